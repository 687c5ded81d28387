use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

/// Stability rating of an implementation, as declared by a feed or
/// overridden by the user.
///
/// Ordered from most to least trusted; `Unset` sorts first and means
/// "no rating given".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Stability {
    #[default]
    Unset,
    Preferred,
    Packaged,
    Stable,
    Testing,
    Developer,
    Buggy,
    Insecure,
}

impl Stability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Unset => "unset",
            Stability::Preferred => "preferred",
            Stability::Packaged => "packaged",
            Stability::Stable => "stable",
            Stability::Testing => "testing",
            Stability::Developer => "developer",
            Stability::Buggy => "buggy",
            Stability::Insecure => "insecure",
        }
    }

    /// Buggy and insecure implementations are never chosen automatically
    pub fn is_rejected(&self) -> bool {
        matches!(self, Stability::Buggy | Stability::Insecure)
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stability {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "unset" => Ok(Stability::Unset),
            "preferred" => Ok(Stability::Preferred),
            "packaged" => Ok(Stability::Packaged),
            "stable" => Ok(Stability::Stable),
            "testing" => Ok(Stability::Testing),
            "developer" => Ok(Stability::Developer),
            "buggy" => Ok(Stability::Buggy),
            "insecure" => Ok(Stability::Insecure),
            _ => Err(VersionError::InvalidStability(s.to_string())),
        }
    }
}

impl Serialize for Stability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stability_order() {
        assert!(Stability::Preferred < Stability::Stable);
        assert!(Stability::Stable < Stability::Testing);
        assert!(Stability::Testing < Stability::Buggy);
        assert!(Stability::Buggy < Stability::Insecure);
    }

    #[test]
    fn test_stability_from_str() {
        assert_eq!("Stable".parse::<Stability>().unwrap(), Stability::Stable);
        assert_eq!("".parse::<Stability>().unwrap(), Stability::Unset);
        assert!("rock-solid".parse::<Stability>().is_err());
    }

    #[test]
    fn test_rejected() {
        assert!(Stability::Buggy.is_rejected());
        assert!(Stability::Insecure.is_rejected());
        assert!(!Stability::Developer.is_rejected());
    }
}
