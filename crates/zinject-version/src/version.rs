use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

lazy_static! {
    static ref DOTTED_LIST_RE: Regex = Regex::new(r"^\d+(?:\.\d+)*$").unwrap();

    // An additional part: optional modifier followed by an optional dotted list
    static ref PART_RE: Regex = Regex::new(r"^(pre|rc|post)?(\d+(?:\.\d+)*)?$").unwrap();
}

/// Modifier of an additional version part.
///
/// The declaration order is the sort order: `pre < rc < none < post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Modifier {
    Pre,
    Rc,
    #[default]
    None,
    Post,
}

impl Modifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Pre => "pre",
            Modifier::Rc => "rc",
            Modifier::None => "",
            Modifier::Post => "post",
        }
    }
}

/// One `-`-separated part following the leading dotted list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionPart {
    pub modifier: Modifier,
    pub numbers: Vec<u64>,
}

impl VersionPart {
    fn parse(text: &str, whole: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion(whole.to_string());

        let caps = PART_RE.captures(text).ok_or_else(invalid)?;
        let modifier = match caps.get(1).map(|m| m.as_str()) {
            Some("pre") => Modifier::Pre,
            Some("rc") => Modifier::Rc,
            Some("post") => Modifier::Post,
            _ => Modifier::None,
        };
        let numbers = match caps.get(2) {
            Some(list) => parse_dotted_list(list.as_str()).ok_or_else(invalid)?,
            None => Vec::new(),
        };

        // A bare "-" with neither modifier nor number is not a part
        if modifier == Modifier::None && numbers.is_empty() {
            return Err(invalid());
        }

        Ok(Self { modifier, numbers })
    }
}

impl Ord for VersionPart {
    fn cmp(&self, other: &Self) -> Ordering {
        self.modifier
            .cmp(&other.modifier)
            .then_with(|| self.numbers.cmp(&other.numbers))
    }
}

impl PartialOrd for VersionPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for VersionPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.modifier.as_str(), join_dotted(&self.numbers))
    }
}

/// A version as declared by an implementation in a feed.
///
/// The text form is a dotted list of numbers optionally followed by
/// `-`-separated parts such as `pre3`, `rc1`, `post` or `2`:
///
/// ```
/// use zinject_version::ImplementationVersion;
///
/// let rc: ImplementationVersion = "1.0-rc1".parse().unwrap();
/// let release: ImplementationVersion = "1.0".parse().unwrap();
/// assert!(rc < release);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImplementationVersion {
    first: Vec<u64>,
    additional: Vec<VersionPart>,
}

impl ImplementationVersion {
    /// Parse a version string
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        let invalid = || VersionError::InvalidVersion(text.to_string());

        let mut parts = text.split('-');
        let first = parts
            .next()
            .filter(|s| DOTTED_LIST_RE.is_match(s))
            .and_then(parse_dotted_list)
            .ok_or_else(invalid)?;

        let additional = parts
            .map(|part| VersionPart::parse(part, text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { first, additional })
    }

    /// The leading dotted list, e.g. `[1, 2, 3]` for `1.2.3-pre`
    pub fn first_part(&self) -> &[u64] {
        &self.first
    }

    pub fn additional_parts(&self) -> &[VersionPart] {
        &self.additional
    }

    /// True for versions carrying a `pre` or `rc` modifier
    pub fn is_prerelease(&self) -> bool {
        self.additional
            .iter()
            .any(|p| matches!(p.modifier, Modifier::Pre | Modifier::Rc))
    }
}

fn parse_dotted_list(text: &str) -> Option<Vec<u64>> {
    text.split('.').map(|n| n.parse::<u64>().ok()).collect()
}

fn join_dotted(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

impl Ord for ImplementationVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.first.cmp(&other.first) {
            Ordering::Equal => {}
            ord => return ord,
        }

        // Missing parts compare as the default part
        let default = VersionPart::default();
        let len = self.additional.len().max(other.additional.len());
        for i in 0..len {
            let a = self.additional.get(i).unwrap_or(&default);
            let b = other.additional.get(i).unwrap_or(&default);
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }

        Ordering::Equal
    }
}

impl PartialOrd for ImplementationVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ImplementationVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", join_dotted(&self.first))?;
        for part in &self.additional {
            write!(f, "-{}", part)?;
        }
        Ok(())
    }
}

impl FromStr for ImplementationVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ImplementationVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ImplementationVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ImplementationVersion {
        ImplementationVersion::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(v("1.2.3").first_part(), &[1, 2, 3]);
        assert!(v("1.2.3").additional_parts().is_empty());
        assert_eq!(v(" 7 ").to_string(), "7");
    }

    #[test]
    fn test_parse_with_modifiers() {
        let version = v("1.0-pre3-post");
        assert_eq!(version.additional_parts().len(), 2);
        assert_eq!(version.additional_parts()[0].modifier, Modifier::Pre);
        assert_eq!(version.additional_parts()[0].numbers, vec![3]);
        assert_eq!(version.additional_parts()[1].modifier, Modifier::Post);
        assert_eq!(version.to_string(), "1.0-pre3-post");
        assert!(version.is_prerelease());
    }

    #[test]
    fn test_parse_invalid() {
        for text in ["", "-1", "1..2", "1.", "a.b", "1.0-beta", "1.0-", "1.0--2", "v1.0"] {
            assert!(
                ImplementationVersion::parse(text).is_err(),
                "{:?} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_ordering_dotted_list() {
        assert!(v("1.0") < v("1.1"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("1.0") < v("1.0.0"));
        assert!(v("2") > v("1.99.99"));
        assert_eq!(v("1.0").cmp(&v("1.0")), Ordering::Equal);
    }

    #[test]
    fn test_ordering_modifiers() {
        let ordered = ["1.0-pre1", "1.0-pre2", "1.0-rc1", "1.0", "1.0-1", "1.0-post", "1.0.1"];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&v("1.2-rc3")).unwrap();
        assert_eq!(json, "\"1.2-rc3\"");
        let back: ImplementationVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.2-rc3"));
        assert!(serde_json::from_str::<ImplementationVersion>("\"x\"").is_err());
    }
}
