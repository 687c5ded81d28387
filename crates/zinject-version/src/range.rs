use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;
use crate::version::ImplementationVersion;

/// A legacy `not-before`/`before` pair attached to a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<ImplementationVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<ImplementationVersion>,
}

impl Constraint {
    pub fn new(not_before: Option<ImplementationVersion>, before: Option<ImplementationVersion>) -> Self {
        Self { not_before, before }
    }

    pub fn matches(&self, version: &ImplementationVersion) -> bool {
        if let Some(ref low) = self.not_before {
            if version < low {
                return false;
            }
        }
        if let Some(ref high) = self.before {
            if version >= high {
                return false;
            }
        }
        true
    }
}

/// One `|`-separated part of a [`VersionRange`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionRangePart {
    /// `1.2`
    Exact(ImplementationVersion),
    /// `!1.2`
    Exclude(ImplementationVersion),
    /// `1.0..!2.0`, either side optional; the upper bound is exclusive
    Range {
        not_before: Option<ImplementationVersion>,
        before: Option<ImplementationVersion>,
    },
}

impl VersionRangePart {
    fn parse(text: &str, whole: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidRange {
            range: whole.to_string(),
            reason: reason.to_string(),
        };

        if let Some((start, end)) = text.split_once("..") {
            let not_before = match start.trim() {
                "" => None,
                s => Some(ImplementationVersion::parse(s)?),
            };
            let before = match end.trim() {
                "" => None,
                s => {
                    let s = s
                        .strip_prefix('!')
                        .ok_or_else(|| invalid("upper bound must start with '!'"))?;
                    Some(ImplementationVersion::parse(s)?)
                }
            };
            return Ok(VersionRangePart::Range { not_before, before });
        }

        if let Some(excluded) = text.strip_prefix('!') {
            return Ok(VersionRangePart::Exclude(ImplementationVersion::parse(excluded)?));
        }

        if text.is_empty() {
            return Err(invalid("empty range part"));
        }

        Ok(VersionRangePart::Exact(ImplementationVersion::parse(text)?))
    }

    pub fn matches(&self, version: &ImplementationVersion) -> bool {
        match self {
            VersionRangePart::Exact(v) => version == v,
            VersionRangePart::Exclude(v) => version != v,
            VersionRangePart::Range { not_before, before } => {
                Constraint::new(not_before.clone(), before.clone()).matches(version)
            }
        }
    }

    /// Narrows this part by another part, `None` when nothing is left.
    ///
    /// An exclusion that falls inside a range cannot be written as a single
    /// part; the range is kept as is in that case.
    fn intersect(&self, other: &VersionRangePart) -> Option<VersionRangePart> {
        use VersionRangePart::*;

        match (self, other) {
            (Exact(v), other) | (other, Exact(v)) => other.matches(v).then(|| Exact(v.clone())),
            (Exclude(a), Exclude(b)) => {
                if a == b {
                    Some(Exclude(a.clone()))
                } else {
                    Some(Range { not_before: None, before: None })
                }
            }
            (Exclude(_), range @ Range { .. }) | (range @ Range { .. }, Exclude(_)) => Some(range.clone()),
            (
                Range { not_before: low_a, before: high_a },
                Range { not_before: low_b, before: high_b },
            ) => {
                let low = max_option(low_a.clone(), low_b.clone());
                let high = min_option(high_a.clone(), high_b.clone());
                if let (Some(l), Some(h)) = (&low, &high) {
                    if l >= h {
                        return None;
                    }
                }
                Some(Range { not_before: low, before: high })
            }
        }
    }
}

fn max_option(a: Option<ImplementationVersion>, b: Option<ImplementationVersion>) -> Option<ImplementationVersion> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_option(a: Option<ImplementationVersion>, b: Option<ImplementationVersion>) -> Option<ImplementationVersion> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl fmt::Display for VersionRangePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRangePart::Exact(v) => write!(f, "{}", v),
            VersionRangePart::Exclude(v) => write!(f, "!{}", v),
            VersionRangePart::Range { not_before, before } => {
                if let Some(low) = not_before {
                    write!(f, "{}", low)?;
                }
                write!(f, "..")?;
                if let Some(high) = before {
                    write!(f, "!{}", high)?;
                }
                Ok(())
            }
        }
    }
}

/// A set of acceptable versions, e.g. `1.0..!2.0 | 2.5 | !1.3`.
///
/// A version matches when it matches any part. The empty range matches
/// everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionRange {
    parts: Vec<VersionRangePart>,
}

impl VersionRange {
    /// Matches every version
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches no version (`0..!0`)
    pub fn none() -> Self {
        let zero = ImplementationVersion::parse("0").ok();
        Self {
            parts: vec![VersionRangePart::Range { not_before: zero.clone(), before: zero }],
        }
    }

    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::any());
        }

        let parts = trimmed
            .split('|')
            .map(|part| VersionRangePart::parse(&part.replace(' ', ""), trimmed))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { parts })
    }

    pub fn from_parts(parts: Vec<VersionRangePart>) -> Self {
        Self { parts }
    }

    pub fn parts(&self) -> &[VersionRangePart] {
        &self.parts
    }

    pub fn is_any(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn matches(&self, version: &ImplementationVersion) -> bool {
        self.parts.is_empty() || self.parts.iter().any(|p| p.matches(version))
    }

    /// Narrows the range to versions also matching `constraint`
    pub fn intersect(&self, constraint: &Constraint) -> VersionRange {
        if constraint.not_before.is_none() && constraint.before.is_none() {
            return self.clone();
        }

        self.intersect_range(&VersionRange {
            parts: vec![VersionRangePart::Range {
                not_before: constraint.not_before.clone(),
                before: constraint.before.clone(),
            }],
        })
    }

    /// Narrows the range to versions also matching `other`
    pub fn intersect_range(&self, other: &VersionRange) -> VersionRange {
        if self.is_any() {
            return other.clone();
        }
        if other.is_any() {
            return self.clone();
        }

        let mut parts: Vec<VersionRangePart> = Vec::new();
        for a in &self.parts {
            for b in &other.parts {
                if let Some(part) = a.intersect(b) {
                    if !parts.contains(&part) {
                        parts.push(part);
                    }
                }
            }
        }

        if parts.is_empty() {
            Self::none()
        } else {
            Self { parts }
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self
            .parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(" | ");
        write!(f, "{}", text)
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<ImplementationVersion> for VersionRange {
    fn from(version: ImplementationVersion) -> Self {
        Self { parts: vec![VersionRangePart::Exact(version)] }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
