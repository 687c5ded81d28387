use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use url::Url;

use crate::error::{Result, SolverError};

const DISTRIBUTION_PREFIX: &str = "distribution:";

/// Identifier of an interface or feed: an HTTP(S) URL, a `file://` URL or
/// an absolute local path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeedUri(String);

impl FeedUri {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SolverError::InvalidUri(text.to_string()));
        }

        if let Some(inner) = text.strip_prefix(DISTRIBUTION_PREFIX) {
            let inner = Self::parse(inner)?;
            return Ok(FeedUri(format!("{}{}", DISTRIBUTION_PREFIX, inner.0)));
        }

        if text.starts_with("http://") || text.starts_with("https://") || text.starts_with("file://") {
            let url = Url::parse(text).map_err(|_| SolverError::InvalidUri(text.to_string()))?;
            if url.scheme() != "file" && url.host_str().is_none() {
                return Err(SolverError::InvalidUri(text.to_string()));
            }
            return Ok(FeedUri(text.to_string()));
        }

        if Path::new(text).is_absolute() {
            return Ok(FeedUri(text.to_string()));
        }

        Err(SolverError::InvalidUri(text.to_string()))
    }

    /// The pseudo feed holding native packages for `self`
    pub fn as_distribution(&self) -> FeedUri {
        if self.is_distribution() {
            self.clone()
        } else {
            FeedUri(format!("{}{}", DISTRIBUTION_PREFIX, self.0))
        }
    }

    pub fn is_distribution(&self) -> bool {
        self.0.starts_with(DISTRIBUTION_PREFIX)
    }

    /// Local file backing this URI, if it names one
    pub fn local_path(&self) -> Option<&Path> {
        if let Some(path) = self.0.strip_prefix("file://") {
            return Some(Path::new(path));
        }
        if self.0.starts_with("http://") || self.0.starts_with("https://") || self.is_distribution() {
            return None;
        }
        Some(Path::new(&self.0))
    }

    /// Filesystem-safe form, used for cache and preference file names
    pub fn escape(&self) -> String {
        url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for FeedUri {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FeedUri {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FeedUri {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
