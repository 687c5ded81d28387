//! Feed documents and the implementations they declare.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use zinject_version::{ImplementationVersion, Stability};

use super::architecture::{Architecture, Os};
use super::element::{Binding, Command, Dependency, Restriction};
use super::uri::FeedUri;

/// Content hashes identifying an implementation in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestDigest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1new: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256new: Option<String>,
}

impl ManifestDigest {
    /// All known digests as `algorithm=value`, strongest first
    pub fn ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(ref value) = self.sha256new {
            ids.push(format!("sha256new_{}", value));
        }
        if let Some(ref value) = self.sha256 {
            ids.push(format!("sha256={}", value));
        }
        if let Some(ref value) = self.sha1new {
            ids.push(format!("sha1new={}", value));
        }
        ids
    }

    pub fn best(&self) -> Option<String> {
        self.ids().into_iter().next()
    }

    pub fn is_empty(&self) -> bool {
        self.sha1new.is_none() && self.sha256.is_none() && self.sha256new.is_none()
    }
}

/// A native package backing an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NativePackage {
    pub distribution: String,
    pub package: String,
    #[serde(default)]
    pub installed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_test_file: Option<String>,
}

/// One concrete build of an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Implementation {
    pub id: String,

    pub version: ImplementationVersion,

    #[serde(default)]
    pub architecture: Architecture,

    #[serde(default)]
    pub stability: Stability,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,

    #[serde(default, skip_serializing_if = "ManifestDigest::is_empty")]
    pub manifest_digest: ManifestDigest,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restrictions: Vec<Restriction>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,

    /// Set for implementations provided by the package manager
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub native: Option<NativePackage>,
}

impl Implementation {
    pub fn new(id: impl Into<String>, version: ImplementationVersion) -> Self {
        Self {
            id: id.into(),
            version,
            architecture: Architecture::default(),
            stability: Stability::Unset,
            released: None,
            license: None,
            languages: BTreeSet::new(),
            local_path: None,
            manifest_digest: ManifestDigest::default(),
            commands: Vec::new(),
            dependencies: Vec::new(),
            restrictions: Vec::new(),
            bindings: Vec::new(),
            native: None,
        }
    }

    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn distribution(&self) -> Option<&str> {
        self.native.as_ref().map(|n| n.distribution.as_str())
    }

    /// Dependencies that apply on `os`
    pub fn dependencies_for(&self, os: Os) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |d| d.restriction.os.is_compatible(os))
    }

    /// Restrictions that apply on `os`
    pub fn restrictions_for(&self, os: Os) -> impl Iterator<Item = &Restriction> {
        self.restrictions.iter().filter(move |r| r.os.is_compatible(os))
    }
}

/// A placeholder asking the package manager for native packages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageImplementation {
    pub package: String,

    /// Distributions this package name is valid for; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bindings: Vec<Binding>,
}

/// A pointer to another feed with more implementations of the same interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeedReference {
    pub source: FeedUri,

    #[serde(default)]
    pub architecture: Architecture,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub languages: BTreeSet<String>,
}

impl FeedReference {
    pub fn new(source: FeedUri) -> Self {
        Self {
            source,
            architecture: Architecture::default(),
            languages: BTreeSet::new(),
        }
    }
}

/// A parsed feed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Feed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<FeedUri>,

    #[serde(default)]
    pub name: String,

    /// Oldest solver able to understand this feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_injector_version: Option<ImplementationVersion>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implementations: Vec<Implementation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_implementations: Vec<PackageImplementation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<FeedReference>,
}

impl Feed {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uri: None,
            name: name.into(),
            min_injector_version: None,
            implementations: Vec::new(),
            package_implementations: Vec::new(),
            feeds: Vec::new(),
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn implementation(&self, id: &str) -> Option<&Implementation> {
        self.implementations.iter().find(|i| i.id == id)
    }
}
