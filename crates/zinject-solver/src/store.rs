//! Lookup of implementations already present on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::model::ManifestDigest;

/// Content-addressed implementation storage.
pub trait Store {
    fn contains(&self, digest: &ManifestDigest) -> bool;
}

/// A set of digest IDs held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    ids: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, digest: &ManifestDigest) -> &mut Self {
        self.ids.extend(digest.ids());
        self
    }
}

impl Store for InMemoryStore {
    fn contains(&self, digest: &ManifestDigest) -> bool {
        digest.ids().iter().any(|id| self.ids.contains(id))
    }
}

/// Implementations unpacked as `<root>/<algorithm>=<value>` directories.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStore {
    roots: Vec<PathBuf>,
}

impl DirectoryStore {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn path_for(root: &Path, id: &str) -> PathBuf {
        root.join(id)
    }
}

impl Store for DirectoryStore {
    fn contains(&self, digest: &ManifestDigest) -> bool {
        digest
            .ids()
            .iter()
            .any(|id| self.roots.iter().any(|root| Self::path_for(root, id).is_dir()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn digest(sha256: &str) -> ManifestDigest {
        ManifestDigest {
            sha256: Some(sha256.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryStore::new();
        store.add(&digest("abc"));
        assert!(store.contains(&digest("abc")));
        assert!(!store.contains(&digest("def")));
        assert!(!store.contains(&ManifestDigest::default()));
    }

    #[test]
    fn test_directory_store() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sha256=abc")).unwrap();

        let store = DirectoryStore::new(vec![dir.path().to_path_buf()]);
        assert!(store.contains(&digest("abc")));
        assert!(!store.contains(&digest("def")));
    }
}
