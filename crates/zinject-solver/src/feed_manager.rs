//! Access to parsed feeds.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;

use crate::error::{Result, SolverError};
use crate::model::{Feed, FeedUri};

/// Provides feed documents by URI.
pub trait FeedManager {
    fn get_feed(&self, uri: &FeedUri) -> Result<Arc<Feed>>;

    /// Set once any feed handed out was older than the freshness threshold
    fn is_stale(&self) -> bool {
        false
    }
}

/// Feeds registered up front.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFeedManager {
    feeds: IndexMap<FeedUri, Arc<Feed>>,
}

impl InMemoryFeedManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, uri: FeedUri, mut feed: Feed) -> &mut Self {
        feed.uri.get_or_insert_with(|| uri.clone());
        self.feeds.insert(uri, Arc::new(feed));
        self
    }
}

impl FeedManager for InMemoryFeedManager {
    fn get_feed(&self, uri: &FeedUri) -> Result<Arc<Feed>> {
        self.feeds
            .get(uri)
            .cloned()
            .ok_or_else(|| SolverError::feed(uri, "Feed not found"))
    }
}

/// Feeds cached as JSON files named after the escaped feed URI.
///
/// Local feed URIs (absolute paths, `file://`) are read directly.
#[derive(Debug)]
pub struct DirectoryFeedManager {
    dirs: Vec<PathBuf>,
    freshness: Option<Duration>,
    stale: AtomicBool,
}

impl DirectoryFeedManager {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            freshness: None,
            stale: AtomicBool::new(false),
        }
    }

    /// Feeds last written longer ago than `freshness` mark the manager stale
    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.freshness = Some(freshness).filter(|f| !f.is_zero());
        self
    }

    fn locate(&self, uri: &FeedUri) -> Option<PathBuf> {
        if let Some(path) = uri.local_path() {
            return Some(path.to_path_buf()).filter(|p| p.is_file());
        }

        let file_name = format!("{}.json", uri.escape());
        self.dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
    }

    fn check_freshness(&self, path: &Path) {
        let Some(freshness) = self.freshness else {
            return;
        };

        let age = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok());

        if let Some(age) = age {
            if age > freshness {
                log::debug!("Feed {} is {}s old, marking as stale", path.display(), age.as_secs());
                self.stale.store(true, Ordering::Relaxed);
            }
        }
    }
}

impl FeedManager for DirectoryFeedManager {
    fn get_feed(&self, uri: &FeedUri) -> Result<Arc<Feed>> {
        let path = self
            .locate(uri)
            .ok_or_else(|| SolverError::feed(uri, "Feed is not cached"))?;

        log::debug!("Loading feed {} from {}", uri, path.display());
        let contents = fs::read_to_string(&path).map_err(|e| SolverError::feed(uri, e))?;
        let mut feed = Feed::from_json(&contents).map_err(|e| SolverError::feed(uri, e))?;
        feed.uri.get_or_insert_with(|| uri.clone());

        self.check_freshness(&path);
        Ok(Arc::new(feed))
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Relaxed)
    }
}
