use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::listing::DirectoryListing;

/// Previously fetched listings plus the set of expanded directories.
/// 保存已抓取的目錄列表以及目前展開中的資料夾集合。
///
/// Collapsing a directory only removes it from the expansion set; its listing
/// stays cached until [`DirectoryCache::invalidate_all`] is called.
#[derive(Debug, Default, Clone)]
pub struct DirectoryCache {
    listings: HashMap<PathBuf, DirectoryListing>,
    expanded: HashSet<PathBuf>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached listing for `path`, if any.
    /// 取得指定路徑的快取列表。
    pub fn get(&self, path: &Path) -> Option<&DirectoryListing> {
        self.listings.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.listings.contains_key(path)
    }

    /// Stores `listing`, replacing whatever was cached for the same directory.
    /// 寫入列表；同一路徑的舊列表會被整筆取代。
    pub fn put(&mut self, listing: DirectoryListing) {
        self.listings.insert(listing.path().to_path_buf(), listing);
    }

    /// Drops every listing and forgets every expanded directory.
    /// 清除所有快取列表與展開狀態。
    pub fn invalidate_all(&mut self) {
        self.listings.clear();
        self.expanded.clear();
    }

    pub fn expand(&mut self, path: impl Into<PathBuf>) {
        self.expanded.insert(path.into());
    }

    /// Hides the children of `path`; returns `true` if it was expanded.
    /// 收合資料夾（僅隱藏，不移除快取）。
    pub fn collapse(&mut self, path: &Path) -> bool {
        self.expanded.remove(path)
    }

    pub fn is_expanded(&self, path: &Path) -> bool {
        self.expanded.contains(path)
    }

    pub fn expanded(&self) -> impl Iterator<Item = &PathBuf> {
        self.expanded.iter()
    }

    /// Number of cached listings.
    /// 快取中的列表數量。
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty() && self.expanded.is_empty()
    }
}
