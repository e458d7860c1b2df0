use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::cache::DirectoryCache;
use crate::listing::{DirectoryListing, FileNode};

/// Identifies one directory fetch issued by a [`DirectoryTree`].
/// 目錄抓取請求的識別碼，包含專案根目錄的世代編號。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FetchToken {
    generation: u64,
    serial: u64,
}

impl FetchToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for FetchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:08x}", self.generation, self.serial)
    }
}

/// A listing request the caller must hand to the file authority.
/// 需交由外部檔案服務執行的列表請求。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub token: FetchToken,
    pub path: PathBuf,
}

/// Visible state of a directory node.
/// 資料夾節點的狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Collapsed,
    Fetching,
    Expanded,
}

/// Result of [`DirectoryTree::toggle`].
/// 切換節點後的結果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A file row was activated; the caller opens it.
    OpenFile(PathBuf),
    Collapsed,
    /// Expanded straight from the cache.
    Expanded,
    /// First expansion; the listing must be fetched.
    Fetch(FetchRequest),
    /// A fetch is already running; the intent applied on arrival was flipped.
    Deferred { expand_on_arrival: bool },
}

/// Result of [`DirectoryTree::complete_fetch`].
/// 列表回傳後的處理結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Expanded,
    /// Listing cached but the latest intent was to stay collapsed.
    Cached,
    /// The fetch failed; an empty listing was cached and shown expanded.
    ExpandedEmpty,
    /// The root changed or the fetch was superseded; nothing was applied.
    Stale,
}

/// One rendered row of the tree.
/// 樹狀檢視中的一列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub node: FileNode,
    pub depth: usize,
    pub state: Option<NodeState>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    token: FetchToken,
    expand_on_arrival: bool,
}

/// Lazily materialized view over a [`DirectoryCache`].
/// 以快取為基礎、延遲展開的專案樹。
///
/// Nodes are addressed by path; expansion is a set membership test rather
/// than a flag stored on nodes, so the tree never holds parent/child links.
#[derive(Debug, Default)]
pub struct DirectoryTree {
    root: Option<PathBuf>,
    cache: DirectoryCache,
    in_flight: HashMap<PathBuf, InFlight>,
    generation: u64,
    next_serial: u64,
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn cache(&self) -> &DirectoryCache {
        &self.cache
    }

    /// Current root generation; bumped by every [`DirectoryTree::set_root`].
    /// 目前的根目錄世代編號。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Switches the project root, discarding every cached listing first.
    /// 切換專案根目錄：先完整清除快取與展開狀態，再請求新的根目錄列表。
    pub fn set_root(&mut self, path: impl Into<PathBuf>) -> FetchRequest {
        let path = path.into();
        info!("project root set to {}", path.display());
        self.cache.invalidate_all();
        self.in_flight.clear();
        self.generation = self.generation.wrapping_add(1);
        self.root = Some(path.clone());
        self.begin_fetch(path)
    }

    /// Forgets the root and everything cached for it.
    /// 關閉專案資料夾。
    pub fn clear_root(&mut self) {
        self.cache.invalidate_all();
        self.in_flight.clear();
        self.generation = self.generation.wrapping_add(1);
        self.root = None;
    }

    /// Handles a click on a tree row.
    /// 處理節點點擊：檔案轉交開啟，資料夾切換展開狀態。
    pub fn toggle(&mut self, path: &Path, is_directory: bool) -> ToggleOutcome {
        if !is_directory {
            return ToggleOutcome::OpenFile(path.to_path_buf());
        }

        if let Some(pending) = self.in_flight.get_mut(path) {
            pending.expand_on_arrival = !pending.expand_on_arrival;
            debug!(
                "toggle on {} while fetching; expand on arrival = {}",
                path.display(),
                pending.expand_on_arrival
            );
            return ToggleOutcome::Deferred {
                expand_on_arrival: pending.expand_on_arrival,
            };
        }

        if self.cache.collapse(path) {
            return ToggleOutcome::Collapsed;
        }

        if self.cache.contains(path) {
            self.cache.expand(path);
            return ToggleOutcome::Expanded;
        }

        ToggleOutcome::Fetch(self.begin_fetch(path.to_path_buf()))
    }

    /// Applies a listing result, unless the request is no longer current.
    /// 套用列表結果；若請求已過期（根目錄變更或被取代）則忽略。
    pub fn complete_fetch<E: fmt::Display>(
        &mut self,
        request: &FetchRequest,
        result: Result<Vec<FileNode>, E>,
    ) -> FetchOutcome {
        if request.token.generation != self.generation {
            debug!(
                "discarding listing {} for {}: root changed",
                request.token,
                request.path.display()
            );
            return FetchOutcome::Stale;
        }
        let Some(pending) = self.in_flight.get(&request.path).copied() else {
            return FetchOutcome::Stale;
        };
        if pending.token != request.token {
            return FetchOutcome::Stale;
        }
        self.in_flight.remove(&request.path);

        match result {
            Ok(children) => {
                self.cache
                    .put(DirectoryListing::sorted(request.path.clone(), children));
                if pending.expand_on_arrival {
                    self.cache.expand(request.path.clone());
                    FetchOutcome::Expanded
                } else {
                    FetchOutcome::Cached
                }
            }
            Err(err) => {
                warn!("listing {} failed: {err}", request.path.display());
                self.cache.put(DirectoryListing::empty(request.path.clone()));
                if pending.expand_on_arrival {
                    self.cache.expand(request.path.clone());
                    FetchOutcome::ExpandedEmpty
                } else {
                    FetchOutcome::Cached
                }
            }
        }
    }

    /// State of a directory node.
    /// 查詢資料夾節點狀態。
    pub fn state(&self, path: &Path) -> NodeState {
        if self.in_flight.contains_key(path) {
            NodeState::Fetching
        } else if self.cache.is_expanded(path) {
            NodeState::Expanded
        } else {
            NodeState::Collapsed
        }
    }

    pub fn is_fetching(&self, path: &Path) -> bool {
        self.in_flight.contains_key(path)
    }

    pub fn root_listing(&self) -> Option<&DirectoryListing> {
        self.root.as_deref().and_then(|root| self.cache.get(root))
    }

    /// Flattens the expanded part of the tree below the root, depth first.
    /// 以深度優先方式攤平已展開的節點，供畫面逐列繪製。
    pub fn visible_rows(&self) -> Vec<TreeRow> {
        let mut rows = Vec::new();
        if let Some(root) = self.root.as_deref() {
            if self.cache.is_expanded(root) {
                self.collect_rows(root, 0, &mut rows);
            }
        }
        rows
    }

    fn collect_rows(&self, dir: &Path, depth: usize, rows: &mut Vec<TreeRow>) {
        let Some(listing) = self.cache.get(dir) else {
            return;
        };
        for child in listing.children() {
            let state = child.is_directory().then(|| self.state(child.path()));
            rows.push(TreeRow {
                node: child.clone(),
                depth,
                state,
            });
            if state == Some(NodeState::Expanded) {
                self.collect_rows(child.path(), depth + 1, rows);
            }
        }
    }

    fn begin_fetch(&mut self, path: PathBuf) -> FetchRequest {
        self.next_serial = self.next_serial.wrapping_add(1);
        let token = FetchToken {
            generation: self.generation,
            serial: self.next_serial,
        };
        self.in_flight.insert(
            path.clone(),
            InFlight {
                token,
                expand_on_arrival: true,
            },
        );
        debug!("fetching {} ({token})", path.display());
        FetchRequest { token, path }
    }
}
