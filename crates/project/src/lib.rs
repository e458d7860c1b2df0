//! Project folder primitives for QuillPad: path labels, directory cache and tree.
//! 管理 QuillPad 專案資料夾的核心模組：路徑顯示、目錄快取與專案樹。

pub mod cache;
pub mod listing;
pub mod path_display;
pub mod tree;

pub use cache::DirectoryCache;
pub use listing::{compare_nodes, DirectoryListing, FileNode};
pub use path_display::{base_name, display_name};
pub use tree::{
    DirectoryTree, FetchOutcome, FetchRequest, FetchToken, NodeState, ToggleOutcome, TreeRow,
};
