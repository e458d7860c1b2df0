use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::path_display::base_name;

/// A single entry returned by a directory listing.
/// 目錄列表中的單一項目，建立後不可變。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileNode {
    path: PathBuf,
    is_directory: bool,
}

impl FileNode {
    pub fn new(path: impl Into<PathBuf>, is_directory: bool) -> Self {
        Self {
            path: path.into(),
            is_directory,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, false)
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Base name used for ordering and display.
    /// 用於排序與顯示的檔名。
    pub fn name(&self) -> String {
        base_name(&self.path)
    }
}

/// Ordering used for every listing: directories first, then case-insensitive name.
/// 所有列表共用的排序：資料夾優先，其次依不分大小寫的名稱排序。
///
/// The case-sensitive name breaks ties so the order never depends on what the
/// backend returned first.
pub fn compare_nodes(a: &FileNode, b: &FileNode) -> Ordering {
    let (a_name, b_name) = (a.name(), b.name());
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
        .then_with(|| a_name.cmp(&b_name))
}

/// Sorted children of one directory.
/// 單一資料夾排序後的子項目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    path: PathBuf,
    children: Vec<FileNode>,
}

impl DirectoryListing {
    /// Builds a listing, sorting `children` regardless of their incoming order.
    /// 建立列表並依固定規則排序子項目。
    pub fn sorted(path: impl Into<PathBuf>, mut children: Vec<FileNode>) -> Self {
        children.sort_by(compare_nodes);
        Self {
            path: path.into(),
            children,
        }
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            children: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn children(&self) -> &[FileNode] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(listing: &DirectoryListing) -> Vec<String> {
        listing.children().iter().map(FileNode::name).collect()
    }

    #[test]
    fn directories_precede_files_case_insensitively() {
        let listing = DirectoryListing::sorted(
            "/proj",
            vec![
                FileNode::file("/proj/b.txt"),
                FileNode::directory("/proj/src"),
                FileNode::file("/proj/A.md"),
                FileNode::directory("/proj/Docs"),
                FileNode::file("/proj/c.rs"),
            ],
        );
        assert_eq!(names(&listing), vec!["Docs", "src", "A.md", "b.txt", "c.rs"]);
    }

    #[test]
    fn order_is_independent_of_input_order() {
        let entries = vec![
            FileNode::file("/p/readme"),
            FileNode::file("/p/README"),
            FileNode::directory("/p/target"),
            FileNode::file("/p/Cargo.toml"),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        let forward = DirectoryListing::sorted("/p", entries);
        let backward = DirectoryListing::sorted("/p", reversed);
        assert_eq!(forward, backward);
        assert_eq!(names(&forward), vec!["target", "Cargo.toml", "README", "readme"]);
    }
}
