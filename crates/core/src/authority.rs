use std::path::{Path, PathBuf};

use quillpad_project::FileNode;

use crate::error::AuthorityError;

/// 讀取檔案後得到的正規化路徑與內容。 / Canonical path and text returned by a file read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub content: String,
}

/// 儲存對話框的檔案類型篩選。 / File-type filter offered by the save dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl SaveFilter {
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }
}

/// 開啟對話框要選擇的目標種類。 / What the open dialog should pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    File,
    Directory,
}

/// 外部檔案內容權威：列目錄、讀寫檔案與比對已儲存內容。 / External file-content authority: listing, reads, writes and saved-content comparison.
pub trait FileAuthority {
    /// 列出目錄內容（不保證順序）。 / Lists a directory; no ordering guarantee.
    fn list_directory(&mut self, path: &Path) -> Result<Vec<FileNode>, AuthorityError>;

    fn read_file(&mut self, path: &Path) -> Result<LoadedFile, AuthorityError>;

    fn write_file(&mut self, path: &Path, content: &str) -> Result<(), AuthorityError>;

    /// 比較 `content` 與最後儲存於 `path` 的內容。 / Compares `content` against the last persisted bytes of `path`.
    fn check_dirty(&mut self, path: &Path, content: &str) -> Result<bool, AuthorityError>;
}

/// 原生對話框；回傳 `None` 代表使用者取消。 / Native dialogs; `None` means the user dismissed them.
pub trait DialogProvider {
    fn choose_save_destination(
        &mut self,
        default_name: &str,
        filters: &[SaveFilter],
    ) -> Option<PathBuf>;

    fn choose_open_target(&mut self, mode: OpenMode) -> Option<PathBuf>;
}
