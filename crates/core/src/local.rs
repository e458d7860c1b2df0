use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::debug;
use quillpad_project::FileNode;

use crate::authority::{FileAuthority, LoadedFile};
use crate::error::AuthorityError;
use crate::text::decode_text;

/// 以本機檔案系統實作的檔案權威。 / File authority backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileAuthority;

impl LocalFileAuthority {
    pub fn new() -> Self {
        Self
    }

    fn read_text(path: &Path) -> Result<String, AuthorityError> {
        let bytes = fs::read(path).map_err(|err| AuthorityError::from_io(path, err))?;
        decode_text(&bytes).map_err(|_| AuthorityError::InvalidEncoding(path.to_path_buf()))
    }
}

impl FileAuthority for LocalFileAuthority {
    fn list_directory(&mut self, path: &Path) -> Result<Vec<FileNode>, AuthorityError> {
        let metadata = fs::metadata(path).map_err(|err| AuthorityError::from_io(path, err))?;
        if !metadata.is_dir() {
            return Err(AuthorityError::NotADirectory(path.to_path_buf()));
        }

        let mut nodes = Vec::new();
        for entry in fs::read_dir(path).map_err(|err| AuthorityError::from_io(path, err))? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("skipping unreadable entry in {}: {err}", path.display());
                    continue;
                }
            };
            // 符號連結依其目標判斷是否為資料夾。 / Symlinks count as directories when their target is one.
            let is_directory = match entry.file_type() {
                Ok(kind) if kind.is_symlink() => entry.path().is_dir(),
                Ok(kind) => kind.is_dir(),
                Err(_) => continue,
            };
            nodes.push(FileNode::new(entry.path(), is_directory));
        }
        Ok(nodes)
    }

    fn read_file(&mut self, path: &Path) -> Result<LoadedFile, AuthorityError> {
        let canonical = fs::canonicalize(path).map_err(|err| AuthorityError::from_io(path, err))?;
        let content = Self::read_text(&canonical)?;
        Ok(LoadedFile {
            path: canonical,
            content,
        })
    }

    fn write_file(&mut self, path: &Path, content: &str) -> Result<(), AuthorityError> {
        write_atomic(path, content.as_bytes()).map_err(|err| AuthorityError::from_io(path, err))
    }

    fn check_dirty(&mut self, path: &Path, content: &str) -> Result<bool, AuthorityError> {
        let saved = Self::read_text(path)?;
        Ok(saved != content)
    }
}

/// 先寫入同層暫存檔再重新命名，避免留下寫到一半的檔案。 / Writes through a temporary sibling plus rename so readers never see a partial file.
fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp_path = temporary_sibling(path);
    {
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
}

fn temporary_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".quillpad-tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn list_directory_reports_kinds() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("notes.md"), "hi").unwrap();

        let mut authority = LocalFileAuthority::new();
        let mut nodes = authority.list_directory(dir.path()).unwrap();
        nodes.sort_by(quillpad_project::compare_nodes);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].is_directory());
        assert_eq!(nodes[1].name(), "notes.md");
    }

    #[test]
    fn list_directory_on_file_fails() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let err = LocalFileAuthority::new().list_directory(&file).unwrap_err();
        assert_eq!(err, AuthorityError::NotADirectory(file));
    }

    #[test]
    fn write_then_check_dirty() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("draft.txt");
        let mut authority = LocalFileAuthority::new();

        authority.write_file(&file, "foo").unwrap();
        assert!(!authority.check_dirty(&file, "foo").unwrap());
        assert!(authority.check_dirty(&file, "foobar").unwrap());
        assert!(!temporary_sibling(&file).exists());
    }

    #[test]
    fn read_file_canonicalizes_and_reports_missing() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        fs::write(&file, "alpha").unwrap();
        let mut authority = LocalFileAuthority::new();

        let loaded = authority.read_file(&dir.path().join(".").join("a.txt")).unwrap();
        assert_eq!(loaded.path, fs::canonicalize(&file).unwrap());
        assert_eq!(loaded.content, "alpha");

        let missing = dir.path().join("gone.txt");
        let err = authority.read_file(&missing).unwrap_err();
        assert_eq!(err, AuthorityError::NotFound(missing));
    }
}
