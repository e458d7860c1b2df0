use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// 外部檔案服務回報的暫時性錯誤；僅能由使用者重試。 / Transient failures reported by the file authority; retried only by user action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorityError {
    #[error("{} not found", .0.display())]
    NotFound(PathBuf),
    #[error("permission denied for {}", .0.display())]
    PermissionDenied(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not valid text in a supported encoding", .0.display())]
    InvalidEncoding(PathBuf),
    #[error("I/O error on {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

impl AuthorityError {
    /// 將 `io::Error` 依種類轉換並附上路徑。 / Classifies an `io::Error` and attaches the affected path.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            ErrorKind::NotFound => AuthorityError::NotFound(path),
            ErrorKind::PermissionDenied => AuthorityError::PermissionDenied(path),
            _ => AuthorityError::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    /// 錯誤所屬的路徑。 / Path the failure refers to.
    pub fn path(&self) -> &Path {
        match self {
            AuthorityError::NotFound(path)
            | AuthorityError::PermissionDenied(path)
            | AuthorityError::NotADirectory(path)
            | AuthorityError::InvalidEncoding(path) => path,
            AuthorityError::Io { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified() {
        let path = Path::new("/missing.txt");
        let err = AuthorityError::from_io(path, io::Error::from(ErrorKind::NotFound));
        assert_eq!(err, AuthorityError::NotFound(path.to_path_buf()));

        let err = AuthorityError::from_io(path, io::Error::new(ErrorKind::Other, "disk full"));
        assert!(matches!(err, AuthorityError::Io { ref message, .. } if message == "disk full"));
        assert_eq!(err.path(), path);
    }
}
