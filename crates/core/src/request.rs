use std::fmt;
use std::path::PathBuf;

use quillpad_project::FileNode;

use crate::authority::{LoadedFile, OpenMode, SaveFilter};
use crate::error::AuthorityError;

/// 每個對外請求的唯一編號，完成時用來比對來源。 / Unique id of an outbound request; completions are matched back through it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 工作階段交由外部執行的工作。 / Work the session hands to its external collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    ListDirectory {
        id: RequestId,
        path: PathBuf,
    },
    ReadFile {
        id: RequestId,
        path: PathBuf,
    },
    WriteFile {
        id: RequestId,
        path: PathBuf,
        content: String,
    },
    CheckDirty {
        id: RequestId,
        path: PathBuf,
        content: String,
    },
    ChooseSaveDestination {
        id: RequestId,
        default_name: String,
        filters: Vec<SaveFilter>,
    },
    ChooseOpenTarget {
        id: RequestId,
        mode: OpenMode,
    },
}

impl Request {
    pub fn id(&self) -> RequestId {
        match self {
            Request::ListDirectory { id, .. }
            | Request::ReadFile { id, .. }
            | Request::WriteFile { id, .. }
            | Request::CheckDirty { id, .. }
            | Request::ChooseSaveDestination { id, .. }
            | Request::ChooseOpenTarget { id, .. } => *id,
        }
    }
}

/// 外部工作完成後回傳給工作階段的結果。 / Result of a request, fed back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Listing {
        id: RequestId,
        result: Result<Vec<FileNode>, AuthorityError>,
    },
    FileRead {
        id: RequestId,
        result: Result<LoadedFile, AuthorityError>,
    },
    FileWritten {
        id: RequestId,
        result: Result<(), AuthorityError>,
    },
    DirtyChecked {
        id: RequestId,
        result: Result<bool, AuthorityError>,
    },
    SaveDestination {
        id: RequestId,
        choice: Option<PathBuf>,
    },
    OpenTarget {
        id: RequestId,
        choice: Option<PathBuf>,
    },
}

impl Completion {
    pub fn id(&self) -> RequestId {
        match self {
            Completion::Listing { id, .. }
            | Completion::FileRead { id, .. }
            | Completion::FileWritten { id, .. }
            | Completion::DirtyChecked { id, .. }
            | Completion::SaveDestination { id, .. }
            | Completion::OpenTarget { id, .. } => *id,
        }
    }
}

/// 套用完成結果後的分類。 / How a completion was handled.
///
/// `Stale` covers results whose originating context is gone, `Cancelled` a
/// dismissed dialog, and `Failed` a transient I/O error that has already been
/// logged and recorded as a session event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Stale,
    Cancelled,
    Failed(AuthorityError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}
