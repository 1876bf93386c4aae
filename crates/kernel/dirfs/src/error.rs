use dirfs_types::NameError;

use crate::storage::StorageError;

/// Failures of directory operations and path resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsError {
    #[error("invalid file name: {0}")]
    InvalidName(#[from] NameError),
    #[error("file exists")]
    AlreadyExists,
    #[error("no such file or directory")]
    NotFound,
    #[error("directory not empty")]
    DirectoryNotEmpty,
    #[error("path component too long")]
    ComponentTooLong,
    #[error("directory has been removed")]
    Removed,
    #[error("not a directory")]
    NotADirectory,
    #[error("empty path")]
    EmptyPath,
    #[error("corrupt directory entry at offset {offset}")]
    CorruptEntry { offset: usize },
    #[error(transparent)]
    Storage(#[from] StorageError),
}
