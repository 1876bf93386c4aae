use strum::FromRepr;

use crate::{error::FsError, storage::StorageError};

/// Errors returned to user code, numbered like their errno counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, thiserror::Error)]
#[repr(isize)]
pub enum SyscallError {
    // ENOENT
    #[error("no such file or directory")]
    FsEntryNotFound = 2,
    // EIO
    #[error("input/output error")]
    Io = 5,
    // EBADF
    #[error("bad file descriptor")]
    BadFileDescriptor = 9,
    // EBUSY
    #[error("device or resource busy")]
    ResourceBusy = 16,
    // EEXIST
    #[error("file exists")]
    AlreadyExists = 17,
    // ENOTDIR
    #[error("not a directory")]
    NotADirectory = 20,
    // EISDIR
    #[error("is a directory")]
    IsADirectory = 21,
    // EINVAL
    #[error("invalid argument")]
    InvalidInput = 22,
    // EMFILE
    #[error("too many open files")]
    TooManyOpenFiles = 24,
    // EFBIG
    #[error("file too large")]
    FileTooLarge = 27,
    // ENOSPC
    #[error("no space left on device")]
    StorageFull = 28,
    // ENAMETOOLONG
    #[error("file name too long")]
    InvalidFilename = 36,
    // ENOTEMPTY
    #[error("directory not empty")]
    DirectoryNotEmpty = 39,
}

impl SyscallError {
    /// Returns the errno value of the error.
    #[must_use]
    pub fn code(self) -> isize {
        self as isize
    }
}

impl From<StorageError> for SyscallError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NoSpace => Self::StorageFull,
            StorageError::FileTooLarge => Self::FileTooLarge,
            StorageError::InvalidSector(_)
            | StorageError::AlreadyAllocated(_)
            | StorageError::NotAllocated(_)
            | StorageError::Io => Self::Io,
        }
    }
}

impl From<FsError> for SyscallError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::InvalidName(_) | FsError::ComponentTooLong => Self::InvalidFilename,
            FsError::AlreadyExists => Self::AlreadyExists,
            FsError::NotFound | FsError::Removed => Self::FsEntryNotFound,
            FsError::DirectoryNotEmpty => Self::DirectoryNotEmpty,
            FsError::NotADirectory => Self::NotADirectory,
            FsError::EmptyPath => Self::InvalidInput,
            FsError::CorruptEntry { .. } => Self::Io,
            FsError::Storage(e) => e.into(),
        }
    }
}
