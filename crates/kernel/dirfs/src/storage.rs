//! The inode layer seen from the directory layer.
//!
//! An inode is a reference-counted, byte-addressable stream identified by the
//! sector of its header. The directory layer never looks at block maps or the
//! cache; it only needs the operations below.
//!
//! Reference counting belongs to the store: every [`Inode`] value is one open
//! reference, [`Inode::reopen()`] takes another, and dropping the value closes
//! it. An inode marked with [`Inode::remove()`] stays readable through the
//! references that are still open and is deallocated when the last one is
//! dropped.

use dirfs_types::SectorNo;

pub use self::mem::{MemInode, MemStore};

mod mem;

/// Failures reported by the inode layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("no free sectors left on the device")]
    NoSpace,
    #[error("sector {0} is outside the device")]
    InvalidSector(SectorNo),
    #[error("sector {0} is already allocated")]
    AlreadyAllocated(SectorNo),
    #[error("sector {0} holds no inode")]
    NotAllocated(SectorNo),
    #[error("file would exceed the maximum file size")]
    FileTooLarge,
    #[error("input/output error")]
    Io,
}

/// An open reference to an inode.
///
/// Dropping the value closes the reference.
pub trait Inode: Sized {
    /// Returns the sector number identifying this inode.
    fn sector(&self) -> SectorNo;

    /// Opens another reference to the same inode.
    #[must_use]
    fn reopen(&self) -> Self;

    /// Reads bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// at the end of the stream.
    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize;

    /// Writes `buf` at `offset`, growing the stream if needed.
    ///
    /// A gap between the current end and `offset` reads back as zeros.
    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, StorageError>;

    /// Returns the length of the stream in bytes.
    fn length(&self) -> usize;

    /// Returns `true` if this inode backs a directory.
    fn is_dir(&self) -> bool;

    /// Returns `true` if the inode was removed and waits for its last close.
    fn is_removed(&self) -> bool;

    /// Marks the inode to be deallocated when its last reference is closed.
    fn remove(&self);
}

/// An inode store: the free map plus the table of inodes.
pub trait InodeStore {
    type Inode: Inode;

    /// Allocates a free sector for a new inode.
    fn allocate(&self) -> Result<SectorNo, StorageError>;

    /// Returns a sector obtained by [`allocate()`](Self::allocate) that ended
    /// up unused.
    fn release(&self, sector: SectorNo);

    /// Writes a new inode of `length` zero bytes to `sector`.
    fn create(&self, sector: SectorNo, length: usize, is_dir: bool) -> Result<(), StorageError>;

    /// Opens the inode at `sector`.
    ///
    /// Opening an inode that is already open returns a new reference to the
    /// same in-memory inode.
    fn open(&self, sector: SectorNo) -> Result<Self::Inode, StorageError>;
}
