//! Directory handles.
//!
//! A [`Dir`] owns one reference to a directory inode, a read cursor used by
//! [`Dir::readdir()`], and a lock. The lock belongs to the handle, not to the
//! inode: two handles opened separately on the same directory do not exclude
//! each other. Operations issued through one handle are serialized; operations
//! issued through different handles are only as ordered as the individual
//! `read_at`/`write_at` calls of the inode layer.

use core::fmt;

use dirfs_types::{DIR_ENTRY_SIZE, DirEntry, FIRST_SLOT_OFFSET, SectorNo};
use mutex_api::Mutex;

use crate::{
    error::FsError,
    storage::{Inode, InodeStore, StorageError},
};

pub(crate) use self::entries::Entries;

mod entries;

/// Read cursor of a directory handle, as a byte offset into the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirPos(pub(crate) usize);

impl Default for DirPos {
    fn default() -> Self {
        Self(FIRST_SLOT_OFFSET)
    }
}

/// The lock a [`Dir`] uses unless told otherwise.
pub type DirLock = parking_lot::Mutex<DirPos>;

/// An open directory.
///
/// Closing the handle (dropping it) closes the inode reference it owns.
pub struct Dir<'s, S, L = DirLock>
where
    S: InodeStore,
{
    store: &'s S,
    inode: S::Inode,
    pos: L,
}

impl<S, L> fmt::Debug for Dir<'_, S, L>
where
    S: InodeStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dir")
            .field("sector", &self.inode.sector())
            .finish_non_exhaustive()
    }
}

/// Creates a directory inode at `sector` with room for `entry_cnt` entries.
///
/// Slot 0 is written with `sector` itself, so the new directory is its own
/// parent until it is linked into another directory.
pub fn create<S>(store: &S, sector: SectorNo, entry_cnt: usize) -> Result<(), FsError>
where
    S: InodeStore,
{
    store.create(sector, entry_cnt * DIR_ENTRY_SIZE, true)?;
    let dir: Dir<'_, S> = Dir::open(store, store.open(sector)?);
    dir.set_parent(sector)
}

impl<'s, S, L> Dir<'s, S, L>
where
    S: InodeStore,
    L: Mutex<Data = DirPos>,
{
    /// Opens a directory on `inode`, taking over the reference.
    pub fn open(store: &'s S, inode: S::Inode) -> Self {
        tracing::trace!(sector = %inode.sector(), "dir open");
        Self {
            store,
            inode,
            pos: L::new(DirPos::default()),
        }
    }

    /// Opens the root directory.
    pub fn open_root(store: &'s S) -> Result<Self, FsError> {
        Ok(Self::open(store, store.open(SectorNo::ROOT)?))
    }

    /// Opens a new handle on the same directory.
    ///
    /// The new handle has its own cursor and its own lock.
    #[must_use]
    pub fn reopen(&self) -> Self {
        Self::open(self.store, self.inode.reopen())
    }

    /// Closes the handle.
    pub fn close(self) {
        drop(self);
    }

    /// Returns the inode backing this directory.
    pub fn inode(&self) -> &S::Inode {
        &self.inode
    }

    /// Returns the sector of the inode backing this directory.
    pub fn sector(&self) -> SectorNo {
        self.inode.sector()
    }

    /// Returns the store this directory lives in.
    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Returns `true` if the directory has been removed from its parent.
    pub fn is_removed(&self) -> bool {
        self.inode.is_removed()
    }

    fn lock(&self) -> L::Guard<'_> {
        self.pos.lock()
    }

    /// Returns the sector stored in slot 0.
    pub fn parent(&self) -> Result<SectorNo, FsError> {
        let _guard = self.lock();
        self.read_parent()
    }

    /// Overwrites slot 0 with `parent`.
    pub fn set_parent(&self, parent: SectorNo) -> Result<(), FsError> {
        let _guard = self.lock();
        write_entry(&self.inode, &DirEntry::parent_link(parent), 0)
    }

    fn read_parent(&self) -> Result<SectorNo, FsError> {
        read_entry(&self.inode, 0)
            .map(|de| de.sector())
            .ok_or(FsError::Storage(StorageError::Io))
    }

    fn entries(&self) -> Entries<'_, S::Inode> {
        Entries::new(&self.inode, FIRST_SLOT_OFFSET)
    }
}

impl<S, L> Drop for Dir<'_, S, L>
where
    S: InodeStore,
{
    fn drop(&mut self) {
        tracing::trace!(sector = %self.inode.sector(), "dir close");
    }
}

/// Reads the record at `offset`.
///
/// Returns `None` at the end of the stream, including when less than a whole
/// record is left.
fn read_entry<I>(inode: &I, offset: usize) -> Option<DirEntry>
where
    I: Inode,
{
    let mut buf = [0; DIR_ENTRY_SIZE];
    if inode.read_at(&mut buf, offset) < DIR_ENTRY_SIZE {
        return None;
    }
    DirEntry::from_bytes(&buf)
}

/// Writes `de` at `offset`.
fn write_entry<I>(inode: &I, de: &DirEntry, offset: usize) -> Result<(), FsError>
where
    I: Inode,
{
    if inode.write_at(de.to_bytes(), offset)? != DIR_ENTRY_SIZE {
        return Err(StorageError::Io.into());
    }
    Ok(())
}
