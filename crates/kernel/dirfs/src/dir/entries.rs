//! Lookup, insertion, removal and iteration of directory entries.

use dirfs_types::{DIR_ENTRY_SIZE, DirEntry, FIRST_SLOT_OFFSET, FileName, SectorNo, validate_name};
use mutex_api::Mutex;

use super::{Dir, DirPos, read_entry, write_entry};
use crate::{
    error::FsError,
    storage::{Inode, InodeStore},
};

/// Iterator over the in-use entries of a directory stream.
///
/// Yields each entry together with its byte offset, starting at `pos` and
/// stopping at the first short read.
pub(crate) struct Entries<'a, I> {
    inode: &'a I,
    pos: usize,
}

impl<'a, I> Entries<'a, I> {
    pub(crate) fn new(inode: &'a I, pos: usize) -> Self {
        Self { inode, pos }
    }

    /// Returns the offset of the next record to be examined.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }
}

impl<I> Iterator for Entries<'_, I>
where
    I: Inode,
{
    type Item = (usize, DirEntry);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(de) = read_entry(self.inode, self.pos) {
            let offset = self.pos;
            self.pos += DIR_ENTRY_SIZE;
            tracing::trace!(dir = %self.inode.sector(), offset, in_use = de.is_in_use(), "scan");
            if de.is_in_use() {
                return Some((offset, de));
            }
        }
        None
    }
}

impl<S, L> Dir<'_, S, L>
where
    S: InodeStore,
    L: Mutex<Data = DirPos>,
{
    /// Looks up `name` and opens the inode it refers to.
    ///
    /// `"."` opens the directory itself and `".."` its parent.
    pub fn lookup(&self, name: &str) -> Result<S::Inode, FsError> {
        tracing::debug!(dir = %self.sector(), name, "lookup");
        let _guard = self.lock();
        if name == "." {
            return Ok(self.inode.reopen());
        }
        let sector = self.lookup_locked(name)?;
        Ok(self.store.open(sector)?)
    }

    /// Looks up `name` and returns the sector of the inode it refers to.
    pub fn lookup_sector(&self, name: &str) -> Result<SectorNo, FsError> {
        tracing::debug!(dir = %self.sector(), name, "lookup_sector");
        let _guard = self.lock();
        if name == "." {
            return Ok(self.sector());
        }
        self.lookup_locked(name)
    }

    fn lookup_locked(&self, name: &str) -> Result<SectorNo, FsError> {
        if name == ".." {
            return self.read_parent();
        }
        self.find(name)
            .map(|(_, de)| de.sector())
            .ok_or(FsError::NotFound)
    }

    /// Finds the in-use entry named `name`.
    fn find(&self, name: &str) -> Option<(usize, DirEntry)> {
        self.entries().find(|(_, de)| de.is_same_name(name))
    }

    /// Returns the offset of the first free slot after slot 0, or the end of
    /// the stream if every slot is in use.
    fn free_slot(&self) -> usize {
        let mut offset = FIRST_SLOT_OFFSET;
        while let Some(de) = read_entry(&self.inode, offset) {
            if !de.is_in_use() {
                break;
            }
            offset += DIR_ENTRY_SIZE;
        }
        offset
    }

    /// Adds an entry binding `name` to the inode at `sector`.
    ///
    /// `"."` and `".."` always exist, so adding them fails with
    /// [`FsError::AlreadyExists`].
    ///
    /// If `is_dir` is set, the target's parent link is pointed at this
    /// directory before the entry is written. The entry is not written if that
    /// fails.
    pub fn add(&self, name: &str, sector: SectorNo, is_dir: bool) -> Result<(), FsError> {
        tracing::debug!(dir = %self.sector(), name, %sector, is_dir, "add");
        validate_name(name)?;
        // always resolved by lookup, never stored
        if matches!(name, "." | "..") {
            return Err(FsError::AlreadyExists);
        }

        let _guard = self.lock();
        if self.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }

        if is_dir {
            let inode = self.store.open(sector)?;
            if !inode.is_dir() {
                return Err(FsError::NotADirectory);
            }
            let child = Self::open(self.store, inode);
            if let Err(e) = child.set_parent(self.sector()) {
                tracing::warn!(dir = %self.sector(), name, error = %e, "parent link write failed");
                return Err(e);
            }
        }

        let offset = self.free_slot();
        write_entry(&self.inode, &DirEntry::new(name, sector), offset).inspect_err(|e| {
            tracing::warn!(dir = %self.sector(), name, offset, error = %e, "entry write failed");
        })
    }

    /// Removes the entry named `name` and marks its inode removed.
    ///
    /// A directory can only be removed while it has no entries.
    pub fn remove(&self, name: &str) -> Result<(), FsError> {
        tracing::debug!(dir = %self.sector(), name, "remove");
        let _guard = self.lock();
        let (offset, mut de) = self.find(name).ok_or(FsError::NotFound)?;
        let inode = self.store.open(de.sector())?;

        if inode.is_dir() {
            let target = Self::open(self.store, inode.reopen());
            if !target.is_empty() {
                return Err(FsError::DirectoryNotEmpty);
            }
        }

        de.set_in_use(false);
        write_entry(&self.inode, &de, offset).inspect_err(|e| {
            tracing::warn!(dir = %self.sector(), name, offset, error = %e, "tombstone write failed");
        })?;
        inode.remove();
        Ok(())
    }

    /// Returns `true` if the directory has no entries besides its parent link.
    pub fn is_empty(&self) -> bool {
        let _guard = self.lock();
        self.entries().next().is_none()
    }

    /// Returns the name of the next entry after the cursor and advances it.
    ///
    /// Returns `Ok(None)` once the cursor reaches the end of the directory.
    /// Entries added or removed through other handles while iterating may be
    /// skipped or returned twice.
    pub fn readdir(&self) -> Result<Option<FileName>, FsError> {
        let mut pos = self.lock();
        let mut entries = Entries::new(&self.inode, pos.0);
        let next = entries.next();
        pos.0 = entries.pos();

        let Some((offset, de)) = next else {
            return Ok(None);
        };
        let name = de.name().ok_or(FsError::CorruptEntry { offset })?;
        tracing::debug!(dir = %self.sector(), %name, offset, "readdir");
        Ok(Some(name))
    }

    /// Moves the cursor back to the first entry.
    pub fn rewind(&self) {
        *self.lock() = DirPos::default();
    }
}
