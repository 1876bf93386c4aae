//! In-memory inode store.
//!
//! The device is a set of `SECTOR_SIZE` sectors tracked by a free map. Each
//! inode occupies its header sector plus one sector per `SECTOR_SIZE` bytes of
//! content, so growth of a directory is charged against the same free map as
//! everything else. The bytes themselves live in memory.

use std::{collections::HashMap, fmt, sync::Arc};

use dirfs_params::{MAX_FILE_SIZE, ROOT_DIR_ENTRIES, SECTOR_SIZE};
use dirfs_types::SectorNo;
use parking_lot::Mutex;

use super::{Inode, InodeStore, StorageError};
use crate::{dir, error::FsError};

/// An inode store kept entirely in memory.
pub struct MemStore {
    inner: Arc<Inner>,
}

/// An open reference to an inode of a [`MemStore`].
pub struct MemInode {
    sector: SectorNo,
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
}

struct State {
    free_map: FreeMap,
    disk: HashMap<SectorNo, DiskInode>,
    open: HashMap<SectorNo, OpenInode>,
}

struct DiskInode {
    is_dir: bool,
    data: Vec<u8>,
    blocks: Vec<SectorNo>,
}

struct OpenInode {
    open_cnt: usize,
    removed: bool,
}

/// Bit map of allocated sectors.
struct FreeMap {
    bits: Vec<u8>,
    len: usize,
}

impl FreeMap {
    fn new(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(8)],
            len,
        }
    }

    fn is_allocated(&self, n: usize) -> bool {
        assert!(n < self.len);
        self.bits[n / 8] & (1 << (n % 8)) != 0
    }

    fn mark(&mut self, n: usize) {
        assert!(n < self.len);
        self.bits[n / 8] |= 1 << (n % 8);
    }

    fn free(&mut self, n: usize) {
        assert!(n < self.len);
        self.bits[n / 8] &= !(1 << (n % 8));
    }

    fn allocate(&mut self) -> Option<SectorNo> {
        let n = (0..self.len).find(|&n| !self.is_allocated(n))?;
        let sector = SectorNo::new(u32::try_from(n).ok()?);
        self.mark(n);
        Some(sector)
    }

    fn free_count(&self) -> usize {
        (0..self.len).filter(|&n| !self.is_allocated(n)).count()
    }
}

impl State {
    fn check_range(&self, sector: SectorNo) -> Result<(), StorageError> {
        if sector.as_index() < self.free_map.len {
            Ok(())
        } else {
            Err(StorageError::InvalidSector(sector))
        }
    }

    fn disk(&self, sector: SectorNo) -> &DiskInode {
        let Some(disk) = self.disk.get(&sector) else {
            panic!("open inode {sector} has no disk inode");
        };
        disk
    }

    fn open_inode(&mut self, sector: SectorNo) -> &mut OpenInode {
        let Some(open) = self.open.get_mut(&sector) else {
            panic!("inode {sector} is not open");
        };
        open
    }

    /// Grows the block list of the inode at `sector` to cover `len` bytes.
    fn reserve_blocks(&mut self, sector: SectorNo, len: usize) -> Result<(), StorageError> {
        let have = self.disk(sector).blocks.len();
        let need = len.div_ceil(SECTOR_SIZE);
        let mut new_blocks: Vec<SectorNo> = Vec::with_capacity(need.saturating_sub(have));
        for _ in have..need {
            let Some(bn) = self.free_map.allocate() else {
                for bn in new_blocks {
                    self.free_map.free(bn.as_index());
                }
                return Err(StorageError::NoSpace);
            };
            new_blocks.push(bn);
        }
        if let Some(disk) = self.disk.get_mut(&sector) {
            disk.blocks.extend(new_blocks);
        }
        Ok(())
    }

    fn deallocate(&mut self, sector: SectorNo) {
        if let Some(disk) = self.disk.remove(&sector) {
            for bn in disk.blocks {
                self.free_map.free(bn.as_index());
            }
        }
        self.free_map.free(sector.as_index());
        tracing::trace!(%sector, "inode deallocated");
    }
}

impl MemStore {
    /// Creates a store of `num_sectors` sectors with no inodes.
    ///
    /// The free map sector is reserved.
    ///
    /// # Panics
    ///
    /// Panics if the device is too small to hold the free map and root sectors.
    #[must_use]
    pub fn new(num_sectors: usize) -> Self {
        assert!(
            num_sectors > SectorNo::ROOT.as_index(),
            "device needs at least {} sectors",
            SectorNo::ROOT.as_index() + 1
        );
        let mut free_map = FreeMap::new(num_sectors);
        free_map.mark(SectorNo::FREE_MAP.as_index());
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    free_map,
                    disk: HashMap::new(),
                    open: HashMap::new(),
                }),
            }),
        }
    }

    /// Creates a store of `num_sectors` sectors holding an empty root
    /// directory.
    pub fn format(num_sectors: usize) -> Result<Self, FsError> {
        let store = Self::new(num_sectors);
        dir::create(&store, SectorNo::ROOT, ROOT_DIR_ENTRIES)?;
        tracing::debug!(num_sectors, "formatted");
        Ok(store)
    }

    /// Returns the size of the device in sectors.
    #[must_use]
    pub fn num_sectors(&self) -> usize {
        self.inner.state.lock().free_map.len
    }

    /// Returns the number of free sectors.
    #[must_use]
    pub fn free_sectors(&self) -> usize {
        self.inner.state.lock().free_map.free_count()
    }

    /// Returns `true` if `sector` is marked in use in the free map.
    #[must_use]
    pub fn is_allocated(&self, sector: SectorNo) -> bool {
        let state = self.inner.state.lock();
        sector.as_index() < state.free_map.len && state.free_map.is_allocated(sector.as_index())
    }

    /// Returns the total number of open inode references.
    #[must_use]
    pub fn open_inodes(&self) -> usize {
        self.inner.state.lock().open.values().map(|o| o.open_cnt).sum()
    }
}

impl fmt::Debug for MemStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MemStore")
            .field("sectors", &state.free_map.len)
            .field("inodes", &state.disk.len())
            .field("open", &state.open.len())
            .finish_non_exhaustive()
    }
}

impl InodeStore for MemStore {
    type Inode = MemInode;

    fn allocate(&self) -> Result<SectorNo, StorageError> {
        self.inner
            .state
            .lock()
            .free_map
            .allocate()
            .ok_or(StorageError::NoSpace)
    }

    fn release(&self, sector: SectorNo) {
        let mut state = self.inner.state.lock();
        if state.check_range(sector).is_ok() && !state.disk.contains_key(&sector) {
            state.free_map.free(sector.as_index());
        }
    }

    fn create(&self, sector: SectorNo, length: usize, is_dir: bool) -> Result<(), StorageError> {
        if length > MAX_FILE_SIZE {
            return Err(StorageError::FileTooLarge);
        }

        let mut state = self.inner.state.lock();
        state.check_range(sector)?;
        if state.disk.contains_key(&sector) {
            return Err(StorageError::AlreadyAllocated(sector));
        }

        let was_allocated = state.free_map.is_allocated(sector.as_index());
        state.free_map.mark(sector.as_index());
        state.disk.insert(
            sector,
            DiskInode {
                is_dir,
                data: vec![0; length],
                blocks: Vec::new(),
            },
        );
        if let Err(e) = state.reserve_blocks(sector, length) {
            state.disk.remove(&sector);
            if !was_allocated {
                state.free_map.free(sector.as_index());
            }
            return Err(e);
        }

        tracing::trace!(%sector, length, is_dir, "inode created");
        Ok(())
    }

    fn open(&self, sector: SectorNo) -> Result<MemInode, StorageError> {
        let mut state = self.inner.state.lock();
        state.check_range(sector)?;
        if !state.disk.contains_key(&sector) {
            return Err(StorageError::NotAllocated(sector));
        }
        state
            .open
            .entry(sector)
            .or_insert(OpenInode {
                open_cnt: 0,
                removed: false,
            })
            .open_cnt += 1;
        Ok(MemInode {
            sector,
            inner: Arc::clone(&self.inner),
        })
    }
}

impl Inode for MemInode {
    fn sector(&self) -> SectorNo {
        self.sector
    }

    fn reopen(&self) -> Self {
        self.inner.state.lock().open_inode(self.sector).open_cnt += 1;
        Self {
            sector: self.sector,
            inner: Arc::clone(&self.inner),
        }
    }

    fn read_at(&self, buf: &mut [u8], offset: usize) -> usize {
        let state = self.inner.state.lock();
        let data = &state.disk(self.sector).data;
        let Some(src) = data.get(offset..) else {
            return 0;
        };
        let n = usize::min(src.len(), buf.len());
        buf[..n].copy_from_slice(&src[..n]);
        n
    }

    fn write_at(&self, buf: &[u8], offset: usize) -> Result<usize, StorageError> {
        let end = offset
            .checked_add(buf.len())
            .ok_or(StorageError::FileTooLarge)?;
        if end > MAX_FILE_SIZE {
            return Err(StorageError::FileTooLarge);
        }

        let mut state = self.inner.state.lock();
        state.reserve_blocks(self.sector, end)?;
        let Some(disk) = state.disk.get_mut(&self.sector) else {
            panic!("open inode {} has no disk inode", self.sector);
        };
        if disk.data.len() < end {
            disk.data.resize(end, 0);
        }
        disk.data[offset..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn length(&self) -> usize {
        self.inner.state.lock().disk(self.sector).data.len()
    }

    fn is_dir(&self) -> bool {
        self.inner.state.lock().disk(self.sector).is_dir
    }

    fn is_removed(&self) -> bool {
        self.inner.state.lock().open_inode(self.sector).removed
    }

    fn remove(&self) {
        self.inner.state.lock().open_inode(self.sector).removed = true;
    }
}

impl Drop for MemInode {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        let open = state.open_inode(self.sector);
        open.open_cnt -= 1;
        if open.open_cnt > 0 {
            return;
        }
        let removed = open.removed;
        state.open.remove(&self.sector);
        if removed {
            state.deallocate(self.sector);
        }
    }
}

impl fmt::Debug for MemInode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemInode")
            .field("sector", &self.sector)
            .finish_non_exhaustive()
    }
}
