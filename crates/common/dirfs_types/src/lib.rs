//! Data types shared by the directory layer and its storage.
//!
//! A directory is an ordinary byte stream holding a dense array of
//! [`DirEntry`] records:
//!
//! | slot | offset                | content                                       |
//! |------|-----------------------|-----------------------------------------------|
//! | 0    | 0                     | parent link (`sector` of `..`, never in use)  |
//! | 1..  | `i * DIR_ENTRY_SIZE`  | named entries, in use or tombstoned           |
//!
//! There is no free list. A free slot is any record with `in_use == 0` after
//! slot 0, found by scanning.

#![cfg_attr(not(test), no_std)]

use core::fmt;

use arrayvec::ArrayString;
use dataview::{Pod, PodMethods as _};
use dirfs_params::{FREE_MAP_SECTOR, NAME_MAX, ROOT_DIR_SECTOR};

/// Path component separator.
pub const SEPARATOR: char = '/';

/// A file name that fits in a directory entry.
pub type FileName = ArrayString<NAME_MAX>;

/// Locator of an inode: the sector holding its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod)]
#[repr(transparent)]
pub struct SectorNo(u32);

impl fmt::Display for SectorNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SectorNo {
    /// Sector of the free map.
    pub const FREE_MAP: Self = Self::new(FREE_MAP_SECTOR);
    /// Sector of the root directory.
    pub const ROOT: Self = Self::new(ROOT_DIR_SECTOR);

    /// Creates a new `SectorNo` with the given value.
    #[must_use]
    pub const fn new(n: u32) -> Self {
        Self(n)
    }

    /// Returns the value of the sector number.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Converts the sector number to an index.
    #[must_use]
    pub const fn as_index(&self) -> usize {
        self.0 as usize
    }
}

/// Reasons a string cannot be stored as a directory entry name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("file name is empty")]
    Empty,
    #[error("file name is {0} bytes long, limit is {limit}", limit = NAME_MAX)]
    TooLong(usize),
    #[error("file name contains a path separator")]
    Separator,
    #[error("file name contains a NUL byte")]
    Nul,
}

/// Checks that `name` can be stored in a [`DirEntry`].
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.len() > NAME_MAX {
        return Err(NameError::TooLong(name.len()));
    }
    if name.contains(SEPARATOR) {
        return Err(NameError::Separator);
    }
    if memchr::memchr(0, name.as_bytes()).is_some() {
        return Err(NameError::Nul);
    }
    Ok(())
}

/// On-disk directory entry.
#[repr(C)]
#[derive(Debug, Clone, Pod)]
pub struct DirEntry {
    sector: u32,
    name: [u8; NAME_MAX + 1],
    in_use: u8,
}
const _: () = const { assert!(size_of::<DirEntry>() == 4 + NAME_MAX + 1 + 1) };

/// Size of one directory entry record in bytes.
pub const DIR_ENTRY_SIZE: usize = size_of::<DirEntry>();

/// Byte offset of the first regular (non-parent) slot.
pub const FIRST_SLOT_OFFSET: usize = DIR_ENTRY_SIZE;

/// Returns the byte offset of slot `index`.
#[must_use]
pub const fn slot_offset(index: usize) -> usize {
    index * DIR_ENTRY_SIZE
}

impl DirEntry {
    /// Creates the record stored in slot 0, pointing at `parent`.
    #[must_use]
    pub fn parent_link(parent: SectorNo) -> Self {
        let mut de = Self::zeroed();
        de.set_sector(parent);
        de
    }

    /// Creates an in-use entry binding `name` to `sector`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`NAME_MAX`].
    #[must_use]
    pub fn new(name: &str, sector: SectorNo) -> Self {
        let mut de = Self::zeroed();
        de.set_name(name);
        de.set_sector(sector);
        de.set_in_use(true);
        de
    }

    /// Returns the sector of the inode this entry refers to.
    #[must_use]
    pub fn sector(&self) -> SectorNo {
        SectorNo(self.sector)
    }

    pub fn set_sector(&mut self, sector: SectorNo) {
        self.sector = sector.0;
    }

    /// Returns `true` unless the slot is free (tombstoned).
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }

    pub fn set_in_use(&mut self, in_use: bool) {
        self.in_use = u8::from(in_use);
    }

    /// Returns the raw name bytes, without the NUL padding.
    #[must_use]
    pub fn name_bytes(&self) -> &[u8] {
        let len = memchr::memchr(0, &self.name).unwrap_or(NAME_MAX);
        &self.name[..len]
    }

    /// Returns the name of the entry, or `None` if it is not valid UTF-8.
    #[must_use]
    pub fn name(&self) -> Option<FileName> {
        let s = core::str::from_utf8(self.name_bytes()).ok()?;
        FileName::from(s).ok()
    }

    /// Checks if the entry name is exactly `name`.
    #[must_use]
    pub fn is_same_name(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }

    /// Sets the name of the entry.
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`NAME_MAX`].
    pub fn set_name(&mut self, name: &str) {
        let bytes = name.as_bytes();
        assert!(bytes.len() <= NAME_MAX, "name too long: {name:?}");
        self.name[..bytes.len()].copy_from_slice(bytes);
        self.name[bytes.len()..].fill(0);
    }

    /// Returns the record as bytes, ready to be written to a directory.
    #[must_use]
    pub fn to_bytes(&self) -> &[u8] {
        self.as_bytes()
    }

    /// Decodes a record from `bytes`.
    ///
    /// Returns `None` if `bytes` is shorter than a record, which marks the end
    /// of the directory stream.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = bytes.get(..DIR_ENTRY_SIZE)?;
        let mut de = Self::zeroed();
        de.as_bytes_mut().copy_from_slice(bytes);
        Some(de)
    }
}
