//! Compile-time parameters of the filesystem.
#![no_std]

/// Maximum length of a file name in bytes.
pub const NAME_MAX: usize = 14;

/// Sector holding the free map.
pub const FREE_MAP_SECTOR: u32 = 0;

/// Sector holding the root directory inode.
pub const ROOT_DIR_SECTOR: u32 = 1;

/// Number of entry slots the root directory is created with.
pub const ROOT_DIR_ENTRIES: usize = 16;

/// Number of entry slots a newly made directory is created with.
pub const DIR_INITIAL_ENTRIES: usize = 16;

/// Open files per process.
pub const NOFILE: usize = 128;

/// First file descriptor handed out to a process.
///
/// Descriptors below this are the console.
pub const FIRST_FD: usize = 2;

/// Size of a disk sector in bytes.
pub const SECTOR_SIZE: usize = 512;

/// Size of the default in-memory device in sectors.
pub const FS_SECTORS: usize = 4096;

/// Largest file an inode can describe (8 MiB).
pub const MAX_FILE_SIZE: usize = 8 * 1024 * 1024;

/// Maximum file path name.
pub const MAX_PATH: usize = 512;
