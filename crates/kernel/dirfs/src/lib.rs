//! Hierarchical directories on top of a flat inode store.
//!
//! A directory is an inode whose bytes are a dense array of fixed-size
//! [`DirEntry`](dirfs_types::DirEntry) records. Slot 0 links to the parent
//! directory; every later slot either binds a name to an inode or is a
//! tombstone waiting to be reused.
//!
//! The crate is layered leaf first:
//!
//! - [`storage`]: the inode layer the directories live in, and an in-memory
//!   implementation of it.
//! - [`dir`]: directory handles and the lookup/add/remove/readdir operations.
//! - [`path`]: path splitting and component-wise resolution.
//! - [`process`] and [`syscall`]: per-process working directory and
//!   descriptor table, and the calls that operate on them.
//!
//! ```
//! use dirfs::{FileSys, Process, storage::MemStore};
//!
//! let store = MemStore::format(256)?;
//! let fs = FileSys::new(&store);
//! let mut proc = Process::new();
//!
//! fs.mkdir(&proc, "/docs")?;
//! fs.chdir(&mut proc, "docs")?;
//! fs.create(&proc, "notes", 0)?;
//!
//! let fd = fs.open(&mut proc, "/docs")?;
//! assert_eq!(fs.readdir(&proc, fd)?.as_deref(), Some("notes"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub use self::{
    dir::{Dir, DirLock, DirPos},
    error::FsError,
    process::{OpenFile, Process},
    syscall::{FileSys, SyscallError},
};

pub mod dir;
mod error;
pub mod path;
pub mod process;
pub mod storage;
pub mod syscall;
