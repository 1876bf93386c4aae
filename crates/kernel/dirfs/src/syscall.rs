//! File system calls.
//!
//! [`FileSys`] turns path strings and descriptor numbers into directory
//! operations on behalf of a [`Process`].

use dirfs_params::{DIR_INITIAL_ENTRIES, MAX_PATH};
use dirfs_types::{FileName, SectorNo};

pub use self::error::SyscallError;
use crate::{
    dir::{self, Dir},
    error::FsError,
    path,
    process::{OpenFile, Process},
    storage::{Inode as _, InodeStore},
};

mod error;

/// Rejects path arguments that cannot name anything.
fn check_path(path: &str) -> Result<(), SyscallError> {
    if path.is_empty() || path.len() > MAX_PATH || path.contains('\0') {
        return Err(SyscallError::InvalidInput);
    }
    Ok(())
}

/// The system call layer of a filesystem stored in `S`.
#[derive(Debug)]
pub struct FileSys<'s, S> {
    store: &'s S,
}

impl<S> Clone for FileSys<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for FileSys<'_, S> {}

impl<'s, S> FileSys<'s, S>
where
    S: InodeStore,
{
    /// Creates the system call layer over a formatted store.
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'s S {
        self.store
    }

    /// Creates a regular file of `initial_size` zero bytes.
    pub fn create(
        &self,
        proc: &Process<'s, S>,
        path: &str,
        initial_size: usize,
    ) -> Result<(), SyscallError> {
        tracing::debug!(path, initial_size, "create");
        self.make(proc, path, false, |sector| {
            self.store.create(sector, initial_size, false)?;
            Ok(())
        })
    }

    /// Creates an empty directory.
    pub fn mkdir(&self, proc: &Process<'s, S>, path: &str) -> Result<(), SyscallError> {
        tracing::debug!(path, "mkdir");
        self.make(proc, path, true, |sector| {
            dir::create(self.store, sector, DIR_INITIAL_ENTRIES)
        })
    }

    /// Allocates an inode, initializes it with `init` and links it at `path`.
    ///
    /// Everything allocated is given back if any step fails.
    fn make<F>(
        &self,
        proc: &Process<'s, S>,
        path: &str,
        is_dir: bool,
        init: F,
    ) -> Result<(), SyscallError>
    where
        F: FnOnce(SectorNo) -> Result<(), FsError>,
    {
        check_path(path)?;
        let (parent, name) = path::resolve_parent(self.store, path, proc.cwd())?;
        if name.is_empty() {
            return Err(SyscallError::AlreadyExists);
        }

        let sector = self.store.allocate()?;
        let res = init(sector).and_then(|()| parent.add(name, sector, is_dir));
        if let Err(e) = res {
            tracing::warn!(path, %sector, error = %e, "create aborted");
            self.discard(sector);
            return Err(e.into());
        }
        Ok(())
    }

    /// Frees `sector` and the inode created on it, if any.
    fn discard(&self, sector: SectorNo) {
        match self.store.open(sector) {
            Ok(inode) => inode.remove(),
            Err(_) => self.store.release(sector),
        }
    }

    /// Opens the file or directory at `path` and returns its descriptor.
    pub fn open(&self, proc: &mut Process<'s, S>, path: &str) -> Result<usize, SyscallError> {
        tracing::debug!(path, "open");
        check_path(path)?;
        let (parent, name) = path::resolve_parent(self.store, path, proc.cwd())?;
        let file = if name.is_empty() {
            OpenFile::Directory(parent)
        } else {
            let inode = parent.lookup(name)?;
            if inode.is_dir() {
                OpenFile::Directory(Dir::open(self.store, inode))
            } else {
                OpenFile::Regular { inode, pos: 0 }
            }
        };
        proc.add_ofile(file)
    }

    pub fn close(&self, proc: &mut Process<'s, S>, fd: usize) -> Result<(), SyscallError> {
        tracing::debug!(fd, "close");
        let _file = proc.unset_ofile(fd)?;
        Ok(())
    }

    /// Unlinks the file or empty directory at `path`.
    ///
    /// Descriptors and working directories still referring to it stay valid
    /// until they are closed, but the directory can no longer be resolved.
    pub fn remove(&self, proc: &Process<'s, S>, path: &str) -> Result<(), SyscallError> {
        tracing::debug!(path, "remove");
        check_path(path)?;
        let (parent, name) = path::resolve_parent(self.store, path, proc.cwd())?;
        if name.is_empty() {
            return Err(SyscallError::ResourceBusy);
        }
        parent.remove(name)?;
        Ok(())
    }

    /// Changes the working directory of `proc`.
    pub fn chdir(&self, proc: &mut Process<'s, S>, path: &str) -> Result<(), SyscallError> {
        tracing::debug!(path, "chdir");
        check_path(path)?;
        let dir = path::resolve_dir(self.store, path, proc.cwd())?;
        let _old = proc.update_cwd(dir);
        Ok(())
    }

    /// Returns the next entry name of the directory open at `fd`.
    pub fn readdir(
        &self,
        proc: &Process<'s, S>,
        fd: usize,
    ) -> Result<Option<FileName>, SyscallError> {
        match proc.ofile(fd)? {
            OpenFile::Directory(dir) => Ok(dir.readdir()?),
            OpenFile::Regular { .. } => Err(SyscallError::NotADirectory),
        }
    }

    pub fn isdir(&self, proc: &Process<'s, S>, fd: usize) -> Result<bool, SyscallError> {
        Ok(proc.ofile(fd)?.is_dir())
    }

    /// Returns the inode number of the file open at `fd`.
    pub fn inumber(&self, proc: &Process<'s, S>, fd: usize) -> Result<SectorNo, SyscallError> {
        Ok(proc.ofile(fd)?.inode().sector())
    }

    pub fn read(
        &self,
        proc: &mut Process<'s, S>,
        fd: usize,
        buf: &mut [u8],
    ) -> Result<usize, SyscallError> {
        tracing::debug!(fd, len = buf.len(), "read");
        match proc.ofile_mut(fd)? {
            OpenFile::Regular { inode, pos } => {
                let n = inode.read_at(buf, *pos);
                *pos += n;
                Ok(n)
            }
            OpenFile::Directory(_) => Err(SyscallError::IsADirectory),
        }
    }

    pub fn write(
        &self,
        proc: &mut Process<'s, S>,
        fd: usize,
        buf: &[u8],
    ) -> Result<usize, SyscallError> {
        tracing::debug!(fd, len = buf.len(), "write");
        match proc.ofile_mut(fd)? {
            OpenFile::Regular { inode, pos } => {
                let n = inode.write_at(buf, *pos)?;
                *pos += n;
                Ok(n)
            }
            OpenFile::Directory(_) => Err(SyscallError::IsADirectory),
        }
    }

    pub fn seek(
        &self,
        proc: &mut Process<'s, S>,
        fd: usize,
        new_pos: usize,
    ) -> Result<(), SyscallError> {
        match proc.ofile_mut(fd)? {
            OpenFile::Regular { pos, .. } => {
                *pos = new_pos;
                Ok(())
            }
            OpenFile::Directory(_) => Err(SyscallError::IsADirectory),
        }
    }

    pub fn tell(&self, proc: &Process<'s, S>, fd: usize) -> Result<usize, SyscallError> {
        match proc.ofile(fd)? {
            OpenFile::Regular { pos, .. } => Ok(*pos),
            OpenFile::Directory(_) => Err(SyscallError::IsADirectory),
        }
    }

    pub fn filesize(&self, proc: &Process<'s, S>, fd: usize) -> Result<usize, SyscallError> {
        Ok(proc.ofile(fd)?.inode().length())
    }
}

#[cfg(test)]
mod tests {
    use dirfs_params::{FIRST_FD, NAME_MAX};

    use super::*;
    use crate::storage::MemStore;

    fn setup() -> MemStore {
        MemStore::format(128).unwrap()
    }

    #[test]
    fn test_create_rolls_back_on_existing_name() {
        let store = setup();
        let fs = FileSys::new(&store);
        let proc = Process::new();
        fs.create(&proc, "/f", 0).unwrap();
        let free = store.free_sectors();

        assert_eq!(fs.create(&proc, "/f", 0), Err(SyscallError::AlreadyExists));
        assert_eq!(fs.mkdir(&proc, "/f"), Err(SyscallError::AlreadyExists));
        assert_eq!(store.free_sectors(), free);
        assert_eq!(store.open_inodes(), 0);
    }

    #[test]
    fn test_create_rolls_back_on_bad_name() {
        let store = setup();
        let fs = FileSys::new(&store);
        let proc = Process::new();
        let free = store.free_sectors();

        let long = format!("/{}", "x".repeat(NAME_MAX + 1));
        assert_eq!(fs.create(&proc, &long, 0), Err(SyscallError::InvalidFilename));
        assert_eq!(fs.create(&proc, "/missing/f", 0), Err(SyscallError::FsEntryNotFound));
        assert_eq!(fs.create(&proc, "/", 0), Err(SyscallError::AlreadyExists));
        assert_eq!(fs.mkdir(&proc, "/.."), Err(SyscallError::AlreadyExists));
        assert_eq!(fs.create(&proc, ".", 0), Err(SyscallError::AlreadyExists));
        assert_eq!(store.free_sectors(), free);
    }

    #[test]
    fn test_create_no_space() {
        let store = MemStore::format(4).unwrap();
        let fs = FileSys::new(&store);
        let proc = Process::new();
        let free = store.free_sectors();

        assert_eq!(
            fs.create(&proc, "/big", 16 * 512),
            Err(SyscallError::StorageFull)
        );
        assert_eq!(store.free_sectors(), free);
    }

    #[test]
    fn test_path_argument_checks() {
        let store = setup();
        let fs = FileSys::new(&store);
        let mut proc = Process::new();
        let long = "/a".repeat(MAX_PATH);

        assert_eq!(fs.open(&mut proc, ""), Err(SyscallError::InvalidInput));
        assert_eq!(fs.open(&mut proc, &long), Err(SyscallError::InvalidInput));
        assert_eq!(fs.chdir(&mut proc, "a\0b"), Err(SyscallError::InvalidInput));
    }

    #[test]
    fn test_open_root_and_read_dir() {
        let store = setup();
        let fs = FileSys::new(&store);
        let mut proc = Process::new();
        fs.create(&proc, "a", 0).unwrap();
        fs.mkdir(&proc, "b").unwrap();

        let fd = fs.open(&mut proc, "/").unwrap();
        assert_eq!(fd, FIRST_FD);
        assert_eq!(fs.isdir(&proc, fd), Ok(true));
        assert_eq!(fs.inumber(&proc, fd), Ok(SectorNo::ROOT));
        assert_eq!(fs.readdir(&proc, fd).unwrap().unwrap().as_str(), "a");
        assert_eq!(fs.readdir(&proc, fd).unwrap().unwrap().as_str(), "b");
        assert_eq!(fs.readdir(&proc, fd), Ok(None));

        let mut buf = [0; 4];
        assert_eq!(fs.read(&mut proc, fd, &mut buf), Err(SyscallError::IsADirectory));
        assert_eq!(fs.write(&mut proc, fd, b"x"), Err(SyscallError::IsADirectory));
        fs.close(&mut proc, fd).unwrap();
        assert_eq!(fs.close(&mut proc, fd), Err(SyscallError::BadFileDescriptor));
    }

    #[test]
    fn test_file_io() {
        let store = setup();
        let fs = FileSys::new(&store);
        let mut proc = Process::new();
        fs.create(&proc, "/f", 3).unwrap();

        let fd = fs.open(&mut proc, "/f").unwrap();
        assert_eq!(fs.isdir(&proc, fd), Ok(false));
        assert_eq!(fs.filesize(&proc, fd), Ok(3));
        assert_eq!(fs.readdir(&proc, fd), Err(SyscallError::NotADirectory));

        assert_eq!(fs.write(&mut proc, fd, b"hello"), Ok(5));
        assert_eq!(fs.tell(&proc, fd), Ok(5));
        assert_eq!(fs.filesize(&proc, fd), Ok(5));

        fs.seek(&mut proc, fd, 1).unwrap();
        let mut buf = [0; 8];
        assert_eq!(fs.read(&mut proc, fd, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"ello");
        assert_eq!(fs.read(&mut proc, fd, &mut buf), Ok(0));
    }

    #[test]
    fn test_remove_root_is_busy() {
        let store = setup();
        let fs = FileSys::new(&store);
        let proc = Process::new();
        assert_eq!(fs.remove(&proc, "/"), Err(SyscallError::ResourceBusy));
        assert_eq!(fs.remove(&proc, "."), Err(SyscallError::FsEntryNotFound));
    }
}
