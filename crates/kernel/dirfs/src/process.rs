//! Per-process filesystem state: the working directory and open files.

use core::fmt;

use dirfs_params::{FIRST_FD, NOFILE};

use crate::{
    dir::Dir,
    storage::{Inode as _, InodeStore},
    syscall::SyscallError,
};

/// An open file description.
pub enum OpenFile<'s, S>
where
    S: InodeStore,
{
    /// A regular file and the position of the next read or write.
    Regular { inode: S::Inode, pos: usize },
    /// A directory, with its own `readdir` cursor.
    Directory(Dir<'s, S>),
}

impl<S> OpenFile<'_, S>
where
    S: InodeStore,
{
    pub fn inode(&self) -> &S::Inode {
        match self {
            Self::Regular { inode, .. } => inode,
            Self::Directory(dir) => dir.inode(),
        }
    }

    #[must_use]
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }
}

impl<S> fmt::Debug for OpenFile<'_, S>
where
    S: InodeStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular { inode, pos } => f
                .debug_struct("Regular")
                .field("sector", &inode.sector())
                .field("pos", pos)
                .finish(),
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
        }
    }
}

/// Filesystem state of one process.
///
/// Descriptors are numbered from [`FIRST_FD`]; the numbers below it belong to
/// the console.
pub struct Process<'s, S>
where
    S: InodeStore,
{
    cwd: Option<Dir<'s, S>>,
    ofile: Vec<Option<OpenFile<'s, S>>>,
}

impl<S> Default for Process<'_, S>
where
    S: InodeStore,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for Process<'_, S>
where
    S: InodeStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("cwd", &self.cwd)
            .field("open_files", &self.open_files())
            .finish_non_exhaustive()
    }
}

fn slot(fd: usize) -> Option<usize> {
    fd.checked_sub(FIRST_FD).filter(|&i| i < NOFILE)
}

impl<'s, S> Process<'s, S>
where
    S: InodeStore,
{
    /// Creates a process whose working directory is the root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cwd: None,
            ofile: (0..NOFILE).map(|_| None).collect(),
        }
    }

    /// Creates a child process starting in the same working directory.
    ///
    /// The child holds its own reference to the directory and starts with no
    /// open descriptors.
    #[must_use]
    pub fn fork(&self) -> Self {
        let mut child = Self::new();
        child.cwd = self.cwd.as_ref().map(Dir::reopen);
        child
    }

    /// Returns the working directory, or `None` if it is the root.
    pub fn cwd(&self) -> Option<&Dir<'s, S>> {
        self.cwd.as_ref()
    }

    /// Replaces the working directory and returns the previous one.
    pub fn update_cwd(&mut self, cwd: Dir<'s, S>) -> Option<Dir<'s, S>> {
        self.cwd.replace(cwd)
    }

    pub fn ofile(&self, fd: usize) -> Result<&OpenFile<'s, S>, SyscallError> {
        slot(fd)
            .and_then(|i| self.ofile[i].as_ref())
            .ok_or(SyscallError::BadFileDescriptor)
    }

    pub fn ofile_mut(&mut self, fd: usize) -> Result<&mut OpenFile<'s, S>, SyscallError> {
        slot(fd)
            .and_then(|i| self.ofile[i].as_mut())
            .ok_or(SyscallError::BadFileDescriptor)
    }

    /// Installs `file` in the lowest free descriptor.
    pub fn add_ofile(&mut self, file: OpenFile<'s, S>) -> Result<usize, SyscallError> {
        let (i, slot) = self
            .ofile
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(SyscallError::TooManyOpenFiles)?;
        *slot = Some(file);
        Ok(FIRST_FD + i)
    }

    pub fn unset_ofile(&mut self, fd: usize) -> Result<OpenFile<'s, S>, SyscallError> {
        slot(fd)
            .and_then(|i| self.ofile[i].take())
            .ok_or(SyscallError::BadFileDescriptor)
    }

    /// Returns the number of open descriptors.
    #[must_use]
    pub fn open_files(&self) -> usize {
        self.ofile.iter().filter(|f| f.is_some()).count()
    }
}
