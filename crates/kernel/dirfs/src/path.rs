//! Path parsing and resolution.
//!
//! Paths are `/`-separated. Leading and repeated separators carry no meaning
//! except that a leading one makes the path absolute, so it resolves from the
//! root instead of the working directory.

use core::iter::FusedIterator;

use dirfs_params::NAME_MAX;
use dirfs_types::SEPARATOR;
use mutex_api::Mutex;

use crate::{
    dir::{Dir, DirPos},
    error::FsError,
    storage::{Inode as _, InodeStore},
};

/// Returns `true` if `path` starts at the root.
#[must_use]
pub fn is_absolute(path: &str) -> bool {
    path.starts_with(SEPARATOR)
}

/// Returns an iterator over the components of `path`.
#[must_use]
pub fn components(path: &str) -> Components<'_> {
    Components {
        rest: path,
        failed: false,
    }
}

/// Iterator over the components of a path, created by [`components()`].
///
/// A component longer than [`NAME_MAX`] yields
/// [`FsError::ComponentTooLong`] and ends the iteration.
#[derive(Debug, Clone)]
pub struct Components<'p> {
    rest: &'p str,
    failed: bool,
}

impl<'p> Iterator for Components<'p> {
    type Item = Result<&'p str, FsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let rest = self.rest.trim_start_matches(SEPARATOR);
        let end = rest.find(SEPARATOR).unwrap_or(rest.len());
        let (part, tail) = rest.split_at(end);
        self.rest = tail;
        if part.is_empty() {
            return None;
        }
        if part.len() > NAME_MAX {
            self.failed = true;
            return Some(Err(FsError::ComponentTooLong));
        }
        Some(Ok(part))
    }
}

impl FusedIterator for Components<'_> {}

/// Splits `path` into the path of its directory and its final component.
///
/// Trailing separators are ignored. The final component is empty only when
/// `path` names the root itself.
///
/// ```
/// use dirfs::path::split;
///
/// assert_eq!(split("/a/b/c"), Ok(("/a/b", "c")));
/// assert_eq!(split("c"), Ok(("", "c")));
/// assert_eq!(split("/c"), Ok(("/", "c")));
/// assert_eq!(split("/"), Ok(("/", "")));
/// ```
pub fn split(path: &str) -> Result<(&str, &str), FsError> {
    if path.is_empty() {
        return Err(FsError::EmptyPath);
    }
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        return Ok(("/", ""));
    }
    let Some(i) = trimmed.rfind(SEPARATOR) else {
        return Ok(("", trimmed));
    };
    let (dir, name) = (&trimmed[..i], &trimmed[i + 1..]);
    let dir = dir.trim_end_matches(SEPARATOR);
    if dir.is_empty() {
        return Ok(("/", name));
    }
    Ok((dir, name))
}

/// Opens the directory named by `path`.
///
/// Relative paths resolve from `cwd`, or from the root when there is none.
/// Every handle opened on the way is closed again, whether or not resolution
/// succeeds.
pub fn resolve_dir<'s, S, L>(
    store: &'s S,
    path: &str,
    cwd: Option<&Dir<'s, S, L>>,
) -> Result<Dir<'s, S, L>, FsError>
where
    S: InodeStore,
    L: Mutex<Data = DirPos>,
{
    tracing::debug!(path, relative = cwd.is_some() && !is_absolute(path), "resolve_dir");
    let mut dir = match cwd {
        Some(cwd) if !is_absolute(path) => cwd.reopen(),
        _ => Dir::open_root(store)?,
    };

    for part in components(path) {
        let inode = dir.lookup(part?)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        dir = Dir::open(store, inode);
    }

    if dir.is_removed() {
        tracing::debug!(path, sector = %dir.sector(), "resolved to a removed directory");
        return Err(FsError::Removed);
    }
    Ok(dir)
}

/// Opens the directory containing the final component of `path` and returns
/// it with that component.
pub fn resolve_parent<'s, 'p, S, L>(
    store: &'s S,
    path: &'p str,
    cwd: Option<&Dir<'s, S, L>>,
) -> Result<(Dir<'s, S, L>, &'p str), FsError>
where
    S: InodeStore,
    L: Mutex<Data = DirPos>,
{
    let (dir_path, name) = split(path)?;
    if name.len() > NAME_MAX {
        return Err(FsError::ComponentTooLong);
    }
    Ok((resolve_dir(store, dir_path, cwd)?, name))
}

#[cfg(test)]
mod tests {
    use dirfs_params::{DIR_INITIAL_ENTRIES, ROOT_DIR_ENTRIES};
    use dirfs_types::SectorNo;

    use super::*;
    use crate::{dir, storage::MemStore};

    type TestDir<'s> = Dir<'s, MemStore>;

    fn setup() -> MemStore {
        let store = MemStore::new(64);
        dir::create(&store, SectorNo::ROOT, ROOT_DIR_ENTRIES).unwrap();
        store
    }

    #[track_caller]
    fn mkdir(store: &MemStore, parent: &TestDir<'_>, name: &str) -> SectorNo {
        let sector = store.allocate().unwrap();
        dir::create(store, sector, DIR_INITIAL_ENTRIES).unwrap();
        parent.add(name, sector, true).unwrap();
        sector
    }

    #[track_caller]
    fn mkfile(store: &MemStore, parent: &TestDir<'_>, name: &str) -> SectorNo {
        let sector = store.allocate().unwrap();
        store.create(sector, 0, false).unwrap();
        parent.add(name, sector, false).unwrap();
        sector
    }

    #[track_caller]
    fn parts(path: &str) -> Vec<&str> {
        components(path).map(Result::unwrap).collect()
    }

    #[test]
    fn test_components() {
        assert_eq!(parts("/a/b/c"), ["a", "b", "c"]);
        assert_eq!(parts("a//b/"), ["a", "b"]);
        assert_eq!(parts("///x"), ["x"]);
        assert_eq!(parts("./.."), [".", ".."]);
        assert!(parts("").is_empty());
        assert!(parts("///").is_empty());
    }

    #[test]
    fn test_components_too_long() {
        let max = "m".repeat(NAME_MAX);
        let long = "l".repeat(NAME_MAX + 1);
        assert_eq!(parts(&format!("/{max}/x")), [max.as_str(), "x"]);

        let path = format!("a/{long}/b");
        let mut iter = components(&path);
        assert_eq!(iter.next(), Some(Ok("a")));
        assert_eq!(iter.next(), Some(Err(FsError::ComponentTooLong)));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
    }

    #[test]
    fn test_components_restartable() {
        let iter = components("/a/b");
        let first = iter.clone().collect::<Vec<_>>();
        let second = iter.collect::<Vec<_>>();
        assert_eq!(first, second);
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/a/b/c"), Ok(("/a/b", "c")));
        assert_eq!(split("c"), Ok(("", "c")));
        assert_eq!(split("a/b"), Ok(("a", "b")));
        assert_eq!(split("/c"), Ok(("/", "c")));
        assert_eq!(split("/"), Ok(("/", "")));
        assert_eq!(split("///"), Ok(("/", "")));
        assert_eq!(split("/a/b/"), Ok(("/a", "b")));
        assert_eq!(split("a//b"), Ok(("a", "b")));
        assert_eq!(split(""), Err(FsError::EmptyPath));
    }

    #[test]
    fn test_resolve_absolute_and_relative() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        let a = mkdir(&store, &root, "a");
        let a_dir = TestDir::open(&store, store.open(a).unwrap());
        let b = mkdir(&store, &a_dir, "b");

        assert_eq!(resolve_dir(&store, "/a/b", None::<&TestDir<'_>>).unwrap().sector(), b);
        assert_eq!(resolve_dir(&store, "a", None::<&TestDir<'_>>).unwrap().sector(), a);
        assert_eq!(resolve_dir(&store, "b", Some(&a_dir)).unwrap().sector(), b);
        assert_eq!(resolve_dir(&store, "/a", Some(&a_dir)).unwrap().sector(), a);
        assert_eq!(resolve_dir(&store, "", Some(&a_dir)).unwrap().sector(), a);
        assert_eq!(resolve_dir(&store, "/", Some(&a_dir)).unwrap().sector(), SectorNo::ROOT);
        assert_eq!(resolve_dir(&store, "b/..", Some(&a_dir)).unwrap().sector(), a);
        assert_eq!(resolve_dir(&store, "./b/./", Some(&a_dir)).unwrap().sector(), b);
        assert_eq!(
            resolve_dir(&store, "/..", None::<&TestDir<'_>>).unwrap().sector(),
            SectorNo::ROOT
        );
    }

    #[test]
    fn test_resolve_missing_does_not_leak() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        mkdir(&store, &root, "d1");
        let open = store.open_inodes();

        assert_eq!(
            resolve_dir(&store, "/d1/d2", None::<&TestDir<'_>>).unwrap_err(),
            FsError::NotFound
        );
        assert_eq!(store.open_inodes(), open);
    }

    #[test]
    fn test_resolve_through_file() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        mkfile(&store, &root, "f");
        let open = store.open_inodes();

        assert_eq!(
            resolve_dir(&store, "/f/x", None::<&TestDir<'_>>).unwrap_err(),
            FsError::NotADirectory
        );
        assert_eq!(
            resolve_dir(&store, "f", Some(&root)).unwrap_err(),
            FsError::NotADirectory
        );
        assert_eq!(store.open_inodes(), open);
    }

    #[test]
    fn test_resolve_length_bound() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        let max = "m".repeat(NAME_MAX);
        let sector = mkdir(&store, &root, &max);
        let open = store.open_inodes();

        let dir = resolve_dir(&store, &format!("/{max}"), None::<&TestDir<'_>>).unwrap();
        assert_eq!(dir.sector(), sector);
        drop(dir);

        let long = format!("/{max}m");
        assert_eq!(
            resolve_dir(&store, &long, None::<&TestDir<'_>>).unwrap_err(),
            FsError::ComponentTooLong
        );
        assert_eq!(store.open_inodes(), open);
    }

    #[test]
    fn test_resolve_removed_cwd() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        let sector = mkdir(&store, &root, "gone");
        let cwd = resolve_dir(&store, "/gone", Some(&root)).unwrap();
        assert_eq!(cwd.sector(), sector);

        root.remove("gone").unwrap();
        assert_eq!(resolve_dir(&store, "", Some(&cwd)).unwrap_err(), FsError::Removed);
        assert_eq!(resolve_dir(&store, ".", Some(&cwd)).unwrap_err(), FsError::Removed);
        // absolute paths do not go through the working directory
        assert_eq!(resolve_dir(&store, "/", Some(&cwd)).unwrap().sector(), SectorNo::ROOT);

        // the directory is deallocated only after the last handle closes
        assert!(store.is_allocated(sector));
        drop(cwd);
        assert!(!store.is_allocated(sector));
    }

    #[test]
    fn test_resolve_parent() {
        let store = setup();
        let root = TestDir::open_root(&store).unwrap();
        let a = mkdir(&store, &root, "a");

        let (dir, name) = resolve_parent(&store, "/a/file", Some(&root)).unwrap();
        assert_eq!((dir.sector(), name), (a, "file"));

        let (dir, name) = resolve_parent(&store, "file", Some(&root)).unwrap();
        assert_eq!((dir.sector(), name), (SectorNo::ROOT, "file"));

        let long = "l".repeat(NAME_MAX + 1);
        assert_eq!(
            resolve_parent(&store, &format!("/a/{long}"), Some(&root)).unwrap_err(),
            FsError::ComponentTooLong
        );
        assert_eq!(
            resolve_parent(&store, "/missing/file", Some(&root)).unwrap_err(),
            FsError::NotFound
        );
        assert_eq!(resolve_parent(&store, "", Some(&root)).unwrap_err(), FsError::EmptyPath);
    }
}
