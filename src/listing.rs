//! Directory entry provider: reads one directory level into an ordered list of
//! entries with per-run stable identities.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::ListingError;

/// Identity of a filesystem object for the lifetime of one run.
///
/// Device + inode on Unix. Not stable across remounts, and hardlinks share
/// one identity (and therefore one preview).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct EntryId {
    dev: u64,
    ino: u64,
}

impl EntryId {
    pub const fn new(dev: u64, ino: u64) -> Self {
        EntryId { dev, ino }
    }

    #[cfg(unix)]
    fn from_metadata(meta: &fs::Metadata, _path: &Path) -> Self {
        use std::os::unix::fs::MetadataExt;
        EntryId::new(meta.dev(), meta.ino())
    }

    #[cfg(not(unix))]
    fn from_metadata(_meta: &fs::Metadata, path: &Path) -> Self {
        use std::hash::{Hash, Hasher};
        let canon = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let mut h = std::collections::hash_map::DefaultHasher::new();
        canon.hash(&mut h);
        EntryId::new(0, h.finish())
    }

    /// Identity of the object at `path` itself (symlinks are not followed).
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let meta = fs::symlink_metadata(path)?;
        Ok(EntryId::from_metadata(&meta, path))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

impl EntryKind {
    fn from_file_type(ft: fs::FileType) -> Self {
        if ft.is_dir() {
            EntryKind::Dir
        } else if ft.is_file() {
            EntryKind::File
        } else if ft.is_symlink() {
            EntryKind::Symlink
        } else {
            EntryKind::Other
        }
    }
}

/// Where an entry's source lives.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Origin {
    /// Relative to the listed directory (`dir/name`).
    Listed,
    /// Absolute path, e.g. a file dropped onto the window from elsewhere.
    Absolute(PathBuf),
}

#[derive(Clone, Debug)]
pub struct Entry {
    pub id: EntryId,
    pub name: String,
    pub kind: EntryKind,
    pub origin: Origin,
    pub removed: bool,
    /// Symlink whose target was a directory when the entry was read.
    pub links_to_dir: bool,
}

/// Follow a symlink once, at read time.
fn symlink_targets_dir(kind: EntryKind, path: &Path) -> bool {
    kind == EntryKind::Symlink && fs::metadata(path).is_ok_and(|m| m.is_dir())
}

impl Entry {
    /// Build an entry for a dropped path. Only regular files and directories
    /// are accepted.
    pub fn dropped(path: &Path) -> std::io::Result<Entry> {
        let meta = fs::metadata(path)?;
        let kind = if meta.is_dir() {
            EntryKind::Dir
        } else if meta.is_file() {
            EntryKind::File
        } else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "not a file or directory",
            ));
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Ok(Entry {
            id: EntryId::from_metadata(&meta, path),
            name,
            kind,
            origin: Origin::Absolute(path.to_path_buf()),
            removed: false,
            links_to_dir: false,
        })
    }

    /// Build an entry for `name` inside `dir`, e.g. one that just appeared.
    pub fn listed(dir: &Path, name: &str) -> std::io::Result<Entry> {
        let path = dir.join(name);
        let meta = fs::symlink_metadata(&path)?;
        let kind = EntryKind::from_file_type(meta.file_type());
        Ok(Entry {
            id: EntryId::from_metadata(&meta, &path),
            name: name.to_string(),
            kind,
            origin: Origin::Listed,
            removed: false,
            links_to_dir: symlink_targets_dir(kind, &path),
        })
    }

    /// Full path of the entry's source, given the directory it is listed in.
    pub fn source_path(&self, dir: &Path) -> PathBuf {
        match &self.origin {
            Origin::Listed => dir.join(&self.name),
            Origin::Absolute(p) => p.clone(),
        }
    }

    /// Directory, or a symlink that resolved to one when read. Does not
    /// touch the filesystem.
    pub fn is_dir_like(&self) -> bool {
        match self.kind {
            EntryKind::Dir => true,
            EntryKind::Symlink => self.links_to_dir,
            _ => false,
        }
    }
}

/// The current directory and its entries, in display order.
#[derive(Clone, Debug, Default)]
pub struct Listing {
    pub dir: PathBuf,
    pub entries: Vec<Entry>,
}

impl Listing {
    /// Read `dir` one level deep. `..` comes first, `.` is omitted, the rest
    /// is sorted by name. Any read error aborts the whole listing.
    pub fn read(dir: &Path) -> Result<Listing, ListingError> {
        let meta = fs::metadata(dir).map_err(|source| ListingError::Open {
            dir: dir.to_path_buf(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(ListingError::Open {
                dir: dir.to_path_buf(),
                source: std::io::Error::other("not a directory"),
            });
        }

        let mut entries = Vec::new();

        let parent = dir.join("..");
        if let Ok(pmeta) = fs::metadata(&parent) {
            entries.push(Entry {
                id: EntryId::from_metadata(&pmeta, &parent),
                name: "..".into(),
                kind: EntryKind::Dir,
                origin: Origin::Listed,
                removed: false,
                links_to_dir: false,
            });
        }

        for item in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let item = item.map_err(|source| ListingError::Read {
                dir: dir.to_path_buf(),
                source,
            })?;
            let imeta = item.metadata().map_err(|source| ListingError::Read {
                dir: dir.to_path_buf(),
                source,
            })?;
            let kind = EntryKind::from_file_type(item.file_type());
            entries.push(Entry {
                id: EntryId::from_metadata(&imeta, item.path()),
                name: item.file_name().to_string_lossy().to_string(),
                kind,
                origin: Origin::Listed,
                removed: false,
                links_to_dir: symlink_targets_dir(kind, item.path()),
            });
        }

        Ok(Listing {
            dir: dir.to_path_buf(),
            entries,
        })
    }

    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    /// Live (not removed) entries.
    pub fn visible(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| !e.removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lists_parent_first_then_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.png"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = Listing::read(dir.path()).unwrap();
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["..", "a.png", "b.txt", "sub"]);
        assert_eq!(listing.entries[0].kind, EntryKind::Dir);
        assert_eq!(listing.entries[1].kind, EntryKind::File);
        assert_eq!(listing.entries[3].kind, EntryKind::Dir);
    }

    #[test]
    fn identities_are_distinct_and_stable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one"), b"1").unwrap();
        std::fs::write(dir.path().join("two"), b"2").unwrap();

        let first = Listing::read(dir.path()).unwrap();
        let second = Listing::read(dir.path()).unwrap();
        let ids: Vec<EntryId> = first.entries.iter().map(|e| e.id).collect();
        let ids2: Vec<EntryId> = second.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, ids2);
        assert_ne!(ids[1], ids[2]);
        assert_eq!(EntryId::of(&dir.path().join("one")).unwrap(), ids[1]);
    }

    #[test]
    fn read_missing_dir_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Listing::read(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ListingError::Open { .. }));
    }

    #[test]
    fn read_file_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("file");
        std::fs::write(&f, b"x").unwrap();
        assert!(matches!(
            Listing::read(&f).unwrap_err(),
            ListingError::Open { .. }
        ));
    }

    #[test]
    fn source_path_respects_origin() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("dropped.png");
        std::fs::write(&f, b"x").unwrap();

        let dropped = Entry::dropped(&f).unwrap();
        assert_eq!(dropped.name, "dropped.png");
        assert_eq!(dropped.source_path(Path::new("/elsewhere")), f);

        let listing = Listing::read(dir.path()).unwrap();
        let listed = &listing.entries[1];
        assert_eq!(listed.origin, Origin::Listed);
        assert_eq!(listed.source_path(dir.path()), f);
        assert_eq!(listed.id, dropped.id);
    }

    #[test]
    fn listed_matches_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("late.png"), b"x").unwrap();
        let e = Entry::listed(dir.path(), "late.png").unwrap();
        assert_eq!(e.kind, EntryKind::File);
        assert_eq!(e.origin, Origin::Listed);
        let listing = Listing::read(dir.path()).unwrap();
        assert_eq!(listing.entries[1].id, e.id);
        assert!(Entry::listed(dir.path(), "missing").is_err());
    }

    #[test]
    fn dropped_missing_path_fails() {
        assert!(Entry::dropped(Path::new("/definitely/not/here.png")).is_err());
    }

    #[test]
    fn visible_skips_removed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x"), b"x").unwrap();
        let mut listing = Listing::read(dir.path()).unwrap();
        listing.entries[1].removed = true;
        assert_eq!(listing.visible().count(), 1);
        assert_eq!(listing.position(listing.entries[1].id), Some(1));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_dir_is_dir_like() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("link")).unwrap();
        let listing = Listing::read(dir.path()).unwrap();
        let link = listing.entries.iter().find(|e| e.name == "link").unwrap();
        assert_eq!(link.kind, EntryKind::Symlink);
        assert!(link.is_dir_like());

        // Decided at read time: removing the target later changes nothing.
        std::fs::remove_dir(dir.path().join("real")).unwrap();
        assert!(link.is_dir_like());
        let late = Entry::listed(dir.path(), "link").unwrap();
        assert!(!late.is_dir_like());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_file_is_not_dir_like() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("real.png"), b"x").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.png"), dir.path().join("alias.png"))
            .unwrap();
        let e = Entry::listed(dir.path(), "alias.png").unwrap();
        assert_eq!(e.kind, EntryKind::Symlink);
        assert!(!e.links_to_dir);
        assert!(!e.is_dir_like());
    }
}
