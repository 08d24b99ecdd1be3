//! A scanfile: a sorted sequence of [`Attr`] records persisted to disk,
//! read back via `mmap`, and rewritten atomically through a sibling temp
//! file plus rename so a reader never observes a half-written inventory.

use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use memmap2::Mmap;

use crate::attr::Attr;
use crate::error::ScanError;

/// Orders two pathnames so that a directory's own entry sorts immediately
/// before its children: `/` is treated as the lowest-valued byte, so
/// `"foo/bar"` sorts before `"foo.c"` even though `.` < `/` byte-for-byte.
#[must_use]
pub fn cmp_pathname(a: &[u8], b: &[u8]) -> Ordering {
    let key = |b: u8| if b == b'/' { 0u8 } else { b };
    a.iter()
        .map(|&b| key(b))
        .cmp(b.iter().map(|&b| key(b)))
}

#[derive(Debug, Clone, Default)]
pub struct ScanFile {
    entries: Vec<Attr>,
}

impl ScanFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scanfile from already-sorted entries, checking the
    /// invariant rather than silently re-sorting — a caller that hands us
    /// unsorted input has a bug worth surfacing.
    pub fn from_sorted(entries: Vec<Attr>) -> Result<Self, ScanError> {
        for pair in entries.windows(2) {
            if cmp_pathname(&pair[0].name, &pair[1].name) != Ordering::Less {
                return Err(ScanError::OutOfOrder {
                    prev: String::from_utf8_lossy(&pair[0].name).into_owned(),
                    next: String::from_utf8_lossy(&pair[1].name).into_owned(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn insert(&mut self, attr: Attr) {
        let idx = self
            .entries
            .partition_point(|e| cmp_pathname(&e.name, &attr.name) == Ordering::Less);
        self.entries.insert(idx, attr);
    }

    /// Inserts `attr`, replacing any existing entry with the same name
    /// rather than creating a duplicate.
    pub fn upsert(&mut self, attr: Attr) {
        let idx = self
            .entries
            .partition_point(|e| cmp_pathname(&e.name, &attr.name) == Ordering::Less);
        if self.entries.get(idx).is_some_and(|e| e.name == attr.name) {
            self.entries[idx] = attr;
        } else {
            self.entries.insert(idx, attr);
        }
    }

    /// Removes the entry named `name`, if present.
    pub fn remove(&mut self, name: &[u8]) {
        if let Ok(idx) = self.entries.binary_search_by(|e| cmp_pathname(&e.name, name)) {
            self.entries.remove(idx);
        }
    }

    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<&Attr> {
        let idx = self
            .entries
            .binary_search_by(|e| cmp_pathname(&e.name, name))
            .ok()?;
        self.entries.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attr> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        if file.metadata().map_err(|e| io_err(path, e))?.len() == 0 {
            return Ok(Self::new());
        }
        // SAFETY: the scanfile is only ever mutated through our own
        // temp-file-plus-rename write path, never edited in place.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| io_err(path, e))?;

        let mut entries = Vec::new();
        let mut offset = 0usize;
        while offset < mmap.len() {
            let (attr, next) = Attr::decode(&mmap, offset)?;
            entries.push(attr);
            offset = next;
        }
        Ok(Self { entries })
    }

    pub fn write(&self, path: &Path) -> Result<(), ScanError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix(".cvsync.")
            .tempfile_in(dir)
            .map_err(|e| io_err(path, e))?;

        let mut buf = Vec::new();
        for attr in &self.entries {
            attr.encode(&mut buf);
        }
        tmp.write_all(&buf).map_err(|e| io_err(path, e))?;
        tmp.flush().map_err(|e| io_err(path, e))?;
        tmp.persist(path)
            .map_err(|e| io_err(path, e.error))?;
        Ok(())
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ScanError {
    ScanError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Removes a scanfile's backing file if present; used to clean up after a
/// failed write attempt. A missing file is not an error.
pub fn remove_if_present(path: &Path) -> Result<(), ScanError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::EntryKind;

    fn attr(name: &str) -> Attr {
        Attr {
            kind: EntryKind::File,
            name: name.as_bytes().to_vec(),
            mtime: 0,
            size: 0,
            mode: 0o644,
            aux: Vec::new(),
        }
    }

    #[test]
    fn directory_entry_sorts_before_sibling_file_with_similar_name() {
        assert_eq!(cmp_pathname(b"foo/bar", b"foo.c"), Ordering::Less);
    }

    #[test]
    fn insert_maintains_sorted_order() {
        let mut sf = ScanFile::new();
        for name in ["zeta", "alpha/child", "alpha", "beta"] {
            sf.insert(attr(name));
        }
        let names: Vec<String> = sf
            .iter()
            .map(|a| String::from_utf8_lossy(&a.name).into_owned())
            .collect();
        assert_eq!(names, vec!["alpha", "alpha/child", "beta", "zeta"]);
    }

    #[test]
    fn write_then_open_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut sf = ScanFile::new();
        sf.insert(attr("a"));
        sf.insert(attr("b"));
        let path = dir.path().join("scanfile");
        sf.write(&path).unwrap();

        let reopened = ScanFile::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.get(b"a").is_some());
    }

    #[test]
    fn from_sorted_rejects_unsorted_input() {
        let entries = vec![attr("zeta"), attr("alpha")];
        assert!(ScanFile::from_sorted(entries).is_err());
    }
}
