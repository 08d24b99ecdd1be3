//! Walks a collection's tree on disk into a sorted, deduplicated
//! [`ScanFile`], folding `Attic/` subdirectories into their logical
//! (non-Attic) pathname so the comparer sees one entry per RCS file
//! regardless of which side of the Attic boundary it currently lives on.

use std::collections::HashMap;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::attr::{Attr, EntryKind};
use crate::error::ScanError;
use crate::scanfile::{cmp_pathname, ScanFile};

const ATTIC: &str = "Attic";
const RCS_SUFFIX: &str = ",v";

/// How `walk` reacts when the same logical name exists both live and under
/// `Attic/` at once — an inconsistency a real RCS tree shouldn't have, but
/// one a partially-applied sync or a hand-edited tree can produce. Mirrors
/// a collection's `errormode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AtticPolicy {
    /// Fail the walk outright.
    Abort,
    /// Keep whichever copy has the newer mtime and delete the other.
    #[default]
    Fixup,
    /// Keep whichever copy has the newer mtime; leave the other on disk.
    Ignore,
}

pub struct WalkOptions {
    /// When true, a file directly under an `Attic/` directory is recorded
    /// under its parent's path (Attic stripped) with kind `Attic` instead
    /// of `File`.
    pub fold_attic: bool,
    pub attic_policy: AtticPolicy,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self { fold_attic: true, attic_policy: AtticPolicy::default() }
    }
}

/// One on-disk entry before Attic-conflict resolution: the record that
/// would go into the scanfile, plus the real path it came from, needed so
/// `Fixup` can delete the losing copy.
struct Candidate {
    attr: Attr,
    disk_path: PathBuf,
}

pub fn walk(root: &Path, opts: &WalkOptions) -> Result<ScanFile, ScanError> {
    let mut groups: HashMap<Vec<u8>, Vec<Candidate>> = HashMap::new();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| ScanError::Io {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
            }),
        })?;

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_path_buf();

        let (logical, folded) = fold_attic_path(&rel, opts.fold_attic);
        let name = path_to_bytes(&logical);

        let metadata = entry.metadata().map_err(|e| ScanError::Io {
            path: entry.path().to_path_buf(),
            source: e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "stat failed")
            }),
        })?;

        let (kind, size, aux) = if metadata.is_dir() {
            (EntryKind::Directory, 0, Vec::new())
        } else if metadata.file_type().is_symlink() {
            let target = fs::read_link(entry.path()).map_err(|e| ScanError::Io {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            (EntryKind::Symlink, 0, path_to_bytes(&target))
        } else if folded {
            (EntryKind::Attic, metadata.size(), Vec::new())
        } else if name.ends_with(RCS_SUFFIX.as_bytes()) {
            (EntryKind::Rcs, metadata.size(), Vec::new())
        } else {
            (EntryKind::File, metadata.size(), Vec::new())
        };

        let attr = Attr {
            kind,
            name,
            mtime: metadata.mtime(),
            size,
            mode: (metadata.mode() & 0o7777) as u16,
            aux,
        };

        groups.entry(attr.name.clone()).or_default().push(Candidate {
            attr,
            disk_path: entry.path().to_path_buf(),
        });
    }

    let mut names: Vec<Vec<u8>> = groups.keys().cloned().collect();
    names.sort_by(|a, b| cmp_pathname(a, b));

    let mut scan = ScanFile::new();
    for name in names {
        let mut candidates = groups.remove(&name).expect("name came from groups' own keys");
        let (winner, loser) = if candidates.len() == 1 {
            (candidates.pop().expect("checked len == 1"), None)
        } else {
            resolve_attic_conflict(candidates, opts.attic_policy)?
        };
        if let Some(loser) = loser {
            fs::remove_file(&loser.disk_path).map_err(|e| ScanError::Io {
                path: loser.disk_path,
                source: e,
            })?;
        }
        scan.upsert(winner.attr);
    }

    Ok(scan)
}

/// Resolves a live/Attic twin pair (the only way more than one candidate
/// ends up under the same folded name) into a winner and an optional
/// loser, per `policy`. The newer mtime always wins.
fn resolve_attic_conflict(
    mut candidates: Vec<Candidate>,
    policy: AtticPolicy,
) -> Result<(Candidate, Option<Candidate>), ScanError> {
    candidates.sort_by(|a, b| b.attr.mtime.cmp(&a.attr.mtime));
    let mut iter = candidates.into_iter();
    let winner = iter.next().expect("conflict implies at least one candidate");
    let loser = iter.next();

    match policy {
        AtticPolicy::Abort => Err(ScanError::AtticInconsistency {
            path: String::from_utf8_lossy(&winner.attr.name).into_owned(),
        }),
        AtticPolicy::Fixup => Ok((winner, loser)),
        AtticPolicy::Ignore => Ok((winner, None)),
    }
}

/// If `rel`'s parent component is `Attic`, returns the path with that
/// component removed and `true`; otherwise returns `rel` unchanged and
/// `false`.
fn fold_attic_path(rel: &Path, fold: bool) -> (std::path::PathBuf, bool) {
    if !fold {
        return (rel.to_path_buf(), false);
    }
    let mut components: Vec<_> = rel.components().collect();
    if let Some(pos) = components
        .iter()
        .position(|c| c.as_os_str() == ATTIC)
    {
        // Only fold when Attic is the immediate parent of a leaf file, not
        // an ancestor directory several levels up.
        if pos + 2 == components.len() {
            components.remove(pos);
            let rebuilt: std::path::PathBuf = components.iter().collect();
            return (rebuilt, true);
        }
    }
    (rel.to_path_buf(), false)
}

fn path_to_bytes(p: &Path) -> Vec<u8> {
    p.to_string_lossy().into_owned().into_bytes()
}
