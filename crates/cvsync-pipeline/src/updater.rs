//! Client-side applier: takes a resolved directive and mutates the local
//! tree, always going through a sibling `.cvsync.*` temp file so a reader
//! never observes a half-written target.

use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};

use cvsync_checksum::HashAlgorithm;
use cvsync_rcs::types::File as RcsFile;
use cvsync_rdiff::RdiffCommand;
use cvsync_scan::{Attr, EntryKind, ScanFile};

use crate::error::PipelineError;
use crate::rcsdiff::{self, RcsDiff};

const TEMP_PREFIX: &str = ".cvsync.";
const ATTIC: &str = "Attic";

/// The reconstructed content for an `Add`/`Update`/`RcsAttic` directive,
/// already verified against its whole-file hash where one was provided.
pub enum Content {
    Generic(Vec<u8>),
    Rdiff { base: Vec<u8>, commands: Vec<RdiffCommand> },
    Rcs { base: RcsFile, diff: RcsDiff },
}

fn io_err(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io { path: path.display().to_string(), source }
}

fn masked_mode(mode: u16, umask: u32) -> u32 {
    u32::from(mode) & !umask & 0o7777
}

/// Writes `data` into `path` atomically via a sibling temp file, setting
/// mode and mtime before the final rename.
fn write_atomically(path: &Path, data: &[u8], mode: u32, mtime: i64) -> Result<(), PipelineError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| io_err(dir, e))?;
    std::io::Write::write_all(&mut temp, data).map_err(|e| io_err(path, e))?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, e))?;
    filetime::set_file_mtime(temp.path(), filetime::FileTime::from_unix_time(mtime, 0)).map_err(|e| io_err(path, e))?;
    temp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

/// `ADD`/`UPDATE` for a directory: create it (or just chmod if it already
/// exists), masked by `umask`.
pub fn apply_mkdir(root: &Path, attr: &Attr, umask: u32) -> Result<(), PipelineError> {
    let path = root.join(rel_path(&attr.name));
    match fs::create_dir(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(io_err(&path, e)),
    }
    fs::set_permissions(&path, fs::Permissions::from_mode(masked_mode(attr.mode, umask))).map_err(|e| io_err(&path, e))
}

/// `ADD`/`UPDATE` for a symlink: `unlink` any stale target, then
/// `symlink(target, path)`.
pub fn apply_symlink(root: &Path, attr: &Attr) -> Result<(), PipelineError> {
    let path = root.join(rel_path(&attr.name));
    let target = PathBuf::from(String::from_utf8_lossy(&attr.aux).into_owned());
    let _ = fs::remove_file(&path);
    symlink(&target, &path).map_err(|e| io_err(&path, e))
}

/// `ADD`/`UPDATE` for file content, verified against `expected_hash` (when
/// one was sent) before the atomic rename.
pub fn apply_content(
    root: &Path,
    attr: &Attr,
    content: Content,
    expected_hash: Option<&[u8]>,
    hash: HashAlgorithm,
    umask: u32,
) -> Result<(), PipelineError> {
    let path = root.join(rel_path(&attr.name));
    let data = match content {
        Content::Generic(data) => data,
        Content::Rdiff { base, commands } => cvsync_rdiff::apply(&base, &commands),
        Content::Rcs { base, diff } => {
            let rebuilt = rcsdiff::apply(&base, &diff);
            cvsync_rcs::write_file(&rebuilt)
        }
    };

    if let Some(expected) = expected_hash {
        let got = hash.digest(&data);
        if got != expected {
            return Err(PipelineError::HashMismatch { path: path.display().to_string() });
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    write_atomically(&path, &data, masked_mode(attr.mode, umask), attr.mtime)
}

/// `SETATTR`: mode always, mtime for non-directories.
pub fn apply_setattr(root: &Path, attr: &Attr, umask: u32) -> Result<(), PipelineError> {
    let path = root.join(rel_path(&attr.name));
    fs::set_permissions(&path, fs::Permissions::from_mode(masked_mode(attr.mode, umask))).map_err(|e| io_err(&path, e))?;
    if attr.kind != EntryKind::Directory {
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(attr.mtime, 0)).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}

/// `REMOVE` for a directory: `rmdir`, then best-effort remove of an empty
/// `Attic` sibling.
pub fn apply_remove_dir(root: &Path, name: &[u8]) -> Result<(), PipelineError> {
    let path = root.join(rel_path(name));
    match fs::remove_dir(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&path, e)),
    }
    let _ = fs::remove_dir(path.join(ATTIC));
    Ok(())
}

/// `REMOVE` for a file/symlink/Attic entry: `unlink`, then for an Attic
/// entry, best-effort `rmdir` of the now-possibly-empty `Attic/`.
pub fn apply_remove_file(root: &Path, name: &[u8], kind: EntryKind) -> Result<(), PipelineError> {
    let path = root.join(rel_path(name));
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(&path, e)),
    }
    if kind == EntryKind::Attic {
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir(parent);
        }
    }
    Ok(())
}

/// `RCS_ATTIC`: the file crossed the Attic boundary. Moves it (creating
/// `Attic/` if it's now the destination) and, if `content` carries a body,
/// applies it on the way via the usual sibling-temp discipline.
pub fn apply_rcs_attic(
    root: &Path,
    attr: &Attr,
    content: Option<Content>,
    expected_hash: Option<&[u8]>,
    hash: HashAlgorithm,
    umask: u32,
) -> Result<(), PipelineError> {
    let dest_is_attic = attr.kind == EntryKind::Attic;
    let (old_name, new_name) = attic_pair(&attr.name);
    let old_path = root.join(rel_path(&old_name));
    let new_path = root.join(rel_path(if dest_is_attic { &new_name } else { &old_name }));
    let source_path = root.join(rel_path(if dest_is_attic { &old_name } else { &new_name }));

    let data = match content {
        Some(c) => match c {
            Content::Generic(data) => data,
            Content::Rdiff { base, commands } => cvsync_rdiff::apply(&base, &commands),
            Content::Rcs { base, diff } => {
                let rebuilt = rcsdiff::apply(&base, &diff);
                cvsync_rcs::write_file(&rebuilt)
            }
        },
        None => fs::read(&source_path).map_err(|e| io_err(&source_path, e))?,
    };

    if let Some(expected) = expected_hash {
        let got = hash.digest(&data);
        if got != expected {
            return Err(PipelineError::HashMismatch { path: new_path.display().to_string() });
        }
    }

    if let Some(parent) = new_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    write_atomically(&new_path, &data, masked_mode(attr.mode, umask), attr.mtime)?;
    let _ = fs::remove_file(&old_path);
    Ok(())
}

/// Given a folded path like `dir/x,v`, returns `(dir/x,v, dir/Attic/x,v)`.
fn attic_pair(folded_name: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let name = String::from_utf8_lossy(folded_name);
    match name.rsplit_once('/') {
        Some((dir, base)) => (name.clone().into_owned().into_bytes(), format!("{dir}/{ATTIC}/{base}").into_bytes()),
        None => (name.clone().into_owned().into_bytes(), format!("{ATTIC}/{name}").into_bytes()),
    }
}

fn rel_path(name: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(name).into_owned())
}

/// After a successful apply, mutates the in-memory inventory to match.
pub fn record_add_or_update(scan: &mut ScanFile, attr: Attr) {
    scan.upsert(attr);
}

pub fn record_remove(scan: &mut ScanFile, name: &[u8]) {
    scan.remove(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, kind: EntryKind, mode: u16) -> Attr {
        Attr { kind, name: name.as_bytes().to_vec(), mtime: 1_700_000_000, size: 0, mode, aux: Vec::new() }
    }

    #[test]
    fn mkdir_then_setattr_changes_mode() {
        let dir = tempfile::tempdir().unwrap();
        apply_mkdir(dir.path(), &attr("mod", EntryKind::Directory, 0o755), 0).unwrap();
        assert!(dir.path().join("mod").is_dir());

        apply_setattr(dir.path(), &attr("mod", EntryKind::Directory, 0o700), 0).unwrap();
        let mode = fs::metadata(dir.path().join("mod")).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }

    #[test]
    fn add_content_verifies_hash_and_renames_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let a = attr("a,v", EntryKind::Rcs, 0o644);
        let data = b"rcs text".to_vec();
        let hash = HashAlgorithm::Md5.digest(&data);
        apply_content(dir.path(), &a, Content::Generic(data.clone()), Some(&hash), HashAlgorithm::Md5, 0).unwrap();
        assert_eq!(fs::read(dir.path().join("a,v")).unwrap(), data);
        assert!(!dir.path().read_dir().unwrap().any(|e| {
            e.unwrap().file_name().to_string_lossy().starts_with(TEMP_PREFIX)
        }));
    }

    #[test]
    fn add_content_with_wrong_hash_errors_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let a = attr("a,v", EntryKind::Rcs, 0o644);
        let err = apply_content(dir.path(), &a, Content::Generic(b"data".to_vec()), Some(b"not-a-real-hash"), HashAlgorithm::Md5, 0)
            .unwrap_err();
        assert!(matches!(err, PipelineError::HashMismatch { .. }));
        assert!(!dir.path().join("a,v").exists());
    }

    #[test]
    fn symlink_replaces_an_existing_one() {
        let dir = tempfile::tempdir().unwrap();
        symlink("old-target", dir.path().join("l")).unwrap();
        let a = Attr { kind: EntryKind::Symlink, name: b"l".to_vec(), mtime: 0, size: 0, mode: 0o777, aux: b"new-target".to_vec() };
        apply_symlink(dir.path(), &a).unwrap();
        assert_eq!(fs::read_link(dir.path().join("l")).unwrap(), PathBuf::from("new-target"));
    }

    #[test]
    fn remove_dir_also_clears_an_empty_attic_sibling() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("mod/Attic")).unwrap();
        apply_remove_dir(dir.path(), b"mod").unwrap();
        assert!(!dir.path().join("mod").exists());
    }

    #[test]
    fn rcs_attic_move_relocates_the_file_into_attic() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("mod")).unwrap();
        fs::write(dir.path().join("mod/x,v"), b"rcs").unwrap();

        let dest = attr("mod/x,v", EntryKind::Attic, 0o644);
        apply_rcs_attic(dir.path(), &dest, None, None, HashAlgorithm::Md5, 0).unwrap();

        assert!(!dir.path().join("mod/x,v").exists());
        assert_eq!(fs::read(dir.path().join("mod/Attic/x,v")).unwrap(), b"rcs");
    }
}
