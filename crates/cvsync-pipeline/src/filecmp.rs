//! Server-side content comparator: consumes the body FileScan attached and
//! decides what the Updater actually needs to apply.

use std::path::Path;

use cvsync_checksum::HashAlgorithm;
use cvsync_rdiff::RdiffCommand;

use crate::directive::{Directive, UpdateBody};
use crate::error::PipelineError;
use crate::rcsdiff::{self, RcsDiff};

/// What FileCmp decides to send the Updater for one `Update`/`RcsAttic`
/// directive, once it has compared the client's body against its own copy.
pub enum Resolution {
    /// Contents already match; only metadata needs to change (or nothing
    /// does, and the directive demotes to a no-op).
    SetAttrOnly,
    /// Send the whole file plus its hash.
    Generic { data: Vec<u8>, hash: Vec<u8> },
    /// Send a COPY/DATA/EOF instruction stream the client replays against
    /// its own copy.
    Rdiff { commands: Vec<RdiffCommand>, whole_file_hash: Vec<u8> },
    /// Send a field-level RCS diff the client applies against the base it
    /// just shipped.
    Rcs { diff: Box<RcsDiff>, whole_file_hash: Vec<u8> },
}

/// Resolves a `Generic` body: hash the server's file and compare.
pub fn resolve_generic(server_data: &[u8], client_hash: &[u8], hash: HashAlgorithm) -> Resolution {
    let server_hash = hash.digest(server_data);
    if server_hash == client_hash {
        Resolution::SetAttrOnly
    } else {
        Resolution::Generic { data: server_data.to_vec(), hash: server_hash }
    }
}

/// Resolves an `Rdiff` body: run the rolling-hash matcher against the
/// server's own copy of the file and produce the instruction stream.
pub fn resolve_rdiff(server_data: &[u8], sig: &cvsync_rdiff::Signature, hash: HashAlgorithm) -> Resolution {
    let commands = cvsync_rdiff::diff(server_data, sig, hash);
    Resolution::Rdiff { commands, whole_file_hash: hash.digest(server_data) }
}

/// Resolves an `Rcs` body: parses the client's raw bytes as the base
/// revision set and the server's own copy as the target, then diffs them
/// field by field. Falls back to shipping the server's copy whole if
/// either side fails to parse as RCS (a `,v`-named file need not actually
/// be one).
pub fn resolve_rcs(server_data: &[u8], client_base: &[u8], hash: HashAlgorithm) -> Resolution {
    let (Ok(base), Ok(target)) = (cvsync_rcs::parse_file(client_base), cvsync_rcs::parse_file(server_data)) else {
        return Resolution::Generic { data: server_data.to_vec(), hash: hash.digest(server_data) };
    };
    let diff = rcsdiff::diff(&base, &target, hash);
    if diff.is_empty() {
        Resolution::SetAttrOnly
    } else {
        // Hashed over the canonical re-serialization, not the server's raw bytes: the client
        // rebuilds `target` by applying `diff` to its own parsed base and re-serializing, which
        // normalizes whitespace the same way `cvsync_rcs::write_file` always does. Hashing the
        // server's original bytes here would make the verification fail whenever the on-disk
        // file isn't already in that canonical form.
        let canonical = cvsync_rcs::write_file(&target);
        Resolution::Rcs { diff: Box::new(diff), whole_file_hash: hash.digest(&canonical) }
    }
}

/// Reads the server's copy (if any — an `Add` has none yet) of the file
/// named by `directive` under `root`.
pub fn read_server_copy(root: &Path, directive: &Directive) -> Result<Vec<u8>, PipelineError> {
    let path = root.join(String::from_utf8_lossy(directive.name()).into_owned());
    std::fs::read(&path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })
}

/// Resolves an `Add`: the client has nothing to compare against, so the
/// server always ships its own copy whole, never an rdiff delta.
pub fn resolve_add(root: &Path, directive: &Directive, hash: HashAlgorithm) -> Result<Resolution, PipelineError> {
    let data = read_server_copy(root, directive)?;
    let digest = hash.digest(&data);
    Ok(Resolution::Generic { data, hash: digest })
}

/// Drives the full server-side resolution for one scanned directive.
pub fn resolve(root: &Path, directive: &Directive, body: &UpdateBody, hash: HashAlgorithm) -> Result<Resolution, PipelineError> {
    let server_data = read_server_copy(root, directive)?;
    match body {
        UpdateBody::Generic { hash: client_hash, .. } => Ok(resolve_generic(&server_data, client_hash, hash)),
        UpdateBody::Rdiff(sig) => Ok(resolve_rdiff(&server_data, sig, hash)),
        UpdateBody::Rcs(client_base) => Ok(resolve_rcs(&server_data, client_base, hash)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_rdiff::Signature;
    use cvsync_scan::{Attr, EntryKind};

    fn attr(name: &str) -> Attr {
        Attr { kind: EntryKind::File, name: name.as_bytes().to_vec(), mtime: 0, size: 0, mode: 0o644, aux: Vec::new() }
    }

    #[test]
    fn generic_resolves_to_setattr_when_hashes_match() {
        let data = b"same content".to_vec();
        let hash = HashAlgorithm::Md5.digest(&data);
        let resolution = resolve_generic(&data, &hash, HashAlgorithm::Md5);
        assert!(matches!(resolution, Resolution::SetAttrOnly));
    }

    #[test]
    fn generic_resolves_to_full_body_when_hashes_differ() {
        let data = b"server content".to_vec();
        let client_hash = HashAlgorithm::Md5.digest(b"client content");
        let resolution = resolve_generic(&data, &client_hash, HashAlgorithm::Md5);
        assert!(matches!(resolution, Resolution::Generic { .. }));
    }

    #[test]
    fn rdiff_resolves_with_copy_for_identical_file() {
        let data = vec![42u8; 4096];
        let sig = Signature::compute(&data, 512, HashAlgorithm::Md5).unwrap();
        let resolution = resolve_rdiff(&data, &sig, HashAlgorithm::Md5);
        match resolution {
            Resolution::Rdiff { commands, .. } => {
                assert!(commands.iter().any(|c| matches!(c, RdiffCommand::Copy { .. })));
                assert!(!commands.iter().any(|c| matches!(c, RdiffCommand::Data { .. })));
            }
            _ => panic!("expected an rdiff resolution"),
        }
    }

    fn rcs_sample(text_11: &str) -> Vec<u8> {
        format!(
            "head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t95.01.01.00.00.00;\tauthor me;\tstate Exp;\nbranches;\nnext;\n\ndesc\n@@\n\n1.1\nlog\n@@\ntext\n@{text_11}@\n"
        )
        .into_bytes()
    }

    #[test]
    fn rcs_resolves_to_setattr_when_content_is_identical() {
        let data = rcs_sample("hello");
        let resolution = resolve_rcs(&data, &data, HashAlgorithm::Md5);
        assert!(matches!(resolution, Resolution::SetAttrOnly));
    }

    #[test]
    fn rcs_resolves_to_a_field_diff_when_content_changed() {
        let client_base = rcs_sample("hello");
        let server_copy = rcs_sample("world");
        let resolution = resolve_rcs(&server_copy, &client_base, HashAlgorithm::Md5);
        assert!(matches!(resolution, Resolution::Rcs { .. }));
    }

    #[test]
    fn rcs_falls_back_to_generic_when_client_base_is_not_rcs() {
        let server_copy = rcs_sample("hello");
        let resolution = resolve_rcs(&server_copy, b"not an rcs file at all", HashAlgorithm::Md5);
        assert!(matches!(resolution, Resolution::Generic { .. }));
    }

    #[test]
    fn resolve_add_ships_the_servers_own_copy_whole() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("new,v"), b"brand new").unwrap();
        let resolution = resolve_add(dir.path(), &Directive::Add(attr("new,v")), HashAlgorithm::Md5).unwrap();
        match resolution {
            Resolution::Generic { data, hash } => {
                assert_eq!(data, b"brand new");
                assert_eq!(hash, HashAlgorithm::Md5.digest(b"brand new"));
            }
            _ => panic!("expected a generic resolution"),
        }
    }

    #[test]
    fn directive_without_a_server_copy_errors_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_server_copy(dir.path(), &Directive::Add(attr("missing,v"))).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
