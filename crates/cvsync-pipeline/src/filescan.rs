//! Client-side content producer: attaches an [`UpdateBody`] to every
//! `Update`/`RcsAttic` directive DirCmp sent down, based on what's actually
//! on disk locally.
//!
//! Below the minimum rdiff block size, a whole-file `Generic` body is
//! cheaper than a signature round trip; at or above it, `Rdiff` block
//! signatures let the peer send back only the bytes that changed.

use std::path::Path;

use cvsync_checksum::HashAlgorithm;
use cvsync_rdiff::Signature;
use cvsync_scan::EntryKind;

use crate::directive::{Directive, UpdateBody};
use crate::error::PipelineError;

/// A directive paired with the content body FileScan attached, if any
/// (`Add`/`Remove`/`SetAttr` never carry one).
pub struct ScannedDirective {
    pub directive: Directive,
    pub body: Option<UpdateBody>,
}

/// Reads the local file named by `directive` (if it needs content) under
/// `root` and attaches the appropriate body. `no_rdiff` forces a whole-file
/// `Generic` body even above the rdiff size threshold, for paths a
/// collection's filters have tagged `nordiff` (binary files rdiff block
/// matching wastes time on).
pub fn scan_directive(
    root: &Path,
    directive: Directive,
    hash: HashAlgorithm,
    no_rdiff: bool,
) -> Result<ScannedDirective, PipelineError> {
    let needs_body = matches!(directive, Directive::Update(_) | Directive::RcsAttic(_));
    if !needs_body {
        return Ok(ScannedDirective { directive, body: None });
    }

    let attr = match &directive {
        Directive::Update(a) | Directive::RcsAttic(a) => a.clone(),
        _ => unreachable!("checked above"),
    };

    if attr.kind == EntryKind::Symlink {
        return Ok(ScannedDirective { directive, body: None });
    }

    let path = root.join(String::from_utf8_lossy(&attr.name).into_owned());
    let data = std::fs::read(&path).map_err(|e| PipelineError::Io { path: path.display().to_string(), source: e })?;

    let is_rcs_like = matches!(attr.kind, EntryKind::Rcs | EntryKind::Attic);
    let body = if is_rcs_like && cvsync_rcs::parse_file(&data).is_ok() {
        UpdateBody::Rcs(data)
    } else {
        let bsize = cvsync_rdiff::block_size(data.len() as u64);
        if no_rdiff || (data.len() as u64) < u64::from(cvsync_rdiff::MIN_BLOCKSIZE) {
            UpdateBody::Generic { size: data.len() as u64, hash: hash.digest(&data) }
        } else {
            UpdateBody::Rdiff(Signature::compute(&data, bsize, hash)?)
        }
    };

    Ok(ScannedDirective { directive, body: Some(body) })
}
