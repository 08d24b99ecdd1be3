//! The server-side synchronized merge of the client's tree (as received
//! from DirScan) against the server's own inventory.
//!
//! Both sides are flat, sorted [`ScanFile`]s, each entry already carrying
//! its full path. Because [`cvsync_scan::cmp_pathname`] sorts a directory's
//! own entry immediately before every one of its descendants, a plain
//! merge-join over the two flat sequences produces exactly one directive
//! per differing entry — including, for a whole missing subtree, one ADD or
//! REMOVE per descendant — without needing to walk directories recursively.

use cvsync_scan::{Attr, EntryKind, ScanFile};
use cvsync_session::{FilterAction, FilterList};

use crate::directive::Directive;

fn is_denied(filters: &FilterList, name: &[u8]) -> bool {
    filters.access(&String::from_utf8_lossy(name)) == FilterAction::Deny
}

/// Runs the merge and returns the directive stream in tree order. A path
/// `filters` denies is skipped entirely, as if neither side had it: no
/// `Add`, `Remove`, `Update`, or `SetAttr` is ever emitted for it.
#[must_use]
pub fn compare(client: &ScanFile, server: &ScanFile, filters: &FilterList) -> Vec<Directive> {
    let mut out = Vec::new();
    let mut ci = client.iter().peekable();
    let mut si = server.iter().peekable();

    loop {
        match (ci.peek(), si.peek()) {
            (None, None) => break,
            (Some(_), None) => {
                let c = ci.next().unwrap();
                if !is_denied(filters, &c.name) {
                    out.push(Directive::Remove { name: c.name.clone(), kind: c.kind });
                }
            }
            (None, Some(_)) => {
                let s = si.next().unwrap();
                if !is_denied(filters, &s.name) {
                    out.push(Directive::Add(s.clone()));
                }
            }
            (Some(c), Some(s)) => match cvsync_scan::cmp_pathname(&c.name, &s.name) {
                std::cmp::Ordering::Less => {
                    let c = ci.next().unwrap();
                    if !is_denied(filters, &c.name) {
                        out.push(Directive::Remove { name: c.name.clone(), kind: c.kind });
                    }
                }
                std::cmp::Ordering::Greater => {
                    let s = si.next().unwrap();
                    if !is_denied(filters, &s.name) {
                        out.push(Directive::Add(s.clone()));
                    }
                }
                std::cmp::Ordering::Equal => {
                    let c = ci.next().unwrap();
                    let s = si.next().unwrap();
                    if is_denied(filters, &s.name) {
                        continue;
                    }
                    if let Some(d) = compare_entries(c, s) {
                        out.push(d);
                    }
                }
            },
        }
    }

    out
}

fn compare_entries(client: &Attr, server: &Attr) -> Option<Directive> {
    let attic_flipped = (client.kind == EntryKind::Attic) != (server.kind == EntryKind::Attic);
    if attic_flipped && is_rcs_like(client.kind) && is_rcs_like(server.kind) {
        return Some(Directive::RcsAttic(server.clone()));
    }

    match server.kind {
        EntryKind::Directory => {
            if client.mode != server.mode {
                Some(Directive::SetAttr(server.clone()))
            } else {
                None
            }
        }
        EntryKind::Symlink => {
            if client.aux != server.aux {
                Some(Directive::Update(server.clone()))
            } else {
                None
            }
        }
        EntryKind::File => {
            if client.mtime != server.mtime || client.size != server.size {
                Some(Directive::Update(server.clone()))
            } else if client.mode != server.mode {
                Some(Directive::SetAttr(server.clone()))
            } else {
                None
            }
        }
        EntryKind::Rcs | EntryKind::Attic => {
            // RCS entries never carry size on the wire; content changes are
            // detected purely off mtime and resolved via the RCS differ.
            if client.mtime != server.mtime {
                Some(Directive::Update(server.clone()))
            } else if client.mode != server.mode {
                Some(Directive::SetAttr(server.clone()))
            } else {
                None
            }
        }
    }
}

fn is_rcs_like(kind: EntryKind) -> bool {
    matches!(kind, EntryKind::Rcs | EntryKind::Attic)
}
