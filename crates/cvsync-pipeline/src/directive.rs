//! The directive stream DirCmp emits to FileScan and FileScan (augmented
//! with content) passes on to FileCmp, then FileCmp to the Updater.
//!
//! Reuses [`cvsync_scan::Attr`]/[`EntryKind`] as the attribute payload since
//! a scanfile record already carries exactly what a directive needs to
//! describe a file, directory, or symlink's metadata.

use cvsync_scan::{Attr, EntryKind};

use crate::tags;

/// One instruction in the DirCmp -> FileScan -> FileCmp -> Updater stream.
/// `name` is always the full path relative to the collection root, matching
/// [`cvsync_scan::cmp_pathname`] ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// The peer is missing this entry; ship the server's attributes (and,
    /// for directories, recursively ADD the whole subtree).
    Add(Attr),
    /// The peer has this entry but the server doesn't; delete it.
    Remove { name: Vec<u8>, kind: EntryKind },
    /// Same content, only mode (and for files, mtime) differs.
    SetAttr(Attr),
    /// Content differs; carries no body yet — FileScan/FileCmp attach one.
    Update(Attr),
    /// The entry moved across the Attic boundary (live <-> dead).
    RcsAttic(Attr),
}

impl Directive {
    #[must_use]
    pub fn name(&self) -> &[u8] {
        match self {
            Directive::Add(a) | Directive::SetAttr(a) | Directive::Update(a) | Directive::RcsAttic(a) => &a.name,
            Directive::Remove { name, .. } => name,
        }
    }

    #[must_use]
    pub fn tag(&self) -> u8 {
        match self {
            Directive::Add(_) => tags::directive::ADD,
            Directive::Remove { .. } => tags::directive::REMOVE,
            Directive::SetAttr(_) => tags::directive::SETATTR,
            Directive::Update(_) => tags::directive::UPDATE,
            Directive::RcsAttic(_) => tags::directive::RCS_ATTIC,
        }
    }
}

/// The content body FileScan attaches to an `Update`/`RcsAttic` directive
/// before handing it to FileCmp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateBody {
    /// File is small enough (or the distfile policy forbids rdiff) that the
    /// whole content plus its hash is sent directly.
    Generic { size: u64, hash: Vec<u8> },
    /// A set of block signatures the peer can match its own copy against.
    Rdiff(cvsync_rdiff::Signature),
    /// The client's own raw `,v` bytes, sent whole so the server can parse
    /// it as the base revision set and diff its own copy against it
    /// field-by-field instead of comparing raw bytes.
    Rcs(Vec<u8>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_attr(name: &str) -> Attr {
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
    fn name_and_tag_agree_with_the_variant() {
        let d = Directive::Update(sample_attr("a/b.txt"));
        assert_eq!(d.name(), b"a/b.txt");
        assert_eq!(d.tag(), tags::directive::UPDATE);
    }
}
