//! Client-side walker: turns a flat, sorted [`ScanFile`] into the nested
//! `DOWN`/`UP`/leaf frame stream DirCmp expects, reconstructing directory
//! structure from path prefixes (the scanfile's own sort order guarantees
//! every directory's entry sits immediately before its descendants).

use cvsync_scan::{Attr, EntryKind, ScanFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Down(Attr),
    Up,
    Leaf(Attr),
    End,
}

/// Builds the frame stream for one collection's worth of a client's scanned
/// tree.
#[must_use]
pub fn frames_from_scan(scan: &ScanFile) -> Vec<Frame> {
    let mut out = Vec::new();
    let mut stack: Vec<Vec<u8>> = Vec::new();

    for entry in scan.iter() {
        while let Some(dir) = stack.last() {
            if is_descendant(dir, &entry.name) {
                break;
            }
            stack.pop();
            out.push(Frame::Up);
        }

        if entry.kind == EntryKind::Directory {
            out.push(Frame::Down(entry.clone()));
            stack.push(entry.name.clone());
        } else {
            out.push(Frame::Leaf(entry.clone()));
        }
    }

    while !stack.is_empty() {
        stack.pop();
        out.push(Frame::Up);
    }
    out.push(Frame::End);
    out
}

fn is_descendant(dir: &[u8], name: &[u8]) -> bool {
    name.len() > dir.len() + 1 && name.starts_with(dir) && name[dir.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str, kind: EntryKind) -> Attr {
        Attr { kind, name: name.as_bytes().to_vec(), mtime: 0, size: 0, mode: 0o644, aux: Vec::new() }
    }

    #[test]
    fn nests_directories_and_closes_them_in_order() {
        let scan = ScanFile::from_sorted(vec![
            attr("dir", EntryKind::Directory),
            attr("dir/a,v", EntryKind::Rcs),
            attr("dir/sub", EntryKind::Directory),
            attr("dir/sub/b,v", EntryKind::Rcs),
            attr("top.txt", EntryKind::File),
        ])
        .unwrap();

        let frames = frames_from_scan(&scan);
        assert!(matches!(frames[0], Frame::Down(_)));
        assert!(matches!(frames[1], Frame::Leaf(_)));
        assert!(matches!(frames[2], Frame::Down(_)));
        assert!(matches!(frames[3], Frame::Leaf(_)));
        assert!(matches!(frames[4], Frame::Up)); // closes dir/sub
        assert!(matches!(frames[5], Frame::Up)); // closes dir
        assert!(matches!(frames[6], Frame::Leaf(_))); // top.txt
        assert!(matches!(frames[7], Frame::End));
    }

    #[test]
    fn flat_tree_has_no_down_up_pairs() {
        let scan = ScanFile::from_sorted(vec![attr("a", EntryKind::File), attr("b", EntryKind::File)]).unwrap();
        let frames = frames_from_scan(&scan);
        assert!(frames.iter().all(|f| !matches!(f, Frame::Down(_) | Frame::Up)));
    }
}
