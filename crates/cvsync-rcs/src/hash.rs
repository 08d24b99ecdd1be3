//! Per-revision content digests, used by `cvsync-pipeline`'s RCS-aware
//! comparer to detect a changed revision without re-checking out full text.

use cvsync_checksum::HashAlgorithm;

use crate::num::Num;
use crate::types::File;

/// Digest of one revision's log message and text, in that order, matching
/// how the two are laid out back-to-back in the deltatext block.
#[must_use]
pub fn revision_digest(file: &File, revision: &Num, algorithm: HashAlgorithm) -> Option<Vec<u8>> {
    let (_, text) = file.revision(revision)?;
    let mut hasher = algorithm.hasher();
    hasher.update(&text.log.0);
    hasher.update(&text.text.0);
    Some(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_file;

    #[test]
    fn digest_changes_when_text_changes() {
        let a = parse_file(b"head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t95.01.01.00.00.00;\tauthor me;\tstate;\nbranches;\nnext;\n\ndesc\n@@\n\n1.1\nlog\n@@\ntext\n@hello@\n").unwrap();
        let b = parse_file(b"head 1.1;\naccess;\nsymbols;\nlocks;\n\n1.1\ndate\t95.01.01.00.00.00;\tauthor me;\tstate;\nbranches;\nnext;\n\ndesc\n@@\n\n1.1\nlog\n@@\ntext\n@world@\n").unwrap();

        let rev = a.head().unwrap().clone();
        let da = revision_digest(&a, &rev, HashAlgorithm::Md5).unwrap();
        let db = revision_digest(&b, &rev, HashAlgorithm::Md5).unwrap();
        assert_ne!(da, db);
    }
}
