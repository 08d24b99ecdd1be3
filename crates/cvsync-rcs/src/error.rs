//! Errors raised while parsing or re-serializing an RCS file.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RcsError {
    #[error("malformed RCS structure at byte offset {offset}")]
    Malformed { offset: usize },

    #[error("revision `{0}` is not a well-formed dotted numeric identifier")]
    BadRevision(String),

    #[error("revision `{0}` referenced but has no admin/delta/deltatext entry")]
    DanglingRevision(String),

    #[error("trailing bytes after the last deltatext block")]
    TrailingData,
}
