//! Errors raised while building or validating session configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unknown release type `{0}` (expected `list` or `rcs`)")]
    UnknownRelease(String),

    #[error("unknown error mode `{0}` (expected `abort`, `fixup`, or `ignore`)")]
    UnknownErrorMode(String),

    #[error("unknown filter action `{0}` (expected `allow`, `deny`, or `nordiff`)")]
    UnknownFilterAction(String),

    #[error("collection `{0}` is not in the collection list")]
    UnknownCollection(String),

    #[error("empty filter pattern")]
    EmptyPattern,
}
