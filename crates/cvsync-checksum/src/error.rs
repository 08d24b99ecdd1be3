//! Errors raised by the checksum crate.

use thiserror::Error;

#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ChecksumError {
    #[error("rolling checksum window is empty")]
    EmptyWindow,

    #[error("rolling checksum window of {len} bytes exceeds the 16-bit roll limit")]
    WindowTooLarge { len: usize },

    #[error("unknown hash algorithm `{0}` (expected md5, ripemd160, sha1, or tiger192)")]
    UnknownAlgorithm(String),
}
