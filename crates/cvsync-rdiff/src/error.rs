//! Errors raised by the delta (rdiff) engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RdiffError {
    #[error("rdiff command byte {0:#04x} is not EOF, COPY, or DATA")]
    UnknownCommand(u8),

    #[error("rdiff command frame truncated")]
    Truncated,

    #[error("block size {0} outside the allowed range")]
    BadBlockSize(u32),
}
