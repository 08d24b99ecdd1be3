//! Errors raised during session negotiation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("mux error during negotiation: {0}")]
    Mux(#[from] cvsync_mux::MuxError),

    #[error("io error during negotiation: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed banner line")]
    BadBanner,

    #[error("unsupported protocol version {major}.{minor}, need at least {min_major}.{min_minor}")]
    UnsupportedVersion {
        major: u16,
        minor: u16,
        min_major: u16,
        min_minor: u16,
    },

    #[error("peer and we share no common hash algorithm")]
    NoCommonHash,

    #[error("server rejected collection `{0}`: {1}")]
    CollectionDenied(String, String),

    #[error("unknown compression mode byte {0:#04x}")]
    UnknownCompressionMode(u8),

    #[error("malformed collection grant payload")]
    MalformedCollectionGrant,

    #[error(transparent)]
    Checksum(#[from] cvsync_checksum::ChecksumError),

    #[error(transparent)]
    Session(#[from] cvsync_session::SessionError),
}
