//! Errors raised while comparing or applying a collection's tree.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("mux error: {0}")]
    Mux(#[from] cvsync_mux::MuxError),

    #[error("protocol error: {0}")]
    Proto(#[from] cvsync_proto::ProtoError),

    #[error(transparent)]
    Scan(#[from] cvsync_scan::ScanError),

    #[error(transparent)]
    Rcs(#[from] cvsync_rcs::RcsError),

    #[error(transparent)]
    Rdiff(#[from] cvsync_rdiff::RdiffError),

    #[error(transparent)]
    Checksum(#[from] cvsync_checksum::ChecksumError),

    #[error("filesystem error at {path}: {source}")]
    Io { path: String, source: std::io::Error },

    #[error("whole-file hash mismatch after applying update to `{path}`")]
    HashMismatch { path: String },

    #[error("unknown inner update body tag {0:#04x}")]
    UnknownBodyTag(u8),

    #[error("the RCS file at `{path}` is not a file this parser can round-trip; falling back to a full copy")]
    RcsUnparseable { path: String },

    #[error("rcs diff payload truncated at offset {offset}")]
    RcsDiffTruncated { offset: usize },

    #[error("rcs diff payload has unknown field tag {0:#04x}")]
    UnknownRcsField(u8),
}
