//! Top-level error enum aggregating every layer a session can fail in.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Mux(#[from] cvsync_mux::MuxError),

    #[error(transparent)]
    Proto(#[from] cvsync_proto::ProtoError),

    #[error(transparent)]
    Session(#[from] cvsync_session::SessionError),

    #[error(transparent)]
    Scan(#[from] cvsync_scan::ScanError),

    #[error(transparent)]
    Pipeline(#[from] cvsync_pipeline::PipelineError),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("client and server collection names disagree (case-insensitively): `{client}` vs `{server}`")]
    CollectionMismatch { client: String, server: String },

    #[error("session was interrupted before completion")]
    Interrupted,

    #[error("a pipeline worker thread panicked")]
    WorkerPanicked,
}
