//! Session-level protocol: banner exchange, version/hash/compression
//! negotiation, collection requests, and the control-message envelope the
//! pipeline stages exchange once a session is running.
//!
//! The bulk-transfer rdiff wire format is deliberately not re-exported here;
//! it lives in `cvsync_rdiff::wire` since it's scoped to a single file
//! transfer rather than the session as a whole.

mod banner;
mod compression;
mod constants;
mod envelope;
mod error;
mod negotiation;
pub mod tags;
mod version;

pub use banner::{format_banner, recv_banner, recv_banner_raw, send_banner, send_banner_raw};
pub use compression::CompressionMode;
pub use constants::{DEFAULT_BSIZE, DEFAULT_PORT, MAX_CMD_LEN, MIN_PROTOCOL_MAJOR, MIN_PROTOCOL_MINOR, PROTOCOL_MAJOR, PROTOCOL_MINOR};
pub use envelope::Envelope;
pub use error::ProtoError;
pub use negotiation::{
    answer_collection_request, client_handshake, request_collection, server_handshake,
    signal_collections_done, ClientHello, CollectionGrant, ServerHello, SessionParams,
};
pub use version::Version;
