//! rsync-style delta transfer: block [`signature`] computation, the
//! rolling-checksum [`matcher`], and the [`wire`] command encoding sent
//! over a mux channel.

pub mod error;
pub mod matcher;
pub mod signature;
pub mod wire;

pub use error::RdiffError;
pub use matcher::{apply, diff};
pub use signature::{block_size, BlockSig, Signature, MAX_BLOCKSIZE, MIN_BLOCKSIZE};
pub use wire::RdiffCommand;
