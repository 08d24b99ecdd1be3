//! Weak rolling checksum and pluggable strong hash backends used by the
//! delta (rdiff) engine and by post-transfer content verification.

mod error;
mod hash;
mod rolling;
mod strong;
mod tiger;

pub use error::ChecksumError;
pub use hash::HashAlgorithm;
pub use rolling::RollingChecksum;
pub use strong::StrongHasher;
