//! RCS (`,v`) file structure: parsing into [`types::File`], revision number
//! ordering via [`num::Num`], re-serialization, and per-revision digests.

pub mod error;
pub mod hash;
pub mod num;
pub mod parser;
pub mod serialize;
pub mod types;

pub use error::RcsError;
pub use num::Num;
pub use parser::parse_file;
pub use serialize::write_file;
