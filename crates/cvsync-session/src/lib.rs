//! Collection, filter, and error-mode configuration data model shared by the
//! client and server halves of a session.
//!
//! This crate holds no I/O or networking; it is the plain data model that
//! [`cvsync-proto`](../cvsync_proto) negotiates over the wire and
//! [`cvsync-pipeline`](../cvsync_pipeline) consults while walking and
//! comparing trees.

mod collection;
mod error;
mod filter;

pub use collection::{Collection, CollectionList, ErrorMode, Release};
pub use error::SessionError;
pub use filter::{FilterAction, FilterList, FilterRule};
