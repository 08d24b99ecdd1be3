//! Sorted on-disk directory inventory format (`scanfile`) and the tree
//! walker that builds one from a live filesystem tree.

pub mod attr;
pub mod error;
pub mod scanfile;
pub mod walk;

pub use attr::{Attr, EntryKind};
pub use error::ScanError;
pub use scanfile::{cmp_pathname, ScanFile};
pub use walk::{walk, AtticPolicy, WalkOptions};
