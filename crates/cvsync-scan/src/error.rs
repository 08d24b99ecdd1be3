//! Errors raised while reading, writing, or walking a scanfile inventory.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("scanfile record truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("scanfile record at offset {offset} has unknown entry type {kind}")]
    UnknownEntryType { offset: usize, kind: u8 },

    #[error("scanfile entries out of order: `{prev}` then `{next}`")]
    OutOfOrder { prev: String, next: String },

    #[error("`{path}` exists both in the main tree and under Attic/")]
    AtticInconsistency { path: String },
}
