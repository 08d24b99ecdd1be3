//! Framed multiplexer carrying the CVSync pipeline's independent byte
//! channels over a single TCP connection.
//!
//! # Design
//!
//! Each direction of each channel is a [`buffer::MuxBuf`]-style ring with its
//! own lock and condition variable, following the historical cvsync `mux.c`
//! layout: a receiver thread is the sole writer of inbound buffers, and each
//! pipeline stage is the sole writer of its own outbound buffer. Flow control
//! is a simple credit scheme (`RESET` grants additional send window) rather
//! than TCP-level backpressure, so one connection can carry several
//! independently-paced streams without head-of-line blocking between them.
//!
//! # Errors
//!
//! Every blocking primitive ([`Mux::send`], [`Mux::recv`], [`Mux::flush`])
//! returns [`MuxError`] on protocol violation, transport failure, or a prior
//! [`Mux::abort`]. There is no partial success: once aborted, a `Mux` stays
//! aborted ([`Mux::abort`] is idempotent).

mod buffer;
mod compress;
mod frame;
mod mux;

pub use buffer::MuxState;
pub use frame::{Command, CLOSE_CMD, DATA_CMD, RESET_CMD};
pub use mux::{Mux, MuxError, MuxOptions};

/// Minimum allowed max-segment-size, in bytes.
pub const MIN_MSS: u16 = 1024;
/// Maximum allowed max-segment-size before compression doubling.
pub const MAX_MSS: u16 = 4096;
/// Minimum allowed per-channel buffer size.
pub const MIN_BUFSIZE: u32 = 8192;
/// Default per-channel buffer size.
pub const DEFAULT_BUFSIZE: u32 = 16384;
/// Maximum allowed per-channel buffer size.
pub const MAX_BUFSIZE: u32 = 32768;

/// The two pipeline channel numbers used by every CVSync session.
pub mod channels {
    /// DirScan -> DirCmp, and FileScan -> FileCmp.
    pub const PRIMARY: u8 = 0;
    /// DirCmp -> FileScan, and FileCmp -> Updater.
    pub const SECONDARY: u8 = 1;
}
