//! Wire-level constants that both peers must agree on independent of
//! negotiation (port, frame size limits, buffer defaults).

/// Default TCP port the daemon listens on.
pub const DEFAULT_PORT: u16 = 7777;

/// Largest single pipeline control command, matching `CVSYNC_MAXCMDLEN`.
pub const MAX_CMD_LEN: usize = 2048;

/// Default per-channel bulk transfer buffer size (`CVSYNC_BSIZE`, 1 MiB).
pub const DEFAULT_BSIZE: usize = 1 << 20;

/// Protocol version this crate implements and will offer during
/// negotiation.
pub const PROTOCOL_MAJOR: u16 = 2;
pub const PROTOCOL_MINOR: u16 = 24;

/// Oldest protocol version this implementation will still speak to.
pub const MIN_PROTOCOL_MAJOR: u16 = 2;
pub const MIN_PROTOCOL_MINOR: u16 = 20;
