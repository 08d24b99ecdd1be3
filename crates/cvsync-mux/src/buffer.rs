//! Per-channel-direction ring buffers and their flow-control bookkeeping.

use std::collections::VecDeque;

/// Lifecycle of one buffer. Transitions are monotonic:
/// `Init -> Running -> Closed` or `Init -> Running -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxState {
    /// Not yet used.
    Init,
    /// Accepting sends/receives normally.
    Running,
    /// Peer sent `CLOSE`; no more bytes will arrive (inbound) or may be sent
    /// (outbound).
    Closed,
    /// Unrecoverable protocol or transport failure; all operations fail.
    Error,
}

impl MuxState {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, MuxState::Closed | MuxState::Error)
    }
}

/// Inbound half of one channel: bytes the receiver thread has appended and
/// the application has not yet consumed.
pub(crate) struct InboundBuf {
    pub data: VecDeque<u8>,
    pub bufsize: usize,
    pub state: MuxState,
    /// Bytes drained by the application since the last credit was sent back
    /// to the peer. Credited (via RESET) once it reaches zero-queue.
    pub uncredited: u32,
}

impl InboundBuf {
    pub fn new(bufsize: usize) -> Self {
        Self {
            data: VecDeque::with_capacity(bufsize.min(4096)),
            bufsize,
            state: MuxState::Init,
            uncredited: 0,
        }
    }
}

/// Outbound half of one channel: the sender tracks how much send window
/// (`rlength`) the peer has granted.
pub(crate) struct OutboundBuf {
    pub credit: u32,
    pub mss: u16,
    pub state: MuxState,
}

impl OutboundBuf {
    pub fn new(initial_credit: u32, mss: u16) -> Self {
        Self {
            credit: initial_credit,
            mss,
            state: MuxState::Init,
        }
    }
}
