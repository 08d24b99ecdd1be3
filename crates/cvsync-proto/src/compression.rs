//! Whole-stream compression negotiation.

use crate::error::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    No,
    Zlib,
}

impl CompressionMode {
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            CompressionMode::No => 0x01,
            CompressionMode::Zlib => 0x02,
        }
    }

    pub fn from_byte(b: u8) -> Result<Self, ProtoError> {
        match b {
            0x01 => Ok(CompressionMode::No),
            0x02 => Ok(CompressionMode::Zlib),
            other => Err(ProtoError::UnknownCompressionMode(other)),
        }
    }

    /// Both sides must request compression for the session to use it;
    /// either side can veto.
    #[must_use]
    pub fn negotiate(client_wants: bool, server_wants: bool) -> Self {
        if client_wants && server_wants {
            CompressionMode::Zlib
        } else {
            CompressionMode::No
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_requires_both_sides() {
        assert_eq!(CompressionMode::negotiate(true, true), CompressionMode::Zlib);
        assert_eq!(CompressionMode::negotiate(true, false), CompressionMode::No);
        assert_eq!(CompressionMode::negotiate(false, false), CompressionMode::No);
    }

    #[test]
    fn byte_round_trips() {
        assert_eq!(CompressionMode::from_byte(CompressionMode::Zlib.to_byte()).unwrap(), CompressionMode::Zlib);
    }
}
