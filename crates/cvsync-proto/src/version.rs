//! Protocol version negotiation.
//!
//! Versions are `major.minor`; a client and server must share the same
//! major version and the session runs at `min(client minor, server minor)`.
//! Minor version 24 is the point at which the SYMBOLS admin field's count
//! switched from a 16-bit to a 32-bit width — both peers read that field
//! once at negotiation time and latch the width for the rest of the
//! session rather than re-checking it per record.

use std::fmt;
use std::str::FromStr;

use crate::constants::{MIN_PROTOCOL_MAJOR, MIN_PROTOCOL_MINOR, PROTOCOL_MAJOR, PROTOCOL_MINOR};
use crate::error::ProtoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
}

impl Version {
    pub const OURS: Version = Version {
        major: PROTOCOL_MAJOR,
        minor: PROTOCOL_MINOR,
    };

    /// The minor version at which the SYMBOLS count field widened from 16
    /// to 32 bits.
    const WIDE_SYMBOLS_COUNT_MINOR: u16 = 24;

    pub fn check_supported(self) -> Result<(), ProtoError> {
        if self.major != MIN_PROTOCOL_MAJOR
            || (self.major == MIN_PROTOCOL_MAJOR && self.minor < MIN_PROTOCOL_MINOR)
        {
            return Err(ProtoError::UnsupportedVersion {
                major: self.major,
                minor: self.minor,
                min_major: MIN_PROTOCOL_MAJOR,
                min_minor: MIN_PROTOCOL_MINOR,
            });
        }
        Ok(())
    }

    /// The version a session actually runs at once negotiated: the lower
    /// minor of the two peers' offers (majors must already match).
    #[must_use]
    pub fn negotiate(client: Version, server: Version) -> Option<Version> {
        if client.major != server.major {
            return None;
        }
        Some(Version {
            major: client.major,
            minor: client.minor.min(server.minor),
        })
    }

    #[must_use]
    pub fn wide_symbols_count(self) -> bool {
        self.minor >= Self::WIDE_SYMBOLS_COUNT_MINOR
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.split_once('.').ok_or(ProtoError::BadBanner)?;
        let major = major.parse().map_err(|_| ProtoError::BadBanner)?;
        let minor = minor.parse().map_err(|_| ProtoError::BadBanner)?;
        Ok(Version { major, minor })
    }
}
