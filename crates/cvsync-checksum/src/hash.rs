//! Negotiable strong hash algorithm identifiers.
//!
//! Ordered exactly as the server offers them during negotiation: MD5 is the
//! mandatory default, the other three are optional upgrades a client may
//! request if the server advertises support.

use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;

use crate::error::ChecksumError;
use crate::strong::StrongHasher;
use crate::tiger::Tiger192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Ripemd160,
    Sha1,
    Tiger192,
}

impl HashAlgorithm {
    /// Preference order used when negotiating: earlier entries win ties.
    pub const PREFERENCE_ORDER: [HashAlgorithm; 4] = [
        HashAlgorithm::Md5,
        HashAlgorithm::Ripemd160,
        HashAlgorithm::Sha1,
        HashAlgorithm::Tiger192,
    ];

    pub const DEFAULT: HashAlgorithm = HashAlgorithm::Md5;

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Ripemd160 => "RIPEMD160",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Tiger192 => "TIGER192",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ChecksumError> {
        match name.to_ascii_uppercase().as_str() {
            "MD5" => Ok(HashAlgorithm::Md5),
            "RIPEMD160" => Ok(HashAlgorithm::Ripemd160),
            "SHA1" => Ok(HashAlgorithm::Sha1),
            "TIGER192" => Ok(HashAlgorithm::Tiger192),
            other => Err(ChecksumError::UnknownAlgorithm(other.to_string())),
        }
    }

    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Ripemd160 | HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Tiger192 => 24,
        }
    }

    #[must_use]
    pub fn hasher(self) -> StrongHasher {
        match self {
            HashAlgorithm::Md5 => StrongHasher::Md5(Md5::default()),
            HashAlgorithm::Ripemd160 => StrongHasher::Ripemd160(Ripemd160::default()),
            HashAlgorithm::Sha1 => StrongHasher::Sha1(Sha1::default()),
            HashAlgorithm::Tiger192 => StrongHasher::Tiger192(Tiger192::new()),
        }
    }

    /// Convenience one-shot digest of a full buffer.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        let mut h = self.hasher();
        h.update(data);
        h.finalize()
    }

    /// Picks the strongest algorithm both sides can use, given the set the
    /// peer advertises as available, preferring the order in
    /// [`Self::PREFERENCE_ORDER`].
    #[must_use]
    pub fn negotiate(offered: &[HashAlgorithm]) -> HashAlgorithm {
        for candidate in Self::PREFERENCE_ORDER {
            if offered.contains(&candidate) {
                return candidate;
            }
        }
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(HashAlgorithm::parse("md5").unwrap(), HashAlgorithm::Md5);
        assert_eq!(
            HashAlgorithm::parse("Tiger192").unwrap(),
            HashAlgorithm::Tiger192
        );
        assert!(HashAlgorithm::parse("crc32").is_err());
    }

    #[test]
    fn negotiate_prefers_md5_when_offered() {
        let offered = [HashAlgorithm::Sha1, HashAlgorithm::Md5, HashAlgorithm::Tiger192];
        assert_eq!(HashAlgorithm::negotiate(&offered), HashAlgorithm::Md5);
    }

    #[test]
    fn negotiate_falls_back_through_preference_order() {
        let offered = [HashAlgorithm::Tiger192, HashAlgorithm::Sha1];
        assert_eq!(HashAlgorithm::negotiate(&offered), HashAlgorithm::Sha1);
    }

    #[test]
    fn negotiate_with_nothing_in_common_falls_back_to_default() {
        assert_eq!(HashAlgorithm::negotiate(&[]), HashAlgorithm::Md5);
    }
}
