//! Strong (collision-resistant) digest backends used to confirm a rolling
//! checksum match and to verify file content after transfer.

use digest::Digest;
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;

use crate::tiger::Tiger192;

/// A strong hash context in progress. Variants wrap the real `digest`-crate
/// implementations for the three standard algorithms, and the native
/// [`Tiger192`] for the fourth.
pub enum StrongHasher {
    Md5(Md5),
    Ripemd160(Ripemd160),
    Sha1(Sha1),
    Tiger192(Tiger192),
}

impl StrongHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            StrongHasher::Md5(h) => Digest::update(h, data),
            StrongHasher::Ripemd160(h) => Digest::update(h, data),
            StrongHasher::Sha1(h) => Digest::update(h, data),
            StrongHasher::Tiger192(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            StrongHasher::Md5(h) => h.finalize().to_vec(),
            StrongHasher::Ripemd160(h) => h.finalize().to_vec(),
            StrongHasher::Sha1(h) => h.finalize().to_vec(),
            StrongHasher::Tiger192(h) => h.finalize().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashAlgorithm;

    #[test]
    fn md5_matches_known_vector() {
        let mut h = HashAlgorithm::Md5.hasher();
        h.update(b"abc");
        let digest = h.finalize();
        assert_eq!(
            digest,
            hex_decode("900150983cd24fb0d6963f7d28e17f72")
        );
    }

    #[test]
    fn sha1_matches_known_vector() {
        let mut h = HashAlgorithm::Sha1.hasher();
        h.update(b"abc");
        let digest = h.finalize();
        assert_eq!(digest, hex_decode("a9993e364706816aba3e25717850c26c9cd0d89"));
    }

    fn hex_decode(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
