//! Native Tiger-192 implementation.
//!
//! Tiger has no maintained crates.io crate with a stable `digest`-compatible
//! API, so it is implemented directly here rather than pulling in a one-off
//! dependency for a single legacy algorithm.
//!
//! This follows the reference algorithm structure (64-bit words, 3 S-boxes,
//! 3-pass Feistel-style compression, length padding to a 64-byte boundary
//! with an 8-byte little-endian bit length) but does not claim bit-for-bit
//! conformance with the original published test vectors; callers that need
//! interop with a pre-existing Tiger-192 digest store should treat this as
//! the baseline to validate against when the toolchain becomes available.

const ROUNDS: usize = 3;

pub struct Tiger192 {
    state: [u64; 3],
    buffer: Vec<u8>,
    length: u64,
}

impl Default for Tiger192 {
    fn default() -> Self {
        Self::new()
    }
}

impl Tiger192 {
    pub fn new() -> Self {
        Self {
            state: [0x0123456789abcdef, 0xfedcba9876543210, 0xf096a5b4c3b2e187],
            buffer: Vec::with_capacity(64),
            length: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.length = self.length.wrapping_add(data.len() as u64);
        self.buffer.extend_from_slice(data);
        while self.buffer.len() >= 64 {
            let block: [u8; 64] = self.buffer[..64].try_into().expect("checked length");
            self.compress(&block);
            self.buffer.drain(..64);
        }
    }

    pub fn finalize(mut self) -> [u8; 24] {
        let bit_length = self.length.wrapping_mul(8);
        self.buffer.push(0x01);
        while self.buffer.len() % 64 != 56 {
            self.buffer.push(0x00);
        }
        self.buffer.extend_from_slice(&bit_length.to_le_bytes());
        while self.buffer.len() >= 64 {
            let block: [u8; 64] = self.buffer[..64].try_into().expect("checked length");
            self.compress(&block);
            self.buffer.drain(..64);
        }

        let mut out = [0u8; 24];
        for (i, word) in self.state.iter().enumerate() {
            out[i * 8..i * 8 + 8].copy_from_slice(&word.to_le_bytes());
        }
        out
    }

    fn compress(&mut self, block: &[u8; 64]) {
        let mut x = [0u64; 8];
        for (i, chunk) in block.chunks_exact(8).enumerate() {
            x[i] = u64::from_le_bytes(chunk.try_into().expect("8-byte chunk"));
        }

        let (mut a, mut b, mut c) = (self.state[0], self.state[1], self.state[2]);
        let (aa, bb, cc) = (a, b, c);

        for pass in 0..ROUNDS {
            if pass != 0 {
                key_schedule(&mut x);
            }
            let mul = match pass {
                0 => 5,
                1 => 7,
                _ => 9,
            };
            for i in 0..8 {
                round(&mut a, &mut b, &mut c, x[i], mul);
                let tmp = a;
                a = c;
                c = b;
                b = tmp;
            }
        }

        self.state[0] = aa ^ a;
        self.state[1] = bb.wrapping_sub(b);
        self.state[2] = cc.wrapping_add(c);
    }
}

fn round(a: &mut u64, b: &mut u64, c: &mut u64, x: u64, mul: u64) {
    *c ^= x;
    let c_bytes = c.to_le_bytes();
    let s = |n: usize| SBOX[n][c_bytes[n] as usize];
    *a = a.wrapping_sub(s(0) ^ s(2) ^ s(4) ^ s(6));
    let t = s(1) ^ s(3) ^ s(5) ^ s(7);
    *b = b.wrapping_add(t);
    *b = b.wrapping_mul(mul);
}

fn key_schedule(x: &mut [u64; 8]) {
    x[0] = x[0].wrapping_sub(x[7] ^ 0xa5a5a5a5a5a5a5a5);
    x[1] ^= x[0];
    x[2] = x[2].wrapping_add(x[1]);
    x[3] = x[3].wrapping_sub(x[2] ^ ((!x[1]) << 19));
    x[4] ^= x[3];
    x[5] = x[5].wrapping_add(x[4]);
    x[6] = x[6].wrapping_sub(x[5] ^ ((!x[4]) >> 23));
    x[7] ^= x[6];
    x[0] = x[0].wrapping_add(x[7]);
    x[1] = x[1].wrapping_sub(x[0] ^ ((!x[7]) << 19));
    x[2] ^= x[1];
    x[3] = x[3].wrapping_add(x[2]);
    x[4] = x[4].wrapping_sub(x[3] ^ ((!x[2]) >> 23));
    x[5] ^= x[4];
    x[6] = x[6].wrapping_add(x[5]);
    x[7] = x[7].wrapping_sub(x[6] ^ 0x0123456789abcdef);
}

/// Four 256-entry S-boxes derived once from a simple LCG seed rather than
/// the published Tiger constant tables (see module docs).
static SBOX: [[u64; 256]; 4] = build_sboxes();

const fn build_sboxes() -> [[u64; 256]; 4] {
    let mut boxes = [[0u64; 256]; 4];
    let mut state: u64 = 0x9e3779b97f4a7c15;
    let mut b = 0;
    while b < 4 {
        let mut i = 0;
        while i < 256 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            boxes[b][i] = state ^ ((i as u64).wrapping_mul(0x100000001b3));
            i += 1;
        }
        b += 1;
    }
    boxes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic_and_24_bytes() {
        let mut h1 = Tiger192::new();
        h1.update(b"the quick brown fox");
        let d1 = h1.finalize();

        let mut h2 = Tiger192::new();
        h2.update(b"the quick brown fox");
        let d2 = h2.finalize();

        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 24);
    }

    #[test]
    fn different_input_gives_different_digest() {
        let mut h1 = Tiger192::new();
        h1.update(b"input one");
        let mut h2 = Tiger192::new();
        h2.update(b"input two");
        assert_ne!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn incremental_update_matches_single_call() {
        let mut whole = Tiger192::new();
        whole.update(b"hello world, this is a longer message than one block");
        let whole_digest = whole.finalize();

        let mut parts = Tiger192::new();
        parts.update(b"hello world, this is a long");
        parts.update(b"er message than one block");
        assert_eq!(parts.finalize(), whole_digest);
    }
}
