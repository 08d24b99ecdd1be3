//! Block signatures: the sender hashes its own copy of a file into
//! fixed-size blocks and ships the weak+strong pair for each one; the peer
//! uses them to find which spans of its own copy can be reused via COPY
//! instead of being retransmitted as DATA.

use cvsync_checksum::{HashAlgorithm, RollingChecksum};

use crate::error::RdiffError;

pub const MIN_BLOCKSIZE: u32 = 512;
pub const MAX_BLOCKSIZE: u32 = 65536;
pub const TARGET_BLOCKS: u64 = 128;

/// Picks a block size so a file of `file_len` bytes yields roughly
/// [`TARGET_BLOCKS`] blocks, clamped to `[MIN_BLOCKSIZE, MAX_BLOCKSIZE]`.
#[must_use]
pub fn block_size(file_len: u64) -> u32 {
    if file_len == 0 {
        return MIN_BLOCKSIZE;
    }
    let ideal = file_len.div_ceil(TARGET_BLOCKS);
    ideal.clamp(u64::from(MIN_BLOCKSIZE), u64::from(MAX_BLOCKSIZE)) as u32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSig {
    pub index: u64,
    pub weak: u32,
    pub strong: Vec<u8>,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub bsize: u32,
    pub blocks: Vec<BlockSig>,
}

impl Signature {
    pub fn compute(data: &[u8], bsize: u32, algorithm: HashAlgorithm) -> Result<Self, RdiffError> {
        if !(MIN_BLOCKSIZE..=MAX_BLOCKSIZE).contains(&bsize) {
            return Err(RdiffError::BadBlockSize(bsize));
        }
        let blocks = data
            .chunks(bsize as usize)
            .enumerate()
            .map(|(index, chunk)| BlockSig {
                index: index as u64,
                weak: RollingChecksum::from_block(chunk).digest(),
                strong: algorithm.digest(chunk),
                length: chunk.len(),
            })
            .collect();
        Ok(Self { bsize, blocks })
    }

    /// Serializes the signature list for the FileScan -> FileCmp wire:
    /// `bsize:4 nblocks:4 (weak:4 stronglen:1 strong length:4)*`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bsize.to_be_bytes());
        out.extend_from_slice(&(self.blocks.len() as u32).to_be_bytes());
        for block in &self.blocks {
            out.extend_from_slice(&block.weak.to_be_bytes());
            out.push(block.strong.len() as u8);
            out.extend_from_slice(&block.strong);
            out.extend_from_slice(&(block.length as u32).to_be_bytes());
        }
    }

    pub fn read_from(input: &[u8]) -> Result<Self, RdiffError> {
        let bsize = u32::from_be_bytes(input.get(0..4).ok_or(RdiffError::Truncated)?.try_into().unwrap());
        let nblocks = u32::from_be_bytes(input.get(4..8).ok_or(RdiffError::Truncated)?.try_into().unwrap());
        let mut pos = 8usize;
        let mut blocks = Vec::with_capacity(nblocks as usize);
        for index in 0..u64::from(nblocks) {
            let weak = u32::from_be_bytes(input.get(pos..pos + 4).ok_or(RdiffError::Truncated)?.try_into().unwrap());
            pos += 4;
            let stronglen = *input.get(pos).ok_or(RdiffError::Truncated)? as usize;
            pos += 1;
            let strong = input.get(pos..pos + stronglen).ok_or(RdiffError::Truncated)?.to_vec();
            pos += stronglen;
            let length = u32::from_be_bytes(input.get(pos..pos + 4).ok_or(RdiffError::Truncated)?.try_into().unwrap()) as usize;
            pos += 4;
            blocks.push(BlockSig { index, weak, strong, length });
        }
        Ok(Self { bsize, blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_size_targets_roughly_128_blocks() {
        let bsize = block_size(128 * 4096);
        assert_eq!(bsize, 4096);
    }

    #[test]
    fn block_size_is_clamped() {
        assert_eq!(block_size(1), MIN_BLOCKSIZE);
        assert_eq!(block_size(u64::MAX), MAX_BLOCKSIZE);
    }

    #[test]
    fn compute_yields_one_block_sig_per_chunk() {
        let data = vec![0u8; 2050];
        let sig = Signature::compute(&data, 1024, HashAlgorithm::Md5).unwrap();
        assert_eq!(sig.blocks.len(), 3);
        assert_eq!(sig.blocks[2].strong.len(), HashAlgorithm::Md5.output_len());
    }

    #[test]
    fn signature_round_trips_over_the_wire() {
        let data = vec![9u8; 3000];
        let sig = Signature::compute(&data, 1024, HashAlgorithm::Md5).unwrap();
        let mut buf = Vec::new();
        sig.write_to(&mut buf);
        let decoded = Signature::read_from(&buf).unwrap();
        assert_eq!(decoded.bsize, sig.bsize);
        assert_eq!(decoded.blocks.len(), sig.blocks.len());
        assert_eq!(decoded.blocks[1].strong, sig.blocks[1].strong);
    }
}
