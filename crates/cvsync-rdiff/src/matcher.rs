//! Finds spans of `new_data` that match a block in [`Signature`] and emits
//! the `COPY`/`DATA`/`EOF` instruction stream that reconstructs `new_data`
//! from the signature owner's existing copy plus the emitted literal data.
//!
//! Mirrors `rdiff_search()`: a weak-checksum hit is confirmed with the
//! strong hash before being trusted, and a miss slides the window forward
//! one byte via the rolling checksum rather than recomputing it whole.

use std::collections::HashMap;

use cvsync_checksum::{HashAlgorithm, RollingChecksum};

use crate::signature::{BlockSig, Signature};
use crate::wire::RdiffCommand;

pub fn diff(new_data: &[u8], sig: &Signature, algorithm: HashAlgorithm) -> Vec<RdiffCommand> {
    let mut index: HashMap<u32, Vec<&BlockSig>> = HashMap::new();
    for block in &sig.blocks {
        index.entry(block.weak).or_default().push(block);
    }

    let mut commands = Vec::new();
    if new_data.is_empty() {
        commands.push(RdiffCommand::Eof);
        return commands;
    }

    let bsize = sig.bsize as usize;
    let mut literal_start = 0usize;
    let mut pos = 0usize;
    let mut window_len = bsize.min(new_data.len());
    let mut rc = RollingChecksum::from_block(&new_data[pos..pos + window_len]);

    loop {
        let window = &new_data[pos..pos + window_len];
        let matched = find_match(&index, &rc, window, algorithm);

        if let Some(block) = matched {
            if literal_start < pos {
                commands.push(RdiffCommand::Data {
                    payload: new_data[literal_start..pos].to_vec(),
                });
            }
            commands.push(RdiffCommand::Copy {
                position: block.index * u64::from(sig.bsize),
                length: window_len as u32,
            });
            pos += window_len;
            literal_start = pos;
            if pos >= new_data.len() {
                break;
            }
            window_len = bsize.min(new_data.len() - pos);
            rc = RollingChecksum::from_block(&new_data[pos..pos + window_len]);
            continue;
        }

        if pos + window_len >= new_data.len() {
            break;
        }
        let outgoing = new_data[pos];
        let incoming = new_data[pos + window_len];
        rc.roll(outgoing, incoming).expect("non-empty window");
        pos += 1;
    }

    if literal_start < new_data.len() {
        commands.push(RdiffCommand::Data {
            payload: new_data[literal_start..].to_vec(),
        });
    }
    commands.push(RdiffCommand::Eof);
    commands
}

fn find_match<'a>(
    index: &HashMap<u32, Vec<&'a BlockSig>>,
    rc: &RollingChecksum,
    window: &[u8],
    algorithm: HashAlgorithm,
) -> Option<&'a BlockSig> {
    let candidates = index.get(&rc.digest())?;
    let strong = algorithm.digest(window);
    candidates
        .iter()
        .find(|b| b.length == window.len() && b.strong == strong)
        .copied()
}

/// Reconstructs a byte buffer from an instruction stream against `base`,
/// the copy of the file the instructions' `COPY` offsets refer to. Used by
/// tests and by the updater to apply a received diff.
pub fn apply(base: &[u8], commands: &[RdiffCommand]) -> Vec<u8> {
    let mut out = Vec::new();
    for cmd in commands {
        match cmd {
            RdiffCommand::Copy { position, length } => {
                let start = *position as usize;
                let end = start + *length as usize;
                out.extend_from_slice(&base[start..end]);
            }
            RdiffCommand::Data { payload } => out.extend_from_slice(payload),
            RdiffCommand::Eof => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_file_diffs_to_a_single_copy_span() {
        let data = vec![7u8; 4096];
        let sig = Signature::compute(&data, 1024, HashAlgorithm::Md5).unwrap();
        let commands = diff(&data, &sig, HashAlgorithm::Md5);

        let copies = commands
            .iter()
            .filter(|c| matches!(c, RdiffCommand::Copy { .. }))
            .count();
        assert_eq!(copies, 4);
        assert_eq!(apply(&data, &commands), data);
    }

    #[test]
    fn inserted_byte_still_finds_surrounding_copy_spans() {
        let mut base = Vec::new();
        base.extend(std::iter::repeat(b'a').take(1024));
        base.extend(std::iter::repeat(b'b').take(1024));
        let sig = Signature::compute(&base, 1024, HashAlgorithm::Md5).unwrap();

        let mut modified = Vec::new();
        modified.extend(std::iter::repeat(b'a').take(1024));
        modified.push(b'X');
        modified.extend(std::iter::repeat(b'b').take(1024));

        let commands = diff(&modified, &sig, HashAlgorithm::Md5);
        assert!(commands.iter().any(|c| matches!(c, RdiffCommand::Copy { .. })));
        assert_eq!(apply(&base, &commands), modified);
    }

    #[test]
    fn completely_different_file_is_all_literal_data() {
        let base = vec![1u8; 2048];
        let sig = Signature::compute(&base, 1024, HashAlgorithm::Md5).unwrap();
        let fresh = vec![9u8; 2048];
        let commands = diff(&fresh, &sig, HashAlgorithm::Md5);
        assert!(commands.iter().all(|c| !matches!(c, RdiffCommand::Copy { .. })));
    }
}
