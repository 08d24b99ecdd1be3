//! Per-entry attribute record: one fixed-layout record per file, directory,
//! symlink, or Attic entry in a scanfile, mirroring `struct cvsync_attr`.

use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A plain, non-RCS file.
    File,
    Directory,
    Symlink,
    /// An RCS file moved under `Attic/` — retained history, no longer live.
    Attic,
    /// An RCS file (`*,v`) still live in its main directory.
    Rcs,
}

impl EntryKind {
    const fn tag(self) -> u8 {
        match self {
            EntryKind::File => 0,
            EntryKind::Directory => 1,
            EntryKind::Symlink => 2,
            EntryKind::Attic => 3,
            EntryKind::Rcs => 4,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EntryKind::File),
            1 => Some(EntryKind::Directory),
            2 => Some(EntryKind::Symlink),
            3 => Some(EntryKind::Attic),
            4 => Some(EntryKind::Rcs),
            _ => None,
        }
    }
}

/// One inventory entry: a pathname plus the metadata needed to decide
/// whether it changed without re-reading the file. Which of `mtime`/`size`/
/// `mode`/`aux` are meaningful, and how they're encoded on the wire, depends
/// on `kind` (see [`Attr::encode`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    pub kind: EntryKind,
    pub name: Vec<u8>,
    pub mtime: i64,
    pub size: u64,
    pub mode: u16,
    /// Symlink target, or empty for everything else.
    pub aux: Vec<u8>,
}

impl Attr {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kind.tag());
        out.extend_from_slice(&(self.name.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.name);
        let aux = self.encode_aux();
        out.extend_from_slice(&(aux.len() as u16).to_be_bytes());
        out.extend_from_slice(&aux);
    }

    /// Builds the type-conditional aux payload: directories carry only their
    /// mode, RCS/Attic entries carry mtime+mode (no size, since content
    /// comparison for them goes through the RCS differ rather than a raw
    /// byte count), plain files carry mtime+size+mode, and symlinks carry
    /// their target verbatim.
    fn encode_aux(&self) -> Vec<u8> {
        match self.kind {
            EntryKind::Directory => self.mode.to_be_bytes().to_vec(),
            EntryKind::Rcs | EntryKind::Attic => {
                let mut aux = Vec::with_capacity(10);
                aux.extend_from_slice(&self.mtime.to_be_bytes());
                aux.extend_from_slice(&self.mode.to_be_bytes());
                aux
            }
            EntryKind::File => {
                let mut aux = Vec::with_capacity(18);
                aux.extend_from_slice(&self.mtime.to_be_bytes());
                aux.extend_from_slice(&self.size.to_be_bytes());
                aux.extend_from_slice(&self.mode.to_be_bytes());
                aux
            }
            EntryKind::Symlink => self.aux.clone(),
        }
    }

    /// Decodes one record starting at `input[offset]`, returning the record
    /// and the offset of the next one.
    pub fn decode(input: &[u8], offset: usize) -> Result<(Self, usize), ScanError> {
        let mut pos = offset;
        let kind = take_u8(input, &mut pos)?;
        let kind = EntryKind::from_tag(kind).ok_or(ScanError::UnknownEntryType { offset, kind })?;

        let namelen = take_u16(input, &mut pos)? as usize;
        let name = take_bytes(input, &mut pos, namelen)?.to_vec();

        let auxlen = take_u16(input, &mut pos)? as usize;
        let aux = take_bytes(input, &mut pos, auxlen)?;

        let (mtime, size, mode, aux) = match kind {
            EntryKind::Directory => {
                let mut p = 0;
                let mode = take_u16(aux, &mut p)?;
                (0, 0, mode, Vec::new())
            }
            EntryKind::Rcs | EntryKind::Attic => {
                let mut p = 0;
                let mtime = take_i64(aux, &mut p)?;
                let mode = take_u16(aux, &mut p)?;
                (mtime, 0, mode, Vec::new())
            }
            EntryKind::File => {
                let mut p = 0;
                let mtime = take_i64(aux, &mut p)?;
                let size = take_u64(aux, &mut p)?;
                let mode = take_u16(aux, &mut p)?;
                (mtime, size, mode, Vec::new())
            }
            EntryKind::Symlink => (0, 0, 0, aux.to_vec()),
        };

        Ok((
            Attr {
                kind,
                name,
                mtime,
                size,
                mode,
                aux,
            },
            pos,
        ))
    }
}

fn take_bytes<'a>(input: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8], ScanError> {
    let end = pos.checked_add(len).ok_or(ScanError::Truncated { offset: *pos })?;
    let slice = input.get(*pos..end).ok_or(ScanError::Truncated { offset: *pos })?;
    *pos = end;
    Ok(slice)
}

fn take_u8(input: &[u8], pos: &mut usize) -> Result<u8, ScanError> {
    Ok(take_bytes(input, pos, 1)?[0])
}

fn take_u16(input: &[u8], pos: &mut usize) -> Result<u16, ScanError> {
    Ok(u16::from_be_bytes(take_bytes(input, pos, 2)?.try_into().unwrap()))
}

fn take_u64(input: &[u8], pos: &mut usize) -> Result<u64, ScanError> {
    Ok(u64::from_be_bytes(take_bytes(input, pos, 8)?.try_into().unwrap()))
}

fn take_i64(input: &[u8], pos: &mut usize) -> Result<i64, ScanError> {
    Ok(i64::from_be_bytes(take_bytes(input, pos, 8)?.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_record() {
        let attr = Attr {
            kind: EntryKind::File,
            name: b"src/main.c".to_vec(),
            mtime: 1_700_000_000,
            size: 4096,
            mode: 0o644,
            aux: Vec::new(),
        };
        let mut buf = Vec::new();
        attr.encode(&mut buf);
        let (decoded, next) = Attr::decode(&buf, 0).unwrap();
        assert_eq!(decoded, attr);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn symlink_carries_target_in_aux() {
        let attr = Attr {
            kind: EntryKind::Symlink,
            name: b"link".to_vec(),
            mtime: 0,
            size: 0,
            mode: 0o777,
            aux: b"../target".to_vec(),
        };
        let mut buf = Vec::new();
        attr.encode(&mut buf);
        let (decoded, _) = Attr::decode(&buf, 0).unwrap();
        assert_eq!(decoded.aux, b"../target");
    }

    #[test]
    fn truncated_record_errors_instead_of_panicking() {
        let err = Attr::decode(&[0, 0, 0, 0, 5], 0).unwrap_err();
        assert!(matches!(err, ScanError::Truncated { .. }));
    }

    #[test]
    fn rcs_entry_carries_mtime_and_mode_but_no_size() {
        let attr = Attr {
            kind: EntryKind::Rcs,
            name: b"main.c,v".to_vec(),
            mtime: 1_700_000_000,
            size: 999,
            mode: 0o644,
            aux: Vec::new(),
        };
        let mut buf = Vec::new();
        attr.encode(&mut buf);
        let (decoded, next) = Attr::decode(&buf, 0).unwrap();
        assert_eq!(decoded.mtime, attr.mtime);
        assert_eq!(decoded.mode, attr.mode);
        assert_eq!(decoded.size, 0, "RCS entries don't carry size on the wire");
        assert_eq!(next, buf.len());
    }

    #[test]
    fn directory_entry_carries_only_mode() {
        let attr = Attr {
            kind: EntryKind::Directory,
            name: b"subdir".to_vec(),
            mtime: 123,
            size: 456,
            mode: 0o755,
            aux: Vec::new(),
        };
        let mut buf = Vec::new();
        attr.encode(&mut buf);
        let (decoded, _) = Attr::decode(&buf, 0).unwrap();
        assert_eq!(decoded.mode, attr.mode);
        assert_eq!(decoded.mtime, 0);
        assert_eq!(decoded.size, 0);
    }
}
