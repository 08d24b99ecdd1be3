//! RDIFF command wire encoding: `EOF`, `COPY position length`, and
//! `DATA length` followed by `length` bytes of literal payload.

use crate::error::RdiffError;

const CMD_EOF: u8 = 0x00;
const CMD_COPY: u8 = 0x01;
const CMD_DATA: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RdiffCommand {
    Eof,
    Copy { position: u64, length: u32 },
    Data { payload: Vec<u8> },
}

impl RdiffCommand {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            RdiffCommand::Eof => out.push(CMD_EOF),
            RdiffCommand::Copy { position, length } => {
                out.push(CMD_COPY);
                out.extend_from_slice(&position.to_be_bytes());
                out.extend_from_slice(&length.to_be_bytes());
            }
            RdiffCommand::Data { payload } => {
                out.push(CMD_DATA);
                out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                out.extend_from_slice(payload);
            }
        }
    }

    /// Parses one command from the front of `input`, returning it and the
    /// number of bytes consumed.
    pub fn read_from(input: &[u8]) -> Result<(Self, usize), RdiffError> {
        let &tag = input.first().ok_or(RdiffError::Truncated)?;
        match tag {
            CMD_EOF => Ok((RdiffCommand::Eof, 1)),
            CMD_COPY => {
                let body = input.get(1..13).ok_or(RdiffError::Truncated)?;
                let position = u64::from_be_bytes(body[0..8].try_into().unwrap());
                let length = u32::from_be_bytes(body[8..12].try_into().unwrap());
                Ok((RdiffCommand::Copy { position, length }, 13))
            }
            CMD_DATA => {
                let header = input.get(1..5).ok_or(RdiffError::Truncated)?;
                let length = u32::from_be_bytes(header.try_into().unwrap()) as usize;
                let payload = input.get(5..5 + length).ok_or(RdiffError::Truncated)?.to_vec();
                Ok((RdiffCommand::Data { payload }, 5 + length))
            }
            other => Err(RdiffError::UnknownCommand(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_three_commands() {
        for cmd in [
            RdiffCommand::Eof,
            RdiffCommand::Copy { position: 4096, length: 512 },
            RdiffCommand::Data { payload: b"hello".to_vec() },
        ] {
            let mut buf = Vec::new();
            cmd.write_to(&mut buf);
            let (decoded, consumed) = RdiffCommand::read_from(&buf).unwrap();
            assert_eq!(decoded, cmd);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn truncated_copy_errors() {
        let err = RdiffCommand::read_from(&[0x01, 0, 0]).unwrap_err();
        assert!(matches!(err, RdiffError::Truncated));
    }

    #[test]
    fn unknown_command_byte_errors() {
        let err = RdiffCommand::read_from(&[0xff]).unwrap_err();
        assert!(matches!(err, RdiffError::UnknownCommand(0xff)));
    }
}
