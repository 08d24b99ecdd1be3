//! Wire encoding for the three mux command kinds.

use std::io::{self, Read, Write};

/// `DATA chan len:2 payload[len]`
pub const DATA_CMD: u8 = 0x00;
/// `RESET chan amount:4`
pub const RESET_CMD: u8 = 0x01;
/// `CLOSE chan`
pub const CLOSE_CMD: u8 = 0x02;

/// One decoded mux command.
#[derive(Debug, Clone)]
pub enum Command {
    /// Deliver `payload` to the peer's inbound buffer for `chan`.
    Data { chan: u8, payload: Vec<u8> },
    /// Grant the peer `amount` additional bytes of send window on `chan`.
    Reset { chan: u8, amount: u32 },
    /// No further bytes will be sent on `chan`.
    Close { chan: u8 },
}

impl Command {
    /// Writes this command in its wire form.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Command::Data { chan, payload } => {
                debug_assert!(!payload.is_empty() && payload.len() <= u16::MAX as usize);
                w.write_all(&[DATA_CMD, *chan])?;
                w.write_all(&(payload.len() as u16).to_be_bytes())?;
                w.write_all(payload)?;
            }
            Command::Reset { chan, amount } => {
                w.write_all(&[RESET_CMD, *chan])?;
                w.write_all(&amount.to_be_bytes())?;
            }
            Command::Close { chan } => {
                w.write_all(&[CLOSE_CMD, *chan])?;
            }
        }
        Ok(())
    }

    /// Reads one command from the wire, or `Ok(None)` on a clean EOF before
    /// any byte of a new frame was read.
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Option<Self>> {
        let mut head = [0u8; 2];
        match read_exact_or_eof(r, &mut head)? {
            false => return Ok(None),
            true => {}
        }
        let (cmd, chan) = (head[0], head[1]);
        match cmd {
            DATA_CMD => {
                let mut len_buf = [0u8; 2];
                r.read_exact(&mut len_buf)?;
                let len = u16::from_be_bytes(len_buf) as usize;
                if len == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "DATA frame with zero length",
                    ));
                }
                let mut payload = vec![0u8; len];
                r.read_exact(&mut payload)?;
                Ok(Some(Command::Data { chan, payload }))
            }
            RESET_CMD => {
                let mut amount_buf = [0u8; 4];
                r.read_exact(&mut amount_buf)?;
                let amount = u32::from_be_bytes(amount_buf);
                if amount == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "RESET frame with zero amount",
                    ));
                }
                Ok(Some(Command::Reset { chan, amount }))
            }
            CLOSE_CMD => Ok(Some(Command::Close { chan })),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown mux command 0x{other:02x}"),
            )),
        }
    }
}

/// Like [`Read::read_exact`] but reports a clean EOF before any byte was
/// consumed as `Ok(false)` instead of an error, so callers can distinguish
/// "peer hung up between frames" from a truncated frame mid-read.
fn read_exact_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated mux frame header",
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
