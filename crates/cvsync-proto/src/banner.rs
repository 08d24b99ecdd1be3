//! The first bytes exchanged on a fresh connection: a newline-terminated
//! ASCII line identifying the protocol and version, read and written
//! byte-at-a-time since its length isn't known up front.

use std::io::{Read, Write};
use std::sync::Arc;

use cvsync_mux::Mux;

use crate::error::ProtoError;
use crate::version::Version;

const MAGIC: &str = "CVSYNC";
const MAX_BANNER_LEN: usize = 128;

#[must_use]
pub fn format_banner(version: Version) -> Vec<u8> {
    format!("{MAGIC} {version}\n").into_bytes()
}

pub fn send_banner(mux: &Mux, chan: u8, version: Version) -> Result<(), ProtoError> {
    mux.send(chan, &format_banner(version))?;
    mux.flush(chan)?;
    Ok(())
}

pub fn recv_banner(mux: &Arc<Mux>, chan: u8) -> Result<Version, ProtoError> {
    let mut line = Vec::new();
    loop {
        if line.len() > MAX_BANNER_LEN {
            return Err(ProtoError::BadBanner);
        }
        let byte = mux.recv(chan, 1)?;
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    parse_banner(&line)
}

/// Writes a banner directly to a raw transport, before any [`Mux`] exists.
/// Used for the pre-mux leg of the handshake, where compression still needs
/// negotiating and so can't yet be assumed by a [`Mux`] instance.
pub fn send_banner_raw<W: Write>(w: &mut W, version: Version) -> Result<(), ProtoError> {
    w.write_all(&format_banner(version))?;
    w.flush()?;
    Ok(())
}

/// Reads a banner directly from a raw transport. See [`send_banner_raw`].
pub fn recv_banner_raw<R: Read>(r: &mut R) -> Result<Version, ProtoError> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        if line.len() > MAX_BANNER_LEN {
            return Err(ProtoError::BadBanner);
        }
        r.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    parse_banner(&line)
}

fn parse_banner(line: &[u8]) -> Result<Version, ProtoError> {
    let text = std::str::from_utf8(line).map_err(|_| ProtoError::BadBanner)?;
    let (magic, version) = text.split_once(' ').ok_or(ProtoError::BadBanner)?;
    if magic != MAGIC {
        return Err(ProtoError::BadBanner);
    }
    version.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_mux::MuxOptions;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    #[test]
    fn formats_and_parses_its_own_output() {
        let v = Version { major: 2, minor: 24 };
        let line = format_banner(v);
        let parsed = parse_banner(&line[..line.len() - 1]).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn rejects_wrong_magic() {
        assert!(parse_banner(b"NOTCVSYNC 2.24").is_err());
    }

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("local addr");
        let client = thread::spawn(move || TcpStream::connect(addr).expect("connect loopback"));
        let (server, _) = listener.accept().expect("accept loopback connection");
        (client.join().expect("client thread"), server)
    }

    fn spawn_mux(stream: TcpStream) -> Arc<Mux> {
        let reader = stream.try_clone().expect("clone stream for reading");
        Mux::spawn(
            reader,
            stream,
            MuxOptions {
                channels: 1,
                bufsize: 16384,
                mss: 2048,
                compress: false,
            },
            None,
        )
        .expect("mux options are valid")
    }

    #[test]
    fn send_then_recv_over_a_real_mux() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        send_banner(&client, 0, Version::OURS).unwrap();
        let got = recv_banner(&server, 0).unwrap();
        assert_eq!(got, Version::OURS);
    }
}
