//! The generic control-message frame every pipeline stage speaks once a
//! session is established: a `u16` big-endian length (of tag + payload), a
//! one-byte tag, and the payload itself. Bulk file content is never carried
//! inside one of these frames — it's streamed as raw mux bytes once a
//! control frame has announced its length, the same way RDIFF's own DATA
//! command carries its payload outside this envelope.

use std::io::{Read, Write};

use cvsync_mux::Mux;

use crate::constants::MAX_CMD_LEN;
use crate::error::ProtoError;

pub struct Envelope {
    pub tag: u8,
    pub payload: Vec<u8>,
}

fn encode_frame(tag: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 1) as u16;
    let mut frame = Vec::with_capacity(2 + 1 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.push(tag);
    frame.extend_from_slice(payload);
    frame
}

impl Envelope {
    #[must_use]
    pub fn new(tag: u8, payload: Vec<u8>) -> Self {
        Envelope { tag, payload }
    }

    pub fn write(&self, mux: &Mux, chan: u8) -> Result<(), ProtoError> {
        mux.send(chan, &encode_frame(self.tag, &self.payload))?;
        mux.flush(chan)?;
        Ok(())
    }

    pub fn read(mux: &Mux, chan: u8) -> Result<Self, ProtoError> {
        let header = mux.recv(chan, 2)?;
        let len = u16::from_be_bytes([header[0], header[1]]) as usize;
        if len == 0 || len > MAX_CMD_LEN + 1 {
            return Err(ProtoError::BadBanner);
        }
        let body = mux.recv(chan, len)?;
        let tag = body[0];
        let payload = body[1..].to_vec();
        Ok(Envelope { tag, payload })
    }

    /// Writes directly to a raw transport, before any [`Mux`] exists.
    pub fn write_raw<W: Write>(&self, w: &mut W) -> Result<(), ProtoError> {
        w.write_all(&encode_frame(self.tag, &self.payload))?;
        w.flush()?;
        Ok(())
    }

    /// Reads directly from a raw transport. See [`Envelope::write_raw`].
    pub fn read_raw<R: Read>(r: &mut R) -> Result<Self, ProtoError> {
        let mut header = [0u8; 2];
        r.read_exact(&mut header)?;
        let len = u16::from_be_bytes(header) as usize;
        if len == 0 || len > MAX_CMD_LEN + 1 {
            return Err(ProtoError::BadBanner);
        }
        let mut body = vec![0u8; len];
        r.read_exact(&mut body)?;
        Ok(Envelope { tag: body[0], payload: body[1..].to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvsync_mux::MuxOptions;
    use std::net::{TcpListener, TcpStream};
    use std::thread;

    fn connected_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback listener");
        let addr = listener.local_addr().expect("local addr");
        let client = thread::spawn(move || TcpStream::connect(addr).expect("connect loopback"));
        let (server, _) = listener.accept().expect("accept loopback connection");
        (client.join().expect("client thread"), server)
    }

    fn spawn_mux(stream: TcpStream) -> std::sync::Arc<Mux> {
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
    fn write_then_read_round_trips_tag_and_payload() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        let env = Envelope::new(crate::tags::HELLO, vec![1, 2, 3]);
        env.write(&client, 0).unwrap();

        let got = Envelope::read(&server, 0).unwrap();
        assert_eq!(got.tag, crate::tags::HELLO);
        assert_eq!(got.payload, vec![1, 2, 3]);
    }

    #[test]
    fn empty_payload_round_trips() {
        let (client_stream, server_stream) = connected_pair();
        let client = spawn_mux(client_stream);
        let server = spawn_mux(server_stream);

        Envelope::new(crate::tags::DONE, Vec::new())
            .write(&client, 0)
            .unwrap();
        let got = Envelope::read(&server, 0).unwrap();
        assert_eq!(got.tag, crate::tags::DONE);
        assert!(got.payload.is_empty());
    }

    #[test]
    fn raw_write_then_read_round_trips_over_a_bare_stream() {
        let (mut client_stream, mut server_stream) = connected_pair();
        let client_thread = std::thread::spawn(move || {
            Envelope::new(crate::tags::HELLO, vec![9, 8, 7]).write_raw(&mut client_stream).unwrap();
        });
        let got = Envelope::read_raw(&mut server_stream).unwrap();
        client_thread.join().unwrap();
        assert_eq!(got.tag, crate::tags::HELLO);
        assert_eq!(got.payload, vec![9, 8, 7]);
    }
}
