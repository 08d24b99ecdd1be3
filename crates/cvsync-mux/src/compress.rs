//! Optional zlib compression of the whole per-direction frame stream.
//!
//! When negotiated, compression wraps the entire outbound or inbound byte
//! stream in one continuous deflate stream; frame boundaries do not line up
//! with deflate block boundaries. We model this by wrapping the
//! raw socket reader/writer in a [`flate2`] stream adaptor *before* any
//! [`crate::frame::Command`] is encoded or decoded.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// Either a raw writer or one deflating everything written to it.
pub(crate) enum FrameWriter<W: Write> {
    Plain(W),
    Compressed(DeflateEncoder<W>),
}

impl<W: Write> FrameWriter<W> {
    pub fn plain(inner: W) -> Self {
        FrameWriter::Plain(inner)
    }

    pub fn compressed(inner: W) -> Self {
        FrameWriter::Compressed(DeflateEncoder::new(inner, Compression::default()))
    }
}

impl<W: Write> Write for FrameWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FrameWriter::Plain(w) => w.write(buf),
            FrameWriter::Compressed(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FrameWriter::Plain(w) => w.flush(),
            FrameWriter::Compressed(w) => w.flush(),
        }
    }
}

/// Either a raw reader or one inflating everything read from it.
pub(crate) enum FrameReader<R: Read> {
    Plain(R),
    Compressed(DeflateDecoder<R>),
}

impl<R: Read> FrameReader<R> {
    pub fn plain(inner: R) -> Self {
        FrameReader::Plain(inner)
    }

    pub fn compressed(inner: R) -> Self {
        FrameReader::Compressed(DeflateDecoder::new(inner))
    }
}

impl<R: Read> Read for FrameReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            FrameReader::Plain(r) => r.read(buf),
            FrameReader::Compressed(r) => r.read(buf),
        }
    }
}
