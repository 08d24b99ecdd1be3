//! The multiplexer itself: channel bookkeeping, the blocking send/recv API,
//! and the receiver thread that is the sole writer of inbound buffers.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::buffer::{InboundBuf, MuxState, OutboundBuf};
use crate::compress::{FrameReader, FrameWriter};
use crate::frame::Command;
use crate::{MAX_BUFSIZE, MAX_MSS, MIN_BUFSIZE, MIN_MSS};

/// Failure modes for every mux primitive.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// The channel, or the whole mux, was aborted.
    #[error("mux channel {0} aborted")]
    Aborted(u8),
    /// Peer closed the channel before the requested bytes arrived.
    #[error("mux channel {0} closed with a short read")]
    ShortRead(u8),
    /// A malformed frame or an out-of-range field was observed.
    #[error("mux protocol violation: {0}")]
    Protocol(String),
    /// The channel number is outside the configured range.
    #[error("mux channel {0} out of range")]
    BadChannel(u8),
    /// The underlying transport failed.
    #[error("mux transport error: {0}")]
    Io(#[from] io::Error),
}

/// Construction-time parameters for a [`Mux`]. Both peers must have already
/// negotiated matching `bufsize`/`mss`/`compress` out of band before calling
/// [`Mux::spawn`].
#[derive(Debug, Clone, Copy)]
pub struct MuxOptions {
    pub channels: u8,
    pub bufsize: u32,
    pub mss: u16,
    pub compress: bool,
}

impl MuxOptions {
    /// Validates the options against the allowed bounds, returning the
    /// effective mss (doubled when compression is active).
    fn effective_mss(&self) -> Result<u16, MuxError> {
        if !(MIN_MSS..=MAX_MSS).contains(&self.mss) {
            return Err(MuxError::Protocol(format!(
                "mss {} outside [{MIN_MSS}, {MAX_MSS}]",
                self.mss
            )));
        }
        if !(MIN_BUFSIZE..=MAX_BUFSIZE).contains(&self.bufsize) {
            return Err(MuxError::Protocol(format!(
                "bufsize {} outside [{MIN_BUFSIZE}, {MAX_BUFSIZE}]",
                self.bufsize
            )));
        }
        Ok(if self.compress { self.mss * 2 } else { self.mss })
    }
}

struct Channel {
    inbound: Mutex<InboundBuf>,
    inbound_cv: Condvar,
    outbound: Mutex<OutboundBuf>,
    outbound_cv: Condvar,
    cap: u32,
}

/// A running multiplexer session. Cheap to clone (it is handed out only as
/// `Arc<Mux>`); every blocking call may be invoked concurrently from
/// different threads for different channels.
pub struct Mux {
    channels: Vec<Channel>,
    writer: Mutex<FrameWriter<Box<dyn Write + Send>>>,
    aborted: AtomicBool,
    receiver: Mutex<Option<JoinHandle<()>>>,
    shutdown_hook: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl Mux {
    /// Spawns the receiver thread and returns the shared mux handle.
    ///
    /// `reader`/`writer` are the two halves of an already-connected
    /// transport (e.g. `TcpStream::try_clone`). `shutdown_hook`, if given, is
    /// invoked exactly once by [`Mux::abort`] so the caller can tear down the
    /// underlying socket (e.g. `TcpStream::shutdown`).
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        opts: MuxOptions,
        shutdown_hook: Option<Box<dyn FnMut() + Send>>,
    ) -> Result<Arc<Mux>, MuxError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let mss = opts.effective_mss()?;
        let mut channels = Vec::with_capacity(opts.channels as usize);
        for _ in 0..opts.channels {
            let mut inbound = InboundBuf::new(opts.bufsize as usize);
            inbound.state = MuxState::Running;
            let mut outbound = OutboundBuf::new(opts.bufsize, mss);
            outbound.state = MuxState::Running;
            channels.push(Channel {
                inbound: Mutex::new(inbound),
                inbound_cv: Condvar::new(),
                outbound: Mutex::new(outbound),
                outbound_cv: Condvar::new(),
                cap: opts.bufsize,
            });
        }

        let writer: FrameWriter<Box<dyn Write + Send>> = if opts.compress {
            FrameWriter::compressed(Box::new(writer))
        } else {
            FrameWriter::plain(Box::new(writer))
        };

        let mux = Arc::new(Mux {
            channels,
            writer: Mutex::new(writer),
            aborted: AtomicBool::new(false),
            receiver: Mutex::new(None),
            shutdown_hook: Mutex::new(shutdown_hook),
        });

        let reader_for_thread = if opts.compress {
            FrameReader::compressed(reader)
        } else {
            FrameReader::plain(reader)
        };
        let mux_for_thread = Arc::clone(&mux);
        let handle = std::thread::Builder::new()
            .name("cvsync-mux-recv".into())
            .spawn(move || mux_for_thread.receive_loop(reader_for_thread))
            .expect("spawning the mux receiver thread");
        *mux.receiver.lock().expect("mux receiver slot lock") = Some(handle);

        Ok(mux)
    }

    fn channel(&self, chan: u8) -> Result<&Channel, MuxError> {
        self.channels
            .get(chan as usize)
            .ok_or(MuxError::BadChannel(chan))
    }

    fn write_command(&self, cmd: &Command) -> Result<(), MuxError> {
        let mut w = self.writer.lock().expect("mux writer lock");
        cmd.write_to(&mut *w)?;
        Ok(())
    }

    /// Sends `bytes` on `chan`, splitting into mss-sized frames and blocking
    /// until enough peer-granted window is available for each one.
    pub fn send(&self, chan: u8, bytes: &[u8]) -> Result<(), MuxError> {
        let ch = self.channel(chan)?;
        for frame in bytes.chunks(ch_mss(ch)) {
            let len = frame.len() as u32;
            {
                let mut out = ch.outbound.lock().expect("outbound lock");
                loop {
                    if out.state == MuxState::Error {
                        return Err(MuxError::Aborted(chan));
                    }
                    if out.state == MuxState::Closed {
                        return Err(MuxError::Protocol(format!(
                            "send on closed outbound channel {chan}"
                        )));
                    }
                    if out.credit >= len {
                        out.credit -= len;
                        break;
                    }
                    out = ch
                        .outbound_cv
                        .wait(out)
                        .expect("outbound condvar wait");
                }
            }
            self.write_command(&Command::Data {
                chan,
                payload: frame.to_vec(),
            })?;
        }
        Ok(())
    }

    /// Forces emission of any buffered (e.g. partially deflated) data.
    pub fn flush(&self, _chan: u8) -> Result<(), MuxError> {
        self.writer.lock().expect("mux writer lock").flush()?;
        Ok(())
    }

    /// Flushes, then signals that no further bytes will be sent on `chan`.
    pub fn close_out(&self, chan: u8) -> Result<(), MuxError> {
        self.flush(chan)?;
        self.write_command(&Command::Close { chan })?;
        let ch = self.channel(chan)?;
        ch.outbound.lock().expect("outbound lock").state = MuxState::Closed;
        Ok(())
    }

    /// Blocks until exactly `n` bytes are available on `chan`'s inbound
    /// buffer, then returns them, crediting the peer's window once the
    /// buffer has been fully drained.
    pub fn recv(&self, chan: u8, n: usize) -> Result<Vec<u8>, MuxError> {
        let ch = self.channel(chan)?;
        let (bytes, maybe_credit) = {
            let mut inb = ch.inbound.lock().expect("inbound lock");
            loop {
                if inb.data.len() >= n {
                    break;
                }
                if inb.state == MuxState::Error {
                    return Err(MuxError::Aborted(chan));
                }
                if inb.state == MuxState::Closed {
                    return Err(MuxError::ShortRead(chan));
                }
                inb = ch.inbound_cv.wait(inb).expect("inbound condvar wait");
            }
            let bytes: Vec<u8> = inb.data.drain(..n).collect();
            inb.uncredited += n as u32;
            let maybe_credit = if inb.data.is_empty() && inb.uncredited > 0 {
                Some(std::mem::take(&mut inb.uncredited))
            } else {
                None
            };
            (bytes, maybe_credit)
        };
        // The RESET write happens after the lock is dropped so no stage ever
        // blocks on the mux writer while holding a buffer lock.
        if let Some(amount) = maybe_credit {
            self.write_command(&Command::Reset { chan, amount })?;
        }
        Ok(bytes)
    }

    /// Acknowledges that the application has observed a peer `CLOSE` on
    /// `chan`. Purely bookkeeping; `recv` already fails once the inbound
    /// buffer is drained past a close.
    pub fn close_in(&self, chan: u8) -> Result<(), MuxError> {
        let ch = self.channel(chan)?;
        let inb = ch.inbound.lock().expect("inbound lock");
        if inb.state == MuxState::Error {
            return Err(MuxError::Aborted(chan));
        }
        Ok(())
    }

    /// Transitions every buffer to `Error` and wakes every blocked waiter.
    /// Safe to call from any thread, any number of times, and from multiple
    /// threads concurrently: only the first caller performs the transition.
    pub fn abort(&self) {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return;
        }
        for ch in &self.channels {
            ch.inbound.lock().expect("inbound lock").state = MuxState::Error;
            ch.inbound_cv.notify_all();
            ch.outbound.lock().expect("outbound lock").state = MuxState::Error;
            ch.outbound_cv.notify_all();
        }
        if let Some(hook) = self.shutdown_hook.lock().expect("shutdown hook lock").as_mut() {
            hook();
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn receive_loop<R: Read>(&self, mut reader: FrameReader<R>) {
        loop {
            match Command::read_from(&mut reader) {
                Ok(None) => {
                    // Clean EOF between frames: only benign if every channel
                    // already saw its close handshake.
                    let all_closed = self.channels.iter().all(|ch| {
                        ch.inbound.lock().expect("inbound lock").state.is_terminal()
                    });
                    if !all_closed {
                        self.abort();
                    }
                    return;
                }
                Ok(Some(Command::Data { chan, payload })) => {
                    let Ok(ch) = self.channel(chan) else {
                        self.abort();
                        return;
                    };
                    let mut inb = ch.inbound.lock().expect("inbound lock");
                    if inb.state != MuxState::Running {
                        drop(inb);
                        self.abort();
                        return;
                    }
                    if inb.data.len() + payload.len() > inb.bufsize {
                        drop(inb);
                        self.abort();
                        return;
                    }
                    inb.data.extend(payload);
                    drop(inb);
                    ch.inbound_cv.notify_all();
                }
                Ok(Some(Command::Reset { chan, amount })) => {
                    let Ok(ch) = self.channel(chan) else {
                        self.abort();
                        return;
                    };
                    let mut out = ch.outbound.lock().expect("outbound lock");
                    if out.state == MuxState::Error {
                        continue;
                    }
                    let Some(new_credit) = out.credit.checked_add(amount) else {
                        drop(out);
                        self.abort();
                        return;
                    };
                    if new_credit > ch.cap {
                        drop(out);
                        self.abort();
                        return;
                    }
                    out.credit = new_credit;
                    drop(out);
                    ch.outbound_cv.notify_all();
                }
                Ok(Some(Command::Close { chan })) => {
                    let Ok(ch) = self.channel(chan) else {
                        self.abort();
                        return;
                    };
                    let mut inb = ch.inbound.lock().expect("inbound lock");
                    inb.state = MuxState::Closed;
                    drop(inb);
                    ch.inbound_cv.notify_all();
                }
                Err(_) => {
                    self.abort();
                    return;
                }
            }
        }
    }
}

impl Drop for Mux {
    fn drop(&mut self) {
        self.abort();
        if let Some(handle) = self.receiver.lock().expect("mux receiver slot lock").take() {
            let _ = handle.join();
        }
    }
}

fn ch_mss(ch: &Channel) -> usize {
    ch.outbound.lock().expect("outbound lock").mss as usize
}
