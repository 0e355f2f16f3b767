//! Transport abstraction: any frame-oriented channel.
//!
//! Concrete implementations:
//! - [`StreamTransport`]: any `Read + Write` byte stream (TCP socket,
//!   Unix socket, serial port) with length-prefix framing.
//! - [`ChannelTransport`]: in-process pair over `std::sync::mpsc`, used in
//!   tests and for running client and server in one process.
//!
//! The client and server are generic over `Transport`, so adding a new
//! transport requires zero changes to the RPC logic.

use std::io::{Read, Write};
use std::sync::mpsc::{Receiver, Sender, channel};

use super::codec::{FrameDecoder, encode_frame};
use crate::error::TransportError;

/// Frame-oriented transport channel.
pub trait Transport: Send {
    /// Send one frame payload.
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Block until one frame payload arrives.
    /// Returns [`TransportError::Disconnected`] when the peer is gone.
    fn recv(&mut self) -> Result<Vec<u8>, TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Byte stream
// ───────────────────────────────────────────────────────────────

pub struct StreamTransport<S> {
    stream: S,
    decoder: FrameDecoder,
}

impl<S: Read + Write + Send> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: FrameDecoder::new(),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl<S: Read + Write + Send> Transport for StreamTransport<S> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(payload)?;
        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }
            let n = match self.stream.read(&mut buf) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.decoder.feed(&buf[..n]);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// In-process channel pair
// ───────────────────────────────────────────────────────────────

pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(payload.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    fn recv(&mut self) -> Result<Vec<u8>, TransportError> {
        self.rx.recv().map_err(|_| TransportError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// In-memory duplex: reads from `input`, writes to `output`.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stream_frames_and_unframes() {
        let mut wire = encode_frame(b"ping").unwrap();
        wire.extend(encode_frame(b"pong").unwrap());
        let mut t = StreamTransport::new(Duplex {
            input: Cursor::new(wire),
            output: Vec::new(),
        });
        assert_eq!(t.recv().unwrap(), b"ping");
        assert_eq!(t.recv().unwrap(), b"pong");
        assert_eq!(t.recv(), Err(TransportError::Disconnected));

        t.send(b"xyz").unwrap();
        assert_eq!(t.get_ref().output, encode_frame(b"xyz").unwrap());
    }

    #[test]
    fn channel_pair_is_duplex() {
        let (mut a, mut b) = ChannelTransport::pair();
        a.send(b"hi").unwrap();
        assert_eq!(b.recv().unwrap(), b"hi");
        b.send(b"yo").unwrap();
        assert_eq!(a.recv().unwrap(), b"yo");
        drop(b);
        assert_eq!(a.recv(), Err(TransportError::Disconnected));
    }
}
