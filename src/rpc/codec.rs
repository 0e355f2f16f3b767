//! Length-prefix frame codec.
//!
//! Wire format:
//! ```text
//! ┌────────────┬──────────────────────────┐
//! │ Length (4B)│ postcard payload (N B)   │
//! │ LE u32     │                          │
//! └────────────┴──────────────────────────┘
//! ```
//!
//! The decoder accumulates incoming bytes and yields complete frames.
//! This handles partial reads gracefully: a single stream read may
//! return part of the header, part of the payload, or several frames
//! concatenated.

use crate::error::TransportError;

/// Maximum frame payload size (protects against memory exhaustion).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frame header size (4-byte little-endian length).
const HEADER_SIZE: usize = 4;

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    /// Waiting for header bytes.
    ReadingHeader,
    /// Header received, reading payload.
    ReadingPayload { expected: usize },
}

/// Streaming frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buf: Vec<u8>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::ReadingHeader,
            buf: Vec::new(),
        }
    }

    /// Append received bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Pop the next complete frame payload, if one is buffered.
    ///
    /// An oversized or zero-length header is a protocol error; the decoder
    /// resets and drops everything buffered.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.state {
                DecoderState::ReadingHeader => {
                    if self.buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }
                    let mut header = [0u8; HEADER_SIZE];
                    header.copy_from_slice(&self.buf[..HEADER_SIZE]);
                    let len = u32::from_le_bytes(header);
                    let expected = len as usize;
                    if expected == 0 || expected > MAX_FRAME_SIZE {
                        self.reset();
                        return Err(TransportError::FrameTooLarge(len));
                    }
                    self.buf.drain(..HEADER_SIZE);
                    self.state = DecoderState::ReadingPayload { expected };
                }

                DecoderState::ReadingPayload { expected } => {
                    if self.buf.len() < expected {
                        return Ok(None);
                    }
                    let frame: Vec<u8> = self.buf.drain(..expected).collect();
                    self.state = DecoderState::ReadingHeader;
                    return Ok(Some(frame));
                }
            }
        }
    }

    /// Reset decoder state (e.g. after a transport reconnect).
    pub fn reset(&mut self) {
        self.state = DecoderState::ReadingHeader;
        self.buf.clear();
    }
}

/// Encode a payload into a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.is_empty() || payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge(payload.len() as u32));
    }
    let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}
