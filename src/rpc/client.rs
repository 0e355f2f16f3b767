//! Request/response client over any [`Transport`].

use log::warn;

use super::protocol::{Envelope, Request, Response, decode, encode};
use super::transport::Transport;
use crate::error::TransportError;

pub struct RpcClient<T> {
    transport: T,
    next_seq: u32,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            next_seq: 1,
        }
    }

    /// Send one request and block for its response.
    ///
    /// The response must carry this client's protocol version and echo the
    /// request's sequence number.
    pub fn call(&mut self, request: Request) -> Result<Response, TransportError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);

        let bytes = encode(&Envelope::new(seq, request))?;
        self.transport.send(&bytes)?;

        let reply = self.transport.recv()?;
        let envelope: Envelope<Response> = decode(&reply)?;
        if envelope.seq != seq {
            warn!("rpc: response seq {} for request {}", envelope.seq, seq);
            return Err(TransportError::SequenceMismatch {
                expected: seq,
                actual: envelope.seq,
            });
        }
        Ok(envelope.body)
    }
}
