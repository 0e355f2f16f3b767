//! Fuzz target: RPC envelope decoding
//!
//! Arbitrary payloads must decode to an error or to an envelope of the
//! current protocol version, and `peek_header` must agree with the full
//! decode on `(version, seq)`.
//!
//! cargo fuzz run fuzz_envelope

#![no_main]

use libfuzzer_sys::fuzz_target;
use ventcore::rpc::protocol::{PROTOCOL_VERSION, Request, Response, decode, peek_header};

fuzz_target!(|data: &[u8]| {
    if let Ok(env) = decode::<Request>(data) {
        assert_eq!(env.version, PROTOCOL_VERSION);
        assert_eq!(peek_header(data).ok(), Some((env.version, env.seq)));
    }
    if let Ok(env) = decode::<Response>(data) {
        assert_eq!(env.version, PROTOCOL_VERSION);
    }
});
