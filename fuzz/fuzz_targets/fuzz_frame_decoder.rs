//! Fuzz target: `FrameDecoder::feed` / `next_frame`
//!
//! Splits arbitrary bytes at a fuzzer-chosen point and feeds both halves
//! into the streaming decoder.  It must never panic, never yield an empty
//! or oversized payload, and must accept a clean frame after `reset`.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use ventcore::rpc::codec::{FrameDecoder, MAX_FRAME_SIZE, encode_frame};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    let split = data.first().map_or(0, |b| usize::from(*b) % (data.len() + 1));
    let (head, tail) = data.split_at(split);

    for chunk in [head, tail] {
        decoder.feed(chunk);
        while let Ok(Some(payload)) = decoder.next_frame() {
            assert!(!payload.is_empty(), "decoder yielded an empty payload");
            assert!(payload.len() <= MAX_FRAME_SIZE, "payload exceeds MAX_FRAME_SIZE");
        }
    }

    decoder.reset();
    let Ok(frame) = encode_frame(b"ok") else {
        return;
    };
    decoder.feed(&frame);
    assert_eq!(decoder.next_frame().ok().flatten().as_deref(), Some(&b"ok"[..]));
});
