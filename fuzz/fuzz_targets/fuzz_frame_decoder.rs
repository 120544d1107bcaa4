//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder, in
//! one piece and split at a fuzzer-chosen point, and checks that every
//! frame it yields is in bounds.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use dispenser::link::codec::{FrameDecoder, MAX_FRAME_SIZE};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();
    if let Some(frame) = decoder.feed(data) {
        assert!(frame.payload.len() < MAX_FRAME_SIZE, "payload exceeds frame body");
    }

    decoder.reset();
    let split = data.first().map_or(0, |&b| usize::from(b)).min(data.len());
    let (head, tail) = data.split_at(split);
    let _ = decoder.feed(head);
    if let Some(frame) = decoder.feed(tail) {
        assert!(frame.payload.len() < MAX_FRAME_SIZE, "payload exceeds frame body");
    }
});
