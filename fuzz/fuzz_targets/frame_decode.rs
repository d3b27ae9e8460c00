//! Fuzz target for the streaming frame [`Decoder`].
//!
//! Feeds arbitrary byte runs, including deliberately malformed frames, at
//! the byte-at-a-time state machine. The decoder must never panic: garbage
//! bytes, stray `'@'`/`'*'` markers, and checksum mismatches are all
//! supposed to be absorbed by resync/reset, not crash the process.

#![no_main]

use frame_proto::Decoder;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::new();
    decoder.set_callback(|_payload: &[u8]| {});
    decoder.feed(data);
});
