//! Fuzz target asserting `decode(encode(p)) == p` for every payload length
//! the encoder accepts, and that out-of-range lengths are always rejected
//! rather than mis-encoded.

#![no_main]

use frame_proto::{Encoder, Decoder, MAX_PAYLOAD};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, Mutex};

fuzz_target!(|payload: Vec<u8>| {
    let enc = Encoder::new();
    let result = enc.encode(&payload);

    if payload.is_empty() || payload.len() > MAX_PAYLOAD {
        assert!(result.is_err());
        return;
    }

    let frame = result.expect("in-range payload must encode");

    let received: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut decoder = Decoder::new();
    decoder.set_callback(move |bytes: &[u8]| {
        sink.lock().expect("fuzz target is single-threaded").push(bytes.to_vec());
    });
    decoder.feed(frame.as_bytes());

    let got = received.lock().expect("fuzz target is single-threaded");
    assert_eq!(got.as_slice(), &[payload]);
});
