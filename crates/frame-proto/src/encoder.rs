use crate::{FRAME_SEP, FRAME_START, FramingError, MAX_PAYLOAD, MAX_WIRE, hex};

/// An encoded frame: the framed wire bytes plus their length.
///
/// Stored as a fixed-size scratch buffer with no heap allocation, matching
/// the bounded-memory style the rest of the engine uses for its buffer
/// pools.
#[derive(Debug, Clone, Copy)]
pub struct EncodedFrame {
    buf: [u8; MAX_WIRE],
    len: usize,
}

impl EncodedFrame {
    /// The framed bytes ready for the transport-send hook.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

/// Stateless encoder: wraps an opaque payload in the `'@' <hex> '*' <hi> <lo>`
/// wire frame.
///
/// Holds no state between calls — encoding is a pure function of the input
/// payload, so a single `Encoder` (or none at all; the methods could be free
/// functions) is shared across every `send_cycle`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Encoder;

impl Encoder {
    /// Create an encoder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Encode `payload` into a framed buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::InvalidArg`] if `payload` is empty or longer
    /// than [`MAX_PAYLOAD`]. No partial state is left behind on failure.
    pub fn encode(&self, payload: &[u8]) -> Result<EncodedFrame, FramingError> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD {
            return Err(FramingError::InvalidArg { len: payload.len(), max: MAX_PAYLOAD });
        }

        let mut buf = [0u8; MAX_WIRE];
        let mut pos = 0;

        buf[pos] = FRAME_START;
        pos += 1;

        for &byte in payload {
            let [hi, lo] = hex::byte_to_hex(byte);
            buf[pos] = hi;
            buf[pos + 1] = lo;
            pos += 2;
        }

        buf[pos] = FRAME_SEP;
        pos += 1;

        let xor = buf[..pos].iter().fold(0u8, |acc, &b| acc ^ b);
        let [hi, lo] = hex::byte_to_hex(xor);
        buf[pos] = hi;
        buf[pos + 1] = lo;
        pos += 2;

        Ok(EncodedFrame { buf, len: pos })
    }
}
