use thiserror::Error;

/// Errors returned by [`crate::Encoder`].
///
/// Decode-side protocol errors (checksum mismatch, odd-length hex, resync)
/// are deliberately *not* represented here: per the decoder's contract they
/// are swallowed internally and never surfaced to the caller (the frame is
/// silently dropped and the callback is not invoked).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Payload was empty or exceeded [`crate::MAX_PAYLOAD`].
    #[error("invalid payload length {len} (must be 1..={max})")]
    InvalidArg {
        /// Length the caller supplied.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
}
