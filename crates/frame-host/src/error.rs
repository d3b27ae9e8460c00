//! Error types for the OS-backed host.

use thiserror::Error;

/// Errors raised by `frame-host`'s transport, timer, and driver code.
#[derive(Error, Debug)]
pub enum HostError {
    /// A controller-level error (pool exhaustion, malformed frame, etc.).
    #[error("controller error: {0}")]
    Controller(#[from] frame_core::ControllerError),

    /// The underlying socket or stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The framing encoder/decoder rejected something.
    #[error("framing error: {0}")]
    Framing(#[from] frame_proto::FramingError),

    /// The message queue's receiving end was dropped.
    #[error("message queue disconnected")]
    QueueDisconnected,
}
