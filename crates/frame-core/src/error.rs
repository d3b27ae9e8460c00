//! Error types for buffer pools, the FSM engine, and the command controller.

use thiserror::Error;

/// Errors raised by the bounded buffer pools.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// A data record's payload exceeded `frame_proto::MAX_DATA`.
    #[error("data payload length {len} exceeds capacity {max}")]
    PayloadTooLarge {
        /// Length the caller supplied.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    /// The single-shot send queue was at capacity.
    #[error("single-shot queue full (capacity {capacity})")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// No free index was available in a fixed-capacity index pool.
    #[error("index pool exhausted (capacity {capacity})")]
    PoolExhausted {
        /// Configured pool capacity.
        capacity: usize,
    },

    /// An index was used that is out of range or not currently owned by the
    /// caller (double free, use of a never-allocated slot).
    #[error("invalid pool index {index}")]
    InvalidIndex {
        /// The offending index.
        index: u8,
    },

    /// A decoded wire frame carried no bytes at all, so no id byte could be
    /// extracted.
    #[error("decoded frame carried no id byte")]
    EmptyFrame,

    /// A decoded wire frame carried an id byte but no payload bytes beyond
    /// it (`len <= 1`), which the receive path never accepts.
    #[error("decoded frame length {len} is too short (need > 1)")]
    PayloadTooShort {
        /// Length the caller supplied, including the id byte.
        len: usize,
    },

    /// The receive pool had no idle buffer available to hold a newly
    /// decoded frame.
    #[error("receive pool exhausted")]
    RecvPoolExhausted,
}

/// Errors raised by the generic FSM engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmError {
    /// The bounded event queue was at capacity when `post_event` was called.
    #[error("event queue full (capacity {capacity})")]
    EventQueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },
}

/// Errors raised by the command controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// A buffer pool operation failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// An FSM event could not be posted.
    #[error("fsm error: {0}")]
    Fsm(#[from] FsmError),

    /// The transport's send hook returned an error.
    #[error("transport send failed: {0}")]
    Transport(String),
}
