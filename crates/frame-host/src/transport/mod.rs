//! Concrete [`frame_core::controller::Transport`] implementations.

mod tcp;

pub use tcp::{ReaderShutdown, TcpTransport};
