//! OS-backed transport, timers, and message loop driving `frame-core`'s
//! command/response controller.
//!
//! `frame-core` is sans-IO: it never touches a socket, a thread, or a real
//! clock. This crate supplies the concrete implementations of its
//! [`frame_core::controller::Transport`] and [`frame_core::controller::TimerDriver`]
//! traits (a TCP connection with a background reader thread, and a
//! dedicated timer thread) and a bounded message queue both feed, then
//! drives the controller's processing loop against them.

pub mod config;
pub mod driver;
pub mod error;
pub mod message_queue;
pub mod timer;
pub mod transport;

pub use config::HostConfig;
pub use driver::Driver;
pub use error::HostError;
