//! Deterministic, virtual-time simulation harness for `frame-core`'s
//! command/response controller.
//!
//! Where `frame-host` drives a [`frame_core::Controller`] with real OS
//! timers, a real socket, and a background message queue, this crate drives
//! the exact same controller with a [`SimClock`] the test advances
//! explicitly and a [`SimTransport`] that records frames instead of writing
//! them anywhere. Nothing here spawns a thread or sleeps; every scenario in
//! this crate's test suite runs to completion instantly regardless of the
//! millisecond values it simulates.

pub mod sim_driver;
pub mod sim_timer;
pub mod sim_transport;

pub use sim_driver::SimDriver;
pub use sim_timer::{SimClock, SimTimerDriver};
pub use sim_transport::SimTransport;
