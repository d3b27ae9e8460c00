//! Buffer pools, a generic table-driven FSM engine, and the concrete
//! command/response controller built on top of them.
//!
//! This crate is sans-IO: nothing here blocks on a socket, spawns a thread,
//! or reads a clock. [`controller::Transport`] and [`controller::TimerDriver`]
//! are the seams a host crate plugs real I/O into.

pub mod command_table;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod fsm;
pub mod pools;

pub use command_table::{CommandTable, CommandTableEntry};
pub use controller::{Controller, ControllerConfig, ControllerCtx, ControllerEvent, ControllerState};
pub use dispatch::Message;
pub use error::{ControllerError, FsmError, PoolError};
pub use fsm::{EventQueue, Fsm, Transition};
pub use pools::{accept_frame, Data, PeriodicSlot, RecvPool, SingleShotQueue, NONE_INDEX};
