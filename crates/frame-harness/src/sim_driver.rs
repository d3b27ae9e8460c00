//! Ties a [`Controller`] to a [`SimClock`] and a [`SimTransport`] so a test
//! can drive the full send/timeout/retry/receive cycle by advancing virtual
//! time and feeding in decoded payloads, with no threads and no real clock.

use frame_core::controller::{ControllerConfig, ControllerCtx};
use frame_core::{CommandTable, Controller, ControllerError, ControllerState, Data, PoolError};

use crate::sim_timer::SimClock;
use crate::sim_transport::SimTransport;

/// A fully wired, deterministically steppable controller.
pub struct SimDriver {
    controller: Controller,
    clock: SimClock,
    transport: SimTransport,
}

impl SimDriver {
    /// Build a controller, in state `None`, against a fresh virtual clock
    /// and an in-memory transport.
    ///
    /// Left unstarted deliberately: a test typically wants to queue its
    /// initial single-shot/periodic commands before the first `SendCycle`
    /// fires (via [`SimDriver::start`]), since `start` itself triggers one
    /// immediately.
    pub fn new(command_table: CommandTable, config: ControllerConfig) -> Self {
        let clock = SimClock::new();
        let transport = SimTransport::new();
        let ctx =
            ControllerCtx::new(Box::new(transport.clone()), Box::new(clock.driver()), command_table, config);
        Self { controller: Controller::new(ctx), clock, transport }
    }

    /// Begin operation: arms the periodic timer and runs the first
    /// `SendCycle` immediately, exactly as a real `Driver::connect` would.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Fsm`] if the internal event queue is
    /// already full (never true for a freshly constructed controller).
    pub fn start(&mut self) -> Result<(), ControllerError> {
        self.controller.start()
    }

    /// Advance virtual time by `ms`, dispatching every `Tick`/`Timeout`
    /// message that becomes due (in the order their deadlines elapsed) and
    /// draining the FSM after each one, exactly as `frame-host`'s
    /// processing loop would as messages arrive one at a time.
    pub fn advance(&mut self, ms: u64) {
        for msg in self.clock.advance(ms) {
            self.controller.handle_message(&msg);
        }
    }

    /// Enqueue a single-shot command.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::QueueFull`] if the single-shot queue is already
    /// at capacity.
    pub fn send_single(&self, data: Data) -> Result<(), PoolError> {
        self.controller.ctx().single_queue().push(data)
    }

    /// Replace the periodic command slot (latest-wins).
    pub fn send_periodic(&self, data: Data) {
        self.controller.ctx().periodic_slot().set(data);
    }

    /// Simulate a decoded reply arriving from the transport: stage it in
    /// the receive pool and let the controller triage it.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Pool`] if `payload` carries no id byte or
    /// the receive pool is exhausted.
    pub fn deliver_reply(&mut self, payload: &[u8]) -> Result<(), ControllerError> {
        self.controller.ctx().accept_frame(payload)?;
        self.controller.handle_message(&frame_core::Message::RecvData);
        Ok(())
    }

    /// Every frame sent to the simulated transport so far, oldest first.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.transport.sent_frames()
    }

    /// The controller's current FSM state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Issue a `Restart` (leave `Error`, resume from `Idle`).
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Fsm`] if the internal event queue is full.
    pub fn restart(&mut self) -> Result<(), ControllerError> {
        self.controller.restart()
    }

    /// The virtual clock driving this simulation, for tests that want to
    /// assert on elapsed time directly.
    #[must_use]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }
}
