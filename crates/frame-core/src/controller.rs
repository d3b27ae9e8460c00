//! The command/response controller: a table-driven FSM wired to the send
//! queues, the receive pool, and a transport.
//!
//! # State machine
//!
//! ```text
//! ┌──────┐  Start    ┌──────┐  SendCycle   ┌───────────┐
//! │ None │──────────>│ Idle │─────────────>│ WaitResp  │
//! └──────┘           └──────┘<─────────────└───────────┘
//!                        │    RecvResp/RecvTimeout  │
//!                        │ Error                     │ Error
//!                        ↓                           ↓
//!                     ┌───────┐   Restart   ┌────────┐
//!                     │ Error │────────────>│  Idle  │
//!                     └───────┘             └────────┘
//!                        │ Stop                  │ Stop
//!                        ↓                       ↓
//!                              ┌──────┐
//!                              │ Stop │
//!                              └──────┘
//! ```
//!
//! Only one command is ever outstanding: arbitration (`pick_next_command`)
//! picks at most one candidate per `SendCycle`, in priority order
//! retry > single-shot > periodic.

use std::sync::Arc;

use frame_proto::Encoder;
use tracing::{debug, trace, warn};

use crate::command_table::{self, CommandTable};
use crate::error::ControllerError;
use crate::fsm::{EventQueue, Fsm, Transition};
use crate::pools::{Data, PeriodicSlot, RecvPool, SingleShotQueue};

/// Controller FSM states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Before `Start` has ever been processed.
    None,
    /// No command outstanding; waiting for the next send cycle.
    Idle,
    /// A command was sent; waiting for its response or timeout.
    WaitResp,
    /// Retries exhausted or an external fault was reported.
    Error,
    /// Terminal: the controller no longer sends or times out commands.
    Stop,
}

/// Controller FSM events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    /// Begin operation: arm the periodic tick and move to `Idle`.
    Start,
    /// A send cycle tick arrived (the periodic driver).
    SendCycle,
    /// A response matching the outstanding command arrived.
    RecvResp,
    /// The outstanding command's timeout elapsed.
    RecvTimeout,
    /// An unrecoverable fault (including retry exhaustion).
    Error,
    /// Leave `Error` and resume from `Idle`.
    Restart,
    /// Leave operation entirely.
    Stop,
}

/// Which send queue a [`Command`] was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Drawn from the bounded single-shot queue.
    Single,
    /// Drawn from the latest-wins periodic slot.
    Periodic,
}

/// A fully resolved outbound command: the bare [`Data`] plus everything
/// arbitration derived for it from the [`CommandTable`].
#[derive(Debug, Clone)]
pub struct Command {
    resp_id: u8,
    payload: Data,
    timeout_ms: u16,
    retry_remaining: u16,
    kind: CommandKind,
    /// Set by the timeout action when a retry is still available; cleared
    /// on a matching response. Read by arbitration to decide whether the
    /// next send cycle must resend this exact command before considering
    /// anything else.
    pending_retry: bool,
}

impl Command {
    /// The id this command expects on its response frame.
    #[must_use]
    pub fn resp_id(&self) -> u8 {
        self.resp_id
    }

    /// The command's outbound data record.
    #[must_use]
    pub fn payload(&self) -> &Data {
        &self.payload
    }
}

/// Per-controller tunables not carried by individual commands.
#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    /// Fallback timeout for ids absent from the command table.
    pub default_timeout_ms: u16,
    /// Fallback retry budget for ids absent from the command table.
    pub default_retry: u16,
    /// Period, in milliseconds, between `SendCycle` ticks.
    pub period_ms: u16,
    /// Capacity of the single-shot send queue.
    pub single_queue_capacity: usize,
    /// Capacity of the FSM's internal event queue.
    pub event_queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 1000,
            default_retry: 4,
            period_ms: 2000,
            single_queue_capacity: 8,
            event_queue_capacity: 4,
        }
    }
}

/// A transport capable of sending an already-framed byte buffer.
///
/// Implemented by `frame-host` for real transports and by `frame-harness`
/// for deterministic simulation; `frame-core` itself never touches a
/// socket, file descriptor, or thread.
pub trait Transport: Send {
    /// Send `bytes` (an encoded wire frame) to the peer.
    ///
    /// # Errors
    ///
    /// Returns an error description if the underlying transport could not
    /// accept the bytes.
    fn send(&self, bytes: &[u8]) -> Result<(), String>;
}

/// Timer control the controller's actions drive directly.
///
/// The timeout timer is one-shot per outstanding command; the period timer
/// is reloaded every time it is (re)started and fires repeatedly.
pub trait TimerDriver: Send {
    /// (Re)start the one-shot timeout timer for `ms` milliseconds,
    /// cancelling any timer already running.
    fn start_timeout(&mut self, ms: u16);
    /// Cancel the timeout timer if running.
    fn stop_timeout(&mut self);
    /// (Re)start the periodic tick timer at `ms` milliseconds, cancelling
    /// any timer already running.
    fn start_period(&mut self, ms: u16);
    /// Cancel the periodic tick timer if running.
    fn stop_period(&mut self);
}

/// The controller's FSM context: everything an action needs to run.
pub struct ControllerCtx {
    cur_cmd: Option<Command>,
    single_queue: Arc<SingleShotQueue<Data>>,
    periodic_slot: Arc<PeriodicSlot<Data>>,
    recv_pool: Arc<RecvPool>,
    encoder: Encoder,
    transport: Box<dyn Transport>,
    timers: Box<dyn TimerDriver>,
    command_table: CommandTable,
    config: ControllerConfig,
}

impl ControllerCtx {
    /// Build a controller context around a transport and timer driver, with
    /// its own freshly allocated receive pool.
    pub fn new(
        transport: Box<dyn Transport>,
        timers: Box<dyn TimerDriver>,
        command_table: CommandTable,
        config: ControllerConfig,
    ) -> Self {
        Self::with_recv_pool(transport, timers, command_table, config, Arc::new(RecvPool::new()))
    }

    /// Build a controller context around a pre-existing receive pool.
    ///
    /// A transport's reader thread needs a handle to the receive pool
    /// before the transport itself exists (to decode inbound bytes while
    /// the connection is being set up), and before `transport` can be
    /// handed to this constructor. Building the pool first and sharing it
    /// both ways breaks that ordering dependency.
    pub fn with_recv_pool(
        transport: Box<dyn Transport>,
        timers: Box<dyn TimerDriver>,
        command_table: CommandTable,
        config: ControllerConfig,
        recv_pool: Arc<RecvPool>,
    ) -> Self {
        Self {
            cur_cmd: None,
            single_queue: Arc::new(SingleShotQueue::new(config.single_queue_capacity)),
            periodic_slot: Arc::new(PeriodicSlot::new()),
            recv_pool,
            encoder: Encoder::new(),
            transport,
            timers,
            command_table,
            config,
        }
    }

    /// A handle to the single-shot send queue, for use by other threads.
    #[must_use]
    pub fn single_queue(&self) -> Arc<SingleShotQueue<Data>> {
        Arc::clone(&self.single_queue)
    }

    /// A handle to the periodic slot, for use by other threads.
    #[must_use]
    pub fn periodic_slot(&self) -> Arc<PeriodicSlot<Data>> {
        Arc::clone(&self.periodic_slot)
    }

    /// A handle to the receive pool, for use by a transport reader thread.
    #[must_use]
    pub fn recv_pool(&self) -> Arc<RecvPool> {
        Arc::clone(&self.recv_pool)
    }

    fn resolve(&self, data: Data) -> Command {
        let entry = command_table::lookup(self.command_table, data.id());
        Command {
            resp_id: entry.map_or(data.id(), |e| e.resp_id),
            timeout_ms: entry.map_or(self.config.default_timeout_ms, |e| e.timeout_ms),
            retry_remaining: entry.map_or(self.config.default_retry, |e| e.retry),
            payload: data,
            kind: CommandKind::Single, // overwritten by the caller
            pending_retry: false,
        }
    }

    /// Arbitrate the next command to send, in priority order retry > single
    /// > periodic. Mutates `cur_cmd` and returns whether a command is now
    /// ready to be sent.
    fn pick_next_command(&mut self) -> bool {
        if matches!(&self.cur_cmd, Some(c) if c.kind == CommandKind::Single && c.pending_retry) {
            trace!("arbitration: resending outstanding single-shot command");
            return true;
        }

        if let Some(data) = self.single_queue.pop() {
            trace!(id = data.id(), "arbitration: new single-shot command");
            let mut cmd = self.resolve(data);
            cmd.kind = CommandKind::Single;
            self.cur_cmd = Some(cmd);
            return true;
        }

        if let Some(data) = self.periodic_slot.get() {
            let carry_over = matches!(&self.cur_cmd, Some(c) if c.kind == CommandKind::Periodic);
            let mut cmd = self.resolve(data);
            cmd.kind = CommandKind::Periodic;
            if carry_over {
                // Periodic retry budget is never reset cycle-to-cycle, only
                // depleted by timeouts, matching the source firmware.
                if let Some(prev) = &self.cur_cmd {
                    cmd.retry_remaining = prev.retry_remaining;
                }
            }
            trace!(id = cmd.payload.id(), carry_over, "arbitration: periodic command");
            self.cur_cmd = Some(cmd);
            return true;
        }

        trace!("arbitration: nothing to send this cycle");
        false
    }

    fn send_current(&mut self) {
        let Some(cmd) = &self.cur_cmd else { return };
        let wire = cmd.payload.to_wire();
        match self.encoder.encode(&wire) {
            Ok(frame) => {
                if let Err(err) = self.transport.send(frame.as_bytes()) {
                    warn!(%err, "transport send failed");
                }
            }
            Err(err) => warn!(%err, "failed to encode outbound command"),
        }
    }

    /// Feed a decoded wire frame in from the transport's reader side.
    ///
    /// Allocates a receive buffer (moving it `idle -> recv`) and writes the
    /// decoded [`Data`] into it. The caller is expected to then hand a
    /// [`crate::dispatch::Message::RecvData`] wake-up to the processing
    /// thread, which will `pop_recv` and triage it from inside
    /// [`Controller::handle_message`]. Returns the allocated index.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Pool`] if the payload is malformed or the
    /// receive pool is exhausted.
    pub fn accept_frame(&self, payload: &[u8]) -> Result<u8, ControllerError> {
        Ok(crate::pools::accept_frame(&self.recv_pool, payload)?)
    }

    /// Pop the oldest buffer awaiting triage from `recv` and read it.
    ///
    /// Called from [`crate::dispatch::dispatch`] on a `RecvData` wake-up.
    /// Returns the index alongside its data so the caller can then
    /// `promote_ready` or `discard` it.
    pub(crate) fn take_recv(&self) -> Option<(u8, Data)> {
        let idx = self.recv_pool.pop_recv()?;
        let data = self.recv_pool.read(idx).ok()?;
        Some((idx, data))
    }

    /// Move a triaged buffer to `ready` and immediately consume it, freeing
    /// it back to `idle`. Returns the data it held.
    pub(crate) fn accept_ready(&self, idx: u8) -> Option<Data> {
        self.recv_pool.promote_ready(idx).ok()?;
        let ready_idx = self.recv_pool.pop_ready()?;
        let data = self.recv_pool.read(ready_idx).ok();
        let _ = self.recv_pool.free(ready_idx);
        data
    }

    /// A triaged buffer did not match anything outstanding: discard it.
    pub(crate) fn reject_recv(&self, idx: u8) {
        let _ = self.recv_pool.discard(idx);
    }

    pub(crate) fn outstanding_resp_id(&self) -> Option<u8> {
        self.cur_cmd.as_ref().map(Command::resp_id)
    }
}

fn action_start(ctx: &mut ControllerCtx, events: &EventQueue<ControllerEvent>) {
    debug!("controller starting");
    ctx.cur_cmd = None;
    ctx.timers.start_period(ctx.config.period_ms);
    let _ = events.post(ControllerEvent::SendCycle);
}

fn action_send_cycle(ctx: &mut ControllerCtx, _events: &EventQueue<ControllerEvent>) {
    let sent = ctx.pick_next_command();
    if sent {
        ctx.send_current();
    }
    let timeout_ms = ctx.cur_cmd.as_ref().map_or(ctx.config.default_timeout_ms, |c| c.timeout_ms);
    ctx.timers.start_timeout(timeout_ms);
}

fn action_recv_resp(ctx: &mut ControllerCtx, _events: &EventQueue<ControllerEvent>) {
    debug!("response received");
    ctx.timers.stop_timeout();
    if let Some(cmd) = &mut ctx.cur_cmd {
        if cmd.kind == CommandKind::Single {
            // Resolved: arbitration must not retry a command that succeeded.
            ctx.cur_cmd = None;
        } else {
            cmd.pending_retry = false;
        }
    }
}

fn action_recv_timeout(ctx: &mut ControllerCtx, events: &EventQueue<ControllerEvent>) {
    ctx.timers.stop_timeout();
    let Some(cmd) = &mut ctx.cur_cmd else {
        warn!("timeout with no outstanding command");
        return;
    };
    cmd.retry_remaining = cmd.retry_remaining.saturating_sub(1);
    if cmd.retry_remaining > 0 {
        cmd.pending_retry = true;
        debug!(remaining = cmd.retry_remaining, "response timed out, will retry");
    } else {
        warn!("retry budget exhausted");
        let _ = events.post(ControllerEvent::Error);
    }
}

fn action_enter_error(ctx: &mut ControllerCtx, _events: &EventQueue<ControllerEvent>) {
    warn!("controller entering error state");
    ctx.timers.stop_timeout();
    ctx.timers.stop_period();
}

fn action_stop(ctx: &mut ControllerCtx, _events: &EventQueue<ControllerEvent>) {
    debug!("controller stopping");
    ctx.timers.stop_timeout();
    ctx.timers.stop_period();
}

static TRANSITIONS: &[Transition<ControllerState, ControllerEvent, ControllerCtx>] = &[
    Transition {
        state: ControllerState::None,
        event: ControllerEvent::Start,
        next_state: ControllerState::Idle,
        action: Some(action_start),
    },
    Transition {
        state: ControllerState::Idle,
        event: ControllerEvent::SendCycle,
        next_state: ControllerState::WaitResp,
        action: Some(action_send_cycle),
    },
    Transition {
        state: ControllerState::WaitResp,
        event: ControllerEvent::RecvResp,
        next_state: ControllerState::Idle,
        action: Some(action_recv_resp),
    },
    Transition {
        state: ControllerState::WaitResp,
        event: ControllerEvent::RecvTimeout,
        next_state: ControllerState::Idle,
        action: Some(action_recv_timeout),
    },
    Transition {
        state: ControllerState::Idle,
        event: ControllerEvent::Error,
        next_state: ControllerState::Error,
        action: Some(action_enter_error),
    },
    Transition {
        state: ControllerState::WaitResp,
        event: ControllerEvent::Error,
        next_state: ControllerState::Error,
        action: Some(action_enter_error),
    },
    Transition {
        state: ControllerState::Error,
        event: ControllerEvent::Restart,
        next_state: ControllerState::Idle,
        action: Some(action_start),
    },
    Transition {
        state: ControllerState::Idle,
        event: ControllerEvent::Stop,
        next_state: ControllerState::Stop,
        action: Some(action_stop),
    },
    Transition {
        state: ControllerState::WaitResp,
        event: ControllerEvent::Stop,
        next_state: ControllerState::Stop,
        action: Some(action_stop),
    },
    Transition {
        state: ControllerState::Error,
        event: ControllerEvent::Stop,
        next_state: ControllerState::Stop,
        action: Some(action_stop),
    },
];

/// The command/response controller.
///
/// Owns the FSM; all mutation happens through [`Controller::handle_message`]
/// and must be driven from a single thread. The send queues and receive
/// pool it hands out via [`ControllerCtx`] are themselves thread-safe, so
/// other threads may enqueue outbound commands or feed in decoded frames
/// concurrently with that processing thread.
pub struct Controller {
    fsm: Fsm<ControllerState, ControllerEvent, ControllerCtx>,
}

impl Controller {
    /// Build a controller around the given context, in state `None`.
    pub fn new(ctx: ControllerCtx) -> Self {
        let event_queue_capacity = ctx.config.event_queue_capacity;
        Self { fsm: Fsm::new(TRANSITIONS, ControllerState::None, ctx, event_queue_capacity) }
    }

    /// The controller's current FSM state.
    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.fsm.state()
    }

    /// Access the controller's context (send queues, receive pool, etc.).
    #[must_use]
    pub fn ctx(&self) -> &ControllerCtx {
        self.fsm.ctx()
    }

    /// Begin operation.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Fsm`] if the internal event queue is
    /// already full (never true for a freshly constructed controller).
    pub fn start(&mut self) -> Result<(), ControllerError> {
        self.fsm.post_event(ControllerEvent::Start)?;
        self.fsm.poll();
        Ok(())
    }

    /// Request a transition to `Stop`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Fsm`] if the internal event queue is full.
    pub fn request_stop(&mut self) -> Result<(), ControllerError> {
        self.fsm.post_event(ControllerEvent::Stop)?;
        self.fsm.poll();
        Ok(())
    }

    /// Leave `Error` and resume from `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Fsm`] if the internal event queue is full.
    pub fn restart(&mut self) -> Result<(), ControllerError> {
        self.fsm.post_event(ControllerEvent::Restart)?;
        self.fsm.poll();
        Ok(())
    }

    /// Process one dequeued [`crate::dispatch::Message`]: dispatch it to the
    /// matching FSM event, then drain the FSM to exhaustion.
    pub fn handle_message(&mut self, msg: &crate::dispatch::Message) {
        crate::dispatch::dispatch(self, msg);
        self.fsm.poll();
    }

    pub(crate) fn post_event(&self, event: ControllerEvent) {
        if self.fsm.post_event(event).is_err() {
            warn!(?event, "fsm event queue full, dropping event");
        }
    }

    pub(crate) fn ctx_mut(&mut self) -> &mut ControllerCtx {
        self.fsm.ctx_mut()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct RecordingTransport {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Transport for RecordingTransport {
        fn send(&self, bytes: &[u8]) -> Result<(), String> {
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullTimers;

    impl TimerDriver for NullTimers {
        fn start_timeout(&mut self, _ms: u16) {}
        fn stop_timeout(&mut self) {}
        fn start_period(&mut self, _ms: u16) {}
        fn stop_period(&mut self) {}
    }

    fn controller_with(sent: Arc<Mutex<Vec<Vec<u8>>>>) -> Controller {
        let ctx = ControllerCtx::new(
            Box::new(RecordingTransport { sent }),
            Box::new(NullTimers::default()),
            command_table::EMPTY,
            ControllerConfig::default(),
        );
        Controller::new(ctx)
    }

    #[test]
    fn start_arms_period_and_moves_to_idle() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller_with(sent);
        controller.start().unwrap();
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn single_shot_command_is_sent_on_next_cycle() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller_with(Arc::clone(&sent));
        controller.start().unwrap();
        controller.ctx().single_queue().push(Data::new(0x04, &[0xAA]).unwrap()).unwrap();

        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();

        assert_eq!(controller.state(), ControllerState::WaitResp);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn timeout_without_exhaustion_retries_then_recovers() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller_with(Arc::clone(&sent));
        controller.start().unwrap();
        controller.ctx().single_queue().push(Data::new(0x04, &[0xAA]).unwrap()).unwrap();
        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();

        controller.post_event(ControllerEvent::RecvTimeout);
        controller.fsm.poll();
        assert_eq!(controller.state(), ControllerState::Idle);

        // Next cycle must resend the same outstanding command, not pull a
        // new one (queue is empty, so a bug here would send nothing).
        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();
        assert_eq!(controller.state(), ControllerState::WaitResp);
        assert_eq!(sent.lock().unwrap().len(), 2);

        controller.post_event(ControllerEvent::RecvResp);
        controller.fsm.poll();
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn retry_exhaustion_enters_error_state() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ctx = ControllerCtx::new(
            Box::new(RecordingTransport { sent: Arc::clone(&sent) }),
            Box::new(NullTimers::default()),
            command_table::EMPTY,
            ControllerConfig { default_retry: 1, ..ControllerConfig::default() },
        );
        let mut controller = Controller::new(ctx);
        controller.start().unwrap();
        controller.ctx().single_queue().push(Data::new(0x04, &[0xAA]).unwrap()).unwrap();

        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();
        controller.post_event(ControllerEvent::RecvTimeout);
        controller.fsm.poll();

        assert_eq!(controller.state(), ControllerState::Error);
    }

    #[test]
    fn periodic_command_keeps_sending_every_cycle() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller_with(Arc::clone(&sent));
        controller.start().unwrap();
        controller.ctx().periodic_slot().set(Data::new(0x20, &[1]).unwrap());

        for _ in 0..3 {
            controller.post_event(ControllerEvent::SendCycle);
            controller.fsm.poll();
            controller.post_event(ControllerEvent::RecvResp);
            controller.fsm.poll();
        }

        assert_eq!(sent.lock().unwrap().len(), 3);
    }

    #[test]
    fn single_shot_takes_priority_over_periodic() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut controller = controller_with(Arc::clone(&sent));
        controller.start().unwrap();
        controller.ctx().periodic_slot().set(Data::new(0x20, &[1]).unwrap());
        controller.ctx().single_queue().push(Data::new(0x04, &[0xAA]).unwrap()).unwrap();

        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();

        let cmd = controller.ctx().cur_cmd.as_ref().unwrap();
        assert_eq!(cmd.payload.id(), 0x04);
        assert_eq!(cmd.kind, CommandKind::Single);
    }

    #[test]
    fn restart_from_error_clears_outstanding_command() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let ctx = ControllerCtx::new(
            Box::new(RecordingTransport { sent: Arc::clone(&sent) }),
            Box::new(NullTimers::default()),
            command_table::EMPTY,
            ControllerConfig { default_retry: 1, ..ControllerConfig::default() },
        );
        let mut controller = Controller::new(ctx);
        controller.start().unwrap();
        controller.ctx().single_queue().push(Data::new(0x04, &[0xAA]).unwrap()).unwrap();
        controller.post_event(ControllerEvent::SendCycle);
        controller.fsm.poll();
        controller.post_event(ControllerEvent::RecvTimeout);
        controller.fsm.poll();
        assert_eq!(controller.state(), ControllerState::Error);

        controller.restart().unwrap();
        assert_eq!(controller.state(), ControllerState::Idle);
        assert!(controller.ctx().cur_cmd.is_none());
    }
}
