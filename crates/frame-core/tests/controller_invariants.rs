//! Integration tests for the command/response controller.
//!
//! These exercise `frame-core` entirely through its public API (no access
//! to `controller`'s private fields), driving the FSM with a fake
//! `Transport`/`TimerDriver` pair the way `frame-host` would with real ones.

use std::sync::{Arc, Mutex};

use frame_core::controller::{ControllerConfig, ControllerCtx, ControllerState, Transport, TimerDriver};
use frame_core::dispatch::Message;
use frame_core::{command_table, Controller, Data};

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

fn controller_with_table(sent: Arc<Mutex<Vec<Vec<u8>>>>, config: ControllerConfig) -> Controller {
    let ctx = ControllerCtx::new(
        Box::new(RecordingTransport { sent }),
        Box::new(NullTimers),
        command_table::DEFAULT,
        config,
    );
    Controller::new(ctx)
}

/// INVARIANT: at most one command is ever outstanding, and it is always the
/// command whose `resp_id` the controller is currently waiting on.
#[test]
fn at_most_one_outstanding_request() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut controller = controller_with_table(Arc::clone(&sent), ControllerConfig::default());
    controller.handle_message(&Message::Start);

    controller.ctx().single_queue().push(Data::new(0x04, &[1]).unwrap()).unwrap();
    controller.ctx().single_queue().push(Data::new(0x08, &[2]).unwrap()).unwrap();
    controller.handle_message(&Message::Tick);

    // Only the first queued command was sent; the second waits in the queue.
    assert_eq!(sent.lock().unwrap().len(), 1);
    assert_eq!(controller.state(), ControllerState::WaitResp);
}

/// INVARIANT: a reply matching the outstanding command's `resp_id` clears
/// the wait, even when the command table resolved a distinct resp id from
/// the send id.
#[test]
fn response_id_is_resolved_through_the_command_table() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut controller = controller_with_table(Arc::clone(&sent), ControllerConfig::default());
    controller.handle_message(&Message::Start);
    controller.ctx().single_queue().push(Data::new(0x04, &[1]).unwrap()).unwrap();
    controller.handle_message(&Message::Tick);

    // 0x04's table entry expects resp_id 0x05, not 0x04.
    controller.ctx().accept_frame(&[0x05, 0xAA]).unwrap();
    controller.handle_message(&Message::RecvData);

    assert_eq!(controller.state(), ControllerState::Idle);
}

/// INVARIANT: retries are monotonically decreasing and the controller
/// enters `Error` exactly when the budget reaches zero, never before.
#[test]
fn retry_budget_is_monotonic_and_exhausts_exactly_once() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let config = ControllerConfig { default_retry: 3, ..ControllerConfig::default() };
    let mut controller = controller_with_table(Arc::clone(&sent), config);
    controller.handle_message(&Message::Start);
    // 0xEE has no table entry, so it falls back to the configured default.
    controller.ctx().single_queue().push(Data::new(0xEE, &[1]).unwrap()).unwrap();
    controller.handle_message(&Message::Tick);

    for _ in 0..2 {
        controller.handle_message(&Message::Timeout);
        assert_eq!(controller.state(), ControllerState::Idle, "must recover while retries remain");
        controller.handle_message(&Message::Tick);
        assert_eq!(controller.state(), ControllerState::WaitResp);
    }

    controller.handle_message(&Message::Timeout);
    assert_eq!(controller.state(), ControllerState::Error, "must enter Error on the final timeout");
    assert_eq!(sent.lock().unwrap().len(), 3, "every retry attempt must actually resend");
}

/// INVARIANT: a reply whose id does not match the outstanding command's
/// `resp_id` is dropped silently; the controller keeps waiting.
#[test]
fn late_or_unmatched_reply_is_ignored() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut controller = controller_with_table(Arc::clone(&sent), ControllerConfig::default());
    controller.handle_message(&Message::Start);
    controller.ctx().single_queue().push(Data::new(0x04, &[1]).unwrap()).unwrap();
    controller.handle_message(&Message::Tick);

    controller.ctx().accept_frame(&[0x99, 0x00]).unwrap();
    controller.handle_message(&Message::RecvData);

    assert_eq!(controller.state(), ControllerState::WaitResp);
}

/// INVARIANT: the receive pool's buffers are fully conserved across many
/// accept/triage cycles: capacity never shrinks, exhaustion is transient.
#[test]
fn recv_pool_buffers_are_conserved_across_many_cycles() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut controller = controller_with_table(sent, ControllerConfig::default());
    controller.handle_message(&Message::Start);

    for _ in 0..50 {
        controller.ctx().single_queue().push(Data::new(0x04, &[1]).unwrap()).unwrap();
        controller.handle_message(&Message::Tick);
        controller.ctx().accept_frame(&[0x05, 0xAA]).unwrap();
        controller.handle_message(&Message::RecvData);
        assert_eq!(controller.state(), ControllerState::Idle);
    }
}

/// INVARIANT: `Stop` halts the controller from any reachable state and is
/// terminal (no further sends happen).
#[test]
fn stop_is_terminal_from_wait_resp() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let mut controller = controller_with_table(Arc::clone(&sent), ControllerConfig::default());
    controller.handle_message(&Message::Start);
    controller.ctx().single_queue().push(Data::new(0x04, &[1]).unwrap()).unwrap();
    controller.handle_message(&Message::Tick);
    assert_eq!(controller.state(), ControllerState::WaitResp);

    controller.request_stop().unwrap();
    assert_eq!(controller.state(), ControllerState::Stop);

    let sent_before = sent.lock().unwrap().len();
    controller.handle_message(&Message::Tick);
    assert_eq!(sent.lock().unwrap().len(), sent_before, "a stopped controller must not send");
    assert_eq!(controller.state(), ControllerState::Stop);
}
