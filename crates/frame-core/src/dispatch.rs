//! Message dispatch: the small set of inputs the processing thread feeds
//! into a [`crate::controller::Controller`], and how each maps to an FSM
//! event.
//!
//! `frame-host` owns the real blocking receive loop (a channel, a socket
//! reader thread, a timer thread) and turns whatever it observes into one
//! of these `Message` variants before calling
//! [`crate::controller::Controller::handle_message`]. `frame-core` itself
//! never blocks or touches a clock.

use crate::controller::{Controller, ControllerEvent, ControllerState};

/// One unit of work for the controller's processing thread.
#[derive(Debug, Clone, Copy)]
pub enum Message {
    /// Begin operation.
    Start,
    /// The periodic send-cycle tick fired.
    Tick,
    /// A decoded frame is sitting in the receive pool's `recv` queue,
    /// awaiting triage.
    RecvData,
    /// The outstanding command's timeout fired.
    Timeout,
    /// Leave `Error` and resume from `Idle`.
    Restart,
    /// Leave operation entirely.
    Stop,
}

/// Route a [`Message`] to the controller's FSM.
///
/// `RecvData` is the one case requiring triage rather than a 1:1 event
/// mapping, in the order the receive-matching rules specify: first, the
/// controller must actually be `WaitResp` (not timed out into `Idle`
/// already, not `Error`) — a reply arriving while nothing is outstanding is
/// dropped regardless of its id. Only then is the popped
/// [`crate::pools::Data`]'s id compared against the outstanding command's
/// expected response id; a mismatch (a stale reply for a command already
/// retried past, for instance) is dropped the same way.
pub fn dispatch(controller: &mut Controller, msg: &Message) {
    match msg {
        Message::Start => controller.post_event(ControllerEvent::Start),
        Message::Tick => controller.post_event(ControllerEvent::SendCycle),
        Message::Timeout => controller.post_event(ControllerEvent::RecvTimeout),
        Message::Restart => controller.post_event(ControllerEvent::Restart),
        Message::Stop => controller.post_event(ControllerEvent::Stop),
        Message::RecvData => {
            let waiting = controller.state() == ControllerState::WaitResp;
            let ctx = controller.ctx_mut();
            let Some((idx, data)) = ctx.take_recv() else {
                return;
            };
            if !waiting {
                tracing::trace!(id = data.id(), "dropping response received outside WaitResp");
                ctx.reject_recv(idx);
                return;
            }
            match ctx.outstanding_resp_id() {
                Some(expected) if expected == data.id() => {
                    ctx.accept_ready(idx);
                    controller.post_event(ControllerEvent::RecvResp);
                }
                Some(_) | None => {
                    tracing::trace!(id = data.id(), "dropping unmatched response");
                    ctx.reject_recv(idx);
                }
            }
        }
    }
}
