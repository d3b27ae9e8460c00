//! A small, generic table-driven finite state machine engine.
//!
//! A [`Fsm`] is built from an immutable transition table, a current state,
//! and an application-owned context. Events are posted to a bounded
//! [`EventQueue`] and drained by [`Fsm::poll`], which processes every event
//! present at the time of the call *and* any additional events an action
//! posts while that drain is in progress — an action that calls
//! [`EventQueue::post`] on the handle it is given does not have to wait for
//! the next external `poll()` to see its own event handled.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::FsmError;

/// A single entry in a [`Fsm`]'s transition table.
///
/// When the FSM is in `state` and `event` is processed, `action` (if any)
/// runs first, then the FSM's state becomes `next_state`. The table is
/// scanned in order and the first matching entry wins.
pub struct Transition<S, E, Ctx> {
    /// The state this entry applies to.
    pub state: S,
    /// The event this entry applies to.
    pub event: E,
    /// The state to move to once the action has run.
    pub next_state: S,
    /// Optional action to run before the state update. Receives the
    /// context and a handle to post further events into the same FSM.
    pub action: Option<fn(&mut Ctx, &EventQueue<E>)>,
}

/// A bounded FIFO of pending FSM events.
///
/// Kept separate from `Ctx` so that an action — which borrows `&mut Ctx` —
/// can still post new events without the two borrows aliasing.
pub struct EventQueue<E> {
    inner: Mutex<VecDeque<E>>,
    capacity: usize,
}

impl<E> EventQueue<E> {
    /// Create an empty queue with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(VecDeque::with_capacity(capacity)), capacity }
    }

    /// Post an event for the next [`Fsm::poll`] to process.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::EventQueueFull`] if the queue is already at
    /// capacity; the event is dropped.
    pub fn post(&self, event: E) -> Result<(), FsmError> {
        let mut inner = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if inner.len() >= self.capacity {
            return Err(FsmError::EventQueueFull { capacity: self.capacity });
        }
        inner.push_back(event);
        Ok(())
    }

    fn drain_one(&self) -> Option<E> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).pop_front()
    }

    /// Number of events currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A table-driven finite state machine.
///
/// `S` and `E` are small `Copy` enums for states and events; `Ctx` is
/// application-owned state threaded through every action. The transition
/// table is `&'static` so it lives as read-only program data, never
/// synthesized or mutated at runtime.
pub struct Fsm<S, E, Ctx> {
    transitions: &'static [Transition<S, E, Ctx>],
    state: S,
    ctx: Ctx,
    events: EventQueue<E>,
}

impl<S, E, Ctx> Fsm<S, E, Ctx>
where
    S: Copy + PartialEq,
    E: Copy + PartialEq,
{
    /// Build an FSM from a static transition table, an initial state, a
    /// context, and the event queue's fixed capacity.
    pub fn new(transitions: &'static [Transition<S, E, Ctx>], initial_state: S, ctx: Ctx, event_capacity: usize) -> Self {
        Self { transitions, state: initial_state, ctx, events: EventQueue::new(event_capacity) }
    }

    /// The FSM's current state.
    pub fn state(&self) -> S {
        self.state
    }

    /// Shared access to the context.
    pub fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    /// Exclusive access to the context.
    pub fn ctx_mut(&mut self) -> &mut Ctx {
        &mut self.ctx
    }

    /// Post an event for the next [`Fsm::poll`] to process.
    ///
    /// # Errors
    ///
    /// Returns [`FsmError::EventQueueFull`] if the queue is already at
    /// capacity.
    pub fn post_event(&self, event: E) -> Result<(), FsmError> {
        self.events.post(event)
    }

    /// Drain and process every pending event, including events posted by
    /// actions while this call is in progress.
    ///
    /// Returns the number of transitions taken.
    pub fn poll(&mut self) -> usize {
        let mut taken = 0;
        while let Some(event) = self.events.drain_one() {
            if self.dispatch(event) {
                taken += 1;
            }
        }
        taken
    }

    /// Find and execute the first transition matching the current state and
    /// `event`. Returns whether a transition was found.
    fn dispatch(&mut self, event: E) -> bool {
        let Some(index) = self.transitions.iter().position(|t| t.state == self.state && t.event == event) else {
            return false;
        };
        let transition = &self.transitions[index];
        if let Some(action) = transition.action {
            action(&mut self.ctx, &self.events);
        }
        self.state = transition.next_state;
        true
    }
}
