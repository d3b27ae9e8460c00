//! A virtual-time [`TimerDriver`] paired with a [`SimClock`] the test
//! advances explicitly, instead of `frame-host`'s real background thread.
//!
//! Mirrors `frame-host::timer`'s deadline bookkeeping (a one-shot timeout
//! deadline, a reloading period deadline) but with no thread and no real
//! clock: [`SimClock::advance`] is the only thing that ever moves time
//! forward, so a test controls exactly which `Tick`/`Timeout` messages fire
//! and in what order.

use std::sync::{Arc, Mutex};

use frame_core::Message;
use frame_core::controller::TimerDriver;

#[derive(Default)]
struct TimerState {
    now_ms: u64,
    timeout_deadline: Option<u64>,
    period_deadline: Option<u64>,
    period_interval: Option<u64>,
}

/// The virtual clock backing a [`SimTimerDriver`].
///
/// Cloning a `SimClock` (or a `SimTimerDriver` built from it) shares the
/// same underlying time; there is exactly one clock per simulated
/// controller instance.
#[derive(Clone, Default)]
pub struct SimClock {
    state: Arc<Mutex<TimerState>>,
}

impl SimClock {
    /// Create a fresh clock at virtual time zero, with no timers armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the [`TimerDriver`] a [`frame_core::ControllerCtx`] should use,
    /// sharing this clock's virtual time.
    #[must_use]
    pub fn driver(&self) -> SimTimerDriver {
        SimTimerDriver { state: Arc::clone(&self.state) }
    }

    /// The current virtual time, in milliseconds since the clock was
    /// created.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).now_ms
    }

    /// Advance virtual time by `ms` and return every `Tick`/`Timeout`
    /// message that became due, in the order their deadlines elapsed
    /// (ties broken timeout-before-tick, matching `frame-host`'s timer
    /// thread).
    ///
    /// A period deadline that falls more than one interval behind after a
    /// large jump reschedules repeatedly, firing once per elapsed interval,
    /// exactly as `frame-host`'s real timer thread would across repeated
    /// wakeups.
    pub fn advance(&self, ms: u64) -> Vec<Message> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.now_ms += ms;
        let mut fired = Vec::new();

        if state.timeout_deadline.is_some_and(|d| state.now_ms >= d) {
            state.timeout_deadline = None;
            fired.push(Message::Timeout);
        }

        while let (Some(deadline), Some(interval)) = (state.period_deadline, state.period_interval) {
            if state.now_ms < deadline {
                break;
            }
            state.period_deadline = Some(deadline + interval);
            fired.push(Message::Tick);
        }

        fired
    }
}

/// The [`TimerDriver`] implementation a [`frame_core::ControllerCtx`] built
/// over a [`SimClock`] uses.
pub struct SimTimerDriver {
    state: Arc<Mutex<TimerState>>,
}

impl TimerDriver for SimTimerDriver {
    fn start_timeout(&mut self, ms: u16) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = state.now_ms;
        state.timeout_deadline = Some(now + u64::from(ms));
    }

    fn stop_timeout(&mut self) {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).timeout_deadline = None;
    }

    fn start_period(&mut self, ms: u16) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = state.now_ms;
        state.period_interval = Some(u64::from(ms));
        state.period_deadline = Some(now + u64::from(ms));
    }

    fn stop_period(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        state.period_interval = None;
        state.period_deadline = None;
    }
}
