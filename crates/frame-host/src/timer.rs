//! A background timer thread implementing [`frame_core::controller::TimerDriver`].
//!
//! OS timer callbacks post messages rather than mutate controller state
//! directly, so each [`TimerDriver`] method here just updates a shared
//! deadline and wakes the timer thread; the thread itself posts
//! `Tick`/`Timeout` onto the message queue when a deadline elapses with no
//! newer command superseding it.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use frame_core::controller::TimerDriver as TimerDriverTrait;
use frame_core::Message;

use crate::message_queue::MessageProducer;

enum TimerCmd {
    StartTimeout(Duration),
    StopTimeout,
    StartPeriod(Duration),
    StopPeriod,
    Shutdown,
}

/// The `TimerDriver` implementation actions call into directly; cheap to
/// construct, just sends commands to the background thread.
pub struct HostTimerDriver {
    cmd_tx: Sender<TimerCmd>,
}

impl HostTimerDriver {
    fn send(&self, cmd: TimerCmd) {
        let _ = self.cmd_tx.send(cmd);
    }
}

impl TimerDriverTrait for HostTimerDriver {
    fn start_timeout(&mut self, ms: u16) {
        self.send(TimerCmd::StartTimeout(Duration::from_millis(u64::from(ms))));
    }

    fn stop_timeout(&mut self) {
        self.send(TimerCmd::StopTimeout);
    }

    fn start_period(&mut self, ms: u16) {
        self.send(TimerCmd::StartPeriod(Duration::from_millis(u64::from(ms))));
    }

    fn stop_period(&mut self) {
        self.send(TimerCmd::StopPeriod);
    }
}

/// Owns the background timer thread's join handle and shutdown trigger.
pub struct TimerThreadHandle {
    cmd_tx: Sender<TimerCmd>,
    handle: Option<JoinHandle<()>>,
}

impl TimerThreadHandle {
    /// Build a fresh `(driver, handle)` pair and spawn the background
    /// thread. `driver` is handed to [`frame_core::ControllerCtx::new`];
    /// `handle` is kept by the host to shut the thread down on exit.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the OS refuses to spawn the thread.
    pub fn spawn(messages: MessageProducer) -> std::io::Result<(HostTimerDriver, Self)> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let handle =
            std::thread::Builder::new().name("frame-timer".into()).spawn(move || run(cmd_rx, messages))?;

        Ok((HostTimerDriver { cmd_tx: cmd_tx.clone() }, Self { cmd_tx, handle: Some(handle) }))
    }

    /// Signal the timer thread to exit and join it.
    pub fn shutdown(mut self) {
        let _ = self.cmd_tx.send(TimerCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(cmd_rx: mpsc::Receiver<TimerCmd>, messages: MessageProducer) {
    let mut timeout_deadline: Option<Instant> = None;
    let mut period_deadline: Option<Instant> = None;
    let mut period_interval: Option<Duration> = None;

    loop {
        let now = Instant::now();
        let next_wake = [timeout_deadline, period_deadline].into_iter().flatten().min();
        let wait = next_wake.map_or(Duration::from_secs(3600), |deadline| deadline.saturating_duration_since(now));

        match cmd_rx.recv_timeout(wait) {
            Ok(TimerCmd::StartTimeout(d)) => timeout_deadline = Some(Instant::now() + d),
            Ok(TimerCmd::StopTimeout) => timeout_deadline = None,
            Ok(TimerCmd::StartPeriod(d)) => {
                period_interval = Some(d);
                period_deadline = Some(Instant::now() + d);
            }
            Ok(TimerCmd::StopPeriod) => {
                period_interval = None;
                period_deadline = None;
            }
            Ok(TimerCmd::Shutdown) => return,
            Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                let now = Instant::now();
                if timeout_deadline.is_some_and(|d| now >= d) {
                    timeout_deadline = None;
                    messages.try_send(Message::Timeout);
                }
                if period_deadline.is_some_and(|d| now >= d) {
                    if let Some(interval) = period_interval {
                        period_deadline = Some(now + interval);
                    }
                    messages.try_send(Message::Tick);
                }
            }
        }
    }
}
