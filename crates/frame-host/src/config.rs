//! Host-level configuration: the concrete values behind the abstract
//! tunables `frame-core` exposes through [`frame_core::ControllerConfig`].

use std::time::Duration;

use frame_core::ControllerConfig;

/// Default timeout for a command with no command-table entry.
pub const DEFAULT_TIMEOUT_MS: u16 = 1000;
/// Default retry budget for a command with no command-table entry.
pub const DEFAULT_RETRY: u16 = 4;
/// Default interval between periodic send cycles.
pub const DEFAULT_PERIOD_MS: u16 = 2000;
/// Default single-shot send queue capacity.
pub const DEFAULT_SINGLE_QUEUE_CAP: usize = 6;
/// Default bounded message queue capacity (mirrors `MSG_QUEUE_CAP`).
pub const DEFAULT_MSG_QUEUE_CAP: usize = 16;
/// Default FSM internal event queue capacity.
pub const DEFAULT_FSM_EVENT_CAP: usize = 4;

/// Everything `frame-host` needs to stand up a [`frame_core::Controller`]
/// and drive it against a real transport.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Address to connect to for the demo TCP transport.
    pub connect_addr: String,
    /// Controller tunables (timeouts, retry budget, period).
    pub controller: ControllerConfig,
    /// Capacity of the bounded message queue feeding the processing loop.
    pub msg_queue_capacity: usize,
    /// How long `process` blocks waiting for the next message before
    /// returning control to the caller.
    pub process_poll_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            connect_addr: "127.0.0.1:7878".to_string(),
            controller: ControllerConfig {
                default_timeout_ms: DEFAULT_TIMEOUT_MS,
                default_retry: DEFAULT_RETRY,
                period_ms: DEFAULT_PERIOD_MS,
                single_queue_capacity: DEFAULT_SINGLE_QUEUE_CAP,
                event_queue_capacity: DEFAULT_FSM_EVENT_CAP,
            },
            msg_queue_capacity: DEFAULT_MSG_QUEUE_CAP,
            process_poll_interval: Duration::from_millis(250),
        }
    }
}
