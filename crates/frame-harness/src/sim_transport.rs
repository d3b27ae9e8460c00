//! An in-memory [`Transport`] that records every frame the controller sends
//! instead of writing it to a socket, mirroring `frame-host::TcpTransport`'s
//! send side without the real connection.

use std::sync::{Arc, Mutex};

use frame_core::controller::Transport;

/// A [`Transport`] backed by a shared, growable buffer of sent frames.
#[derive(Clone, Default)]
pub struct SimTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SimTransport {
    /// Create a transport with no frames recorded yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every frame sent so far, oldest first.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Number of frames sent so far.
    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}

impl Transport for SimTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), String> {
        self.sent.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(bytes.to_vec());
        Ok(())
    }
}
