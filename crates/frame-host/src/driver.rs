//! Ties together the TCP transport, the timer thread, the message queue,
//! and a [`Controller`] into a runnable processing loop.

use std::sync::Arc;
use std::thread::JoinHandle;

use frame_core::{command_table, Controller, ControllerCtx, RecvPool};

use crate::config::HostConfig;
use crate::error::HostError;
use crate::message_queue::{self, MessageConsumer};
use crate::timer::TimerThreadHandle;
use crate::transport::{ReaderShutdown, TcpTransport};

/// Owns the controller and every background thread it depends on.
pub struct Driver {
    controller: Controller,
    messages: MessageConsumer,
    timer_handle: TimerThreadHandle,
    reader_shutdown: ReaderShutdown,
    reader_handle: JoinHandle<()>,
    config: HostConfig,
}

impl Driver {
    /// Connect to `config.connect_addr` and wire up a controller against
    /// it: a TCP transport with a reader thread, a dedicated timer thread,
    /// and the bounded message queue both feed from.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Io`] if the TCP connection cannot be
    /// established.
    pub fn connect(config: HostConfig) -> Result<Self, HostError> {
        let (producer, consumer) = message_queue::channel(config.msg_queue_capacity);
        let recv_pool = Arc::new(RecvPool::new());

        let (transport, reader_shutdown, reader_handle) =
            TcpTransport::connect(&config.connect_addr, Arc::clone(&recv_pool), producer.clone())?;
        let (timer_driver, timer_handle) = TimerThreadHandle::spawn(producer.clone())?;

        let ctx = ControllerCtx::with_recv_pool(
            Box::new(transport),
            Box::new(timer_driver),
            command_table::DEFAULT,
            config.controller,
            recv_pool,
        );
        let mut controller = Controller::new(ctx);
        controller.start()?;

        Ok(Self { controller, messages: consumer, timer_handle, reader_shutdown, reader_handle, config })
    }

    /// A handle for enqueueing ad-hoc single-shot or periodic commands from
    /// outside the processing loop (a CLI, an API handler, ...).
    #[must_use]
    pub fn single_queue(&self) -> Arc<frame_core::SingleShotQueue<frame_core::Data>> {
        self.controller.ctx().single_queue()
    }

    /// A handle for setting/replacing the periodic command.
    #[must_use]
    pub fn periodic_slot(&self) -> Arc<frame_core::PeriodicSlot<frame_core::Data>> {
        self.controller.ctx().periodic_slot()
    }

    /// Block for up to `config.process_poll_interval`, dispatch at most one
    /// message, and drain the FSM. Returns `Ok(true)` if a message was
    /// processed, `Ok(false)` on a bare timeout.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::QueueDisconnected`] if every producer (the
    /// timer thread, the transport reader thread) has been dropped.
    pub fn process(&mut self) -> Result<bool, HostError> {
        match self.messages.recv_timeout(self.config.process_poll_interval)? {
            Some(msg) => {
                self.controller.handle_message(&msg);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Request the controller stop and shut down the timer thread.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Controller`] if the stop event could not be
    /// posted.
    pub fn shutdown(mut self) -> Result<(), HostError> {
        self.controller.request_stop()?;
        self.timer_handle.shutdown();
        // Unblock the reader thread's in-flight read, then wait for it to exit.
        let _ = self.reader_shutdown.shutdown(std::net::Shutdown::Both);
        let _ = self.reader_handle.join();
        Ok(())
    }

    /// The controller's current FSM state.
    #[must_use]
    pub fn state(&self) -> frame_core::ControllerState {
        self.controller.state()
    }
}
