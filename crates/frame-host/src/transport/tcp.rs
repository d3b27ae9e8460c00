//! A TCP-backed [`Transport`], grounded in `original_source`'s `drv_socket.c`
//! send/recv pair but expressed as a std `TcpStream` plus a background
//! reader thread that feeds the framing [`Decoder`].

use std::io::Read;
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Handle returned alongside a [`TcpTransport`] for shutting down its
/// background reader thread: shutting down this socket clone unblocks the
/// thread's in-flight `read`, after which its [`JoinHandle`] completes.
pub type ReaderShutdown = TcpStream;

use frame_core::controller::Transport;
use frame_core::RecvPool;
use frame_proto::Decoder;

use crate::message_queue::MessageProducer;

/// Sends over a shared `TcpStream`; a background thread owns the read side.
pub struct TcpTransport {
    stream: Mutex<TcpStream>,
}

impl TcpTransport {
    /// Connect to `addr` and spawn a reader thread that decodes inbound
    /// bytes into `recv_pool`, waking the processing loop via `messages` on
    /// every decoded frame.
    ///
    /// Takes only the receive pool handle, not the full controller context:
    /// the transport and timer fields of [`frame_core::ControllerCtx`] are
    /// owned exclusively by the processing thread, so this reader thread
    /// must never see them.
    ///
    /// # Errors
    ///
    /// Returns [`std::io::Error`] if the connection cannot be established or
    /// the reader thread cannot be spawned.
    pub fn connect(
        addr: &str,
        recv_pool: Arc<RecvPool>,
        messages: MessageProducer,
    ) -> std::io::Result<(Self, ReaderShutdown, JoinHandle<()>)> {
        let stream = TcpStream::connect(addr)?;
        let reader_stream = stream.try_clone()?;
        let shutdown_stream = stream.try_clone()?;
        let handle = std::thread::Builder::new()
            .name("frame-tcp-reader".into())
            .spawn(move || read_loop(reader_stream, recv_pool, messages))?;

        Ok((Self { stream: Mutex::new(stream) }, shutdown_stream, handle))
    }
}

impl Transport for TcpTransport {
    fn send(&self, bytes: &[u8]) -> Result<(), String> {
        use std::io::Write;
        let mut stream = self.stream.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        stream.write_all(bytes).map_err(|err| err.to_string())
    }
}

fn read_loop(mut stream: TcpStream, recv_pool: Arc<RecvPool>, messages: MessageProducer) {
    let mut decoder = Decoder::new();
    decoder.set_callback(move |payload: &[u8]| match frame_core::accept_frame(&recv_pool, payload) {
        Ok(_idx) => messages.try_send(frame_core::Message::RecvData),
        Err(err) => tracing::warn!(%err, "failed to accept decoded frame"),
    });

    let mut buf = [0u8; 256];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                tracing::info!("peer closed connection");
                return;
            }
            Ok(n) => decoder.feed(&buf[..n]),
            Err(err) => {
                tracing::warn!(%err, "tcp read failed, stopping reader thread");
                return;
            }
        }
    }
}
