//! OSC UDP listener
//!
//! Binds a UDP socket and decodes incoming packets on a dedicated thread,
//! bridging `(OscMessage, source)` pairs to the host via a bounded flume
//! channel. Bundles are flattened depth-first into their member messages.

use flume::{Receiver, Sender};
use rosc::{OscMessage, OscPacket};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Error type for OSC server operations
#[derive(Debug, thiserror::Error)]
pub enum OscServerError {
    #[error("Failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to configure UDP socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Read timeout so the receive loop observes the stop flag promptly.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Incoming datagram buffer size. OSC over UDP; one datagram, one packet.
const RECV_BUFFER_SIZE: usize = 4096;

/// UDP OSC listener with a background decode thread
pub struct OscServer {
    message_rx: Receiver<(OscMessage, SocketAddr)>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl OscServer {
    /// Bind `0.0.0.0:port` and start the receive thread
    pub fn bind(port: u16) -> Result<Self, OscServerError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .map_err(|source| OscServerError::Bind { port, source })?;
        socket.set_read_timeout(Some(RECV_POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;

        let (message_tx, message_rx) = flume::bounded(256);
        let running = Arc::new(AtomicBool::new(true));
        let run_flag = running.clone();

        let thread = std::thread::Builder::new()
            .name("osc-recv".into())
            .spawn(move || {
                Self::recv_loop(socket, message_tx, run_flag);
            })?;

        log::info!("OSC: Listening on {}", local_addr);

        Ok(Self {
            message_rx,
            running,
            thread: Some(thread),
            local_addr,
        })
    }

    fn recv_loop(
        socket: UdpSocket,
        message_tx: Sender<(OscMessage, SocketAddr)>,
        running: Arc<AtomicBool>,
    ) {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        while running.load(Ordering::Relaxed) {
            match socket.recv_from(&mut buf) {
                Ok((n, source)) => match rosc::decoder::decode_udp(&buf[..n]) {
                    Ok((_, packet)) => Self::deliver_packet(packet, source, &message_tx),
                    Err(e) => {
                        log::debug!("OSC: Dropping malformed packet from {}: {}", source, e);
                    }
                },
                Err(ref e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::warn!("OSC: Receive failed, stopping listener: {}", e);
                    break;
                }
            }
        }
    }

    fn deliver_packet(
        packet: OscPacket,
        source: SocketAddr,
        message_tx: &Sender<(OscMessage, SocketAddr)>,
    ) {
        match packet {
            OscPacket::Message(msg) => {
                log::trace!("[OSC IN] {} {:?} from {}", msg.addr, msg.args, source);
                if message_tx.try_send((msg, source)).is_err() {
                    log::warn!("OSC: Message channel full, dropping message");
                }
            }
            OscPacket::Bundle(bundle) => {
                for inner in bundle.content {
                    Self::deliver_packet(inner, source, message_tx);
                }
            }
        }
    }

    /// The bound local address (useful when port 0 was requested)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the message receiver for manual polling or a dedicated thread
    pub fn messages(&self) -> Receiver<(OscMessage, SocketAddr)> {
        self.message_rx.clone()
    }

    /// Try to receive a pending message (non-blocking)
    pub fn try_recv(&self) -> Option<(OscMessage, SocketAddr)> {
        self.message_rx.try_recv().ok()
    }

    /// Stop the receive thread and join it
    ///
    /// Idempotent: calling stop on an already-stopped server is a no-op.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::Relaxed) {
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("OSC: Receive thread panicked during shutdown");
            }
        }
        log::info!("OSC: Listener on {} stopped", self.local_addr);
    }
}

impl Drop for OscServer {
    fn drop(&mut self) {
        self.stop();
    }
}
