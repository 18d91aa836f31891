//! OSC/UDP transport
//!
//! Owns the one datagram socket per bridge: bound to the local feedback
//! endpoint, connected to the remote control endpoint. Lifecycle events and
//! inbound messages are delivered to the layer above over an mpsc channel
//! instead of ad-hoc callbacks, so the bridge can drive its state machine
//! from a single event loop.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use rosc::{decoder, encoder, OscMessage, OscPacket};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::TransportError;

/// Connection lifecycle states, surfaced to the host status indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Failed { reason: String },
}

impl ConnectionState {
    /// Human-readable label for logs and the console.
    pub fn label(&self) -> String {
        match self {
            ConnectionState::Disconnected => "disconnected".to_string(),
            ConnectionState::Connecting => "connecting".to_string(),
            ConnectionState::Ready => "ready".to_string(),
            ConnectionState::Failed { reason } => format!("failed ({reason})"),
        }
    }
}

/// Callback type for connection status updates
pub type StatusCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Events delivered from the transport to the bridge event loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// The socket is bound and pointed at the remote endpoint.
    Ready,
    /// One decoded inbound OSC message.
    Message(OscMessage),
    /// A socket-level failure. The transport may still be usable afterwards
    /// (a refused datagram does not kill the socket).
    Error(TransportError),
    /// The receive loop ended; no further traffic will be seen.
    Closed,
}

/// One UDP/OSC socket with a background receive loop.
pub struct OscTransport {
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    remote: SocketAddr,
    recv_task: Mutex<Option<JoinHandle<()>>>,
}

impl OscTransport {
    /// Bind the feedback socket, point it at the remote control endpoint and
    /// start the receive loop.
    ///
    /// `Ready` is emitted on the event channel once the socket is up, before
    /// any `Message` can arrive.
    pub async fn open(
        local: SocketAddr,
        remote: SocketAddr,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(local).await?;
        socket.connect(remote).await?;
        let socket = Arc::new(socket);
        let bound = socket.local_addr()?;
        debug!("OSC socket bound on {bound}, target {remote}");

        let _ = events.send(TransportEvent::Ready).await;

        let recv_task = tokio::spawn(recv_loop(Arc::clone(&socket), events));

        Ok(Self {
            socket,
            local: bound,
            remote,
            recv_task: Mutex::new(Some(recv_task)),
        })
    }

    /// Address the socket actually bound to (resolves an ephemeral port)
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Remote endpoint datagrams are sent to
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Serialize one OSC message and emit it as a single datagram.
    ///
    /// Fire-and-forget: no acknowledgement, no retry.
    pub async fn send(&self, msg: OscMessage) -> Result<(), TransportError> {
        trace!("OSC -> {} {:?}", msg.addr, msg.args);
        let packet = OscPacket::Message(msg);
        let buf = encoder::encode(&packet).map_err(|e| TransportError::Malformed(e.to_string()))?;
        self.socket.send(&buf).await?;
        Ok(())
    }

    /// Stop the receive loop and release the socket.
    ///
    /// No events are delivered after this returns.
    pub fn close(&self) {
        if let Some(task) = self.recv_task.lock().take() {
            task.abort();
            debug!("OSC transport closed");
        }
    }
}

impl Drop for OscTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receive loop: decode datagrams and forward them as events.
///
/// Malformed datagrams are dropped with a log line. A refused datagram
/// surfaces as an `Error` but keeps the loop alive; any other socket error
/// ends the loop with `Error` then `Closed`.
async fn recv_loop(socket: Arc<UdpSocket>, events: mpsc::Sender<TransportEvent>) {
    let mut buf = [0u8; decoder::MTU];

    loop {
        match socket.recv(&mut buf).await {
            Ok(len) => match decoder::decode_udp(&buf[..len]) {
                Ok((_, OscPacket::Message(msg))) => {
                    trace!("OSC <- {} {:?}", msg.addr, msg.args);
                    if events.send(TransportEvent::Message(msg)).await.is_err() {
                        break;
                    }
                },
                Ok((_, OscPacket::Bundle(_))) => {
                    debug!("ignoring inbound OSC bundle");
                },
                Err(e) => {
                    warn!("dropping malformed OSC datagram: {e}");
                },
            },
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                if events
                    .send(TransportEvent::Error(TransportError::ConnectionRefused))
                    .await
                    .is_err()
                {
                    break;
                }
            },
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.into())).await;
                let _ = events.send(TransportEvent::Closed).await;
                break;
            },
        }
    }
}
