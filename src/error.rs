//! Transport error taxonomy

use std::io;

use thiserror::Error;

/// Failures the UDP/OSC transport can surface.
///
/// None of these are fatal to the process: they are logged, reflected as a
/// `Failed` connection state, and the bridge stays down until a new connect
/// is requested.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The remote endpoint is not listening (ICMP port unreachable on the
    /// connected datagram socket).
    #[error("connection refused by remote")]
    ConnectionRefused,

    /// The socket was torn down locally or by the peer.
    #[error("socket closed")]
    SocketClosed,

    /// Any other socket failure.
    #[error("socket error: {0}")]
    Io(io::Error),

    /// A payload that could not be encoded as OSC.
    #[error("malformed OSC payload: {0}")]
    Malformed(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => TransportError::ConnectionRefused,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                TransportError::SocketClosed
            },
            _ => TransportError::Io(err),
        }
    }
}
