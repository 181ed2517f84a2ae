use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Borderlink error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not connect to {addr} after {attempts} attempt(s)")]
    ConnectTimeout { addr: SocketAddr, attempts: u32 },

    #[error("Failed to accept peer connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Peer did not connect back within {0:?}")]
    AcceptTimeout(Duration),

    #[error("No handshake from peer within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("No data from peer within {0:?}")]
    ReceiveTimeout(Duration),

    #[error("Peer closed the connection")]
    StreamClosed,

    #[error("Invalid frame: {0}")]
    Codec(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to serialize/deserialize: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors raised while the link is being set up. Fatal to startup.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Error::Bind { .. }
                | Error::ConnectTimeout { .. }
                | Error::Accept(_)
                | Error::AcceptTimeout(_)
                | Error::HandshakeTimeout(_)
        )
    }

    /// Errors raised by the step loop. Fatal to the session.
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            Error::StreamClosed | Error::Codec(_) | Error::Protocol(_) | Error::ReceiveTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
