//! Session configuration
//!
//! Read once at startup and handed to [`crate::sync::establish`]. Role is
//! always given explicitly, never derived from the local address.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::constants::*;
use crate::protocol::{Endpoint, Role};
use crate::sync::RetryPolicy;
use crate::{Error, Result};

/// Configuration for one peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Which half of the grid this peer owns
    pub role: Role,
    /// Address to listen on
    pub local_addr: IpAddr,
    /// Partner's address
    pub remote_addr: IpAddr,
    /// Port to listen on for the partner's stream
    #[serde(default = "default_recv_port")]
    pub listen_port: u16,
    /// Port the partner listens on
    #[serde(default = "default_recv_port")]
    pub peer_port: u16,
    /// Source port for the outbound stream, 0 to let the OS pick
    #[serde(default = "default_send_port")]
    pub send_port: u16,
    #[serde(default = "default_grid_width")]
    pub grid_width: usize,
    #[serde(default = "default_grid_height")]
    pub grid_height: usize,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    #[serde(default = "default_connect_interval_ms")]
    pub connect_interval_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    /// Stop after this many steps
    #[serde(default)]
    pub max_steps: Option<u64>,
}

fn default_recv_port() -> u16 {
    DEFAULT_RECV_PORT
}

fn default_send_port() -> u16 {
    DEFAULT_SEND_PORT
}

fn default_grid_width() -> usize {
    DEFAULT_GRID_WIDTH
}

fn default_grid_height() -> usize {
    DEFAULT_GRID_HEIGHT
}

fn default_connect_attempts() -> u32 {
    DEFAULT_CONNECT_ATTEMPTS
}

fn default_connect_interval_ms() -> u64 {
    DEFAULT_CONNECT_INTERVAL_MS
}

fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

impl Config {
    /// Well-known ports and default timings for the given pair
    pub fn new(role: Role, local_addr: IpAddr, remote_addr: IpAddr) -> Self {
        Self {
            role,
            local_addr,
            remote_addr,
            listen_port: DEFAULT_RECV_PORT,
            peer_port: DEFAULT_RECV_PORT,
            send_port: DEFAULT_SEND_PORT,
            grid_width: DEFAULT_GRID_WIDTH,
            grid_height: DEFAULT_GRID_HEIGHT,
            connect_attempts: DEFAULT_CONNECT_ATTEMPTS,
            connect_interval_ms: DEFAULT_CONNECT_INTERVAL_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            max_steps: None,
        }
    }

    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let config: Config = serde_json::from_slice(&data)?;
        tracing::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid_width < MIN_GRID_WIDTH {
            return Err(Error::Config(format!(
                "grid width must be at least {}, got {}",
                MIN_GRID_WIDTH, self.grid_width
            )));
        }
        if self.grid_height == 0 {
            return Err(Error::Config("grid height must be at least 1".to_string()));
        }
        if self.listen_port == 0 || self.peer_port == 0 {
            return Err(Error::Config("listen and peer ports must be non-zero".to_string()));
        }
        if self.connect_interval_ms == 0 || self.handshake_timeout_ms == 0 || self.read_timeout_ms == 0 {
            return Err(Error::Config("intervals and timeouts must be non-zero".to_string()));
        }
        if self.local_addr == self.remote_addr && self.listen_port == self.peer_port {
            return Err(Error::Config(format!(
                "local and remote endpoints are both {}",
                self.local_endpoint()
            )));
        }
        Ok(())
    }

    pub fn local_endpoint(&self) -> Endpoint {
        Endpoint::new(self.local_addr, self.listen_port)
    }

    pub fn remote_endpoint(&self) -> Endpoint {
        Endpoint::new(self.remote_addr, self.peer_port)
    }

    /// Local endpoint the outbound socket binds, if pinned
    pub fn source_endpoint(&self) -> Option<Endpoint> {
        (self.send_port != 0).then(|| Endpoint::new(self.local_addr, self.send_port))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_attempts,
            interval: Duration::from_millis(self.connect_interval_ms),
        }
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
