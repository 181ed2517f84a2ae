//! Peer roles and socket endpoints

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Which half of the grid this peer owns.
///
/// Column 0 and column `width - 1` are ghost columns mirroring the
/// partner's cells. LEFT owns the right boundary, RIGHT the left one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Left,
    Right,
}

impl Role {
    /// Column whose cells are published to the partner each step
    pub fn send_column(self, width: usize) -> usize {
        match self {
            Role::Left => width - 2,
            Role::Right => 1,
        }
    }

    /// Ghost column overwritten with the partner's border each step
    pub fn receive_column(self, width: usize) -> usize {
        match self {
            Role::Left => width - 1,
            Role::Right => 0,
        }
    }

    pub fn partner(self) -> Role {
        match self {
            Role::Left => Role::Right,
            Role::Right => Role::Left,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Left => f.write_str("left"),
            Role::Right => f.write_str("right"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Role::Left),
            "right" | "r" => Ok(Role::Right),
            other => Err(Error::Config(format!("unknown role: {}", other))),
        }
    }
}

/// Address and port of one socket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self { address, port }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}
