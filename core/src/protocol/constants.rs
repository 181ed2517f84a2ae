//! Centralized protocol constants
//!
//! Both peers must agree on every value here; none of them are negotiated.

/// Port each peer listens on for the partner's outbound stream
pub const DEFAULT_RECV_PORT: u16 = 20000;

/// Source port bound for this peer's outbound stream
pub const DEFAULT_SEND_PORT: u16 = 20001;

/// Size of the big-endian length prefix on every frame
pub const FRAME_HEADER_LEN: usize = 4;

/// Maximum frame payload size (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Bytes per pixel on the wire, one per RGB channel
pub const BYTES_PER_PIXEL: usize = 3;

/// Sent once per peer after both connections are up
pub const HANDSHAKE_TOKEN: &[u8] = b"lets do this";

/// Sent once per step after the border swap
pub const SYNC_TOKEN: &[u8] = b"sync";

/// Default grid dimensions
pub const DEFAULT_GRID_WIDTH: usize = 100;
pub const DEFAULT_GRID_HEIGHT: usize = 100;

/// Two ghost columns plus at least one owned column
pub const MIN_GRID_WIDTH: usize = 3;

/// Connection retry defaults, a 10 second window in total
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 100;
pub const DEFAULT_CONNECT_INTERVAL_MS: u64 = 100;

/// Bounded waits on blocking receives
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;
