//! Borderlink Core - lockstep border exchange between two grid halves
//!
//! Two peers each own half of a cellular-automaton grid. Every step they
//! swap the columns along the partition boundary over TCP and then pass a
//! sync barrier, so neither peer runs ahead of the other.

pub mod config;
pub mod grid;
pub mod protocol;
pub mod service;
pub mod stats;
pub mod sync;

mod error;

pub use error::{Error, Result};

// Re-export key types for convenience
pub use config::Config;
pub use grid::{Grid, GridEdges};
pub use protocol::{BorderVector, Endpoint, Pixel, Role};
pub use service::{run_peer, RunOutcome};
pub use stats::{Phase, StepStats};
pub use sync::{stop_signal, PeerSession, StepCoordinator, StopHandle, StopSignal};
