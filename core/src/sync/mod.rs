//! TCP lockstep synchronization between two peers

pub mod coordinator;
pub mod framing;
pub mod link;

pub use coordinator::{stop_signal, StepCoordinator, StepState, StopHandle, StopSignal};
pub use framing::{decode, encode, write_frame, Frame, FrameReader};
pub use link::{accept, accept_within, bind_and_listen, connect_with_retry, establish, handshake, PeerSession, RetryPolicy};
