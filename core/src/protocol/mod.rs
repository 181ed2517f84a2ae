//! Protocol types shared by both peers

mod border;
pub mod constants;
mod role;

pub use border::{BorderVector, Pixel};
pub use role::{Endpoint, Role};
