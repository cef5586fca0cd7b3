//! Per-stream message handling: reassembly of inbound DATA chunks and
//! fragmentation of outbound messages.

pub mod fragmenter;
pub mod message;
pub mod reassembly;

pub use crate::codec::Fragment;
pub use fragmenter::fragment_message;
pub use message::{SctpMessage, StreamListener};
pub use reassembly::StreamState;
