//! SCTP (Stream Control Transmission Protocol, RFC 4960) data-plane core
//!
//! Decodes and encodes chunks, drives the INIT / INIT-ACK / COOKIE-ECHO /
//! COOKIE-ACK handshake and the shutdown sequence, and reassembles
//! fragmented per-stream messages for an upper layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐
//! │   Upper layer (listener)    │
//! ├─────────────────────────────┤
//! │  Stream reassembly engine   │  stream/
//! ├─────────────────────────────┤
//! │ Association state machine   │  association/
//! ├─────────────────────────────┤
//! │ Chunk / cause / packet codec│  codec/
//! ├─────────────────────────────┤
//! │  Transport (not included)   │
//! └─────────────────────────────┘
//! ```
//!
//! ## Not Implemented
//!
//! - Congestion control and retransmission timers
//! - Multi-homing and path MTU discovery
//! - Partial reliability extensions
//! - CRC32c checksum computation

pub mod association;
pub mod codec;
pub mod config;
pub mod error;
pub mod stream;
pub mod utils;

pub use association::{
    AbortReason, AssociationListener, AssociationState, COOKIE_SIZE, CookieError, SctpAssociation,
    StateCookie,
};
pub use codec::{
    Chunk, ChunkType, DataChunk, ErrorCause, FormatError, InitChunk, Parameter, SackChunk,
    SctpPacket,
};
pub use config::{LoggingConfig, SctpConfig};
pub use error::{Result, SctpError};
pub use stream::{Fragment, SctpMessage, StreamListener, StreamState};
