//! Wire codec: packets, chunks, TLV parameters and error causes

pub mod cause;
pub mod chunk;
pub mod packet;
pub mod param;
pub mod primitives;

pub use crate::error::FormatError;
pub use cause::ErrorCause;
pub use chunk::{
    Chunk, ChunkHeader, ChunkType, DataChunk, Fragment, HeartbeatChunk, InitChunk, SackChunk,
    UnrecognizedAction,
};
pub use packet::{DecodedPacket, SCTP_HEADER_SIZE, SctpPacket, UnrecognizedChunk};
pub use param::Parameter;
