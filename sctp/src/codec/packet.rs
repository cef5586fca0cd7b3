//! SCTP packet structure
//!
//! An SCTP packet consists of a common header followed by one or more chunks.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Source Port Number        |     Destination Port Number   |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                      Verification Tag                         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Checksum                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                                                               |
//! /                            Chunks                             /
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The checksum is carried verbatim in both directions; computing and
//! verifying CRC32c belongs to the transport below this crate.

use super::chunk::{Chunk, UnrecognizedAction};
use super::primitives::{ByteReader, ByteWriter};
use crate::error::FormatError;

/// SCTP common header size in bytes
pub const SCTP_HEADER_SIZE: usize = 12;

/// SCTP packet containing header and chunks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SctpPacket {
    /// Source port
    pub source_port: u16,
    /// Destination port
    pub destination_port: u16,
    /// Verification tag
    pub verification_tag: u32,
    /// Checksum field as received, or as supplied by the caller
    pub checksum: u32,
    /// Chunks in this packet
    pub chunks: Vec<Chunk>,
}

/// A chunk of unknown type met while decoding a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedChunk {
    pub chunk_type: u8,
    pub action: UnrecognizedAction,
    /// The chunk as it appeared on the wire, without padding
    pub bytes: Vec<u8>,
}

/// Result of decoding a packet with unknown chunk types handled per their
/// action bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPacket {
    pub packet: SctpPacket,
    pub unrecognized: Vec<UnrecognizedChunk>,
    /// An unknown chunk with a "stop" action ended decoding early
    pub stopped: bool,
}

impl DecodedPacket {
    /// Unknown chunks the peer asked to hear about
    pub fn to_report(&self) -> impl Iterator<Item = &UnrecognizedChunk> {
        self.unrecognized.iter().filter(|u| u.action.reports())
    }
}

impl SctpPacket {
    /// Create a new SCTP packet
    pub fn new(source_port: u16, destination_port: u16, verification_tag: u32) -> Self {
        Self {
            source_port,
            destination_port,
            verification_tag,
            checksum: 0,
            chunks: Vec::new(),
        }
    }

    /// Add a chunk to the packet
    pub fn add_chunk(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    /// Encoded size of the packet
    pub fn encoded_len(&self) -> usize {
        SCTP_HEADER_SIZE + self.chunks.iter().map(Chunk::padded_len).sum::<usize>()
    }

    /// Serialize packet to bytes
    ///
    /// Fails if any chunk is too large for its length field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut writer = ByteWriter::with_capacity(self.encoded_len());

        writer.put_u16(self.source_port);
        writer.put_u16(self.destination_port);
        writer.put_u32(self.verification_tag);
        writer.put_u32(self.checksum);

        // Each chunk arrives already padded to a 4-byte boundary
        for chunk in &self.chunks {
            writer.put_bytes(&chunk.to_bytes()?);
        }

        Ok(writer.into_inner())
    }

    /// Parse packet from bytes, collecting chunks of unknown type instead
    /// of failing on them.
    ///
    /// Any other malformed chunk makes the whole packet malformed.
    pub fn decode(data: &[u8]) -> Result<DecodedPacket, FormatError> {
        let mut reader = ByteReader::new(data, "SCTP common header");
        let source_port = reader.read_u16()?;
        let destination_port = reader.read_u16()?;
        let verification_tag = reader.read_u32()?;
        let checksum = reader.read_u32()?;

        let mut packet = SctpPacket {
            source_port,
            destination_port,
            verification_tag,
            checksum,
            chunks: Vec::new(),
        };
        let mut unrecognized = Vec::new();
        let mut stopped = false;
        let mut offset = SCTP_HEADER_SIZE;

        while offset < data.len() {
            match Chunk::decode(&data[offset..]) {
                Ok((chunk, consumed)) => {
                    packet.chunks.push(chunk);
                    offset += consumed;
                }
                Err(FormatError::UnrecognizedChunkType { chunk_type, chunk }) => {
                    let action = UnrecognizedAction::for_type(chunk_type);
                    let consumed = super::primitives::padded_len(chunk.len());
                    unrecognized.push(UnrecognizedChunk {
                        chunk_type,
                        action,
                        bytes: chunk,
                    });
                    if action.stops() {
                        stopped = true;
                        break;
                    }
                    offset += consumed;
                }
                Err(err) => return Err(err),
            }
        }

        Ok(DecodedPacket {
            packet,
            unrecognized,
            stopped,
        })
    }

    /// Parse packet from bytes, ignoring unknown chunk types
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Self::decode(data).map(|decoded| decoded.packet)
    }

    /// Verification tag field without decoding any chunk
    pub fn peek_verification_tag(data: &[u8]) -> Option<u32> {
        data.get(4..8)
            .map(|tag| u32::from_be_bytes([tag[0], tag[1], tag[2], tag[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::chunk::{DataChunk, SackChunk};

    #[test]
    fn test_packet_roundtrip() {
        let mut packet = SctpPacket::new(5000, 5001, 0x12345678);
        packet.checksum = 0xA1B2C3D4;
        packet.add_chunk(Chunk::Data(DataChunk::new(1, 0, 0, 51, b"hi".to_vec())));
        packet.add_chunk(Chunk::Sack(SackChunk::new(10, 1000)));

        let bytes = packet.to_bytes().unwrap();
        assert_eq!(bytes.len(), packet.encoded_len());
        assert_eq!(&bytes[8..12], &[0xA1, 0xB2, 0xC3, 0xD4]);

        let parsed = SctpPacket::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_packet_too_short() {
        assert!(matches!(
            SctpPacket::from_bytes(&[0; 8]),
            Err(FormatError::TooShort { .. })
        ));
    }

    #[test]
    fn test_empty_packet() {
        let packet = SctpPacket::from_bytes(&[0; 12]).unwrap();
        assert!(packet.chunks.is_empty());
    }

    #[test]
    fn test_unknown_chunk_skip_and_report() {
        let mut bytes = SctpPacket::new(1, 2, 3).to_bytes().unwrap();
        bytes.extend_from_slice(&[0xC0, 0, 0, 5, 0xEE, 0, 0, 0]);
        bytes.extend_from_slice(&Chunk::CookieAck.to_bytes().unwrap());

        let decoded = SctpPacket::decode(&bytes).unwrap();
        assert_eq!(decoded.packet.chunks, vec![Chunk::CookieAck]);
        assert!(!decoded.stopped);
        let reported: Vec<_> = decoded.to_report().collect();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].bytes, vec![0xC0, 0, 0, 5, 0xEE]);
    }

    #[test]
    fn test_unknown_chunk_stop() {
        let mut bytes = SctpPacket::new(1, 2, 3).to_bytes().unwrap();
        bytes.extend_from_slice(&Chunk::CookieAck.to_bytes().unwrap());
        bytes.extend_from_slice(&[0x3F, 0, 0, 4]);
        bytes.extend_from_slice(&Chunk::ShutdownAck.to_bytes().unwrap());

        let decoded = SctpPacket::decode(&bytes).unwrap();
        assert!(decoded.stopped);
        assert_eq!(decoded.packet.chunks, vec![Chunk::CookieAck]);
        assert_eq!(decoded.to_report().count(), 0);
    }

    #[test]
    fn test_malformed_chunk_fails_packet() {
        let mut bytes = SctpPacket::new(1, 2, 3).to_bytes().unwrap();
        bytes.extend_from_slice(&[7, 0, 0, 6, 0, 0]);
        assert!(SctpPacket::decode(&bytes).is_err());
    }

    #[test]
    fn test_peek_verification_tag() {
        let bytes = SctpPacket::new(1, 2, 0xCAFEBABE).to_bytes().unwrap();
        assert_eq!(SctpPacket::peek_verification_tag(&bytes), Some(0xCAFEBABE));
        assert_eq!(SctpPacket::peek_verification_tag(&bytes[..6]), None);
    }
}
