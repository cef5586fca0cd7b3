//! SCTP chunk types and structures
//!
//! SCTP packets contain one or more chunks. Each chunk has a type, flags,
//! length, and a type-specific body.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Chunk Type  | Chunk  Flags  |        Chunk Length           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! \                                                               \
//! /                          Chunk Value                          /
//! \                                                               \
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `Chunk Length` counts the header and value but never the trailing
//! padding. Encoding always recomputes it.

use super::cause::{ErrorCause, parse_causes, write_causes};
use super::param::{Parameter, param_type, parse_parameters, write_parameters};
use super::primitives::{
    ByteReader, ByteWriter, padded_len, read_tlvs, tlv_list_len, write_tlv,
};
use crate::association::COOKIE_SIZE;
use crate::error::FormatError;

/// Size of the common chunk header
pub const CHUNK_HEADER_SIZE: usize = 4;
/// DATA chunk header: common header + TSN + stream id + SSN + PPID
pub const DATA_CHUNK_HEADER_SIZE: usize = 16;

/// SCTP chunk type identifiers (RFC 4960)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChunkType {
    /// Payload data
    Data = 0,
    /// Initiate association
    Init = 1,
    /// Initiate acknowledgment
    InitAck = 2,
    /// Selective acknowledgment
    Sack = 3,
    /// Heartbeat request
    Heartbeat = 4,
    /// Heartbeat acknowledgment
    HeartbeatAck = 5,
    /// Abort association
    Abort = 6,
    /// Shutdown association
    Shutdown = 7,
    /// Shutdown acknowledgment
    ShutdownAck = 8,
    /// Operation error
    Error = 9,
    /// State cookie
    CookieEcho = 10,
    /// Cookie acknowledgment
    CookieAck = 11,
    /// Explicit congestion notification echo
    EcnEcho = 12,
    /// Congestion window reduced
    Cwr = 13,
    /// Shutdown complete
    ShutdownComplete = 14,
}

impl ChunkType {
    /// Parse chunk type from byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Data),
            1 => Some(Self::Init),
            2 => Some(Self::InitAck),
            3 => Some(Self::Sack),
            4 => Some(Self::Heartbeat),
            5 => Some(Self::HeartbeatAck),
            6 => Some(Self::Abort),
            7 => Some(Self::Shutdown),
            8 => Some(Self::ShutdownAck),
            9 => Some(Self::Error),
            10 => Some(Self::CookieEcho),
            11 => Some(Self::CookieAck),
            12 => Some(Self::EcnEcho),
            13 => Some(Self::Cwr),
            14 => Some(Self::ShutdownComplete),
            _ => None,
        }
    }
}

/// What a receiver does with a chunk type it does not know, taken from the
/// two high-order bits of the type (RFC 4960 section 3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnrecognizedAction {
    /// 00 - stop processing the packet, discard it
    Stop,
    /// 01 - stop processing and report in an ERROR chunk
    StopAndReport,
    /// 10 - skip this chunk and continue
    Skip,
    /// 11 - skip, continue, and report in an ERROR chunk
    SkipAndReport,
}

impl UnrecognizedAction {
    pub fn for_type(chunk_type: u8) -> Self {
        match chunk_type >> 6 {
            0b00 => Self::Stop,
            0b01 => Self::StopAndReport,
            0b10 => Self::Skip,
            _ => Self::SkipAndReport,
        }
    }

    pub fn stops(&self) -> bool {
        matches!(self, Self::Stop | Self::StopAndReport)
    }

    pub fn reports(&self) -> bool {
        matches!(self, Self::StopAndReport | Self::SkipAndReport)
    }
}

/// Common chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub chunk_type: u8,
    pub flags: u8,
    pub length: u16,
}

impl ChunkHeader {
    pub fn parse(data: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(data, "chunk header");
        Ok(Self {
            chunk_type: reader.read_u8()?,
            flags: reader.read_u8()?,
            length: reader.read_u16()?,
        })
    }
}

/// Position of a DATA chunk within its user message, from the B and E bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    /// B and E both set: the whole message in one chunk
    Single,
    Begin,
    Middle,
    End,
}

/// DATA chunk for transmitting user data
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   Type = 0    | Reserved|U|B|E|         Length                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                              TSN                              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |      Stream Identifier        |   Stream Sequence Number      |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                  Payload Protocol Identifier                  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \                                                               \
/// /                           User Data                           /
/// \                                                               \
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataChunk {
    /// Unordered flag - if true, can be delivered out of order
    pub unordered: bool,
    /// Beginning fragment flag
    pub beginning: bool,
    /// Ending fragment flag
    pub ending: bool,
    /// Transmission Sequence Number
    pub tsn: u32,
    /// Stream identifier
    pub stream_id: u16,
    /// Stream sequence number
    pub stream_seq: u16,
    /// Payload protocol identifier (PPID)
    pub ppid: u32,
    /// User data
    pub data: Vec<u8>,
}

const FLAG_UNORDERED: u8 = 0x04;
const FLAG_BEGINNING: u8 = 0x02;
const FLAG_ENDING: u8 = 0x01;
/// T bit on ABORT and SHUTDOWN-COMPLETE: tag reflected from the peer
const FLAG_T: u8 = 0x01;

impl DataChunk {
    /// Create a new single-fragment, ordered DATA chunk
    pub fn new(tsn: u32, stream_id: u16, stream_seq: u16, ppid: u32, data: Vec<u8>) -> Self {
        Self {
            unordered: false,
            beginning: true,
            ending: true,
            tsn,
            stream_id,
            stream_seq,
            ppid,
            data,
        }
    }

    /// Create one fragment of a larger message
    pub fn fragment_of(
        fragment: Fragment,
        tsn: u32,
        stream_id: u16,
        stream_seq: u16,
        ppid: u32,
        data: Vec<u8>,
    ) -> Self {
        let (beginning, ending) = match fragment {
            Fragment::Single => (true, true),
            Fragment::Begin => (true, false),
            Fragment::Middle => (false, false),
            Fragment::End => (false, true),
        };
        Self {
            beginning,
            ending,
            ..Self::new(tsn, stream_id, stream_seq, ppid, data)
        }
    }

    pub fn fragment(&self) -> Fragment {
        match (self.beginning, self.ending) {
            (true, true) => Fragment::Single,
            (true, false) => Fragment::Begin,
            (false, false) => Fragment::Middle,
            (false, true) => Fragment::End,
        }
    }

    fn flags(&self) -> u8 {
        (if self.unordered { FLAG_UNORDERED } else { 0 })
            | (if self.beginning { FLAG_BEGINNING } else { 0 })
            | (if self.ending { FLAG_ENDING } else { 0 })
    }

    fn write_body(&self, writer: &mut ByteWriter) {
        writer.put_u32(self.tsn);
        writer.put_u16(self.stream_id);
        writer.put_u16(self.stream_seq);
        writer.put_u32(self.ppid);
        writer.put_bytes(&self.data);
    }

    fn parse(flags: u8, body: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(body, "DATA chunk");
        Ok(Self {
            unordered: flags & FLAG_UNORDERED != 0,
            beginning: flags & FLAG_BEGINNING != 0,
            ending: flags & FLAG_ENDING != 0,
            tsn: reader.read_u32()?,
            stream_id: reader.read_u16()?,
            stream_seq: reader.read_u16()?,
            ppid: reader.read_u32()?,
            data: reader.rest().to_vec(),
        })
    }
}

/// INIT and INIT-ACK share one layout
///
/// ```text
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Initiate Tag                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           Advertised Receiver Window Credit (a_rwnd)          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Number of Outbound Streams   |  Number of Inbound Streams    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          Initial TSN                          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// \              Optional/Variable-Length Parameters              \
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitChunk {
    /// Initiate Tag
    pub initiate_tag: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Number of outbound streams
    pub num_outbound_streams: u16,
    /// Number of inbound streams
    pub num_inbound_streams: u16,
    /// Initial TSN
    pub initial_tsn: u32,
    /// Optional/variable-length parameters, unknown types included
    pub params: Vec<Parameter>,
}

impl InitChunk {
    pub fn new(
        initiate_tag: u32,
        a_rwnd: u32,
        num_outbound_streams: u16,
        num_inbound_streams: u16,
        initial_tsn: u32,
    ) -> Self {
        Self {
            initiate_tag,
            a_rwnd,
            num_outbound_streams,
            num_inbound_streams,
            initial_tsn,
            params: Vec::new(),
        }
    }

    /// The State Cookie parameter value, if present (INIT-ACK only)
    pub fn state_cookie(&self) -> Option<&[u8]> {
        self.params.iter().find_map(|param| match param {
            Parameter::StateCookie(cookie) => Some(cookie.as_slice()),
            _ => None,
        })
    }

    fn write_body(&self, writer: &mut ByteWriter) {
        writer.put_u32(self.initiate_tag);
        writer.put_u32(self.a_rwnd);
        writer.put_u16(self.num_outbound_streams);
        writer.put_u16(self.num_inbound_streams);
        writer.put_u32(self.initial_tsn);
        write_parameters(writer, &self.params);
    }

    fn parse(body: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(body, "INIT chunk");
        Ok(Self {
            initiate_tag: reader.read_u32()?,
            a_rwnd: reader.read_u32()?,
            num_outbound_streams: reader.read_u16()?,
            num_inbound_streams: reader.read_u16()?,
            initial_tsn: reader.read_u32()?,
            params: parse_parameters(reader.rest())?,
        })
    }
}

/// SACK chunk for selective acknowledgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SackChunk {
    /// Cumulative TSN Ack
    pub cumulative_tsn: u32,
    /// Advertised Receiver Window Credit
    pub a_rwnd: u32,
    /// Gap Ack Blocks as (start, end) offsets from the cumulative TSN
    pub gap_ack_blocks: Vec<(u16, u16)>,
    /// Duplicate TSNs
    pub duplicate_tsns: Vec<u32>,
}

impl SackChunk {
    /// Create new SACK chunk
    pub fn new(cumulative_tsn: u32, a_rwnd: u32) -> Self {
        Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks: Vec::new(),
            duplicate_tsns: Vec::new(),
        }
    }

    /// Encoded size of a SACK carrying `entries` gap blocks and duplicates
    pub fn len_for(entries: usize) -> usize {
        CHUNK_HEADER_SIZE + 12 + 4 * entries
    }

    pub fn encoded_len(&self) -> usize {
        Self::len_for(self.gap_ack_blocks.len() + self.duplicate_tsns.len())
    }

    // Counts fit in u16 once `Chunk::to_bytes` has checked the total length
    fn write_body(&self, writer: &mut ByteWriter) {
        writer.put_u32(self.cumulative_tsn);
        writer.put_u32(self.a_rwnd);
        writer.put_u16(self.gap_ack_blocks.len() as u16);
        writer.put_u16(self.duplicate_tsns.len() as u16);

        for (start, end) in &self.gap_ack_blocks {
            writer.put_u16(*start);
            writer.put_u16(*end);
        }

        for tsn in &self.duplicate_tsns {
            writer.put_u32(*tsn);
        }
    }

    fn parse(body: &[u8]) -> Result<Self, FormatError> {
        let mut reader = ByteReader::new(body, "SACK chunk");
        let cumulative_tsn = reader.read_u32()?;
        let a_rwnd = reader.read_u32()?;
        let num_gap_blocks = reader.read_u16()? as usize;
        let num_dup_tsns = reader.read_u16()? as usize;

        let expected = 12 + 4 * (num_gap_blocks + num_dup_tsns);
        if body.len() != expected {
            return Err(FormatError::LengthMismatch {
                what: "SACK chunk",
                declared: CHUNK_HEADER_SIZE + body.len(),
                actual: CHUNK_HEADER_SIZE + expected,
            });
        }

        let mut gap_ack_blocks = Vec::with_capacity(num_gap_blocks);
        for _ in 0..num_gap_blocks {
            gap_ack_blocks.push((reader.read_u16()?, reader.read_u16()?));
        }

        let mut duplicate_tsns = Vec::with_capacity(num_dup_tsns);
        for _ in 0..num_dup_tsns {
            duplicate_tsns.push(reader.read_u32()?);
        }

        Ok(Self {
            cumulative_tsn,
            a_rwnd,
            gap_ack_blocks,
            duplicate_tsns,
        })
    }
}

/// HEARTBEAT and HEARTBEAT-ACK body: one Heartbeat Info TLV whose
/// sender-specific content is echoed back unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatChunk {
    pub info: Vec<u8>,
}

impl HeartbeatChunk {
    fn parse(body: &[u8]) -> Result<Self, FormatError> {
        let tlvs = read_tlvs(body, "heartbeat info")?;
        match tlvs.first() {
            Some(tlv) if tlv.tlv_type == param_type::HEARTBEAT_INFO => Ok(Self {
                info: tlv.value.to_vec(),
            }),
            _ => Err(FormatError::InvalidParameter(
                "heartbeat without heartbeat info".to_string(),
            )),
        }
    }
}

/// Generic SCTP chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Data(DataChunk),
    Init(InitChunk),
    InitAck(InitChunk),
    Sack(SackChunk),
    Heartbeat(HeartbeatChunk),
    HeartbeatAck(HeartbeatChunk),
    /// `t_bit` set when the sender had no TCB and reflected our tag
    Abort {
        t_bit: bool,
        causes: Vec<ErrorCause>,
    },
    Shutdown {
        cumulative_tsn: u32,
    },
    ShutdownAck,
    Error {
        causes: Vec<ErrorCause>,
    },
    /// Cookie bytes exactly as received in the INIT-ACK State Cookie
    CookieEcho(Vec<u8>),
    CookieAck,
    EcnEcho {
        lowest_tsn: u32,
    },
    Cwr {
        lowest_tsn: u32,
    },
    ShutdownComplete {
        t_bit: bool,
    },
}

impl Chunk {
    pub fn chunk_type(&self) -> ChunkType {
        match self {
            Chunk::Data(_) => ChunkType::Data,
            Chunk::Init(_) => ChunkType::Init,
            Chunk::InitAck(_) => ChunkType::InitAck,
            Chunk::Sack(_) => ChunkType::Sack,
            Chunk::Heartbeat(_) => ChunkType::Heartbeat,
            Chunk::HeartbeatAck(_) => ChunkType::HeartbeatAck,
            Chunk::Abort { .. } => ChunkType::Abort,
            Chunk::Shutdown { .. } => ChunkType::Shutdown,
            Chunk::ShutdownAck => ChunkType::ShutdownAck,
            Chunk::Error { .. } => ChunkType::Error,
            Chunk::CookieEcho(_) => ChunkType::CookieEcho,
            Chunk::CookieAck => ChunkType::CookieAck,
            Chunk::EcnEcho { .. } => ChunkType::EcnEcho,
            Chunk::Cwr { .. } => ChunkType::Cwr,
            Chunk::ShutdownComplete { .. } => ChunkType::ShutdownComplete,
        }
    }

    /// Short RFC name, for logs
    pub fn name(&self) -> &'static str {
        match self.chunk_type() {
            ChunkType::Data => "DATA",
            ChunkType::Init => "INIT",
            ChunkType::InitAck => "INIT-ACK",
            ChunkType::Sack => "SACK",
            ChunkType::Heartbeat => "HEARTBEAT",
            ChunkType::HeartbeatAck => "HEARTBEAT-ACK",
            ChunkType::Abort => "ABORT",
            ChunkType::Shutdown => "SHUTDOWN",
            ChunkType::ShutdownAck => "SHUTDOWN-ACK",
            ChunkType::Error => "ERROR",
            ChunkType::CookieEcho => "COOKIE-ECHO",
            ChunkType::CookieAck => "COOKIE-ACK",
            ChunkType::EcnEcho => "ECNE",
            ChunkType::Cwr => "CWR",
            ChunkType::ShutdownComplete => "SHUTDOWN-COMPLETE",
        }
    }

    fn flags(&self) -> u8 {
        match self {
            Chunk::Data(data) => data.flags(),
            Chunk::Abort { t_bit: true, .. } | Chunk::ShutdownComplete { t_bit: true } => FLAG_T,
            _ => 0,
        }
    }

    fn write_body(&self, writer: &mut ByteWriter) {
        match self {
            Chunk::Data(data) => data.write_body(writer),
            Chunk::Init(init) | Chunk::InitAck(init) => init.write_body(writer),
            Chunk::Sack(sack) => sack.write_body(writer),
            Chunk::Heartbeat(hb) | Chunk::HeartbeatAck(hb) => {
                write_tlv(writer, param_type::HEARTBEAT_INFO, &hb.info);
            }
            Chunk::Abort { causes, .. } | Chunk::Error { causes } => {
                write_causes(writer, causes);
            }
            Chunk::Shutdown { cumulative_tsn } => writer.put_u32(*cumulative_tsn),
            Chunk::EcnEcho { lowest_tsn } | Chunk::Cwr { lowest_tsn } => {
                writer.put_u32(*lowest_tsn)
            }
            Chunk::CookieEcho(cookie) => writer.put_bytes(cookie),
            Chunk::ShutdownAck | Chunk::CookieAck | Chunk::ShutdownComplete { .. } => {}
        }
    }

    /// Value of the chunk length field: header and body, without the
    /// trailing padding.
    pub fn encoded_len(&self) -> usize {
        let body = match self {
            Chunk::Data(data) => DATA_CHUNK_HEADER_SIZE - CHUNK_HEADER_SIZE + data.data.len(),
            Chunk::Init(init) | Chunk::InitAck(init) => {
                16 + tlv_list_len(init.params.iter().map(Parameter::value_len))
            }
            Chunk::Sack(sack) => return sack.encoded_len(),
            Chunk::Heartbeat(hb) | Chunk::HeartbeatAck(hb) => 4 + hb.info.len(),
            Chunk::Abort { causes, .. } | Chunk::Error { causes } => {
                tlv_list_len(causes.iter().map(ErrorCause::body_len))
            }
            Chunk::Shutdown { .. } | Chunk::EcnEcho { .. } | Chunk::Cwr { .. } => 4,
            Chunk::CookieEcho(cookie) => cookie.len(),
            Chunk::ShutdownAck | Chunk::CookieAck | Chunk::ShutdownComplete { .. } => 0,
        };
        CHUNK_HEADER_SIZE + body
    }

    /// Size on the wire, padded to a 4-byte boundary
    pub fn padded_len(&self) -> usize {
        padded_len(self.encoded_len())
    }

    /// Serialize chunk to bytes, padded to a 4-byte boundary.
    ///
    /// Fails when the chunk length would not fit its 16-bit field.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let length = self.encoded_len();
        let declared = u16::try_from(length).map_err(|_| FormatError::TooLarge {
            what: self.name(),
            length,
        })?;

        let mut writer = ByteWriter::with_capacity(padded_len(length));
        writer.put_u8(self.chunk_type() as u8);
        writer.put_u8(self.flags());
        writer.put_u16(declared);

        self.write_body(&mut writer);
        writer.pad();
        debug_assert_eq!(writer.len(), padded_len(length), "{} size", self.name());

        Ok(writer.into_inner())
    }

    /// Parse one chunk from the start of `data`.
    ///
    /// Returns the chunk and the number of bytes it occupies including
    /// padding (clamped to what is available).
    pub fn decode(data: &[u8]) -> Result<(Self, usize), FormatError> {
        let header = ChunkHeader::parse(data)?;
        let length = header.length as usize;

        if length < CHUNK_HEADER_SIZE {
            return Err(FormatError::InvalidLength {
                what: "chunk",
                length,
            });
        }
        if length > data.len() {
            return Err(FormatError::TooShort {
                what: "chunk",
                needed: length,
                available: data.len(),
            });
        }

        let body = &data[CHUNK_HEADER_SIZE..length];
        let consumed = padded_len(length).min(data.len());

        let Some(chunk_type) = ChunkType::from_u8(header.chunk_type) else {
            return Err(FormatError::UnrecognizedChunkType {
                chunk_type: header.chunk_type,
                chunk: data[..length].to_vec(),
            });
        };

        let chunk = match chunk_type {
            ChunkType::Data => {
                min_body("DATA chunk", body, DATA_CHUNK_HEADER_SIZE - CHUNK_HEADER_SIZE)?;
                Chunk::Data(DataChunk::parse(header.flags, body)?)
            }
            ChunkType::Init => Chunk::Init(InitChunk::parse(body)?),
            ChunkType::InitAck => Chunk::InitAck(InitChunk::parse(body)?),
            ChunkType::Sack => Chunk::Sack(SackChunk::parse(body)?),
            ChunkType::Heartbeat => Chunk::Heartbeat(HeartbeatChunk::parse(body)?),
            ChunkType::HeartbeatAck => Chunk::HeartbeatAck(HeartbeatChunk::parse(body)?),
            ChunkType::Abort => Chunk::Abort {
                t_bit: header.flags & FLAG_T != 0,
                causes: parse_causes(body)?,
            },
            ChunkType::Shutdown => Chunk::Shutdown {
                cumulative_tsn: fixed_u32("SHUTDOWN", body)?,
            },
            ChunkType::ShutdownAck => {
                exact_body("SHUTDOWN-ACK", body, 0)?;
                Chunk::ShutdownAck
            }
            ChunkType::Error => Chunk::Error {
                causes: parse_causes(body)?,
            },
            ChunkType::CookieEcho => {
                if body.len() != COOKIE_SIZE {
                    return Err(FormatError::BadCookieLength {
                        expected: COOKIE_SIZE,
                        actual: body.len(),
                    });
                }
                Chunk::CookieEcho(body.to_vec())
            }
            ChunkType::CookieAck => {
                exact_body("COOKIE-ACK", body, 0)?;
                Chunk::CookieAck
            }
            ChunkType::EcnEcho => Chunk::EcnEcho {
                lowest_tsn: fixed_u32("ECNE", body)?,
            },
            ChunkType::Cwr => Chunk::Cwr {
                lowest_tsn: fixed_u32("CWR", body)?,
            },
            ChunkType::ShutdownComplete => {
                exact_body("SHUTDOWN-COMPLETE", body, 0)?;
                Chunk::ShutdownComplete {
                    t_bit: header.flags & FLAG_T != 0,
                }
            }
        };

        Ok((chunk, consumed))
    }

    /// Parse chunk from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Self::decode(data).map(|(chunk, _)| chunk)
    }
}

fn min_body(what: &'static str, body: &[u8], needed: usize) -> Result<(), FormatError> {
    if body.len() < needed {
        return Err(FormatError::TooShort {
            what,
            needed: CHUNK_HEADER_SIZE + needed,
            available: CHUNK_HEADER_SIZE + body.len(),
        });
    }
    Ok(())
}

fn exact_body(what: &'static str, body: &[u8], expected: usize) -> Result<(), FormatError> {
    if body.len() != expected {
        return Err(FormatError::LengthMismatch {
            what,
            declared: CHUNK_HEADER_SIZE + body.len(),
            actual: CHUNK_HEADER_SIZE + expected,
        });
    }
    Ok(())
}

fn fixed_u32(what: &'static str, body: &[u8]) -> Result<u32, FormatError> {
    exact_body(what, body, 4)?;
    ByteReader::new(body, what).read_u32()
}
