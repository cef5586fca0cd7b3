//! Error causes carried inside ABORT and ERROR chunks (RFC 4960 section 3.3.10)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Cause Code          |       Cause Length            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! /                    Cause-Specific Information                 /
//! \                                                               \
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The cause length is always recomputed from the body on encode.

use super::param::{Parameter, parse_address};
use super::primitives::{ByteReader, ByteWriter, Tlv, padded_len, read_tlvs, write_tlv};
use crate::error::FormatError;

/// Cause codes
pub mod cause_code {
    pub const INVALID_STREAM_IDENTIFIER: u16 = 1;
    pub const MISSING_MANDATORY_PARAMETER: u16 = 2;
    pub const STALE_COOKIE: u16 = 3;
    pub const OUT_OF_RESOURCE: u16 = 4;
    pub const UNRESOLVABLE_ADDRESS: u16 = 5;
    pub const UNRECOGNIZED_CHUNK_TYPE: u16 = 6;
    pub const INVALID_MANDATORY_PARAMETER: u16 = 7;
    pub const UNRECOGNIZED_PARAMETERS: u16 = 8;
    pub const NO_USER_DATA: u16 = 9;
    pub const COOKIE_RECEIVED_WHILE_SHUTTING_DOWN: u16 = 10;
    pub const RESTART_WITH_NEW_ADDRESSES: u16 = 11;
    pub const USER_INITIATED_ABORT: u16 = 12;
    pub const PROTOCOL_VIOLATION: u16 = 13;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCause {
    /// DATA received for a stream that does not exist
    InvalidStreamIdentifier(u16),
    /// Mandatory parameter types missing from an INIT or INIT-ACK
    MissingMandatoryParameter(Vec<u16>),
    /// Cookie arrived past its lifetime; staleness in microseconds
    StaleCookie { staleness_us: u32 },
    OutOfResource,
    /// One IPv4, IPv6 or host name address TLV
    UnresolvableAddress(Parameter),
    /// The complete chunk that was not understood
    UnrecognizedChunkType(Vec<u8>),
    InvalidMandatoryParameter,
    /// The raw parameter TLVs that were not understood
    UnrecognizedParameters(Vec<u8>),
    NoUserData { tsn: u32 },
    CookieReceivedWhileShuttingDown,
    /// Addresses added by a peer restarting the association
    RestartWithNewAddresses(Vec<Parameter>),
    /// Reason supplied by the upper layer
    UserInitiatedAbort(Vec<u8>),
    /// Free-form description of the violation
    ProtocolViolation(Vec<u8>),
    Unknown { code: u16, value: Vec<u8> },
}

impl ErrorCause {
    pub fn code(&self) -> u16 {
        match self {
            ErrorCause::InvalidStreamIdentifier(_) => cause_code::INVALID_STREAM_IDENTIFIER,
            ErrorCause::MissingMandatoryParameter(_) => cause_code::MISSING_MANDATORY_PARAMETER,
            ErrorCause::StaleCookie { .. } => cause_code::STALE_COOKIE,
            ErrorCause::OutOfResource => cause_code::OUT_OF_RESOURCE,
            ErrorCause::UnresolvableAddress(_) => cause_code::UNRESOLVABLE_ADDRESS,
            ErrorCause::UnrecognizedChunkType(_) => cause_code::UNRECOGNIZED_CHUNK_TYPE,
            ErrorCause::InvalidMandatoryParameter => cause_code::INVALID_MANDATORY_PARAMETER,
            ErrorCause::UnrecognizedParameters(_) => cause_code::UNRECOGNIZED_PARAMETERS,
            ErrorCause::NoUserData { .. } => cause_code::NO_USER_DATA,
            ErrorCause::CookieReceivedWhileShuttingDown => {
                cause_code::COOKIE_RECEIVED_WHILE_SHUTTING_DOWN
            }
            ErrorCause::RestartWithNewAddresses(_) => cause_code::RESTART_WITH_NEW_ADDRESSES,
            ErrorCause::UserInitiatedAbort(_) => cause_code::USER_INITIATED_ABORT,
            ErrorCause::ProtocolViolation(_) => cause_code::PROTOCOL_VIOLATION,
            ErrorCause::Unknown { code, .. } => *code,
        }
    }

    pub fn protocol_violation(description: &str) -> Self {
        ErrorCause::ProtocolViolation(description.as_bytes().to_vec())
    }

    fn body(&self) -> Vec<u8> {
        let mut writer = ByteWriter::default();
        match self {
            ErrorCause::InvalidStreamIdentifier(stream_id) => {
                writer.put_u16(*stream_id);
                writer.put_u16(0); // reserved
            }
            ErrorCause::MissingMandatoryParameter(missing) => {
                writer.put_u32(missing.len() as u32);
                for param_type in missing {
                    writer.put_u16(*param_type);
                }
            }
            ErrorCause::StaleCookie { staleness_us } => writer.put_u32(*staleness_us),
            ErrorCause::OutOfResource
            | ErrorCause::InvalidMandatoryParameter
            | ErrorCause::CookieReceivedWhileShuttingDown => {}
            ErrorCause::UnresolvableAddress(address) => {
                // Nested TLV keeps its own padding out of the cause length
                let bytes = address.to_bytes();
                let unpadded = 4 + address_value_len(&bytes);
                writer.put_bytes(&bytes[..unpadded]);
            }
            ErrorCause::RestartWithNewAddresses(addresses) => {
                for address in addresses {
                    address.encode(&mut writer);
                }
            }
            ErrorCause::NoUserData { tsn } => writer.put_u32(*tsn),
            ErrorCause::UnrecognizedChunkType(raw)
            | ErrorCause::UnrecognizedParameters(raw)
            | ErrorCause::UserInitiatedAbort(raw)
            | ErrorCause::ProtocolViolation(raw)
            | ErrorCause::Unknown { value: raw, .. } => writer.put_bytes(raw),
        }
        writer.into_inner()
    }

    /// Size of the body as encoded, without header or padding
    pub fn body_len(&self) -> usize {
        match self {
            ErrorCause::InvalidStreamIdentifier(_)
            | ErrorCause::StaleCookie { .. }
            | ErrorCause::NoUserData { .. } => 4,
            ErrorCause::MissingMandatoryParameter(missing) => 4 + 2 * missing.len(),
            ErrorCause::OutOfResource
            | ErrorCause::InvalidMandatoryParameter
            | ErrorCause::CookieReceivedWhileShuttingDown => 0,
            ErrorCause::UnresolvableAddress(address) => 4 + address.value_len(),
            ErrorCause::RestartWithNewAddresses(addresses) => addresses
                .iter()
                .map(|address| padded_len(4 + address.value_len()))
                .sum(),
            ErrorCause::UnrecognizedChunkType(raw)
            | ErrorCause::UnrecognizedParameters(raw)
            | ErrorCause::UserInitiatedAbort(raw)
            | ErrorCause::ProtocolViolation(raw)
            | ErrorCause::Unknown { value: raw, .. } => raw.len(),
        }
    }

    /// Writes header, body and padding.
    pub fn encode(&self, writer: &mut ByteWriter) {
        write_tlv(writer, self.code(), &self.body());
    }

    /// Decodes one cause TLV.
    pub fn decode(tlv: &Tlv<'_>) -> Result<Self, FormatError> {
        let value = tlv.value;
        let mut reader = ByteReader::new(value, "error cause");

        let cause = match tlv.tlv_type {
            cause_code::INVALID_STREAM_IDENTIFIER => {
                let stream_id = reader.read_u16()?;
                let _reserved = reader.read_u16()?;
                ErrorCause::InvalidStreamIdentifier(stream_id)
            }
            cause_code::MISSING_MANDATORY_PARAMETER => {
                let count = reader.read_u32()? as usize;
                if reader.remaining() != count * 2 {
                    return Err(FormatError::InvalidCause(format!(
                        "missing parameter count {} does not match {} bytes of types",
                        count,
                        reader.remaining()
                    )));
                }
                let mut missing = Vec::with_capacity(count);
                for _ in 0..count {
                    missing.push(reader.read_u16()?);
                }
                ErrorCause::MissingMandatoryParameter(missing)
            }
            cause_code::STALE_COOKIE => ErrorCause::StaleCookie {
                staleness_us: reader.read_u32()?,
            },
            cause_code::OUT_OF_RESOURCE => ErrorCause::OutOfResource,
            cause_code::INVALID_MANDATORY_PARAMETER => ErrorCause::InvalidMandatoryParameter,
            cause_code::COOKIE_RECEIVED_WHILE_SHUTTING_DOWN => {
                ErrorCause::CookieReceivedWhileShuttingDown
            }
            cause_code::UNRESOLVABLE_ADDRESS => {
                let tlvs = read_tlvs(value, "unresolvable address")?;
                match tlvs.as_slice() {
                    [address] => ErrorCause::UnresolvableAddress(parse_address(address)?),
                    _ => {
                        return Err(FormatError::InvalidCause(format!(
                            "unresolvable address carries {} TLVs, expected 1",
                            tlvs.len()
                        )));
                    }
                }
            }
            cause_code::RESTART_WITH_NEW_ADDRESSES => {
                let addresses = read_tlvs(value, "new address")?
                    .iter()
                    .map(parse_address)
                    .collect::<Result<Vec<_>, _>>()?;
                ErrorCause::RestartWithNewAddresses(addresses)
            }
            cause_code::NO_USER_DATA => ErrorCause::NoUserData {
                tsn: reader.read_u32()?,
            },
            cause_code::UNRECOGNIZED_CHUNK_TYPE => ErrorCause::UnrecognizedChunkType(value.to_vec()),
            cause_code::UNRECOGNIZED_PARAMETERS => {
                ErrorCause::UnrecognizedParameters(value.to_vec())
            }
            cause_code::USER_INITIATED_ABORT => ErrorCause::UserInitiatedAbort(value.to_vec()),
            cause_code::PROTOCOL_VIOLATION => ErrorCause::ProtocolViolation(value.to_vec()),
            code => ErrorCause::Unknown {
                code,
                value: value.to_vec(),
            },
        };
        Ok(cause)
    }
}

/// Value length of an encoded parameter, read back from its header.
fn address_value_len(encoded: &[u8]) -> usize {
    u16::from_be_bytes([encoded[2], encoded[3]]) as usize - 4
}

/// Decodes a single cause from the start of `data`.
pub fn decode_cause(data: &[u8]) -> Result<ErrorCause, FormatError> {
    let tlvs = read_tlvs(data, "error cause")?;
    match tlvs.first() {
        Some(tlv) => ErrorCause::decode(tlv),
        None => Err(FormatError::TooShort {
            what: "error cause",
            needed: 4,
            available: data.len(),
        }),
    }
}

/// Encodes a single cause, padded to 4 bytes.
pub fn encode_cause(cause: &ErrorCause) -> Vec<u8> {
    let mut writer = ByteWriter::default();
    cause.encode(&mut writer);
    writer.into_inner()
}

/// Parses the cause list of an ABORT or ERROR chunk body.
pub fn parse_causes(data: &[u8]) -> Result<Vec<ErrorCause>, FormatError> {
    read_tlvs(data, "error cause")?
        .iter()
        .map(ErrorCause::decode)
        .collect()
}

/// Encodes `causes` back to back, each padded.
pub fn write_causes(writer: &mut ByteWriter, causes: &[ErrorCause]) {
    for cause in causes {
        cause.encode(writer);
    }
}
