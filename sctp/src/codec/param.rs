//! Variable-length parameters carried by INIT, INIT-ACK and HEARTBEAT, and
//! the address TLVs nested inside error causes.
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |          Parameter Type       |       Parameter Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! \                                                               \
//! /                       Parameter Value                         /
//! \                                                               \
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::primitives::{ByteReader, ByteWriter, Tlv, read_tlvs, write_tlv};
use crate::error::FormatError;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Parameter type identifiers (RFC 4960 section 3.3.2 and 3.3.3)
pub mod param_type {
    pub const HEARTBEAT_INFO: u16 = 1;
    pub const IPV4_ADDRESS: u16 = 5;
    pub const IPV6_ADDRESS: u16 = 6;
    pub const STATE_COOKIE: u16 = 7;
    pub const UNRECOGNIZED_PARAMETER: u16 = 8;
    pub const COOKIE_PRESERVATIVE: u16 = 9;
    pub const HOST_NAME_ADDRESS: u16 = 11;
    pub const SUPPORTED_ADDRESS_TYPES: u16 = 12;
    pub const ECN_CAPABLE: u16 = 0x8000;
}

/// Upper-bit action for a parameter type this endpoint does not understand:
/// bit 0x4000 set means the sender wants it reported back.
pub fn report_if_unrecognized(param_type: u16) -> bool {
    param_type & 0x4000 != 0
}

/// A decoded TLV parameter.
///
/// Unknown types are preserved verbatim so a chunk survives a
/// decode/encode pass unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Ipv4Address(Ipv4Addr),
    Ipv6Address(Ipv6Addr),
    /// Opaque state cookie minted by the INIT-ACK sender
    StateCookie(Vec<u8>),
    /// An INIT parameter the peer did not understand, echoed as a raw TLV
    UnrecognizedParameter(Vec<u8>),
    /// Requested cookie lifespan increment in milliseconds
    CookiePreservative(u32),
    HostNameAddress(String),
    SupportedAddressTypes(Vec<u16>),
    EcnCapable,
    Unknown { param_type: u16, value: Vec<u8> },
}

impl Parameter {
    pub fn param_type(&self) -> u16 {
        match self {
            Parameter::Ipv4Address(_) => param_type::IPV4_ADDRESS,
            Parameter::Ipv6Address(_) => param_type::IPV6_ADDRESS,
            Parameter::StateCookie(_) => param_type::STATE_COOKIE,
            Parameter::UnrecognizedParameter(_) => param_type::UNRECOGNIZED_PARAMETER,
            Parameter::CookiePreservative(_) => param_type::COOKIE_PRESERVATIVE,
            Parameter::HostNameAddress(_) => param_type::HOST_NAME_ADDRESS,
            Parameter::SupportedAddressTypes(_) => param_type::SUPPORTED_ADDRESS_TYPES,
            Parameter::EcnCapable => param_type::ECN_CAPABLE,
            Parameter::Unknown { param_type, .. } => *param_type,
        }
    }

    /// True for the three address forms an UNRESOLVABLE ADDRESS cause may carry.
    pub fn is_address(&self) -> bool {
        matches!(
            self,
            Parameter::Ipv4Address(_) | Parameter::Ipv6Address(_) | Parameter::HostNameAddress(_)
        )
    }

    fn value(&self) -> Vec<u8> {
        match self {
            Parameter::Ipv4Address(addr) => addr.octets().to_vec(),
            Parameter::Ipv6Address(addr) => addr.octets().to_vec(),
            Parameter::StateCookie(cookie) => cookie.clone(),
            Parameter::UnrecognizedParameter(raw) => raw.clone(),
            Parameter::CookiePreservative(increment) => increment.to_be_bytes().to_vec(),
            Parameter::HostNameAddress(name) => {
                let mut value = name.as_bytes().to_vec();
                value.push(0);
                value
            }
            Parameter::SupportedAddressTypes(types) => {
                types.iter().flat_map(|t| t.to_be_bytes()).collect()
            }
            Parameter::EcnCapable => Vec::new(),
            Parameter::Unknown { value, .. } => value.clone(),
        }
    }

    /// Size of the value as encoded, without header or padding
    pub fn value_len(&self) -> usize {
        match self {
            Parameter::Ipv4Address(_) | Parameter::CookiePreservative(_) => 4,
            Parameter::Ipv6Address(_) => 16,
            Parameter::StateCookie(raw)
            | Parameter::UnrecognizedParameter(raw)
            | Parameter::Unknown { value: raw, .. } => raw.len(),
            Parameter::HostNameAddress(name) => name.len() + 1,
            Parameter::SupportedAddressTypes(types) => 2 * types.len(),
            Parameter::EcnCapable => 0,
        }
    }

    /// Encodes the parameter (header, value, padding) into `writer`.
    pub fn encode(&self, writer: &mut ByteWriter) {
        write_tlv(writer, self.param_type(), &self.value());
    }

    /// Serialize to bytes, padded to a 4-byte boundary
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::default();
        self.encode(&mut writer);
        writer.into_inner()
    }

    /// Decodes one TLV produced by [`read_tlvs`].
    pub fn decode(tlv: &Tlv<'_>) -> Result<Self, FormatError> {
        let value = tlv.value;
        let param = match tlv.tlv_type {
            param_type::IPV4_ADDRESS => {
                let octets: [u8; 4] = fixed_value(value, "IPv4 address")?;
                Parameter::Ipv4Address(Ipv4Addr::from(octets))
            }
            param_type::IPV6_ADDRESS => {
                let octets: [u8; 16] = fixed_value(value, "IPv6 address")?;
                Parameter::Ipv6Address(Ipv6Addr::from(octets))
            }
            param_type::STATE_COOKIE => Parameter::StateCookie(value.to_vec()),
            param_type::UNRECOGNIZED_PARAMETER => Parameter::UnrecognizedParameter(value.to_vec()),
            param_type::COOKIE_PRESERVATIVE => {
                let raw: [u8; 4] = fixed_value(value, "cookie preservative")?;
                Parameter::CookiePreservative(u32::from_be_bytes(raw))
            }
            param_type::HOST_NAME_ADDRESS => Parameter::HostNameAddress(decode_host_name(value)?),
            param_type::SUPPORTED_ADDRESS_TYPES => {
                if value.len() % 2 != 0 {
                    return Err(FormatError::InvalidParameter(format!(
                        "supported address types length {} is odd",
                        value.len()
                    )));
                }
                let mut reader = ByteReader::new(value, "supported address types");
                let mut types = Vec::with_capacity(value.len() / 2);
                while !reader.is_empty() {
                    types.push(reader.read_u16()?);
                }
                Parameter::SupportedAddressTypes(types)
            }
            param_type::ECN_CAPABLE => {
                if !value.is_empty() {
                    return Err(FormatError::InvalidParameter(
                        "ECN capable parameter carries a value".to_string(),
                    ));
                }
                Parameter::EcnCapable
            }
            other => Parameter::Unknown {
                param_type: other,
                value: value.to_vec(),
            },
        };
        Ok(param)
    }

    /// Parses a single parameter from the start of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        let tlvs = read_tlvs(data, "parameter")?;
        match tlvs.first() {
            Some(tlv) => Self::decode(tlv),
            None => Err(FormatError::TooShort {
                what: "parameter",
                needed: 4,
                available: data.len(),
            }),
        }
    }
}

fn fixed_value<const N: usize>(value: &[u8], what: &str) -> Result<[u8; N], FormatError> {
    value.try_into().map_err(|_| {
        FormatError::InvalidParameter(format!(
            "{} value is {} bytes, expected {}",
            what,
            value.len(),
            N
        ))
    })
}

fn decode_host_name(value: &[u8]) -> Result<String, FormatError> {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    let name = &value[..end];
    if !name.is_ascii() {
        return Err(FormatError::InvalidParameter(
            "host name is not ASCII".to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Parses a run of parameters, e.g. the tail of an INIT chunk.
pub fn parse_parameters(data: &[u8]) -> Result<Vec<Parameter>, FormatError> {
    read_tlvs(data, "parameter")?
        .iter()
        .map(Parameter::decode)
        .collect()
}

/// Parses one address TLV (IPv4, IPv6 or host name); any other type is an error.
///
/// Shared by the INIT parameter list and the UNRESOLVABLE ADDRESS cause.
pub fn parse_address(tlv: &Tlv<'_>) -> Result<Parameter, FormatError> {
    let param = Parameter::decode(tlv)?;
    if !param.is_address() {
        return Err(FormatError::InvalidParameter(format!(
            "parameter type {} is not an address",
            tlv.tlv_type
        )));
    }
    Ok(param)
}

/// Encodes `params` back to back, each padded.
pub fn write_parameters(writer: &mut ByteWriter, params: &[Parameter]) {
    for param in params {
        param.encode(writer);
    }
}
