//! SCTP error types
//!
//! `FormatError` covers everything the codec can reject on the wire,
//! `SctpError` wraps it together with configuration, logging and API misuse.

pub use crate::association::CookieError;
pub use config_loader::ConfigError;
pub use logging::LoggingError;
use std::fmt;

pub type Result<T> = std::result::Result<T, SctpError>;

/// Wire-format errors produced while decoding chunks, parameters and causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Fewer bytes than the structure requires
    TooShort {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    /// A length field smaller than its own header
    InvalidLength { what: &'static str, length: usize },
    /// Declared length does not match the bytes the body consumed
    LengthMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },
    /// COOKIE-ECHO payload is not exactly one state cookie
    BadCookieLength { expected: usize, actual: usize },
    /// Malformed TLV parameter
    InvalidParameter(String),
    /// Malformed error cause
    InvalidCause(String),
    /// Chunk type this implementation does not know; carries the raw chunk
    UnrecognizedChunkType { chunk_type: u8, chunk: Vec<u8> },
    /// Encoded length would not fit the 16-bit length field
    TooLarge { what: &'static str, length: usize },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::TooShort {
                what,
                needed,
                available,
            } => write!(
                f,
                "{} too short: need {} bytes, have {}",
                what, needed, available
            ),
            FormatError::InvalidLength { what, length } => {
                write!(f, "{} has invalid length {}", what, length)
            }
            FormatError::LengthMismatch {
                what,
                declared,
                actual,
            } => write!(
                f,
                "{} length mismatch: declared {}, actual {}",
                what, declared, actual
            ),
            FormatError::BadCookieLength { expected, actual } => write!(
                f,
                "COOKIE-ECHO wrong length for our association: {} != {}",
                actual, expected
            ),
            FormatError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            FormatError::InvalidCause(msg) => write!(f, "Invalid error cause: {}", msg),
            FormatError::UnrecognizedChunkType { chunk_type, .. } => {
                write!(f, "Unrecognized chunk type: {}", chunk_type)
            }
            FormatError::TooLarge { what, length } => write!(
                f,
                "{} of {} bytes does not fit a 16-bit length field",
                what, length
            ),
        }
    }
}

impl std::error::Error for FormatError {}

/// SCTP-related errors
#[derive(Debug)]
pub enum SctpError {
    Format(FormatError),
    Cookie(CookieError),
    Config(ConfigError),
    InvalidConfig(String),
    Logging(LoggingError),
    /// Operation not allowed in the current association state
    InvalidState(String),
    /// Stream identifier outside the negotiated range
    InvalidStream(u16),
    /// Zero-length user message
    EmptyMessage,
    /// Message larger than the peer's advertised receive window
    MessageTooLarge { size: usize },
}

impl fmt::Display for SctpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SctpError::Format(err) => write!(f, "Format error: {}", err),
            SctpError::Cookie(err) => write!(f, "Cookie error: {}", err),
            SctpError::Config(err) => write!(f, "Config error: {}", err),
            SctpError::InvalidConfig(msg) => write!(f, "Config error: {}", msg),
            SctpError::Logging(err) => write!(f, "Logging error: {}", err),
            SctpError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            SctpError::InvalidStream(id) => write!(f, "Invalid stream identifier: {}", id),
            SctpError::EmptyMessage => write!(f, "Cannot send an empty message"),
            SctpError::MessageTooLarge { size } => {
                write!(f, "Message of {} bytes is too large", size)
            }
        }
    }
}

impl std::error::Error for SctpError {}

impl From<FormatError> for SctpError {
    fn from(err: FormatError) -> Self {
        SctpError::Format(err)
    }
}

impl From<CookieError> for SctpError {
    fn from(err: CookieError) -> Self {
        SctpError::Cookie(err)
    }
}

impl From<ConfigError> for SctpError {
    fn from(err: ConfigError) -> Self {
        SctpError::Config(err)
    }
}

impl From<LoggingError> for SctpError {
    fn from(err: LoggingError) -> Self {
        SctpError::Logging(err)
    }
}
