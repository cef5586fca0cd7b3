//! Error types for logging operations.

use std::fmt;
use std::io;

/// Result type for logging operations.
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Errors that can occur while setting up a log sink.
#[derive(Debug)]
pub enum LoggingError {
    /// The log file could not be opened or created.
    Io(io::Error),
    /// The configured log destination is unusable.
    Sink(String),
    /// A level name that matches no [`crate::LogLevel`].
    UnknownLevel(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::Io(err) => write!(f, "Log file error: {}", err),
            LoggingError::Sink(msg) => write!(f, "Log sink error: {}", msg),
            LoggingError::UnknownLevel(name) => write!(f, "Unknown log level: {}", name),
        }
    }
}

impl std::error::Error for LoggingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoggingError::Io(err) => Some(err),
            LoggingError::Sink(_) | LoggingError::UnknownLevel(_) => None,
        }
    }
}

impl From<io::Error> for LoggingError {
    fn from(err: io::Error) -> Self {
        LoggingError::Io(err)
    }
}
