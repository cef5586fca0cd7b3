//! Thread-safe logging library.
//!
//! Messages go to a file through a dedicated writer thread, to an in-memory
//! [`LogBuffer`], or nowhere at all.

pub mod error;
mod log_level;
mod log_message;
mod log_writer;
mod logger;

pub use error::{LoggingError, Result};
pub use log_level::LogLevel;
pub use log_writer::LogBuffer;
pub use logger::Logger;
