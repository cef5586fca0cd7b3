//! Thread-safe logger implementation.
//!
//! This module provides the main [`Logger`] interface. File output never
//! blocks the caller: records are handed to a writer thread over a channel.

use crate::error::Result;
use crate::log_level::LogLevel;
use crate::log_message::LogMessage;
use crate::log_writer::{LogBuffer, LogWriter, spawn_writer_thread};
use std::path::PathBuf;
use std::sync::mpsc::{Sender, channel};

#[derive(Debug, Clone)]
enum Sink {
    Writer(Sender<LogMessage>),
    Memory(LogBuffer),
    Discard,
}

/// Thread-safe, non-blocking logger.
///
/// Cloneable instances (and those derived with [`Logger::for_component`])
/// share the same sink.
///
/// # Examples
///
/// ```no_run
/// use logging::{Logger, LogLevel};
///
/// let logger = Logger::new("sctp.log".into(), LogLevel::Info).unwrap();
/// logger.info("Association established");
/// let stream_logger = logger.for_component("Stream");
/// stream_logger.debug("Hole in chunk sequence");
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    sink: Sink,
    level: LogLevel,
    component: Option<String>,
    console_output: bool,
}

impl Logger {
    /// Creates a new file logger with a dedicated writer thread.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn new(log_path: PathBuf, level: LogLevel) -> Result<Self> {
        Self::with_component(log_path, level, None, false)
    }

    /// Creates a file logger tagged with a component name.
    ///
    /// # Arguments
    ///
    /// * `log_path` - Path to log file (created if it doesn't exist)
    /// * `level` - Minimum log level to record
    /// * `component` - Component or layer name (e.g., "Association", "Stream")
    /// * `console_output` - Echo every record to stdout as well
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or opened.
    pub fn with_component(
        log_path: PathBuf,
        level: LogLevel,
        component: Option<String>,
        console_output: bool,
    ) -> Result<Self> {
        let writer = LogWriter::to_file(&log_path)?;
        let (sender, receiver) = channel();
        spawn_writer_thread(writer, receiver);
        Ok(Logger {
            sink: Sink::Writer(sender),
            level,
            component,
            console_output,
        })
    }

    /// Creates a logger that records into memory.
    ///
    /// The returned [`LogBuffer`] observes every record this logger (and any
    /// logger derived from it) accepts.
    pub fn in_memory(level: LogLevel) -> (Self, LogBuffer) {
        let buffer = LogBuffer::default();
        let logger = Logger {
            sink: Sink::Memory(buffer.clone()),
            level,
            component: None,
            console_output: false,
        };
        (logger, buffer)
    }

    /// Creates a logger that drops every record.
    pub fn discard() -> Self {
        Logger {
            sink: Sink::Discard,
            level: LogLevel::Error,
            component: None,
            console_output: false,
        }
    }

    /// Derives a logger for another component, sharing sink and level.
    pub fn for_component(&self, component: &str) -> Self {
        Logger {
            sink: self.sink.clone(),
            level: self.level,
            component: Some(component.to_string()),
            console_output: self.console_output,
        }
    }

    /// Returns true if a record at `level` would be kept.
    pub fn enabled(&self, level: LogLevel) -> bool {
        !matches!(self.sink, Sink::Discard) && level >= self.level
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Logs an error message (always recorded unless discarding).
    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Filters by level and hands the message to the sink.
    fn log(&self, level: LogLevel, message: &str) {
        if !self.enabled(level) {
            return;
        }

        let msg = LogMessage::new(level, self.component.clone(), message.to_string());

        if self.console_output {
            print!("{}", msg.format());
        }

        match &self.sink {
            Sink::Writer(sender) => {
                let _ = sender.send(msg);
            }
            Sink::Memory(buffer) => buffer.push(msg.format()),
            Sink::Discard => {}
        }
    }
}
