//! Log sinks: the dedicated writer thread and the in-memory buffer.

use crate::error::Result;
use crate::log_message::LogMessage;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

/// Drains formatted messages into any byte sink on its own thread.
pub(crate) struct LogWriter {
    out: Box<dyn Write + Send>,
}

impl LogWriter {
    /// Opens (or creates) `log_path` in append mode.
    pub fn to_file(log_path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        Ok(Self::to_writer(Box::new(file)))
    }

    pub fn to_writer(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    /// Writes and flushes a message to the sink.
    fn write_message(&mut self, message: &LogMessage) {
        if let Err(e) = self.out.write_all(message.format().as_bytes()) {
            eprintln!("Error writing log: {}", e);
            return;
        }
        if let Err(e) = self.out.flush() {
            eprintln!("Error flushing log: {}", e);
        }
    }

    /// Runs the writer loop until every sender is dropped.
    pub fn run(mut self, receiver: Receiver<LogMessage>) {
        for message in receiver {
            self.write_message(&message);
        }
    }
}

/// Spawns a dedicated log writer thread.
pub(crate) fn spawn_writer_thread(writer: LogWriter, receiver: Receiver<LogMessage>) {
    std::thread::spawn(move || writer.run(receiver));
}

/// Shared in-memory record of formatted log lines.
///
/// Written synchronously by the logging call, so a test can inspect it
/// immediately after the code under test returns.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer {
    lines: Arc<Mutex<Vec<String>>>,
}

impl LogBuffer {
    pub(crate) fn push(&self, line: String) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }

    /// Snapshot of every line recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    /// True if any recorded line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::LogLevel;
    use std::fs;
    use std::sync::mpsc::channel;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_file_writer_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("sctp.log");

        assert!(LogWriter::to_file(&log_path).is_ok());
        assert!(log_path.exists());
    }

    #[test]
    fn test_writer_thread_drains_channel() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("sctp.log");
        let (sender, receiver) = channel();

        spawn_writer_thread(LogWriter::to_file(&log_path).unwrap(), receiver);

        sender
            .send(LogMessage::new(LogLevel::Debug, None, "Thread test".to_string()))
            .unwrap();
        drop(sender);

        thread::sleep(Duration::from_millis(100));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Thread test"));
    }

    #[test]
    fn test_log_buffer_records_and_clears() {
        let buffer = LogBuffer::default();
        let shared = buffer.clone();

        shared.push("stash full".to_string());
        assert!(buffer.contains("stash"));
        assert_eq!(buffer.lines().len(), 1);

        buffer.clear();
        assert!(shared.lines().is_empty());
    }
}
