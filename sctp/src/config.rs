//! Association configuration
//!
//! Loaded from JSON through `config_loader`; every field has a default so a
//! file only needs to name what it changes.

use crate::codec::SCTP_HEADER_SIZE;
use crate::codec::chunk::DATA_CHUNK_HEADER_SIZE;
use crate::error::{Result, SctpError};
use logging::{LogLevel, Logger, LoggingError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_file_path: String,
    pub log_level: String,
    pub enable_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_file_path: "sctp.log".to_string(),
            log_level: "info".to_string(),
            enable_console: false,
        }
    }
}

impl LoggingConfig {
    /// Open the configured log file and return a logger for `component`.
    pub fn build_logger(&self, component: &str) -> Result<Logger> {
        if self.log_file_path.trim().is_empty() {
            return Err(LoggingError::Sink("log_file_path is empty".to_string()).into());
        }
        let logger = Logger::with_component(
            PathBuf::from(&self.log_file_path),
            LogLevel::parse_lenient(&self.log_level),
            Some(component.to_string()),
            self.enable_console,
        )?;
        Ok(logger)
    }
}

/// SCTP association configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SctpConfig {
    /// Local port
    pub local_port: u16,
    /// Remote port
    pub remote_port: u16,
    /// Streams we offer to open towards the peer
    pub max_outbound_streams: u16,
    /// Streams we accept from the peer
    pub max_inbound_streams: u16,
    /// Advertised receiver window (a_rwnd)
    pub recv_window: u32,
    /// Largest packet `poll_send` produces
    pub mtu: usize,
    /// Largest user-data payload carried by one DATA chunk
    pub max_fragment_size: usize,
    /// Lifetime stamped into the cookies we mint
    pub cookie_lifetime_ms: u32,
    /// Bound on DATA chunks held across all stream stashes
    pub max_stash_chunks: usize,
    pub logging: LoggingConfig,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            local_port: 5000,
            remote_port: 5000,
            max_outbound_streams: 65535,
            max_inbound_streams: 65535,
            recv_window: 131072,
            mtu: 1200,
            max_fragment_size: 1024,
            cookie_lifetime_ms: 60_000,
            max_stash_chunks: 4096,
            logging: LoggingConfig::default(),
        }
    }
}

impl SctpConfig {
    /// Load configuration from a JSON file and validate it
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: SctpConfig = config_loader::load_json(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from JSON text and validate it
    pub fn from_json(content: &str) -> Result<Self> {
        let config: SctpConfig = config_loader::parse_json(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_outbound_streams == 0 || self.max_inbound_streams == 0 {
            return Err(invalid("stream counts must be at least 1"));
        }
        if self.mtu == 0 {
            return Err(invalid("mtu must be positive"));
        }
        if self.max_fragment_size == 0 {
            return Err(invalid("max_fragment_size must be positive"));
        }
        if SCTP_HEADER_SIZE + DATA_CHUNK_HEADER_SIZE + self.max_fragment_size > self.mtu {
            return Err(invalid(&format!(
                "max_fragment_size {} does not fit in mtu {}",
                self.max_fragment_size, self.mtu
            )));
        }
        if self.max_stash_chunks == 0 {
            return Err(invalid("max_stash_chunks must be positive"));
        }
        if self.cookie_lifetime_ms == 0 {
            return Err(invalid("cookie_lifetime_ms must be positive"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SctpError {
    SctpError::InvalidConfig(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = SctpConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.local_port, 5000);
        assert_eq!(config.recv_window, 131072);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SctpConfig::from_json(r#"{"local_port": 9899, "mtu": 1500}"#).unwrap();
        assert_eq!(config.local_port, 9899);
        assert_eq!(config.mtu, 1500);
        assert_eq!(config.remote_port, 5000);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_nested_logging_section() {
        let config =
            SctpConfig::from_json(r#"{"logging": {"log_level": "debug"}}"#).unwrap();
        assert_eq!(config.logging.log_level, "debug");
        assert_eq!(config.logging.log_file_path, "sctp.log");
    }

    #[test]
    fn test_fragment_must_fit_mtu() {
        let config = SctpConfig {
            mtu: 100,
            max_fragment_size: 80,
            ..SctpConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SctpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_streams_rejected() {
        let config = SctpConfig {
            max_inbound_streams: 0,
            ..SctpConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_stash_rejected() {
        let result = SctpConfig::from_json(r#"{"max_stash_chunks": 0}"#);
        assert!(matches!(result, Err(SctpError::InvalidConfig(_))));
    }

    #[test]
    fn test_malformed_json() {
        let result = SctpConfig::from_json("{ not json");
        assert!(matches!(result, Err(SctpError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"remote_port": 6000, "max_stash_chunks": 16}}"#).unwrap();

        let config = SctpConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.remote_port, 6000);
        assert_eq!(config.max_stash_chunks, 16);
    }

    #[test]
    fn test_load_missing_file() {
        let result = SctpConfig::load_from_file("/nonexistent/sctp.json");
        assert!(matches!(result, Err(SctpError::Config(_))));
    }

    #[test]
    fn test_build_logger_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assoc.log");
        let logging = LoggingConfig {
            log_file_path: path.display().to_string(),
            ..LoggingConfig::default()
        };

        let logger = logging.build_logger("Association").unwrap();
        logger.info("ready");
        assert!(path.exists());
    }

    #[test]
    fn test_build_logger_empty_path() {
        let logging = LoggingConfig {
            log_file_path: String::new(),
            ..LoggingConfig::default()
        };
        assert!(matches!(
            logging.build_logger("Association"),
            Err(SctpError::Logging(LoggingError::Sink(_)))
        ));
    }
}
