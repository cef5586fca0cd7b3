//! # Config Loader
//!
//! Locates configuration files on disk and turns their JSON content into
//! typed configuration structs.
//!
//! ```no_run
//! use config_loader::{find_config_file, load_json};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct EndpointConfig {
//!     local_port: u16,
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = find_config_file("sctp.json")?;
//!     let config: EndpointConfig = load_json(&path)?;
//!     println!("binding port {}", config.local_port);
//!     Ok(())
//! }
//! ```

pub mod error;

pub use error::{ConfigError, Result};

use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration search path.
pub const CONFIG_PATH_ENV: &str = "SCTP_CONFIG_PATH";

/// Reads a configuration file and returns its raw content.
pub fn load_config_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))
}

/// Reads a JSON configuration file into `T`.
///
/// Fields missing from the file are handled by `T`'s own serde defaults.
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = load_config_file(path)?;
    parse_json(&content)
}

/// Parses JSON configuration text into `T`.
pub fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(serde_json::from_str(content)?)
}

/// Searches common locations for a configuration file.
///
/// Search order:
/// 1. `SCTP_CONFIG_PATH` environment variable (if set and the file exists)
/// 2. `./config/{filename}`
/// 3. `./{filename}`
pub fn find_config_file(filename: &str) -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let path_buf = PathBuf::from(&path);
        if path_buf.exists() {
            return Ok(path_buf);
        }
    }

    let config_dir = PathBuf::from("./config").join(filename);
    if config_dir.exists() {
        return Ok(config_dir);
    }

    let current_dir = PathBuf::from("./").join(filename);
    if current_dir.exists() {
        return Ok(current_dir);
    }

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found. Searched: {} env var, ./config/{}, ./{}",
        filename, CONFIG_PATH_ENV, filename, filename
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Ports {
        local_port: u16,
        #[serde(default)]
        remote_port: u16,
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = load_config_file("/path/that/does/not/exist.json");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_find_nonexistent_file() {
        let result = find_config_file("file_that_definitely_does_not_exist_12345.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_json_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "local_port": 5000, "remote_port": 5001 }}"#).unwrap();

        let ports: Ports = load_json(file.path()).unwrap();
        assert_eq!(
            ports,
            Ports {
                local_port: 5000,
                remote_port: 5001
            }
        );
    }

    #[test]
    fn test_parse_json_reports_bad_content() {
        let result: Result<Ports> = parse_json("{ \"local_port\": \"not a number\" }");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
