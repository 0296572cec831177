//! Configuration for vtcon.
//!
//! Read once at startup from `$VTCON_CONFIG`, or `/etc/vtcon.toml` when the
//! variable is unset. A missing file means defaults; a file that exists
//! but cannot be read or parsed stops startup. Every field is optional:
//!
//! ```toml
//! [session]
//! program = "/usr/bin/login"
//! args = []
//! term = "linux"
//!
//! [devices]
//! keyboard = "/dev/ps2keyboard"
//! speaker = "/dev/pcspeaker"
//!
//! [bell]
//! frequency = 1000
//! duration_ms = 100
//!
//! # Used only when the host display size cannot be queried
//! [display]
//! cols = 80
//! rows = 25
//!
//! [log]
//! path = "/var/log/vtcon.log"
//! level = "info"
//! ```

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::pty::SessionCommand;
use crate::mux::BellTone;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "VTCON_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "/etc/vtcon.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub devices: DeviceConfig,
    pub bell: BellConfig,
    pub display: DisplayConfig,
    pub log: LogConfig,
}

/// Program started in each virtual terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// `TERM` for the session
    pub term: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/login"),
            args: Vec::new(),
            term: "linux".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub keyboard: PathBuf,
    pub speaker: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            keyboard: PathBuf::from("/dev/ps2keyboard"),
            speaker: PathBuf::from("/dev/pcspeaker"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BellConfig {
    /// Hz
    pub frequency: u32,
    pub duration_ms: u64,
}

impl Default for BellConfig {
    fn default() -> Self {
        Self {
            frequency: 1000,
            duration_ms: 100,
        }
    }
}

/// Fallback geometry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub cols: u16,
    pub rows: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { cols: 80, rows: 25 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
    /// `tracing` filter directive, overridden by `VTCON_LOG`
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/vtcon.log"),
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::get_config_path())
    }

    /// Load configuration from `path`, using defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read { path: path.to_path_buf(), source });
            }
        };
        toml::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Get config file path
    pub fn get_config_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn session_command(&self) -> SessionCommand {
        SessionCommand {
            program: self.session.program.clone(),
            args: self.session.args.iter().map(OsString::from).collect(),
            term: self.session.term.clone(),
        }
    }

    pub fn bell_tone(&self) -> BellTone {
        BellTone {
            frequency: self.bell.frequency,
            duration: Duration::from_millis(self.bell.duration_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.bell_tone(), BellTone::default());
        assert_eq!(config.session_command().program, PathBuf::from("/usr/bin/login"));
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [session]
            program = "/bin/sh"
            args = ["-l"]

            [bell]
            duration_ms = 250
            "#,
        )
        .unwrap();

        let command = config.session_command();
        assert_eq!(command.program, PathBuf::from("/bin/sh"));
        assert_eq!(command.args, vec![OsString::from("-l")]);
        assert_eq!(command.term, "linux");
        assert_eq!(
            config.bell_tone(),
            BellTone { frequency: 1000, duration: Duration::from_millis(250) }
        );
        assert_eq!(config.devices, DeviceConfig::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("vtcon-test-does-not-exist.toml");
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("vtcon-test-{}.toml", std::process::id()));
        fs::write(&path, "[bell]\nfrequency = \"loud\"\n").unwrap();
        let result = Config::load_from(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
