//! Configuration parsing and validation for wardend
//!
//! Supports TOML configuration with:
//! - Trading window definition (daily hour range in an IANA timezone)
//! - Bot subprocess command and working directory
//! - Supervisor timing overrides
//! - Validation with clear error messages

mod policy;
mod schema;

pub use policy::*;
pub use schema::*;

use std::path::Path;
use thiserror::Error;

/// Configuration errors. All of these are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("window start hour {start} must be earlier than end hour {end}")]
    WindowBounds { start: u8, end: u8 },

    #[error("hour {0} out of range, expected 0-23")]
    HourOutOfRange(u8),

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("bot command cannot be empty")]
    EmptyCommand,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let raw: RawConfig = toml::from_str(content)?;
    Config::from_raw(raw)
}
