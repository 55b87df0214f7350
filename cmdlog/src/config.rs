//! Device configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config:
//!
//! ```
//! use cmdlog::config::{DeviceConfig, TrailingBytes};
//!
//! let config = DeviceConfig::from_json(r#"{"capacity": 4, "delimiter": 59}"#).unwrap();
//! assert_eq!(config.capacity, 4);
//! assert_eq!(config.delimiter, b';');
//! assert_eq!(config.trailing_bytes, TrailingBytes::Discard);
//! ```

use serde::Deserialize;
use std::fmt;

use crate::ring::DEFAULT_CAPACITY;

/// What a write does with the bytes that follow the first delimiter of a chunk
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrailingBytes {
    /// Drop them and report only the bytes up to the delimiter as written
    #[default]
    Discard,
    /// Keep assembling: every terminated command in the chunk is stored and
    /// an unterminated tail stays pending
    Retain,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// Number of commands the ring log retains
    pub capacity: usize,
    /// Byte that terminates a command
    pub delimiter: u8,
    pub trailing_bytes: TrailingBytes,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            delimiter: b'\n',
            trailing_bytes: TrailingBytes::Discard,
        }
    }
}

/// Errors that can occur while loading a configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The config source could not be read
    Read(String),
    /// The JSON was malformed or had unknown fields
    Parse(serde_json::Error),
    /// The capacity must be at least one
    ZeroCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(msg) => write!(f, "Failed to read config: {msg}"),
            Self::Parse(e) => write!(f, "Failed to parse config JSON: {e}"),
            Self::ZeroCapacity => write!(f, "capacity must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(e) => Some(e),
            Self::Read(_) | Self::ZeroCapacity => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl DeviceConfig {
    /// Parse and validate a JSON config
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or a value is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config to the end of `reader`, then parse and validate it
    ///
    /// # Errors
    /// Returns an error if:
    /// - Reading fails
    /// - The JSON is invalid or has unknown fields
    /// - A value is out of range
    pub fn from_reader(mut reader: impl embedded_io::Read) -> Result<Self, ConfigError> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            match embedded_io::Read::read(&mut reader, &mut chunk) {
                Ok(0) => break,
                Ok(n) => buffer.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(ConfigError::Read(format!("{e:?}"))),
            }
        }

        let config: Self = serde_json::from_slice(&buffer)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::ZeroCapacity` if `capacity` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}
