//! Error type for recoverable failures.
//!
//! Queue admission rejections and burst capacity exhaustion are routine outcomes and are reported
//! through `bool`/`Option` returns. Broken scheduling invariants panic.

use std::fmt::{Display, Formatter};

/// Errors returned by codecs and configuration loading.
#[derive(Debug)]
pub enum XgponError {
    /// Input buffer is shorter than the structure being deserialized.
    BufferTooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        actual: usize,
    },
    /// Config file could not be read.
    Io(std::io::Error),
    /// Config file is not valid YAML for [`RawConfig`](crate::config::RawConfig).
    Yaml(serde_yaml::Error),
    /// Config values are inconsistent.
    InvalidConfig(String),
}

impl XgponError {
    pub(crate) fn check_len(buf: &[u8], needed: usize) -> Result<(), XgponError> {
        if buf.len() < needed {
            Err(XgponError::BufferTooShort {
                needed,
                actual: buf.len(),
            })
        } else {
            Ok(())
        }
    }
}

impl Display for XgponError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            XgponError::BufferTooShort { needed, actual } => {
                write!(f, "buffer too short: need {} bytes, got {}", needed, actual)
            }
            XgponError::Io(e) => write!(f, "cannot read config: {}", e),
            XgponError::Yaml(e) => write!(f, "cannot parse config: {}", e),
            XgponError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for XgponError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XgponError::Io(e) => Some(e),
            XgponError::Yaml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for XgponError {
    fn from(e: std::io::Error) -> Self {
        XgponError::Io(e)
    }
}

impl From<serde_yaml::Error> for XgponError {
    fn from(e: serde_yaml::Error) -> Self {
        XgponError::Yaml(e)
    }
}
