// SPDX-License-Identifier: MPL-2.0

//! Error types for the scanner

use crate::backends::camera::types::BackendError;
use std::fmt;

/// Result type alias using ScanError
pub type ScanResult<T> = Result<T, ScanError>;

/// Session-level error taxonomy
///
/// Only [`ScanError::HardwareUnavailable`] and [`ScanError::BadRotation`]
/// are shown to the user. Everything else is recovered silently by the
/// component that hit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Camera could not be opened (held by another process, missing, broken)
    HardwareUnavailable(String),
    /// Display rotation was not a multiple of 90 degrees
    BadRotation(i32),
    /// A single frame failed to decode
    DecodeTransient(String),
    /// Torch or zoom is not supported by the active camera
    CapabilityUnsupported(String),
    /// The render surface went away while the camera was running
    SurfaceLost,
}

impl ScanError {
    /// Whether the session cannot continue after this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::HardwareUnavailable(_) | ScanError::BadRotation(_)
        )
    }

    /// Whether the host should put a blocking notification in front of the user
    pub fn is_user_visible(&self) -> bool {
        self.is_fatal()
    }
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanError::HardwareUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
            ScanError::BadRotation(degrees) => {
                write!(f, "Unsupported display rotation: {} degrees", degrees)
            }
            ScanError::DecodeTransient(msg) => write!(f, "Frame decode failed: {}", msg),
            ScanError::CapabilityUnsupported(what) => write!(f, "Not supported: {}", what),
            ScanError::SurfaceLost => write!(f, "Render surface lost"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<BackendError> for ScanError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unsupported(what) => ScanError::CapabilityUnsupported(what),
            other => ScanError::HardwareUnavailable(other.to_string()),
        }
    }
}

/// Errors raised while loading scan options
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::Error),
    /// File is not valid JSON for [`crate::config::ScanOptions`]
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read options: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid options file: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}
