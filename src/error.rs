//! Error types and handling for the Solivia driver
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Solivia operations
pub type Result<T> = std::result::Result<T, SoliviaError>;

/// Errors produced while decoding a response frame from the bus.
///
/// Both kinds are non-fatal: the scheduler logs them and treats the poll
/// cycle the same as a timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Sync marker or checksum did not match
    #[error("malformed frame: {reason}")]
    Malformed { reason: String },

    /// A different inverter answered than the one queried
    #[error("address mismatch: queried inverter {expected}, inverter {actual} answered")]
    AddressMismatch { expected: u8, actual: u8 },
}

impl FrameError {
    /// Create a new malformed-frame error
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        FrameError::Malformed {
            reason: reason.into(),
        }
    }
}

/// Main error type for the Solivia driver
#[derive(Debug, Error)]
pub enum SoliviaError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Two configured inverters share the same bus address
    #[error("Configuration error: duplicate inverter address {address}")]
    DuplicateAddress { address: u8 },

    /// The inverter list is empty
    #[error("Configuration error: at least one inverter must be configured")]
    NoInverters,

    /// Serial bus communication errors
    #[error("Serial error: {message}")]
    Serial { message: String },

    /// Protocol frame decode errors
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl SoliviaError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        SoliviaError::Config {
            message: message.into(),
        }
    }

    /// Create a new serial error
    pub fn serial<S: Into<String>>(message: S) -> Self {
        SoliviaError::Serial {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        SoliviaError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        SoliviaError::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        SoliviaError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        SoliviaError::Generic {
            message: message.into(),
        }
    }

    /// Whether this error is a routine per-poll protocol failure.
    ///
    /// Such errors are logged and skipped; only configuration errors abort
    /// the driver.
    pub fn is_poll_error(&self) -> bool {
        matches!(
            self,
            SoliviaError::Frame(_) | SoliviaError::Timeout { .. } | SoliviaError::Serial { .. }
        )
    }
}

impl From<std::io::Error> for SoliviaError {
    fn from(err: std::io::Error) -> Self {
        SoliviaError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for SoliviaError {
    fn from(err: serde_yaml::Error) -> Self {
        SoliviaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SoliviaError {
    fn from(err: serde_json::Error) -> Self {
        SoliviaError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<tokio_serial::Error> for SoliviaError {
    fn from(err: tokio_serial::Error) -> Self {
        SoliviaError::serial(err.to_string())
    }
}
