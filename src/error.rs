//! Error types for the resolution engine.
//!
//! All errors are strongly typed using thiserror. Note that "not enough
//! evidence" is never an error here: a field that cannot be resolved is
//! reported through `FieldStatus`, not through `ResolveError`.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors that occur during input or configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A configuration knob is outside its allowed range.
    #[error("Config value '{field}' = {value} is out of range [{min}, {max}]")]
    ConfigOutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A candidate confidence is NaN or outside [0, 1].
    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        value: f64,
    },

    /// Make or model is blank.
    #[error("Vehicle field '{field}' cannot be empty")]
    EmptyVehicleField {
        field: String,
    },

    /// Make or model contains the storage key separator.
    #[error("Vehicle field '{field}' cannot contain '{separator}'")]
    ReservedSeparator {
        field: String,
        separator: char,
    },

    /// Model year outside the supported range.
    #[error("Model year {year} is out of range")]
    YearOutOfRange {
        year: u16,
    },

    /// Attribute name not recognised.
    #[error("Unknown field name: {name}")]
    UnknownField {
        name: String,
    },

    /// Trust indicator list could not be compiled.
    #[error("Invalid trust indicator: {reason}")]
    InvalidIndicator {
        reason: String,
    },
}

/// Top-level error type.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Input or configuration validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Provenance storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON input could not be parsed.
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    /// A file could not be read.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ResolveError {
    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::Parse { .. } => false,
            Self::Storage(e) => matches!(e, StorageError::ConnectionError(_)),
            Self::Io { .. } => true,
        }
    }
}

/// Result type alias for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;
