//! Error types for Siteline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Siteline workspace.
///
/// Backends and transports return these; the instrumentation layer above them
/// absorbs them (logging and recording an internal event) so callers of the
/// public tracking API never observe a fault.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SitelineError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound { entity_type: String, id: String },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A write was refused because the serialized value is over the size cap
    #[error("Storage quota exceeded for '{key}': {size} bytes (limit {limit})")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    /// Network-level failure (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The collector answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The collector answered 2xx but reported a failure in its body
    #[error("Collector rejected payload: {0}")]
    Rejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SitelineError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this is a storage-side failure (backend or quota)
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::QuotaExceeded { .. } | Self::Io { .. }
        )
    }

    /// Check if this error came from the delivery path.
    ///
    /// Returns true for network failures, non-2xx statuses and collector
    /// rejections.
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::HttpStatus { .. } | Self::Rejected(_)
        )
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for SitelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for SitelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for SitelineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SitelineError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for SitelineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for SitelineError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, SitelineError>`.
pub type Result<T> = std::result::Result<T, SitelineError>;
