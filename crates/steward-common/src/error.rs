//! Unified error types for the steward workspace.
//!
//! Collaborator implementations (runtime clients, registries, network
//! providers) report their failures through the same enum so that the
//! reconciliation engine can classify them without knowing the backend.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::NetworkType;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum StewardError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A runtime, registry, or network backend call failed.
    #[error("{operation} failed for {id}: {message}")]
    Backend {
        /// Operation that was attempted.
        operation: &'static str,
        /// Identifier of the object the operation targeted.
        id: String,
        /// Backend-provided failure description.
        message: String,
    },

    /// No network provider is registered for the container's network type.
    #[error("no network provider for type `{network}` (container {id})")]
    UnknownNetwork {
        /// Container that requested the network.
        id: String,
        /// The unmapped network type.
        network: NetworkType,
    },

    /// A bounded wait expired.
    #[error("{operation} timed out for {id} after {after:?}")]
    Timeout {
        /// Operation that was waited on.
        operation: &'static str,
        /// Identifier of the object waited on.
        id: String,
        /// The deadline that expired.
        after: Duration,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl StewardError {
    /// Builds a [`StewardError::Backend`] from any displayable failure.
    pub fn backend(
        operation: &'static str,
        id: impl Into<String>,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::Backend {
            operation,
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Builds a [`StewardError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Returns whether this error reports an absent container or task.
    ///
    /// Absence is an expected state for the reconciler and is never
    /// logged as a failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, StewardError>;
