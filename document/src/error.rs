//! Error types for schema document handling.

use registry_contract_core::{ContractError, SchemaLoadError};
use thiserror::Error;

/// Errors that can occur while loading, converting or bootstrapping.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document could not be indexed into a registry.
    #[error("invalid schema document: {0}")]
    Load(#[from] SchemaLoadError),

    /// The process-wide contract could not be installed.
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// All configured document sources failed.
    #[error("no schema document sources available")]
    NoSourcesAvailable,
}

/// Convenience alias for results with [`DocumentError`].
pub type Result<T> = std::result::Result<T, DocumentError>;
