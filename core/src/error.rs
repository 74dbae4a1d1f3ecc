//! Error types for indexing, compiling and the process-wide contract.
//!
//! Validation failures are not errors in this sense: they are reported as
//! data through [`ValidationResult`](crate::ValidationResult).

use thiserror::Error;

/// The Schema Document could not be indexed.
///
/// Fatal at startup: a registry is never partially built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaLoadError {
    /// The document root is not a mapping.
    #[error("schema document must be an object")]
    NotAnObject,

    /// The expected top-level container is missing or not a mapping.
    #[error("schema document has no object at '{pointer}'")]
    MissingContainer {
        /// JSON Pointer of the missing container.
        pointer: String,
    },

    /// An entity name is empty or whitespace-only.
    #[error("entity name cannot be empty")]
    EmptyKey,

    /// Two entities share the same name.
    #[error("duplicate entity in schema document: {0}")]
    DuplicateKey(String),

    /// An entity definition uses a construct the entity model cannot express.
    #[error("invalid definition for entity '{name}': {reason}")]
    InvalidDefinition {
        /// Entity whose definition failed to lower.
        name: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An entity reaches itself through references, unions or
    /// intersections alone, without an enclosing object or array.
    #[error("entity '{0}' refers to itself without an enclosing object or array")]
    UnguardedRecursion(String),
}

/// A requested or internally referenced entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown schema reference: {key}")]
pub struct UnknownReferenceError {
    /// The key that failed to resolve.
    pub key: String,
}

impl UnknownReferenceError {
    /// Creates an error for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Failures of the process-wide contract.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The registry could not be built.
    #[error(transparent)]
    Load(#[from] SchemaLoadError),

    /// An entity could not be resolved.
    #[error(transparent)]
    UnknownReference(#[from] UnknownReferenceError),

    /// [`init`](crate::contract::init) has not been called yet.
    #[error("contract has not been initialized")]
    NotInitialized,

    /// [`init`](crate::contract::init) was called a second time.
    #[error("contract is already initialized")]
    AlreadyInitialized,
}
