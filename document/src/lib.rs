//! Schema document handling for the server registry contract.
//!
//! This crate loads the OpenAPI-style schema document (bundled, or from a
//! JSON/YAML file), converts its human-authored YAML form to JSON, and
//! installs the process-wide contract at startup.
//!
//! # Quick start
//!
//! ```no_run
//! use registry_contract_core::contract;
//! use registry_contract_document::{ContractConfig, bootstrap};
//! use serde_json::json;
//!
//! bootstrap(&ContractConfig::default()).unwrap();
//!
//! let validator = contract::create_validator("ServerList").unwrap();
//! assert!(validator.validate(&json!({"servers": []})).is_valid());
//! ```

mod config;
mod convert;
mod error;
mod loader;

use registry_contract_core::contract::{self, Contract};
use tracing::info;

pub use config::{ContractConfig, ConversionConfig, ValidationConfig};
pub use convert::{convert, yaml_to_json};
pub use error::{DocumentError, Result};
pub use loader::{BUNDLED_DOCUMENT, DocumentFormat, DocumentLoader, DocumentSource, SchemaDocument};

/// Loads the configured document and installs the process-wide contract.
///
/// # Errors
///
/// Returns the load or indexing error of the document, or
/// [`DocumentError::Contract`] if the contract is already installed or has
/// a dangling reference.
pub fn bootstrap(config: &ContractConfig) -> Result<&'static Contract> {
    let document = config.load_document()?;
    let registry = document.registry()?;
    info!(
        source = ?document.source(),
        fingerprint = %document.fingerprint(),
        "Loaded schema document"
    );
    Ok(contract::init(registry)?)
}
