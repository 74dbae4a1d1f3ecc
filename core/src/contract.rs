//! Process-wide contract: one registry and its validators, built once.
//!
//! Call [`init`] during startup; afterwards [`global`] and
//! [`create_validator`] hand out shared, immutable state to any thread.
//! Tests that need isolation build their own [`Registry`] and
//! [`Compiler`] instead.

use std::sync::OnceLock;

use tracing::info;

use crate::compile::{Compiler, Validator, ValidatorSet};
use crate::error::ContractError;
use crate::registry::Registry;

static CONTRACT: OnceLock<Contract> = OnceLock::new();

/// A registry with every entity compiled.
#[derive(Debug)]
pub struct Contract {
    registry: Registry,
    validators: ValidatorSet,
}

impl Contract {
    /// Compiles every entity of `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownReference`] for a dangling reference.
    pub fn new(registry: Registry) -> Result<Self, ContractError> {
        let validators = Compiler::new(&registry).compile_all()?;
        Ok(Self {
            registry,
            validators,
        })
    }

    /// The indexed registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validator of the entity registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::UnknownReference`] if `name` is not registered.
    pub fn validator(&self, name: &str) -> Result<Validator, ContractError> {
        Ok(self.validators.get(name)?)
    }
}

/// Installs the process-wide contract.
///
/// # Errors
///
/// Returns [`ContractError::AlreadyInitialized`] on a second call, or the
/// compile error of `registry`.
pub fn init(registry: Registry) -> Result<&'static Contract, ContractError> {
    if CONTRACT.get().is_some() {
        return Err(ContractError::AlreadyInitialized);
    }
    let contract = Contract::new(registry)?;
    let entities = contract.registry.len();

    CONTRACT
        .set(contract)
        .map_err(|_| ContractError::AlreadyInitialized)?;
    info!(entities, "Initialized registry contract");
    global()
}

/// The contract installed by [`init`].
///
/// # Errors
///
/// Returns [`ContractError::NotInitialized`] before [`init`].
pub fn global() -> Result<&'static Contract, ContractError> {
    CONTRACT.get().ok_or(ContractError::NotInitialized)
}

/// Validator of the entity `name` from the process-wide contract.
///
/// # Errors
///
/// Returns [`ContractError::NotInitialized`] before [`init`], or
/// [`ContractError::UnknownReference`] for an unregistered name.
pub fn create_validator(name: &str) -> Result<Validator, ContractError> {
    global()?.validator(name)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // The only test in this crate's unit suite touching the global.
    #[test]
    fn test_global_lifecycle() {
        assert!(matches!(global(), Err(ContractError::NotInitialized)));
        assert!(matches!(
            create_validator("Server"),
            Err(ContractError::NotInitialized)
        ));

        let registry =
            Registry::from_entries([("Server", json!({"type": "object", "required": ["name"]}))])
                .unwrap();
        let contract = init(registry.clone()).unwrap();
        assert_eq!(contract.registry().len(), 1);

        assert!(matches!(init(registry), Err(ContractError::AlreadyInitialized)));

        let validator = create_validator("Server").unwrap();
        assert!(validator.validate(&json!({"name": "s"})).is_valid());
        assert!(matches!(
            create_validator("NoSuchEntity"),
            Err(ContractError::UnknownReference(_))
        ));
    }

    #[test]
    fn test_contract_rejects_dangling_reference() {
        let registry =
            Registry::from_entries([("A", json!({"$ref": "#/components/schemas/Missing"}))])
                .unwrap();
        let err = Contract::new(registry).unwrap_err();
        assert_eq!(err.to_string(), "unknown schema reference: Missing");
    }
}
