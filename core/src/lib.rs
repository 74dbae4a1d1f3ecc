//! Schema-driven contract for a server registry API.
//!
//! This crate turns the `components.schemas` section of a schema document
//! into runtime validators:
//!
//! - [`Registry`] indexes every entity definition by its reference key.
//! - [`shape`] is the entity model: composable builders (objects, optional
//!   fields with defaults, unions, intersections, enums, arrays, records,
//!   passthrough objects) that definitions are lowered to.
//! - [`Compiler`] produces a [`Validator`] per entity, resolving references
//!   (including recursive ones) through the registry.
//! - [`ValidationResult`] reports either the normalized document or every
//!   violation with its [`FieldPath`].
//!
//! The typed model ([`ServerList`], [`ServerDetail`], ...) lets callers
//! deserialize validated documents, and [`contract`] holds the process-wide
//! instance built once at startup.
//!
//! # Example
//!
//! ```
//! use registry_contract_core::*;
//! use serde_json::json;
//!
//! let registry = Registry::index(&json!({
//!     "components": {"schemas": {
//!         "Server": {
//!             "type": "object",
//!             "required": ["name", "description", "version"],
//!             "properties": {
//!                 "name": {"type": "string"},
//!                 "description": {"type": "string"},
//!                 "version": {"type": "string"}
//!             }
//!         }
//!     }}
//! }))
//! .unwrap();
//!
//! let validator = Compiler::new(&registry).compile("Server").unwrap();
//! let server: Server = validator
//!     .parse(&json!({"name": "s", "description": "d", "version": "1.0.0", "x": 1}))
//!     .unwrap();
//! assert_eq!(server.extra["x"], json!(1));
//! ```

mod compile;
pub mod contract;
mod error;
mod merge;
mod registry;
mod sample;
pub mod shape;
mod types;
mod validate;

pub use compile::{Compiler, Validator, ValidatorSet};
pub use contract::Contract;
pub use error::{ContractError, SchemaLoadError, UnknownReferenceError};
pub use merge::merge_objects;
pub use registry::{Entity, Registry, SCHEMA_REF_PREFIX, SCHEMAS_POINTER, reference_pointer};
pub use shape::{Field, InvalidShape, ObjectShape, Shape, StringFormat, UnknownFields};
pub use types::*;
pub use validate::{
    ConstraintKind, FieldPath, ParseError, PathSegment, ReportedError, Validated,
    ValidationError, ValidationErrors, ValidationReport, ValidationResult,
};
