//! API contract of the server registry.
//!
//! [`endpoints`] lists every operation of the registry HTTP API with its
//! parameters and responses typed by entity-model shapes.
//! [`ContractValidators`] binds those shapes to a schema registry so a
//! server or client can check requests and responses at runtime.
//!
//! This crate describes the API; it does not serve it.

mod bind;
mod endpoint;

/// Error of [`ContractValidators::bind`]: an endpoint shape references an
/// entity the registry does not define.
pub type ContractBindError = registry_contract_core::UnknownReferenceError;

pub use bind::{BoundEndpoint, ContractValidators, RequestParts, ResponseError};
pub use endpoint::{
    Endpoint, ErrorResponse, Method, Parameter, ParameterLocation, RequestMatch, endpoints,
    error_shape, find_by_alias, find_by_path, match_request,
};
