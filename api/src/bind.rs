//! Validators bound to the endpoint table.
//!
//! [`ContractValidators::bind`] compiles every parameter, response and error
//! shape of [`endpoints`] against a [`Registry`]. Binding fails on the first
//! shape that references an entity the registry does not define.

use std::collections::BTreeMap;

use registry_contract_core::{
    Compiler, ConstraintKind, FieldPath, PathSegment, Registry, Shape, UnknownReferenceError,
    Validated, ValidationError, ValidationResult, Validator,
};
use serde_json::{Map, Number, Value};
use thiserror::Error;
use tracing::debug;

use crate::endpoint::{Endpoint, Parameter, ParameterLocation, endpoints};

/// A response status the endpoint does not declare.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("response status {0} is not declared by the endpoint")]
    UnexpectedStatus(u16),
}

/// The raw parts of an incoming request.
///
/// # Examples
///
/// ```
/// use registry_contract_api::RequestParts;
///
/// let request = RequestParts::new()
///     .with_path("serverName", "io.example/weather")
///     .with_query("limit", "10");
/// assert_eq!(request.query["limit"], "10");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParts {
    /// Path parameters by name.
    pub path: BTreeMap<String, String>,
    /// Query parameters by name, undecoded strings.
    pub query: BTreeMap<String, String>,
    /// Parsed JSON body.
    pub body: Option<Value>,
}

impl RequestParts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

struct BoundParameter {
    parameter: &'static Parameter,
    validator: Validator,
}

/// An endpoint with its shapes compiled.
pub struct BoundEndpoint {
    endpoint: &'static Endpoint,
    parameters: Vec<BoundParameter>,
    response: Validator,
    errors: Vec<(u16, Validator)>,
}

impl BoundEndpoint {
    fn bind(compiler: &Compiler<'_>, endpoint: &'static Endpoint) -> Result<Self, UnknownReferenceError> {
        let parameters = endpoint
            .parameters
            .iter()
            .map(|parameter| {
                Ok(BoundParameter {
                    parameter,
                    validator: compiler.compile_shape(&parameter.shape)?,
                })
            })
            .collect::<Result<_, UnknownReferenceError>>()?;
        let errors = endpoint
            .errors
            .iter()
            .map(|error| Ok((error.status, compiler.compile_shape(&error.shape)?)))
            .collect::<Result<_, UnknownReferenceError>>()?;

        Ok(Self {
            endpoint,
            parameters,
            response: compiler.compile_shape(&endpoint.response)?,
            errors,
        })
    }

    /// The endpoint these validators belong to.
    pub fn endpoint(&self) -> &'static Endpoint {
        self.endpoint
    }

    /// Validates every declared parameter of `request`.
    ///
    /// Query strings are coerced to the integer, number or boolean their
    /// parameter declares before validation. Errors are reported under the
    /// parameter name (`limit`, `body.name`). On success the normalized
    /// document maps each present parameter name to its value.
    pub fn validate_request(&self, request: &RequestParts) -> ValidationResult {
        let mut output = Map::new();
        let mut errors = Vec::new();

        for bound in &self.parameters {
            let parameter = bound.parameter;
            let value = match parameter.location {
                ParameterLocation::Path => request.path.get(parameter.name).cloned().map(Value::String),
                ParameterLocation::Query => request
                    .query
                    .get(parameter.name)
                    .map(|raw| coerce_query(&parameter.shape, raw)),
                ParameterLocation::Body => request.body.clone(),
            };

            let Some(value) = value else {
                match &parameter.shape {
                    Shape::Optional { default: Some(default), .. } => {
                        output.insert(parameter.name.to_string(), default.clone());
                    }
                    Shape::Optional { .. } => {}
                    _ => errors.push(ValidationError {
                        path: FieldPath::from(vec![PathSegment::Key(parameter.name.to_string())]),
                        kind: ConstraintKind::Required,
                        message: "required parameter is missing".to_string(),
                    }),
                }
                continue;
            };

            match bound.validator.validate(&value) {
                ValidationResult::Valid(validated) => {
                    output.insert(parameter.name.to_string(), validated.document);
                }
                ValidationResult::Invalid(found) => {
                    let segment = PathSegment::Key(parameter.name.to_string());
                    errors.extend(found.into_iter().map(|error| ValidationError {
                        path: error.path.prefixed(segment.clone()),
                        ..error
                    }));
                }
            }
        }

        if errors.is_empty() {
            ValidationResult::Valid(Validated {
                document: Value::Object(output),
                variant: None,
            })
        } else {
            ValidationResult::Invalid(errors)
        }
    }

    /// Validates a response body against the shape declared for `status`.
    ///
    /// Any 2xx status uses the success response shape.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::UnexpectedStatus`] when the endpoint declares
    /// no response for `status`.
    pub fn validate_response(&self, status: u16, body: &Value) -> Result<ValidationResult, ResponseError> {
        if (200..300).contains(&status) {
            return Ok(self.response.validate(body));
        }
        self.errors
            .iter()
            .find(|(declared, _)| *declared == status)
            .map(|(_, validator)| validator.validate(body))
            .ok_or(ResponseError::UnexpectedStatus(status))
    }
}

fn coerce_query(shape: &Shape, raw: &str) -> Value {
    let target = match shape {
        Shape::Optional { inner, .. } => inner.as_ref(),
        other => other,
    };
    let coerced = match target {
        Shape::Integer => raw.parse::<i64>().ok().map(Value::from),
        Shape::Number => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
        Shape::Boolean => raw.parse::<bool>().ok().map(Value::Bool),
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Compiled validators for every endpoint.
///
/// # Examples
///
/// ```
/// use registry_contract_api::{ContractValidators, RequestParts};
/// use registry_contract_core::Registry;
/// use serde_json::json;
///
/// let registry = Registry::index(&json!({"components": {"schemas": {
///     "ServerDetail": {"type": "object"},
///     "ServerResponse": {"type": "object"},
///     "ServerList": {"type": "object"}
/// }}}))
/// .unwrap();
///
/// let validators = ContractValidators::bind(&registry).unwrap();
/// let list = validators.get("getV0servers").unwrap();
/// let result = list.validate_request(&RequestParts::new().with_query("limit", "5"));
/// assert_eq!(result.document().unwrap(), &json!({"limit": 5}));
/// ```
pub struct ContractValidators {
    endpoints: Vec<BoundEndpoint>,
}

impl ContractValidators {
    /// Compiles the validators of every endpoint against `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if any endpoint shape references an
    /// entity the registry does not define.
    pub fn bind(registry: &Registry) -> Result<Self, UnknownReferenceError> {
        let compiler = Compiler::new(registry);
        let endpoints = endpoints()
            .iter()
            .map(|endpoint| BoundEndpoint::bind(&compiler, endpoint))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(endpoints = endpoints.len(), "Bound API contract validators");
        Ok(Self { endpoints })
    }

    /// Validators of the endpoint with `alias`.
    pub fn get(&self, alias: &str) -> Option<&BoundEndpoint> {
        self.endpoints.iter().find(|b| b.endpoint.alias == alias)
    }

    /// Iterates over every bound endpoint in table order.
    pub fn iter(&self) -> impl Iterator<Item = &BoundEndpoint> {
        self.endpoints.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::index(&json!({"components": {"schemas": {
            "ServerDetail": {
                "type": "object",
                "required": ["name"],
                "properties": {"name": {"type": "string"}}
            },
            "ServerResponse": {
                "type": "object",
                "required": ["server"],
                "properties": {"server": {"$ref": "#/components/schemas/ServerDetail"}}
            },
            "ServerList": {
                "type": "object",
                "required": ["servers"],
                "properties": {
                    "servers": {"type": "array", "items": {"$ref": "#/components/schemas/ServerResponse"}}
                }
            }
        }}}))
        .unwrap()
    }

    #[test]
    fn test_bind_requires_referenced_entities() {
        let registry = Registry::index(&json!({"components": {"schemas": {
            "ServerList": {"type": "object"}
        }}}))
        .unwrap();
        let err = ContractValidators::bind(&registry).err().unwrap();
        assert_eq!(err.key, "ServerDetail");
    }

    #[test]
    fn test_query_coercion() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let list = validators.get("getV0servers").unwrap();

        let result = list.validate_request(
            &RequestParts::new().with_query("cursor", "abc").with_query("limit", "25"),
        );
        assert_eq!(result.document().unwrap(), &json!({"cursor": "abc", "limit": 25}));

        let result = list.validate_request(&RequestParts::new().with_query("limit", "ten"));
        let errors = result.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.to_string(), "limit");
        assert_eq!(errors[0].kind, ConstraintKind::TypeMismatch);
    }

    #[test]
    fn test_optional_query_parameters_may_be_absent() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let result = validators
            .get("getV0servers")
            .unwrap()
            .validate_request(&RequestParts::new());
        assert_eq!(result.document().unwrap(), &json!({}));
    }

    #[test]
    fn test_missing_path_parameter() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let version = validators.get("getV0serversServerNameversionsVersion").unwrap();

        let result = version.validate_request(&RequestParts::new().with_path("serverName", "weather"));
        let errors = result.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path.to_string(), "version");
        assert_eq!(errors[0].kind, ConstraintKind::Required);
    }

    #[test]
    fn test_body_errors_are_prefixed() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let publish = validators.get("postV0publish").unwrap();

        let result = publish.validate_request(&RequestParts::new().with_body(json!({"name": 1})));
        assert_eq!(result.errors()[0].path.to_string(), "body.name");

        let result = publish.validate_request(&RequestParts::new());
        assert_eq!(result.errors()[0].path.to_string(), "body");
    }

    #[test]
    fn test_validate_response_by_status() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let by_name = validators.get("getV0serversServerName").unwrap();

        let ok = by_name
            .validate_response(200, &json!({"server": {"name": "weather"}}))
            .unwrap();
        assert!(ok.is_valid());

        let not_found = by_name
            .validate_response(404, &json!({"error": "Server not found"}))
            .unwrap();
        assert!(not_found.is_valid());

        let bad_error = by_name.validate_response(404, &json!({"error": 404})).unwrap();
        assert_eq!(bad_error.errors()[0].path.to_string(), "error");

        assert_eq!(
            by_name.validate_response(418, &json!({})).err(),
            Some(ResponseError::UnexpectedStatus(418))
        );
    }

    #[test]
    fn test_iter_follows_table_order() {
        let validators = ContractValidators::bind(&registry()).unwrap();
        let aliases: Vec<_> = validators.iter().map(|b| b.endpoint().alias).collect();
        assert_eq!(aliases.len(), 5);
        assert_eq!(aliases[0], "postV0publish");
    }
}
