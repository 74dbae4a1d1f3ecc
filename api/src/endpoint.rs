//! The endpoint table of the registry API.
//!
//! Pure data: each [`Endpoint`] names its method, `:param` path template,
//! parameters, success response and declared error responses, each typed
//! by an entity-model [`Shape`]. Transport code looks endpoints up by alias,
//! by template, or by matching a concrete request path.
//!
//! # Examples
//!
//! ```
//! use registry_contract_api::{Method, find_by_alias, match_request};
//!
//! let endpoint = find_by_alias("getV0serversServerNameversions").unwrap();
//! assert_eq!(endpoint.path, "/v0/servers/:serverName/versions");
//!
//! let matched = match_request(Method::Get, "/v0/servers/weather/versions/1.0.0").unwrap();
//! assert_eq!(matched.endpoint.alias, "getV0serversServerNameversionsVersion");
//! assert_eq!(matched.param("version"), Some("1.0.0"));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use registry_contract_core::shape::{self, Shape};

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// Where a parameter is carried in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Body,
}

/// A request parameter.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: &'static str,
    pub location: ParameterLocation,
    /// [`Shape::Optional`] marks a parameter that may be omitted.
    pub shape: Shape,
}

impl Parameter {
    fn new(name: &'static str, location: ParameterLocation, shape: Shape) -> Self {
        Self {
            name,
            location,
            shape,
        }
    }

    /// Returns `true` unless the parameter shape is optional.
    pub fn is_required(&self) -> bool {
        !matches!(self.shape, Shape::Optional { .. })
    }
}

/// A declared non-success response.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: u16,
    pub description: &'static str,
    pub shape: Shape,
}

/// One operation of the registry API.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub method: Method,
    /// Path template with `:name` placeholders.
    pub path: &'static str,
    /// Stable operation identifier.
    pub alias: &'static str,
    pub description: &'static str,
    pub parameters: Vec<Parameter>,
    /// Body of a 2xx response.
    pub response: Shape,
    pub errors: Vec<ErrorResponse>,
}

impl Endpoint {
    /// Looks up a parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Declared error response for `status`.
    pub fn error(&self, status: u16) -> Option<&ErrorResponse> {
        self.errors.iter().find(|e| e.status == status)
    }

    /// The path template in OpenAPI form (`{name}` placeholders).
    ///
    /// ```
    /// use registry_contract_api::find_by_alias;
    ///
    /// let endpoint = find_by_alias("getV0serversServerName").unwrap();
    /// assert_eq!(endpoint.openapi_path(), "/v0/servers/{serverName}");
    /// ```
    pub fn openapi_path(&self) -> String {
        self.path
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => format!("{{{name}}}"),
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Matches a concrete request path against the template, returning the
    /// placeholder values in template order.
    ///
    /// Values are returned as they appear in the path, without decoding.
    pub fn match_path(&self, path: &str) -> Option<Vec<(&'static str, String)>> {
        let mut params = Vec::new();
        let mut template = self.path.split('/');
        let mut actual = path.split('/');

        loop {
            match (template.next(), actual.next()) {
                (None, None) => return Some(params),
                (Some(expected), Some(segment)) => match expected.strip_prefix(':') {
                    Some(_) if segment.is_empty() => return None,
                    Some(name) => params.push((name, segment.to_string())),
                    None if expected == segment => {}
                    None => return None,
                },
                _ => return None,
            }
        }
    }
}

/// An endpoint matched against a concrete request path.
#[derive(Debug, Clone)]
pub struct RequestMatch {
    pub endpoint: &'static Endpoint,
    /// Path parameters in template order.
    pub params: Vec<(&'static str, String)>,
}

impl RequestMatch {
    /// Value of the path parameter `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Body of every declared error response: `{error?: string}`.
pub fn error_shape() -> Shape {
    shape::object([("error", shape::string().optional())]).passthrough()
}

fn server_name() -> Parameter {
    Parameter::new("serverName", ParameterLocation::Path, shape::string())
}

fn not_found(description: &'static str) -> ErrorResponse {
    ErrorResponse {
        status: 404,
        description,
        shape: error_shape(),
    }
}

static ENDPOINTS: LazyLock<Vec<Endpoint>> = LazyLock::new(|| {
    vec![
        Endpoint {
            method: Method::Post,
            path: "/v0/publish",
            alias: "postV0publish",
            description: "Publish a new MCP server to the registry or update an existing one.\n\n\
                **Note**: This endpoint is optional for registry implementations. \
                Read-only registries may not provide this functionality.\n\n\
                Authentication mechanism is registry-specific and may vary between implementations.",
            parameters: vec![Parameter::new(
                "body",
                ParameterLocation::Body,
                shape::reference("ServerDetail"),
            )],
            response: shape::reference("ServerResponse"),
            errors: vec![
                ErrorResponse {
                    status: 401,
                    description: "Unauthorized - Invalid or missing authentication token",
                    shape: error_shape(),
                },
                ErrorResponse {
                    status: 403,
                    description: "Forbidden - Insufficient permissions",
                    shape: error_shape(),
                },
                ErrorResponse {
                    status: 500,
                    description: "Internal server error",
                    shape: error_shape(),
                },
            ],
        },
        Endpoint {
            method: Method::Get,
            path: "/v0/servers",
            alias: "getV0servers",
            description: "Returns a list of all registered MCP servers",
            parameters: vec![
                Parameter::new("cursor", ParameterLocation::Query, shape::string().optional()),
                Parameter::new("limit", ParameterLocation::Query, shape::integer().optional()),
            ],
            response: shape::reference("ServerList"),
            errors: Vec::new(),
        },
        Endpoint {
            method: Method::Get,
            path: "/v0/servers/:serverName",
            alias: "getV0serversServerName",
            description: "Returns detailed information about the latest version of a specific MCP server.",
            parameters: vec![server_name()],
            response: shape::reference("ServerResponse"),
            errors: vec![not_found("Server not found")],
        },
        Endpoint {
            method: Method::Get,
            path: "/v0/servers/:serverName/versions",
            alias: "getV0serversServerNameversions",
            description: "Returns all available versions for a specific MCP server, \
                ordered by publication date (newest first)",
            parameters: vec![server_name()],
            response: shape::reference("ServerList"),
            errors: vec![not_found("Server not found")],
        },
        Endpoint {
            method: Method::Get,
            path: "/v0/servers/:serverName/versions/:version",
            alias: "getV0serversServerNameversionsVersion",
            description: "Returns detailed information about a specific version of an MCP server.",
            parameters: vec![
                server_name(),
                Parameter::new("version", ParameterLocation::Path, shape::string()),
            ],
            response: shape::reference("ServerResponse"),
            errors: vec![not_found("Server or version not found")],
        },
    ]
});

/// Every endpoint, in declaration order.
pub fn endpoints() -> &'static [Endpoint] {
    &ENDPOINTS
}

/// Looks up an endpoint by alias.
pub fn find_by_alias(alias: &str) -> Option<&'static Endpoint> {
    endpoints().iter().find(|e| e.alias == alias)
}

/// Looks up an endpoint by method and `:param` path template.
pub fn find_by_path(method: Method, template: &str) -> Option<&'static Endpoint> {
    endpoints()
        .iter()
        .find(|e| e.method == method && e.path == template)
}

/// Finds the endpoint serving a concrete request path.
pub fn match_request(method: Method, path: &str) -> Option<RequestMatch> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    endpoints()
        .iter()
        .filter(|e| e.method == method)
        .find_map(|endpoint| {
            endpoint
                .match_path(path)
                .map(|params| RequestMatch { endpoint, params })
        })
}
