//! Typed model of the registry entities.
//!
//! These structs mirror the entities of the bundled schema document and are
//! the target of [`Validator::parse`](crate::Validator::parse). Composition
//! (`InputWithVariables` on `Input`, `ServerDetail` on `Server`) is expressed
//! with `#[serde(flatten)]`, and every object keeps fields it does not
//! declare in an ordered `extra` map so registry extensions round-trip
//! untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `_meta` key of registry-managed metadata on a [`ServerResponse`].
pub const OFFICIAL_META_KEY: &str = "io.modelcontextprotocol.registry/official";

/// `_meta` key of publisher-supplied metadata on a [`ServerDetail`].
pub const PUBLISHER_META_KEY: &str = "io.modelcontextprotocol.registry/publisher-provided";

/// Source-control origin of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    /// Repository URL.
    pub url: String,
    /// Hosting service, e.g. `github`.
    pub source: String,
    /// Service-specific repository identifier.
    pub id: String,
    /// Path of the server within a monorepo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Base identity of a registry entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    /// Reverse-DNS server name.
    pub name: String,
    /// Human-readable summary.
    pub description: String,
    /// Where the source lives.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Repository>,
    /// Published version.
    pub version: String,
    /// Project homepage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How the value of an [`Input`] is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    String,
    Number,
    Boolean,
    Filepath,
}

/// A single configurable value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub format: InputFormat,
    /// Fixed value, possibly containing `{variable}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub is_secret: bool,
    /// Value used when the user supplies none.
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An [`Input`] whose value may reference named sub-inputs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputWithVariables {
    #[serde(flatten)]
    pub input: Input,
    /// Substitutions for `{name}` placeholders in the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, Input>>,
}

/// A bare command-line argument.
pub type PositionalArgument = InputWithVariables;

/// Discriminant of a [`NamedArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamedArgumentType {
    #[default]
    #[serde(rename = "named")]
    Named,
}

/// A `--flag value` style argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedArgument {
    #[serde(flatten)]
    pub base: InputWithVariables,
    #[serde(rename = "type")]
    pub kind: NamedArgumentType,
    /// Flag name, e.g. `--port`.
    pub name: String,
    #[serde(default)]
    pub is_repeated: bool,
}

/// A runtime or package argument.
///
/// Named arguments are tried first: a positional argument carries no
/// discriminant and would accept any object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Named(NamedArgument),
    Positional(PositionalArgument),
}

/// A named input, used for environment variables and HTTP headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueInput {
    #[serde(flatten)]
    pub base: InputWithVariables,
    pub name: String,
}

/// A distributable package of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package ecosystem, e.g. `npm` or `oci`.
    pub registry_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_base_url: Option<String>,
    pub identifier: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_arguments: Option<Vec<Argument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_arguments: Option<Vec<Argument>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<Vec<KeyValueInput>>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Transport of a [`Remote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteTransport {
    #[serde(rename = "streamable-http")]
    StreamableHttp,
    #[serde(rename = "sse")]
    Sse,
}

/// A hosted endpoint of a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Remote {
    #[serde(rename = "type")]
    pub transport: RemoteTransport,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<KeyValueInput>>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server as published, with its packages and remotes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDetail {
    #[serde(flatten)]
    pub server: Server,
    /// URL of the JSON schema the entry was written against.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<Package>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remotes: Option<Vec<Remote>>,
    /// Extension metadata, keyed by reverse-DNS namespace.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
}

impl ServerDetail {
    /// The `name@version` identity of this entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_contract_core::ServerDetail;
    /// use serde_json::json;
    ///
    /// let detail: ServerDetail = serde_json::from_value(json!({
    ///     "name": "io.example/weather",
    ///     "description": "Forecasts",
    ///     "version": "1.2.0"
    /// }))
    /// .unwrap();
    /// assert_eq!(detail.key(), "io.example/weather@1.2.0");
    /// ```
    pub fn key(&self) -> String {
        format!("{}@{}", self.server.name, self.server.version)
    }

    /// Publisher-supplied metadata, if any.
    pub fn publisher_meta(&self) -> Option<&Value> {
        self.meta.as_ref()?.get(PUBLISHER_META_KEY)
    }
}

/// Lifecycle state of a published server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Active,
    Deprecated,
    Deleted,
}

/// Registry-managed metadata of a published server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialMeta {
    pub status: ServerStatus,
    pub published_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
    pub is_latest: bool,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `_meta` of a [`ServerResponse`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(
        rename = "io.modelcontextprotocol.registry/official",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub official: Option<OfficialMeta>,
    /// Other namespaces.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A server entry as returned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    pub server: ServerDetail,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerResponse {
    /// Registry-managed metadata, if present.
    pub fn official(&self) -> Option<&OfficialMeta> {
        self.meta.as_ref()?.official.as_ref()
    }
}

/// Pagination details of a [`ServerList`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    /// Cursor of the next page; absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerList {
    pub servers: Vec<ServerResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ListMetadata>,
    /// Undeclared fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_argument_prefers_named() {
        let argument: Argument =
            serde_json::from_value(json!({"type": "named", "name": "--port", "value": "8080"}))
                .unwrap();
        let Argument::Named(named) = argument else {
            panic!("expected named argument");
        };
        assert_eq!(named.name, "--port");
        assert_eq!(named.base.input.value.as_deref(), Some("8080"));
        assert!(!named.is_repeated);
    }

    #[test]
    fn test_argument_falls_back_to_positional() {
        let argument: Argument =
            serde_json::from_value(json!({"value": "server.js", "isRequired": true})).unwrap();
        let Argument::Positional(positional) = argument else {
            panic!("expected positional argument");
        };
        assert!(positional.input.is_required);
        assert_eq!(positional.input.format, InputFormat::String);
    }

    #[test]
    fn test_nested_variables() {
        let input: InputWithVariables = serde_json::from_value(json!({
            "value": "{host}:{port}",
            "variables": {
                "host": {"default": "localhost"},
                "port": {"format": "number", "x-hint": "tcp"}
            }
        }))
        .unwrap();
        let variables = input.variables.unwrap();
        assert_eq!(variables["host"].default_value.as_deref(), Some("localhost"));
        assert_eq!(variables["port"].format, InputFormat::Number);
        assert_eq!(variables["port"].extra["x-hint"], json!("tcp"));
        assert!(input.input.extra.is_empty());
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let document = json!({
            "name": "io.example/weather",
            "description": "Forecasts",
            "version": "1.0.0",
            "x-internal": {"team": "platform"},
            "_meta": {PUBLISHER_META_KEY: {"build": 7}}
        });
        let detail: ServerDetail = serde_json::from_value(document.clone()).unwrap();
        assert_eq!(detail.server.extra["x-internal"], json!({"team": "platform"}));
        assert_eq!(detail.publisher_meta(), Some(&json!({"build": 7})));
        assert_eq!(serde_json::to_value(&detail).unwrap(), document);
    }

    #[test]
    fn test_official_meta() {
        let response: ServerResponse = serde_json::from_value(json!({
            "server": {"name": "s", "description": "d", "version": "1.0.0"},
            "_meta": {
                OFFICIAL_META_KEY: {
                    "status": "active",
                    "publishedAt": "2025-09-01T12:00:00Z",
                    "updatedAt": "2025-09-02T08:30:00+02:00",
                    "isLatest": true
                }
            }
        }))
        .unwrap();
        let official = response.official().unwrap();
        assert_eq!(official.status, ServerStatus::Active);
        assert!(official.is_latest);
        assert!(official.updated_at > official.published_at);
    }

    #[test]
    fn test_remote_transport_names() {
        let remote: Remote =
            serde_json::from_value(json!({"type": "streamable-http", "url": "https://example.com/mcp"}))
                .unwrap();
        assert_eq!(remote.transport, RemoteTransport::StreamableHttp);
        assert!(serde_json::from_value::<Remote>(json!({"type": "ftp", "url": "x"})).is_err());
    }

    #[test]
    fn test_list_metadata_count_is_signed() {
        let metadata: ListMetadata = serde_json::from_value(json!({"count": -1})).unwrap();
        assert_eq!(metadata.count, Some(-1));
    }
}
