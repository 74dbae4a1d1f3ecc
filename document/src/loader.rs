//! Schema document loading with builder pattern and fallback chains.
//!
//! Provides [`SchemaDocument`] for a parsed OpenAPI-style document and
//! [`DocumentLoader`] for trying several sources in order.
//!
//! # Loading patterns
//!
//! ```no_run
//! use registry_contract_document::{DocumentFormat, SchemaDocument};
//!
//! // The document compiled into this crate
//! let document = SchemaDocument::bundled().unwrap();
//! let registry = document.registry().unwrap();
//! assert!(registry.contains("ServerList"));
//!
//! // A file on disk, format taken from the extension
//! let document = SchemaDocument::from_path("openapi.yaml").unwrap();
//!
//! // A fallback chain
//! let document = SchemaDocument::builder()
//!     .from_path("custom/openapi.json")
//!     .with_bundled()
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use registry_contract_core::{Registry, SCHEMAS_POINTER, SchemaLoadError};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{DocumentError, Result};

/// Human-authored schema document compiled into the crate.
pub const BUNDLED_DOCUMENT: &str = include_str!("../openapi.yaml");

/// Textual encoding of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Infers the format from a file extension (`.json`, `.yaml`, `.yml`).
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_contract_document::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_path("src/openapi.json"), Some(DocumentFormat::Json));
    /// assert_eq!(DocumentFormat::from_path("openapi.YML"), Some(DocumentFormat::Yaml));
    /// assert_eq!(DocumentFormat::from_path("openapi.toml"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(DocumentFormat::Json),
            "yaml" | "yml" => Some(DocumentFormat::Yaml),
            _ => None,
        }
    }
}

/// Describes where a [`SchemaDocument`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    /// Parsed from text supplied by the caller.
    Inline,
    /// Loaded from a file.
    Path(PathBuf),
    /// The document compiled into the crate.
    Bundled,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<DocumentSource>),
}

/// A parsed schema document.
///
/// Keeps the schema entries in document order, duplicates included, so that
/// indexing can reject a name defined twice (a plain JSON object would
/// silently keep the last one).
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    value: Value,
    schemas: Option<Vec<(String, Value)>>,
    source: DocumentSource,
}

#[derive(Deserialize)]
struct Outline {
    #[serde(default)]
    components: Option<OutlineComponents>,
}

#[derive(Deserialize)]
struct OutlineComponents {
    #[serde(default, deserialize_with = "deserialize_entries")]
    schemas: Option<Vec<(String, Value)>>,
}

fn deserialize_entries<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<(String, Value)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntriesVisitor;

    impl<'de> Visitor<'de> for EntriesVisitor {
        type Value = Option<Vec<(String, Value)>>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a map of entity names to definitions")
        }

        fn visit_map<M>(self, mut map: M) -> std::result::Result<Self::Value, M::Error>
        where
            M: MapAccess<'de>,
        {
            let mut entries = Vec::new();
            while let Some((key, value)) = map.next_entry::<String, Value>()? {
                entries.push((key, value));
            }
            Ok(Some(entries))
        }
    }

    deserializer.deserialize_map(EntriesVisitor)
}

impl SchemaDocument {
    /// Returns a new [`DocumentLoader`] for configuring a fallback chain.
    pub fn builder() -> DocumentLoader {
        DocumentLoader::new()
    }

    /// Parses a document from text.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] or [`DocumentError::Yaml`] for text
    /// that does not parse, and [`DocumentError::Load`] with
    /// [`SchemaLoadError::DuplicateKey`] for an entity defined twice.
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_contract_document::{DocumentFormat, SchemaDocument};
    ///
    /// let yaml = r#"
    /// components:
    ///   schemas:
    ///     Repository:
    ///       type: object
    ///       required: [url]
    ///       properties:
    ///         url: {type: string, format: uri}
    /// "#;
    /// let document = SchemaDocument::from_str(yaml, DocumentFormat::Yaml).unwrap();
    /// assert_eq!(document.registry().unwrap().len(), 1);
    /// ```
    pub fn from_str(text: &str, format: DocumentFormat) -> Result<Self> {
        // The outline keeps repeated keys, so duplicates are reported before
        // the full parse, which rejects them with a format error.
        let outline = match format {
            DocumentFormat::Json => serde_json::from_str::<Outline>(text).ok(),
            DocumentFormat::Yaml => serde_yaml::from_str::<Outline>(text).ok(),
        };
        let schemas = outline.and_then(|o| o.components).and_then(|c| c.schemas);
        if let Some(entries) = &schemas {
            for (i, (name, _)) in entries.iter().enumerate() {
                if entries[..i].iter().any(|(seen, _)| seen == name) {
                    return Err(SchemaLoadError::DuplicateKey(name.clone()).into());
                }
            }
        }

        let value = match format {
            DocumentFormat::Json => serde_json::from_str::<Value>(text)?,
            // Through the YAML value model so non-string keys (such as
            // unquoted status codes) become JSON strings.
            DocumentFormat::Yaml => {
                serde_json::to_value(serde_yaml::from_str::<serde_yaml::Value>(text)?)?
            }
        };

        Ok(Self {
            value,
            schemas,
            source: DocumentSource::Inline,
        })
    }

    /// Loads a document from a file, choosing the format by extension.
    ///
    /// Files without a recognized extension are parsed as YAML, which also
    /// accepts JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Io`] if the file cannot be read, or any error
    /// of [`from_str`](Self::from_str).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let format = DocumentFormat::from_path(path).unwrap_or(DocumentFormat::Yaml);

        let mut document = Self::from_str(&text, format)?;
        document.source = DocumentSource::Path(path.to_path_buf());
        debug!(path = %path.display(), "Loaded schema document");
        Ok(document)
    }

    /// Parses the document compiled into the crate.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Yaml`] if the bundled text is malformed.
    pub fn bundled() -> Result<Self> {
        let mut document = Self::from_str(BUNDLED_DOCUMENT, DocumentFormat::Yaml)?;
        document.source = DocumentSource::Bundled;
        Ok(document)
    }

    /// Indexes the `components.schemas` container.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Load`] for anything
    /// [`Registry::index`] rejects.
    pub fn registry(&self) -> Result<Registry> {
        if !self.value.is_object() {
            return Err(SchemaLoadError::NotAnObject.into());
        }
        let registry = match &self.schemas {
            Some(entries) if self.value.pointer(SCHEMAS_POINTER).is_some_and(Value::is_object) => {
                Registry::from_entries(entries.iter().cloned())?
            }
            _ => Registry::index(&self.value)?,
        };
        Ok(registry)
    }

    /// The parsed document.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the document, returning the parsed value.
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Path templates declared under `paths`, in document order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.value
            .get("paths")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|paths| paths.keys().map(String::as_str))
    }

    /// SHA-256 hex digest of the compact JSON encoding.
    ///
    /// Identical for a YAML document and its JSON conversion.
    pub fn fingerprint(&self) -> String {
        let bytes = self.value.to_string();
        format!("{:x}", Sha256::digest(bytes.as_bytes()))
    }

    /// Where this document was loaded from.
    pub fn source(&self) -> &DocumentSource {
        &self.source
    }
}

/// Builder for loading a [`SchemaDocument`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first one that loads
/// wins; if all fail, [`DocumentError::NoSourcesAvailable`] is returned.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    sources: Vec<DocumentSource>,
}

impl DocumentLoader {
    /// Creates a new loader with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document file as a source.
    pub fn from_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(DocumentSource::Path(path.into()));
        self
    }

    /// Adds the bundled document as a source.
    pub fn with_bundled(mut self) -> Self {
        self.sources.push(DocumentSource::Bundled);
        self
    }

    /// Attempts to load a document from the configured sources in order.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NoSourcesAvailable`] if no source loads.
    pub fn build(self) -> Result<SchemaDocument> {
        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                DocumentSource::Path(path) => SchemaDocument::from_path(path),
                DocumentSource::Bundled => SchemaDocument::bundled(),
                DocumentSource::Inline | DocumentSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut document) => {
                    if all_sources.len() > 1 {
                        document.source = DocumentSource::Multiple(all_sources);
                    }
                    return Ok(document);
                }
                Err(err) => warn!(?source, error = %err, "Schema document source failed"),
            }
        }

        Err(DocumentError::NoSourcesAvailable)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_bundled_document_indexes() {
        let document = SchemaDocument::bundled().unwrap();
        assert_eq!(document.source(), &DocumentSource::Bundled);
        let registry = document.registry().unwrap();
        let keys: Vec<_> = registry.keys().collect();
        assert_eq!(
            keys,
            [
                "Repository",
                "Server",
                "Input",
                "InputWithVariables",
                "PositionalArgument",
                "NamedArgument",
                "Argument",
                "KeyValueInput",
                "Package",
                "Remote",
                "ServerDetail",
                "ServerResponse",
                "ServerList",
            ]
        );
    }

    #[test]
    fn test_duplicate_json_entities_are_rejected() {
        let text = r#"{"components": {"schemas": {
            "Server": {"type": "object"},
            "Server": {"type": "string"}
        }}}"#;
        let err = SchemaDocument::from_str(text, DocumentFormat::Json).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Load(SchemaLoadError::DuplicateKey(ref name)) if name == "Server"
        ));
    }

    #[test]
    fn test_duplicate_yaml_entities_are_rejected() {
        let text = "components:\n  schemas:\n    Server: {type: object}\n    Server: {type: string}\n";
        let err = SchemaDocument::from_str(text, DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Load(SchemaLoadError::DuplicateKey(ref name)) if name == "Server"
        ));
    }

    #[test]
    fn test_missing_container() {
        let document =
            SchemaDocument::from_str(r#"{"openapi": "3.1.0"}"#, DocumentFormat::Json).unwrap();
        assert!(matches!(
            document.registry(),
            Err(DocumentError::Load(SchemaLoadError::MissingContainer { .. }))
        ));
    }

    #[test]
    fn test_non_object_document() {
        let document = SchemaDocument::from_str("- a\n- b\n", DocumentFormat::Yaml).unwrap();
        assert!(matches!(
            document.registry(),
            Err(DocumentError::Load(SchemaLoadError::NotAnObject))
        ));
    }

    #[test]
    fn test_yaml_numeric_keys_become_strings() {
        let document =
            SchemaDocument::from_str("responses:\n  200:\n    description: ok\n", DocumentFormat::Yaml)
                .unwrap();
        assert_eq!(
            document.value(),
            &json!({"responses": {"200": {"description": "ok"}}})
        );
    }

    #[test]
    fn test_fingerprint_ignores_encoding() {
        let yaml = SchemaDocument::from_str("a: 1\nb: [x, y]\n", DocumentFormat::Yaml).unwrap();
        let json =
            SchemaDocument::from_str(r#"{ "a": 1, "b": ["x", "y"] }"#, DocumentFormat::Json)
                .unwrap();
        assert_eq!(yaml.fingerprint(), json.fingerprint());
        assert_eq!(yaml.fingerprint().len(), 64);
    }

    #[test]
    fn test_bundled_paths() {
        let document = SchemaDocument::bundled().unwrap();
        assert!(document.paths().any(|p| p == "/v0/publish"));
        assert_eq!(document.paths().count(), 5);
    }

    #[test]
    fn test_loader_falls_back_to_bundled() {
        let document = SchemaDocument::builder()
            .from_path("/nonexistent/openapi.yaml")
            .with_bundled()
            .build()
            .unwrap();
        assert!(matches!(document.source(), DocumentSource::Multiple(s) if s.len() == 2));
    }

    #[test]
    fn test_loader_all_fail() {
        let result = SchemaDocument::builder()
            .from_path("/nonexistent/a.json")
            .from_path("/nonexistent/b.yaml")
            .build();
        assert!(matches!(result, Err(DocumentError::NoSourcesAvailable)));
    }

    #[test]
    fn test_loader_without_sources() {
        assert!(matches!(
            DocumentLoader::new().build(),
            Err(DocumentError::NoSourcesAvailable)
        ));
    }
}
