//! Configuration of document sources, conversion and batch validation.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! document: openapi.yaml
//! conversion:
//!   input: openapi.yaml
//!   output: src/openapi.json
//! validation:
//!   jobs: 4
//! ```
//!
//! Every field is optional; an empty file yields
//! [`ContractConfig::default`].

use std::io::{BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::loader::{DocumentLoader, SchemaDocument};

/// Paths of the YAML to JSON conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// YAML document to read.
    pub input: PathBuf,
    /// JSON document to write.
    pub output: PathBuf,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("openapi.yaml"),
            output: PathBuf::from("src/openapi.json"),
        }
    }
}

/// Settings for batch validation of documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Number of parallel validation workers.
    pub jobs: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Top-level configuration.
///
/// # Examples
///
/// ```
/// use registry_contract_document::ContractConfig;
///
/// let config: ContractConfig = serde_yaml::from_str("validation: {jobs: 8}").unwrap();
/// assert_eq!(config.validation.jobs, 8);
/// assert_eq!(config.conversion.output.to_str(), Some("src/openapi.json"));
/// assert!(config.document.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    /// Schema document to load; the bundled document when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<PathBuf>,
    pub conversion: ConversionConfig,
    pub validation: ValidationConfig,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            document: None,
            conversion: ConversionConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

impl ContractConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::DocumentError::Io) if the file cannot be read,
    /// or [`Yaml`](crate::DocumentError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut text = String::new();
        BufReader::new(std::fs::File::open(path)?).read_to_string(&mut text)?;
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&text)?)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::DocumentError::Io) if the file cannot be
    /// written, or [`Yaml`](crate::DocumentError::Yaml) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Loads the configured schema document.
    ///
    /// A configured path is used alone so that a broken file is reported
    /// rather than masked by the bundled document.
    ///
    /// # Errors
    ///
    /// Returns the load error of the configured file, or
    /// [`NoSourcesAvailable`](crate::DocumentError::NoSourcesAvailable).
    pub fn load_document(&self) -> Result<SchemaDocument> {
        match &self.document {
            Some(path) => SchemaDocument::from_path(path),
            None => DocumentLoader::new().with_bundled().build(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1.0"
document: schemas/openapi.yaml
conversion:
  input: schemas/openapi.yaml
  output: build/openapi.json
validation:
  jobs: 8
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: ContractConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.document, Some(PathBuf::from("schemas/openapi.yaml")));
        assert_eq!(config.conversion.input, PathBuf::from("schemas/openapi.yaml"));
        assert_eq!(config.conversion.output, PathBuf::from("build/openapi.json"));
        assert_eq!(config.validation.jobs, 8);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: ContractConfig =
            serde_yaml::from_str("conversion:\n  output: out.json\n").unwrap();
        assert_eq!(config.conversion.input, PathBuf::from("openapi.yaml"));
        assert_eq!(config.conversion.output, PathBuf::from("out.json"));
        assert_eq!(config.validation.jobs, 4);
    }

    #[test]
    fn test_load_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = ContractConfig::load(file.path()).unwrap();
        assert_eq!(config, ContractConfig::default());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.yml");

        let original: ContractConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        original.save(&path).unwrap();

        let loaded = ContractConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_document_defaults_to_bundled() {
        let document = ContractConfig::default().load_document().unwrap();
        assert!(document.registry().unwrap().contains("ServerList"));
    }

    #[test]
    fn test_load_document_reports_missing_file() {
        let config = ContractConfig {
            document: Some(PathBuf::from("/nonexistent/openapi.yaml")),
            ..ContractConfig::default()
        };
        assert!(matches!(
            config.load_document(),
            Err(crate::DocumentError::Io(_))
        ));
    }
}
