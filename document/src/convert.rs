//! YAML to JSON conversion of the schema document.

use std::path::Path;

use tracing::info;

use crate::error::Result;

/// Converts YAML text to pretty-printed JSON (two-space indent, trailing
/// newline), keeping mapping order.
///
/// # Errors
///
/// Returns [`Yaml`](crate::DocumentError::Yaml) for malformed input, or
/// [`Json`](crate::DocumentError::Json) for values JSON cannot represent.
///
/// # Examples
///
/// ```
/// use registry_contract_document::yaml_to_json;
///
/// let json = yaml_to_json("openapi: 3.1.0\ninfo:\n  title: Registry\n").unwrap();
/// assert_eq!(
///     json,
///     "{\n  \"openapi\": \"3.1.0\",\n  \"info\": {\n    \"title\": \"Registry\"\n  }\n}\n"
/// );
/// ```
pub fn yaml_to_json(yaml: &str) -> Result<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    let mut json = serde_json::to_string_pretty(&value)?;
    json.push('\n');
    Ok(json)
}

/// Reads the YAML document at `input` and writes its JSON encoding to
/// `output`, overwriting any existing file and creating missing parent
/// directories.
///
/// # Errors
///
/// Returns [`Io`](crate::DocumentError::Io) on read or write failure, or any
/// error of [`yaml_to_json`].
pub fn convert(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<()> {
    let (input, output) = (input.as_ref(), output.as_ref());

    let yaml = std::fs::read_to_string(input)?;
    let json = yaml_to_json(&yaml)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, json)?;

    info!(input = %input.display(), output = %output.display(), "Converted schema document");
    Ok(())
}
