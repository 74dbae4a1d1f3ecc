//! Validation results and the document walker.
//!
//! A failed validation is data, not an error: [`ValidationResult::Invalid`]
//! carries every violation found, each with the [`FieldPath`] from the
//! document root, a [`ConstraintKind`] and a readable message.
//!
//! # Examples
//!
//! ```
//! use registry_contract_core::{Compiler, ConstraintKind, Registry};
//! use serde_json::json;
//!
//! let registry = Registry::from_entries([(
//!     "Server",
//!     json!({
//!         "type": "object",
//!         "required": ["name", "version"],
//!         "properties": {"name": {"type": "string"}, "version": {"type": "string"}}
//!     }),
//! )])
//! .unwrap();
//!
//! let validator = Compiler::new(&registry).compile("Server").unwrap();
//! let result = validator.validate(&json!({"name": "io.example/server"}));
//! let errors = result.errors();
//! assert_eq!(errors.len(), 1);
//! assert_eq!(errors[0].path.to_string(), "version");
//! assert_eq!(errors[0].kind, ConstraintKind::Required);
//! ```

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

use crate::compile::{Graph, Node, NodeId, ObjectNode, Variant};
use crate::shape::{StringFormat, UnknownFields};

/// One step from a parent value to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array position.
    Index(usize),
    /// Object property.
    Key(String),
}

/// Location of a value within a document, from the root.
///
/// Displays as `servers[0].server.name`; keys that are not plain
/// identifiers are bracket-quoted (`headers["x-api-key"]`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Segments from the root.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Returns `true` for the document root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Returns a copy of this path with `segment` prepended.
    pub fn prefixed(&self, segment: PathSegment) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(segment);
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// RFC 6901 JSON Pointer to the same location.
    ///
    /// ```
    /// use registry_contract_core::{FieldPath, PathSegment};
    ///
    /// let path = FieldPath::from(vec![
    ///     PathSegment::Key("servers".into()),
    ///     PathSegment::Index(0),
    ///     PathSegment::Key("a/b".into()),
    /// ]);
    /// assert_eq!(path.to_pointer(), "/servers/0/a~1b");
    /// assert_eq!(path.to_string(), r#"servers[0]["a/b"]"#);
    /// ```
    pub fn to_pointer(&self) -> String {
        let mut pointer = String::new();
        for segment in &self.0 {
            pointer.push('/');
            match segment {
                PathSegment::Index(i) => pointer.push_str(&i.to_string()),
                PathSegment::Key(key) => {
                    pointer.push_str(&key.replace('~', "~0").replace('/', "~1"))
                }
            }
        }
        pointer
    }
}

impl From<Vec<PathSegment>> for FieldPath {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Index(index) => write!(f, "[{index}]")?,
                PathSegment::Key(key) if is_identifier(key) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(key)?;
                }
                PathSegment::Key(key) => write!(f, "[{}]", Value::String(key.clone()))?,
            }
        }
        Ok(())
    }
}

/// The kind of constraint a value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// The value has the wrong JSON type.
    TypeMismatch,
    /// A required field is absent.
    Required,
    /// A string is outside its closed set.
    Enum,
    /// The value differs from the expected literal.
    Literal,
    /// A string does not match its declared format.
    Format,
}

/// A single violation found while validating a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Where the violation occurred.
    pub path: FieldPath,
    /// Which constraint failed.
    pub kind: ConstraintKind,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation of a rejected document, as one error value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// Iterates over the violations.
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there is no violation.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// A document that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// Input with defaults applied and unknown fields kept or dropped.
    pub document: Value,
    /// Label of the variant chosen when the validated entity is a union.
    pub variant: Option<String>,
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    /// The document satisfies the shape.
    Valid(Validated),
    /// The document violates the shape; never empty.
    Invalid(Vec<ValidationError>),
}

impl ValidationResult {
    /// Returns `true` for [`ValidationResult::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    /// Normalized document, if valid.
    pub fn document(&self) -> Option<&Value> {
        match self {
            ValidationResult::Valid(validated) => Some(&validated.document),
            ValidationResult::Invalid(_) => None,
        }
    }

    /// Chosen union variant, if valid and the root is a union.
    pub fn variant(&self) -> Option<&str> {
        match self {
            ValidationResult::Valid(validated) => validated.variant.as_deref(),
            ValidationResult::Invalid(_) => None,
        }
    }

    /// Violations; empty when valid.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidationResult::Valid(_) => &[],
            ValidationResult::Invalid(errors) => errors,
        }
    }

    /// Converts into a `Result` for `?`-style callers.
    ///
    /// # Errors
    ///
    /// Returns every violation as [`ValidationErrors`].
    pub fn into_result(self) -> Result<Validated, ValidationErrors> {
        match self {
            ValidationResult::Valid(validated) => Ok(validated),
            ValidationResult::Invalid(errors) => Err(ValidationErrors(errors)),
        }
    }

    /// Condenses the result into the `{valid, errors?}` report.
    pub fn report(&self) -> ValidationReport {
        match self {
            ValidationResult::Valid(_) => ValidationReport {
                valid: true,
                errors: None,
            },
            ValidationResult::Invalid(errors) => ValidationReport {
                valid: false,
                errors: Some(
                    errors
                        .iter()
                        .map(|e| ReportedError {
                            path: e.path.to_string(),
                            message: e.message.clone(),
                        })
                        .collect(),
                ),
            },
        }
    }
}

/// Serializable `{valid, errors?: [{path, message}]}` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Whether the document was accepted.
    pub valid: bool,
    /// Violations, omitted when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ReportedError>>,
}

/// One entry of [`ValidationReport::errors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    /// Display form of the [`FieldPath`].
    pub path: String,
    /// Human-readable description.
    pub message: String,
}

/// Failure of [`Validator::parse`](crate::Validator::parse).
#[derive(Debug, Error)]
pub enum ParseError {
    /// The document violates the shape.
    #[error("document is invalid: {0}")]
    Invalid(#[from] ValidationErrors),

    /// The normalized document does not fit the target type.
    #[error("failed to deserialize validated document: {0}")]
    Deserialize(#[from] serde_json::Error),
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if is_integral(n) => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_integral(number: &serde_json::Number) -> bool {
    number.is_i64()
        || number.is_u64()
        || number.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

// Whole floats such as `5.0` become `5` so typed integer fields accept them.
fn normalize_integer(number: &serde_json::Number) -> Value {
    if number.is_i64() || number.is_u64() {
        return Value::Number(number.clone());
    }
    match number.as_f64() {
        Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => Value::from(f as i64),
        _ => Value::Number(number.clone()),
    }
}

/// Deep merge of the outputs of both sides of an intersection.
///
/// Objects merge key by key and equal-length arrays element by element. On
/// any other disagreement the side that changed the input wins, so a value
/// one side only passed through never hides the other side's defaults.
pub(crate) fn merge_outputs(left: Value, right: Value, input: Option<&Value>) -> Value {
    match (left, right) {
        (Value::Object(mut merged), Value::Object(other)) => {
            for (key, element) in other {
                let child = input.and_then(|v| v.get(&key));
                match merged.get_mut(&key) {
                    Some(existing) => {
                        let current = std::mem::take(existing);
                        *existing = merge_outputs(current, element, child);
                    }
                    None => {
                        merged.insert(key, element);
                    }
                }
            }
            Value::Object(merged)
        }
        (Value::Array(items), Value::Array(other)) if items.len() == other.len() => Value::Array(
            items
                .into_iter()
                .zip(other)
                .enumerate()
                .map(|(i, (a, b))| merge_outputs(a, b, input.and_then(|v| v.get(i))))
                .collect(),
        ),
        (left, right) if input == Some(&left) && input != Some(&right) => right,
        (left, _) => left,
    }
}

/// Walks a document against a compiled graph.
pub(crate) struct Walker<'g> {
    graph: &'g Graph,
    path: Vec<PathSegment>,
    root_variant: Option<String>,
}

impl<'g> Walker<'g> {
    pub(crate) fn new(graph: &'g Graph) -> Self {
        Self {
            graph,
            path: Vec::new(),
            root_variant: None,
        }
    }

    pub(crate) fn run(mut self, root: NodeId, document: &Value) -> ValidationResult {
        let mut errors = Vec::new();
        let output = self.walk(root, document, &mut errors);
        if errors.is_empty() {
            ValidationResult::Valid(Validated {
                document: output,
                variant: self.root_variant,
            })
        } else {
            ValidationResult::Invalid(errors)
        }
    }

    fn fail(&self, errors: &mut Vec<ValidationError>, kind: ConstraintKind, message: String) {
        errors.push(ValidationError {
            path: FieldPath(self.path.clone()),
            kind,
            message,
        });
    }

    fn mismatch(&self, errors: &mut Vec<ValidationError>, expected: &str, value: &Value) {
        self.fail(
            errors,
            ConstraintKind::TypeMismatch,
            format!("expected {expected}, received {}", json_type(value)),
        );
    }

    fn walk(&mut self, id: NodeId, value: &Value, errors: &mut Vec<ValidationError>) -> Value {
        let graph = self.graph;
        debug_assert!(
            !matches!(graph.node(id), Node::Pending),
            "unresolved placeholder node {id} reached during validation"
        );
        match graph.node(id) {
            // Only reachable from a graph whose compilation did not finish.
            Node::Pending => value.clone(),
            Node::Unknown => value.clone(),
            Node::Entity { target, .. } => self.walk(*target, value, errors),
            Node::String(format) => {
                match value.as_str() {
                    Some(text) => self.check_format(*format, text, errors),
                    None => self.mismatch(errors, "string", value),
                }
                value.clone()
            }
            Node::Integer => match value {
                Value::Number(n) if is_integral(n) => normalize_integer(n),
                _ => {
                    self.mismatch(errors, "integer", value);
                    value.clone()
                }
            },
            Node::Number => {
                if !value.is_number() {
                    self.mismatch(errors, "number", value);
                }
                value.clone()
            }
            Node::Boolean => {
                if !value.is_boolean() {
                    self.mismatch(errors, "boolean", value);
                }
                value.clone()
            }
            Node::Literal(expected) => {
                if value != expected {
                    self.fail(
                        errors,
                        ConstraintKind::Literal,
                        format!("expected literal {expected}, received {value}"),
                    );
                }
                value.clone()
            }
            Node::Enum(options) => {
                match value.as_str() {
                    Some(text) if options.iter().any(|o| o == text) => {}
                    Some(text) => {
                        let expected = options
                            .iter()
                            .map(|o| format!("'{o}'"))
                            .collect::<Vec<_>>()
                            .join(" | ");
                        self.fail(
                            errors,
                            ConstraintKind::Enum,
                            format!("invalid enum value '{text}': expected one of {expected}"),
                        );
                    }
                    None => self.mismatch(errors, "string", value),
                }
                value.clone()
            }
            Node::Array(item) => match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for (i, element) in items.iter().enumerate() {
                        self.path.push(PathSegment::Index(i));
                        out.push(self.walk(*item, element, errors));
                        self.path.pop();
                    }
                    Value::Array(out)
                }
                _ => {
                    self.mismatch(errors, "array", value);
                    value.clone()
                }
            },
            Node::Record(item) => match value {
                Value::Object(entries) => {
                    let mut out = Map::with_capacity(entries.len());
                    for (key, element) in entries {
                        self.path.push(PathSegment::Key(key.clone()));
                        out.insert(key.clone(), self.walk(*item, element, errors));
                        self.path.pop();
                    }
                    Value::Object(out)
                }
                _ => {
                    self.mismatch(errors, "object", value);
                    value.clone()
                }
            },
            Node::Object(object) => self.object(object, value, errors),
            Node::Union(variants) => self.union(variants, value, errors),
            Node::Intersection(left, right) => {
                let left = self.walk(*left, value, errors);
                let right = self.walk(*right, value, errors);
                merge_outputs(left, right, Some(value))
            }
        }
    }

    fn check_format(&self, format: StringFormat, text: &str, errors: &mut Vec<ValidationError>) {
        let problem = match format {
            StringFormat::Any => None,
            StringFormat::Uri => url::Url::parse(text).err().map(|e| e.to_string()),
            StringFormat::DateTime => chrono::DateTime::parse_from_rfc3339(text)
                .err()
                .map(|e| e.to_string()),
        };
        if let (Some(problem), Some(name)) = (problem, format.name()) {
            self.fail(
                errors,
                ConstraintKind::Format,
                format!("invalid {name} '{text}': {problem}"),
            );
        }
    }

    fn object(
        &mut self,
        object: &ObjectNode,
        value: &Value,
        errors: &mut Vec<ValidationError>,
    ) -> Value {
        let Value::Object(entries) = value else {
            self.mismatch(errors, "object", value);
            return value.clone();
        };

        let mut out = Map::with_capacity(entries.len());
        for (key, element) in entries {
            match object.field(key) {
                Some(field) => {
                    self.path.push(PathSegment::Key(key.clone()));
                    out.insert(key.clone(), self.walk(field.node, element, errors));
                    self.path.pop();
                }
                None if object.unknown == UnknownFields::Passthrough => {
                    out.insert(key.clone(), element.clone());
                }
                None => {}
            }
        }

        for field in &object.fields {
            if entries.contains_key(&field.name) {
                continue;
            }
            if field.required {
                self.path.push(PathSegment::Key(field.name.clone()));
                self.fail(errors, ConstraintKind::Required, "required field is missing".to_string());
                self.path.pop();
            } else if let Some(default) = &field.default {
                out.insert(field.name.clone(), default.clone());
            }
        }

        Value::Object(out)
    }

    fn union(
        &mut self,
        variants: &[Variant],
        value: &Value,
        errors: &mut Vec<ValidationError>,
    ) -> Value {
        let at_root = self.path.is_empty();
        let mut best_match: Option<(usize, &Variant, Value)> = None;
        let mut best_failure: Option<(&Variant, Vec<ValidationError>)> = None;

        for variant in variants {
            let mut attempt = Vec::new();
            let output = self.walk(variant.node, value, &mut attempt);

            if attempt.is_empty() {
                let score = self.specificity(variant.node, value);
                trace!(variant = %variant.label, score, "Union variant matched");
                if best_match.as_ref().is_none_or(|(best, _, _)| score > *best) {
                    best_match = Some((score, variant, output));
                }
            } else if best_failure
                .as_ref()
                .is_none_or(|(_, best)| failure_outranks(&attempt, best))
            {
                best_failure = Some((variant, attempt));
            }
        }

        if let Some((_, variant, output)) = best_match {
            if at_root {
                self.root_variant = Some(variant.label.clone());
            }
            return output;
        }

        if let Some((variant, failures)) = best_failure {
            trace!(variant = %variant.label, errors = failures.len(), "No union variant matched");
            errors.extend(failures.into_iter().map(|mut e| {
                e.message = format!("{} (closest variant: {})", e.message, variant.label);
                e
            }));
        }
        value.clone()
    }

    /// Number of the candidate's keys declared by the variant.
    fn specificity(&self, id: NodeId, value: &Value) -> usize {
        let Value::Object(entries) = value else {
            return 0;
        };
        let mut declared = Vec::new();
        self.declared_fields(id, &mut declared, 0);
        entries
            .keys()
            .filter(|key| declared.contains(&key.as_str()))
            .count()
    }

    fn declared_fields(&self, id: NodeId, out: &mut Vec<&'g str>, depth: usize) {
        if depth > self.graph.nodes.len() {
            return;
        }
        match self.graph.node(self.graph.resolve(id)) {
            Node::Object(object) => {
                out.extend(object.fields.iter().map(|f| f.name.as_str()));
            }
            Node::Intersection(left, right) => {
                self.declared_fields(*left, out, depth + 1);
                self.declared_fields(*right, out, depth + 1);
            }
            _ => {}
        }
    }
}

/// Deepest error path first, then fewer errors; ties keep the earlier variant.
fn failure_outranks(candidate: &[ValidationError], best: &[ValidationError]) -> bool {
    let depth = |errors: &[ValidationError]| errors.iter().map(|e| e.path.depth()).max();
    match depth(candidate).cmp(&depth(best)) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => candidate.len() < best.len(),
    }
}
