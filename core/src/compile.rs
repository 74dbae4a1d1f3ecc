//! Validator compilation.
//!
//! Shapes are compiled into an arena of nodes addressed by index. Every
//! entity gets exactly one node per arena; a reference to an entity that is
//! still being compiled receives its (not yet filled) slot, which is how
//! recursive and mutually recursive entities terminate. Intersections of
//! objects are merged while compiling, so validation never re-derives them.
//!
//! # Examples
//!
//! ```
//! use registry_contract_core::{Compiler, Registry};
//! use serde_json::json;
//!
//! let registry = Registry::index(&json!({
//!     "components": {"schemas": {
//!         "Input": {
//!             "type": "object",
//!             "properties": {
//!                 "isSecret": {"type": "boolean", "default": false},
//!                 "variables": {
//!                     "type": "object",
//!                     "additionalProperties": {"$ref": "#/components/schemas/Input"}
//!                 }
//!             }
//!         }
//!     }}
//! }))
//! .unwrap();
//!
//! let validator = Compiler::new(&registry).compile("Input").unwrap();
//! let result = validator.validate(&json!({"variables": {"port": {}}}));
//! assert_eq!(
//!     result.document().unwrap(),
//!     &json!({"variables": {"port": {"isSecret": false}}, "isSecret": false})
//! );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::UnknownReferenceError;
use crate::merge::flatten;
use crate::registry::Registry;
use crate::shape::{ObjectShape, Shape, StringFormat, UnknownFields};
use crate::validate::{ParseError, ValidationReport, ValidationResult, Walker};

pub(crate) type NodeId = usize;

/// One compiled check.
#[derive(Debug, Clone)]
pub(crate) enum Node {
    /// Slot of an entity whose compilation has not finished.
    Pending,
    String(StringFormat),
    Integer,
    Number,
    Boolean,
    Unknown,
    Literal(Value),
    Enum(Vec<String>),
    Array(NodeId),
    Record(NodeId),
    Object(ObjectNode),
    Union(Vec<Variant>),
    Intersection(NodeId, NodeId),
    /// A named entity; `target` holds its compiled shape.
    Entity { key: String, target: NodeId },
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectNode {
    pub(crate) fields: Vec<FieldNode>,
    pub(crate) unknown: UnknownFields,
}

impl ObjectNode {
    pub(crate) fn field(&self, name: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FieldNode {
    pub(crate) name: String,
    pub(crate) node: NodeId,
    pub(crate) required: bool,
    pub(crate) default: Option<Value>,
}

#[derive(Debug, Clone)]
pub(crate) struct Variant {
    pub(crate) label: String,
    pub(crate) node: NodeId,
}

/// Compiled node arena shared by the validators built from it.
#[derive(Debug, Default)]
pub(crate) struct Graph {
    pub(crate) nodes: Vec<Node>,
}

impl Graph {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Follows entity indirections to the node that does the checking.
    pub(crate) fn resolve(&self, mut id: NodeId) -> NodeId {
        // Registry indexing rejects entities that alias themselves, so this
        // chain is finite; the bound only guards hand-built graphs.
        for _ in 0..self.nodes.len() {
            match &self.nodes[id] {
                Node::Entity { target, .. } => id = *target,
                _ => return id,
            }
        }
        id
    }
}

struct GraphBuilder<'r> {
    registry: &'r Registry,
    nodes: Vec<Node>,
    entities: HashMap<String, NodeId>,
}

impl<'r> GraphBuilder<'r> {
    fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            entities: HashMap::new(),
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn entity(&mut self, key: &str) -> Result<NodeId, UnknownReferenceError> {
        if let Some(&id) = self.entities.get(key) {
            return Ok(id);
        }

        let shape = self.registry.shape(key)?;
        let slot = self.push(Node::Pending);
        self.entities.insert(key.to_string(), slot);

        let target = self.shape(shape)?;
        self.nodes[slot] = Node::Entity {
            key: key.to_string(),
            target,
        };
        Ok(slot)
    }

    fn shape(&mut self, shape: &Shape) -> Result<NodeId, UnknownReferenceError> {
        let node = match shape {
            Shape::String(format) => Node::String(*format),
            Shape::Integer => Node::Integer,
            Shape::Number => Node::Number,
            Shape::Boolean => Node::Boolean,
            Shape::Unknown => Node::Unknown,
            Shape::Literal(value) => Node::Literal(value.clone()),
            Shape::Enum(values) => Node::Enum(values.clone()),
            Shape::Array(item) => Node::Array(self.shape(item)?),
            Shape::Record(value) => Node::Record(self.shape(value)?),
            Shape::Object(object) => Node::Object(self.object(object)?),
            // Presence only matters for object fields; elsewhere an optional
            // value is checked like its inner shape.
            Shape::Optional { inner, .. } => return self.shape(inner),
            Shape::Union(variants) => {
                let mut compiled = Vec::with_capacity(variants.len());
                for (i, variant) in variants.iter().enumerate() {
                    let label = match variant.presence().0 {
                        Shape::Ref(key) => key.clone(),
                        _ => format!("variant {}", i + 1),
                    };
                    compiled.push(Variant {
                        label,
                        node: self.shape(variant)?,
                    });
                }
                Node::Union(compiled)
            }
            Shape::Intersection(left, right) => match flatten(self.registry, shape) {
                Some(merged) => Node::Object(self.object(&merged)?),
                None => Node::Intersection(self.shape(left)?, self.shape(right)?),
            },
            Shape::Ref(key) => return self.entity(key),
        };
        Ok(self.push(node))
    }

    fn object(&mut self, object: &ObjectShape) -> Result<ObjectNode, UnknownReferenceError> {
        let mut fields = Vec::with_capacity(object.fields.len());
        for field in &object.fields {
            let (shape, default) = field.shape.presence();
            fields.push(FieldNode {
                name: field.name.clone(),
                node: self.shape(shape)?,
                required: field.is_required(),
                default: default.cloned(),
            });
        }
        Ok(ObjectNode {
            fields,
            unknown: object.unknown,
        })
    }

    fn finish(self) -> Graph {
        Graph { nodes: self.nodes }
    }
}

/// Compiles registry entities and inline shapes into [`Validator`]s.
#[derive(Debug, Clone, Copy)]
pub struct Compiler<'r> {
    registry: &'r Registry,
}

impl<'r> Compiler<'r> {
    /// Creates a compiler resolving references against `registry`.
    pub fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    /// Compiles the entity registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if `key`, or any entity it
    /// transitively references, is not registered.
    pub fn compile(&self, key: &str) -> Result<Validator, UnknownReferenceError> {
        let mut builder = GraphBuilder::new(self.registry);
        let root = builder.entity(key)?;
        let graph = builder.finish();
        debug!(entity = key, nodes = graph.nodes.len(), "Compiled validator");

        Ok(Validator {
            graph: Arc::new(graph),
            root,
            name: Some(key.to_string()),
        })
    }

    /// Compiles an inline shape whose references resolve against the registry.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] for an unregistered reference.
    pub fn compile_shape(&self, shape: &Shape) -> Result<Validator, UnknownReferenceError> {
        let mut builder = GraphBuilder::new(self.registry);
        let root = builder.shape(shape)?;
        Ok(Validator {
            graph: Arc::new(builder.finish()),
            root,
            name: None,
        })
    }

    /// Compiles every registered entity into one shared arena.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] for the first dangling reference.
    pub fn compile_all(&self) -> Result<ValidatorSet, UnknownReferenceError> {
        let mut builder = GraphBuilder::new(self.registry);
        let mut roots = Vec::with_capacity(self.registry.len());
        for key in self.registry.keys() {
            roots.push((key.to_string(), builder.entity(key)?));
        }
        let graph = builder.finish();
        debug!(
            entities = roots.len(),
            nodes = graph.nodes.len(),
            "Compiled validator set"
        );

        Ok(ValidatorSet {
            graph: Arc::new(graph),
            roots,
        })
    }
}

/// A compiled check of documents against one entity or inline shape.
///
/// Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct Validator {
    graph: Arc<Graph>,
    root: NodeId,
    name: Option<String>,
}

impl Validator {
    /// Entity name, or `None` for an inline shape.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Validates `document`, collecting every violation.
    pub fn validate(&self, document: &Value) -> ValidationResult {
        Walker::new(&self.graph).run(self.root, document)
    }

    /// Validates `document` and reports `{valid, errors?}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_contract_core::{Compiler, Registry};
    /// use serde_json::json;
    ///
    /// let registry = Registry::from_entries([(
    ///     "Remote",
    ///     json!({
    ///         "type": "object",
    ///         "required": ["type", "url"],
    ///         "properties": {
    ///             "type": {"type": "string", "enum": ["streamable-http", "sse"]},
    ///             "url": {"type": "string", "format": "uri"}
    ///         }
    ///     }),
    /// )])
    /// .unwrap();
    ///
    /// let validator = Compiler::new(&registry).compile("Remote").unwrap();
    /// let report = validator.check(&json!({"type": "ftp", "url": "https://example.com"}));
    /// assert!(!report.valid);
    /// assert_eq!(report.errors.unwrap()[0].path, "type");
    /// ```
    pub fn check(&self, document: &Value) -> ValidationReport {
        self.validate(document).report()
    }

    /// Validates `document` and deserializes the normalized output.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Invalid`] with every violation, or
    /// [`ParseError::Deserialize`] if the normalized output does not fit `T`.
    pub fn parse<T: DeserializeOwned>(&self, document: &Value) -> Result<T, ParseError> {
        let validated = self.validate(document).into_result()?;
        Ok(serde_json::from_value(validated.document)?)
    }

    /// Generates the smallest document this validator accepts.
    pub fn minimal_document(&self) -> Value {
        crate::sample::minimal(&self.graph, self.root)
    }
}

/// Validators for every registry entity sharing one compiled arena.
#[derive(Debug, Clone)]
pub struct ValidatorSet {
    graph: Arc<Graph>,
    roots: Vec<(String, NodeId)>,
}

impl ValidatorSet {
    /// Validator for the entity registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if `key` is not registered.
    pub fn get(&self, key: &str) -> Result<Validator, UnknownReferenceError> {
        self.roots
            .iter()
            .find(|(name, _)| name == key)
            .map(|(name, root)| Validator {
                graph: Arc::clone(&self.graph),
                root: *root,
                name: Some(name.clone()),
            })
            .ok_or_else(|| UnknownReferenceError::new(key))
    }

    /// Entity names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|(name, _)| name.as_str())
    }

    /// Number of validators.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Returns `true` if the set holds no validator.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::shape::{array, enumeration, object, reference, string};

    fn registry() -> Registry {
        Registry::from_entries([
            (
                "Input",
                json!({
                    "type": "object",
                    "properties": {
                        "description": {"type": "string"},
                        "variables": {
                            "type": "object",
                            "additionalProperties": {"$ref": "#/components/schemas/Input"}
                        }
                    }
                }),
            ),
            (
                "Named",
                json!({
                    "allOf": [
                        {"$ref": "#/components/schemas/Input"},
                        {
                            "type": "object",
                            "required": ["name"],
                            "properties": {"name": {"type": "string"}}
                        }
                    ]
                }),
            ),
            ("Ping", json!({"$ref": "#/components/schemas/Pong"})),
            (
                "Pong",
                json!({"type": "array", "items": {"$ref": "#/components/schemas/Ping"}}),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_recursive_entity_shares_one_node() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        let first = builder.entity("Input").unwrap();
        let second = builder.entity("Input").unwrap();
        assert_eq!(first, second);
        assert!(builder.nodes.iter().all(|n| !matches!(n, Node::Pending)));
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let registry = registry();
        let validator = Compiler::new(&registry).compile("Ping").unwrap();
        assert!(validator.validate(&json!([[[]], []])).is_valid());
        assert!(!validator.validate(&json!([["x"]])).is_valid());
    }

    #[test]
    fn test_intersection_of_objects_is_merged() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        let root = builder.entity("Named").unwrap();
        let graph = builder.finish();
        let Node::Object(object) = graph.node(graph.resolve(root)) else {
            panic!("expected merged object");
        };
        assert!(object.field("description").is_some());
        assert!(object.field("name").unwrap().required);
    }

    #[test]
    fn test_compile_unknown_key() {
        let registry = registry();
        let err = Compiler::new(&registry).compile("NoSuchEntity").unwrap_err();
        assert_eq!(err.key, "NoSuchEntity");
    }

    #[test]
    fn test_compile_shape_reports_dangling_reference() {
        let registry = registry();
        let err = Compiler::new(&registry)
            .compile_shape(&array(reference("Missing")))
            .unwrap_err();
        assert_eq!(err.key, "Missing");
    }

    #[test]
    fn test_compile_shape_inline() {
        let registry = registry();
        let validator = Compiler::new(&registry)
            .compile_shape(&object([
                ("kind", enumeration(["a", "b"])),
                ("input", reference("Input")),
            ]))
            .unwrap();
        assert_eq!(validator.name(), None);
        assert!(
            validator
                .validate(&json!({"kind": "a", "input": {"description": "d"}}))
                .is_valid()
        );
    }

    #[test]
    fn test_compile_all_covers_every_entity() {
        let registry = registry();
        let set = Compiler::new(&registry).compile_all().unwrap();
        assert_eq!(set.names().collect::<Vec<_>>(), ["Input", "Named", "Ping", "Pong"]);
        let named = set.get("Named").unwrap();
        assert_eq!(named.name(), Some("Named"));
        assert!(!named.validate(&json!({})).is_valid());
        assert!(set.get("Nope").is_err());
    }

    #[test]
    fn test_union_labels() {
        let registry = registry();
        let mut builder = GraphBuilder::new(&registry);
        let root = builder
            .shape(&crate::shape::union([reference("Input"), string()]))
            .unwrap();
        let Node::Union(variants) = &builder.nodes[root] else {
            panic!("expected union");
        };
        let labels: Vec<_> = variants.iter().map(|v| v.label.as_str()).collect();
        assert_eq!(labels, ["Input", "variant 2"]);
    }
}
