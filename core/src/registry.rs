//! Schema registry: entity definitions indexed by reference key.
//!
//! Built once from the `components.schemas` container of a Schema Document
//! and read-only afterwards. Every definition is lowered to a
//! [`Shape`] while indexing, so a malformed document fails up front rather
//! than on first use.
//!
//! # Examples
//!
//! ```
//! use registry_contract_core::Registry;
//! use serde_json::json;
//!
//! let registry = Registry::index(&json!({
//!     "components": {
//!         "schemas": {
//!             "Repository": {
//!                 "type": "object",
//!                 "required": ["url", "source", "id"],
//!                 "properties": {
//!                     "url": {"type": "string", "format": "uri"},
//!                     "source": {"type": "string"},
//!                     "id": {"type": "string"}
//!                 }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! assert!(registry.contains("Repository"));
//! assert!(registry.resolve("NoSuchEntity").is_err());
//! ```

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaLoadError, UnknownReferenceError};
use crate::shape::Shape;

/// Prefix of every internal reference: `#/components/schemas/<Name>`.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// JSON Pointer of the container that maps entity names to definitions.
pub const SCHEMAS_POINTER: &str = "/components/schemas";

/// Builds the internal reference pointer for `key`.
pub fn reference_pointer(key: &str) -> String {
    format!("{SCHEMA_REF_PREFIX}{key}")
}

/// A named entry of the registry.
#[derive(Debug, Clone)]
pub struct Entity {
    name: String,
    definition: Value,
    shape: Shape,
}

impl Entity {
    /// Reference key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw definition as found in the Schema Document.
    pub fn definition(&self) -> &Value {
        &self.definition
    }

    /// Definition lowered to the entity model.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

/// Immutable lookup of entities by reference key.
///
/// Safe to share across threads without locking.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl Registry {
    /// Indexes the `components.schemas` container of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaLoadError::NotAnObject`] or
    /// [`SchemaLoadError::MissingContainer`] for a malformed document, and
    /// anything [`from_entries`](Self::from_entries) rejects.
    pub fn index(document: &Value) -> Result<Self, SchemaLoadError> {
        if !document.is_object() {
            return Err(SchemaLoadError::NotAnObject);
        }
        let schemas = document
            .pointer(SCHEMAS_POINTER)
            .and_then(Value::as_object)
            .ok_or_else(|| SchemaLoadError::MissingContainer {
                pointer: SCHEMAS_POINTER.to_string(),
            })?;

        Self::from_entries(schemas.iter().map(|(name, def)| (name.clone(), def.clone())))
    }

    /// Indexes `(name, definition)` pairs in document order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaLoadError::EmptyKey`], [`SchemaLoadError::DuplicateKey`],
    /// [`SchemaLoadError::InvalidDefinition`] or
    /// [`SchemaLoadError::UnguardedRecursion`].
    pub fn from_entries<I, K>(entries: I) -> Result<Self, SchemaLoadError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut registry = Registry::default();

        for (name, definition) in entries {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(SchemaLoadError::EmptyKey);
            }
            if registry.index.contains_key(&name) {
                return Err(SchemaLoadError::DuplicateKey(name));
            }
            let shape = Shape::from_definition(&definition).map_err(|e| {
                SchemaLoadError::InvalidDefinition {
                    name: name.clone(),
                    reason: e.reason,
                }
            })?;

            registry.index.insert(name.clone(), registry.entities.len());
            registry.entities.push(Entity {
                name,
                definition,
                shape,
            });
        }

        for entity in &registry.entities {
            if registry.reaches_itself_unguarded(&entity.name) {
                return Err(SchemaLoadError::UnguardedRecursion(entity.name.clone()));
            }
        }

        debug!(entities = registry.len(), "Indexed schema registry");
        Ok(registry)
    }

    /// Raw definition registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if `key` is absent.
    pub fn resolve(&self, key: &str) -> Result<&Value, UnknownReferenceError> {
        self.entity(key).map(Entity::definition)
    }

    /// Lowered shape registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if `key` is absent.
    pub fn shape(&self, key: &str) -> Result<&Shape, UnknownReferenceError> {
        self.entity(key).map(Entity::shape)
    }

    /// Entity registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownReferenceError`] if `key` is absent.
    pub fn entity(&self, key: &str) -> Result<&Entity, UnknownReferenceError> {
        self.get(key).ok_or_else(|| UnknownReferenceError::new(key))
    }

    /// Looks up an entity without producing an error.
    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.index.get(key).map(|&i| &self.entities[i])
    }

    /// Returns `true` if `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Entity names in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    /// Entities in document order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // Objects, arrays and records consume document depth, so recursion
    // through them terminates; anything else would loop forever.
    fn reaches_itself_unguarded(&self, start: &str) -> bool {
        let mut pending = Vec::new();
        if let Some(entity) = self.get(start) {
            unguarded_references(&entity.shape, &mut pending);
        }

        let mut visited = HashSet::new();
        while let Some(key) = pending.pop() {
            if key == start {
                return true;
            }
            if visited.insert(key) {
                if let Some(entity) = self.get(key) {
                    unguarded_references(&entity.shape, &mut pending);
                }
            }
        }
        false
    }
}

fn unguarded_references<'a>(shape: &'a Shape, out: &mut Vec<&'a str>) {
    match shape {
        Shape::Ref(key) => out.push(key.as_str()),
        Shape::Optional { inner, .. } => unguarded_references(inner, out),
        Shape::Union(variants) => {
            for variant in variants {
                unguarded_references(variant, out);
            }
        }
        Shape::Intersection(left, right) => {
            unguarded_references(left, out);
            unguarded_references(right, out);
        }
        _ => {}
    }
}
