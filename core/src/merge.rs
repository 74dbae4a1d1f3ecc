//! Compile-time merging of intersected object shapes.
//!
//! `allOf` composition in the registry (for example `NamedArgument` built on
//! `InputWithVariables` built on `Input`) is expressed as nested
//! intersections. When every operand resolves to an object, the compiler
//! folds them into a single object with [`merge_objects`] instead of checking
//! each side separately at runtime.
//!
//! # Example
//!
//! ```
//! use registry_contract_core::merge_objects;
//! use registry_contract_core::shape::{self, Shape};
//!
//! let Shape::Object(base) = shape::object([
//!     ("name", shape::string()),
//!     ("isRequired", shape::boolean().with_default(false)),
//! ]) else { unreachable!() };
//!
//! let Shape::Object(overlay) = shape::object([
//!     ("isRequired", shape::boolean()),
//!     ("isRepeated", shape::boolean().with_default(false)),
//! ])
//! .passthrough() else { unreachable!() };
//!
//! let merged = merge_objects(&base, &overlay);
//! assert_eq!(merged.fields.len(), 3);
//! assert!(merged.field("isRequired").unwrap().is_required());
//! ```

use crate::registry::Registry;
use crate::shape::{Field, ObjectShape, Shape, UnknownFields, intersection};

/// Merges two object shapes into one.
///
/// Fields keep `base` declaration order with new `overlay` fields appended.
/// A field declared on both sides must satisfy both shapes and is required
/// when either side requires it; otherwise the first declared default is
/// kept. The result passes unknown fields through if either side does.
pub fn merge_objects(base: &ObjectShape, overlay: &ObjectShape) -> ObjectShape {
    let mut fields: Vec<Field> = base.fields.clone();

    for theirs in &overlay.fields {
        let Some(ours) = fields.iter_mut().find(|f| f.name == theirs.name) else {
            fields.push(theirs.clone());
            continue;
        };

        let (our_shape, our_default) = ours.shape.presence();
        let (their_shape, their_default) = theirs.shape.presence();

        let shape = if our_shape == their_shape {
            our_shape.clone()
        } else {
            intersection(our_shape.clone(), their_shape.clone())
        };

        ours.shape = if ours.is_required() || theirs.is_required() {
            shape
        } else {
            match our_default.or(their_default) {
                Some(default) => shape.with_default(default.clone()),
                None => shape.optional(),
            }
        };
    }

    let unknown = if base.unknown == UnknownFields::Passthrough
        || overlay.unknown == UnknownFields::Passthrough
    {
        UnknownFields::Passthrough
    } else {
        UnknownFields::Strip
    };

    ObjectShape { fields, unknown }
}

/// Resolves `shape` to a single object if it is an object, a reference to
/// one, or an intersection of such.
///
/// Returns `None` for anything else, including unknown references and
/// references that loop back to an entity already being flattened.
pub(crate) fn flatten(registry: &Registry, shape: &Shape) -> Option<ObjectShape> {
    let mut visiting = Vec::new();
    flatten_inner(registry, shape, &mut visiting)
}

fn flatten_inner<'r>(
    registry: &'r Registry,
    shape: &'r Shape,
    visiting: &mut Vec<&'r str>,
) -> Option<ObjectShape> {
    match shape {
        Shape::Object(object) => Some(object.clone()),
        Shape::Ref(key) => {
            if visiting.contains(&key.as_str()) {
                return None;
            }
            let target = registry.get(key)?;
            visiting.push(key.as_str());
            let flattened = flatten_inner(registry, target.shape(), visiting);
            visiting.pop();
            flattened
        }
        Shape::Intersection(left, right) => {
            let left = flatten_inner(registry, left, visiting)?;
            let right = flatten_inner(registry, right, visiting)?;
            Some(merge_objects(&left, &right))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::shape::{boolean, integer, object, reference, string};

    fn object_shape(shape: Shape) -> ObjectShape {
        match shape {
            Shape::Object(object) => object,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_appends_overlay_fields_in_order() {
        let base = object_shape(object([("a", string()), ("b", string())]));
        let overlay = object_shape(object([("c", string()), ("a", string())]));
        let merged = merge_objects(&base, &overlay);
        let names: Vec<_> = merged.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn test_merge_conflicting_field_intersects() {
        let base = object_shape(object([("value", string())]));
        let overlay = object_shape(object([("value", integer().optional())]));
        let merged = merge_objects(&base, &overlay);
        let field = merged.field("value").unwrap();
        assert!(field.is_required());
        assert_eq!(field.shape, intersection(string(), integer()));
    }

    #[test]
    fn test_merge_keeps_first_default() {
        let base = object_shape(object([("flag", boolean().with_default(false))]));
        let overlay = object_shape(object([("flag", boolean().with_default(true))]));
        let merged = merge_objects(&base, &overlay);
        assert_eq!(merged.field("flag").unwrap().default_value(), Some(&json!(false)));
    }

    #[test]
    fn test_merge_passthrough_wins() {
        let base = object_shape(object([("a", string())]));
        let overlay = object_shape(object([("b", string())]).passthrough());
        assert_eq!(
            merge_objects(&base, &overlay).unknown,
            UnknownFields::Passthrough
        );
        assert_eq!(merge_objects(&base, &base).unknown, UnknownFields::Strip);
    }

    #[test]
    fn test_flatten_follows_references() {
        let registry = Registry::from_entries([
            (
                "Input",
                json!({"type": "object", "properties": {"description": {"type": "string"}}}),
            ),
            (
                "KeyValueInput",
                json!({
                    "allOf": [
                        {"$ref": "#/components/schemas/Input"},
                        {"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}}
                    ]
                }),
            ),
        ])
        .unwrap();

        let flattened = flatten(&registry, &reference("KeyValueInput")).unwrap();
        assert!(flattened.field("description").is_some());
        assert!(flattened.field("name").unwrap().is_required());
        assert_eq!(flattened.unknown, UnknownFields::Passthrough);
    }

    #[test]
    fn test_flatten_rejects_non_objects() {
        let registry = Registry::from_entries([("Name", json!({"type": "string"}))]).unwrap();
        assert!(flatten(&registry, &intersection(reference("Name"), object([("a", string())]))).is_none());
        assert!(flatten(&registry, &reference("Missing")).is_none());
    }
}
