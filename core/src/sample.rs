//! Minimal document generation.

use serde_json::{Map, Value, json};

use crate::compile::{Graph, Node, NodeId};
use crate::shape::StringFormat;
use crate::validate::merge_outputs;

/// Builds the smallest document accepted by `root`: required fields only,
/// the first enum value, the first union variant and empty collections.
pub(crate) fn minimal(graph: &Graph, root: NodeId) -> Value {
    let mut stack = Vec::new();
    generate(graph, root, &mut stack)
}

fn generate(graph: &Graph, id: NodeId, stack: &mut Vec<NodeId>) -> Value {
    match graph.node(id) {
        Node::Pending | Node::Unknown => Value::Null,
        Node::Entity { target, .. } => {
            // A required field leading back to an entity on the stack has no
            // finite minimal document.
            if stack.contains(&id) {
                return Value::Null;
            }
            stack.push(id);
            let value = generate(graph, *target, stack);
            stack.pop();
            value
        }
        Node::String(StringFormat::Any) => json!(""),
        Node::String(StringFormat::Uri) => json!("https://example.com"),
        Node::String(StringFormat::DateTime) => json!("1970-01-01T00:00:00Z"),
        Node::Integer | Node::Number => json!(0),
        Node::Boolean => json!(false),
        Node::Literal(value) => value.clone(),
        Node::Enum(options) => options.first().map_or(Value::Null, |o| json!(o)),
        Node::Array(_) => json!([]),
        Node::Record(_) => json!({}),
        Node::Object(object) => {
            let mut out = Map::new();
            for field in object.fields.iter().filter(|f| f.required) {
                out.insert(field.name.clone(), generate(graph, field.node, stack));
            }
            Value::Object(out)
        }
        Node::Union(variants) => variants
            .first()
            .map_or(Value::Null, |v| generate(graph, v.node, stack)),
        Node::Intersection(left, right) => merge_outputs(
            generate(graph, *left, stack),
            generate(graph, *right, stack),
            None,
        ),
    }
}
