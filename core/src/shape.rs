//! Entity model: composable shape builders.
//!
//! Every entity of the registry is described as a [`Shape`] built from a
//! small set of primitives. Shapes are plain values; an entity refers to
//! another (or to itself) through [`reference`], which the
//! [`Compiler`](crate::Compiler) resolves against a
//! [`Registry`](crate::Registry), so definition order never matters.
//!
//! # Examples
//!
//! ```
//! use registry_contract_core::shape::{self, Shape};
//!
//! let remote = shape::object([
//!     ("type", shape::enumeration(["streamable-http", "sse"])),
//!     ("url", shape::uri()),
//!     ("headers", shape::array(shape::reference("KeyValueInput")).optional()),
//! ])
//! .passthrough();
//!
//! let Shape::Object(object) = &remote else { unreachable!() };
//! assert!(object.field("url").unwrap().is_required());
//! assert!(!object.field("headers").unwrap().is_required());
//! assert_eq!(remote.references(), vec!["KeyValueInput"]);
//! ```
//!
//! Shapes can also be lowered from an OpenAPI-style definition with
//! [`Shape::from_definition`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::SCHEMA_REF_PREFIX;

/// Extra constraint on string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
    /// Any string.
    #[default]
    Any,
    /// Absolute URL.
    Uri,
    /// RFC 3339 timestamp with offset.
    DateTime,
}

impl StringFormat {
    /// Name of the format as written in a schema document.
    pub fn name(self) -> Option<&'static str> {
        match self {
            StringFormat::Any => None,
            StringFormat::Uri => Some("uri"),
            StringFormat::DateTime => Some("date-time"),
        }
    }

    // Unrecognized annotations are ignored rather than rejected.
    fn from_name(name: &str) -> Self {
        match name {
            "uri" | "url" => StringFormat::Uri,
            "date-time" => StringFormat::DateTime,
            _ => StringFormat::Any,
        }
    }
}

/// What an object does with fields it does not declare.
///
/// Neither policy rejects a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFields {
    /// Drop undeclared fields from the normalized output.
    #[default]
    Strip,
    /// Keep undeclared fields unchanged in the normalized output.
    Passthrough,
}

/// A composable description of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A string, optionally constrained by a format.
    String(StringFormat),
    /// A number without a fractional part.
    Integer,
    /// Any number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// Anything, including `null`.
    Unknown,
    /// Exactly this value.
    Literal(Value),
    /// One of a closed set of strings.
    Enum(Vec<String>),
    /// A homogeneous array.
    Array(Box<Shape>),
    /// A mapping with arbitrary string keys and homogeneous values.
    Record(Box<Shape>),
    /// A mapping with declared fields.
    Object(ObjectShape),
    /// Absence is valid; `default` is filled in when the field is absent.
    Optional {
        /// Shape the value must satisfy when present.
        inner: Box<Shape>,
        /// Value applied to the normalized output when absent.
        default: Option<Value>,
    },
    /// Valid if at least one variant is.
    Union(Vec<Shape>),
    /// Valid only if both sides are.
    Intersection(Box<Shape>, Box<Shape>),
    /// Another entity, by reference key.
    Ref(String),
}

/// Declared fields of an object shape.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectShape {
    /// Fields in declaration order.
    pub fields: Vec<Field>,
    /// Policy for undeclared fields.
    pub unknown: UnknownFields,
}

impl ObjectShape {
    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A named field of an [`ObjectShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Property name.
    pub name: String,
    /// Shape of the value; [`Shape::Optional`] makes the field optional.
    pub shape: Shape,
}

impl Field {
    /// Returns `true` unless the field shape is optional.
    pub fn is_required(&self) -> bool {
        !matches!(self.shape, Shape::Optional { .. })
    }

    /// Default applied when the field is absent.
    pub fn default_value(&self) -> Option<&Value> {
        self.shape.presence().1
    }
}

/// A schema definition the entity model cannot express.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct InvalidShape {
    /// What was wrong.
    pub reason: String,
}

impl InvalidShape {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Any string.
pub fn string() -> Shape {
    Shape::String(StringFormat::Any)
}

/// An absolute URL.
pub fn uri() -> Shape {
    Shape::String(StringFormat::Uri)
}

/// An RFC 3339 timestamp with offset.
pub fn date_time() -> Shape {
    Shape::String(StringFormat::DateTime)
}

/// A number without a fractional part.
pub fn integer() -> Shape {
    Shape::Integer
}

/// Any number.
pub fn number() -> Shape {
    Shape::Number
}

/// A boolean.
pub fn boolean() -> Shape {
    Shape::Boolean
}

/// Anything.
pub fn unknown() -> Shape {
    Shape::Unknown
}

/// Exactly `value`.
pub fn literal(value: impl Into<Value>) -> Shape {
    Shape::Literal(value.into())
}

/// One of `values`.
pub fn enumeration<I, S>(values: I) -> Shape
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Shape::Enum(values.into_iter().map(Into::into).collect())
}

/// An array of `item`.
pub fn array(item: Shape) -> Shape {
    Shape::Array(Box::new(item))
}

/// A string-keyed mapping of `value`.
pub fn record(value: Shape) -> Shape {
    Shape::Record(Box::new(value))
}

/// An object with the given fields, stripping undeclared ones.
pub fn object<I, K>(fields: I) -> Shape
where
    I: IntoIterator<Item = (K, Shape)>,
    K: Into<String>,
{
    Shape::Object(ObjectShape {
        fields: fields
            .into_iter()
            .map(|(name, shape)| Field {
                name: name.into(),
                shape,
            })
            .collect(),
        unknown: UnknownFields::Strip,
    })
}

/// The entity registered under `key`.
pub fn reference(key: impl Into<String>) -> Shape {
    Shape::Ref(key.into())
}

/// Any of `variants`.
pub fn union<I>(variants: I) -> Shape
where
    I: IntoIterator<Item = Shape>,
{
    Shape::Union(variants.into_iter().collect())
}

/// Both `left` and `right`.
pub fn intersection(left: Shape, right: Shape) -> Shape {
    Shape::Intersection(Box::new(left), Box::new(right))
}

impl Shape {
    /// Makes absence valid.
    pub fn optional(self) -> Shape {
        if matches!(self, Shape::Optional { .. }) {
            return self;
        }
        Shape::Optional {
            inner: Box::new(self),
            default: None,
        }
    }

    /// Makes absence valid and fills in `value` when absent.
    pub fn with_default(self, value: impl Into<Value>) -> Shape {
        let inner = match self {
            Shape::Optional { inner, .. } => inner,
            other => Box::new(other),
        };
        Shape::Optional {
            inner,
            default: Some(value.into()),
        }
    }

    /// Keeps undeclared fields of an object shape.
    pub fn passthrough(self) -> Shape {
        self.with_unknown(UnknownFields::Passthrough)
    }

    /// Drops undeclared fields of an object shape.
    pub fn strip(self) -> Shape {
        self.with_unknown(UnknownFields::Strip)
    }

    /// Makes every field of an object shape optional.
    pub fn partial(self) -> Shape {
        match self {
            Shape::Object(mut object) => {
                for field in &mut object.fields {
                    let shape = std::mem::replace(&mut field.shape, Shape::Unknown);
                    field.shape = shape.optional();
                }
                Shape::Object(object)
            }
            Shape::Optional { inner, default } => Shape::Optional {
                inner: Box::new(inner.partial()),
                default,
            },
            other => other,
        }
    }

    fn with_unknown(self, unknown: UnknownFields) -> Shape {
        match self {
            Shape::Object(mut object) => {
                object.unknown = unknown;
                Shape::Object(object)
            }
            Shape::Optional { inner, default } => Shape::Optional {
                inner: Box::new(inner.with_unknown(unknown)),
                default,
            },
            other => other,
        }
    }

    /// Strips optional wrappers: the shape a present value must satisfy,
    /// and the first default found on the way.
    pub(crate) fn presence(&self) -> (&Shape, Option<&Value>) {
        let mut shape = self;
        let mut default = None;
        while let Shape::Optional {
            inner,
            default: own,
        } = shape
        {
            default = default.or(own.as_ref());
            shape = inner.as_ref();
        }
        (shape, default)
    }

    /// Reference keys used directly by this shape, in first-use order.
    ///
    /// References are not followed.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Shape::Ref(key) => {
                if !out.contains(&key.as_str()) {
                    out.push(key.as_str());
                }
            }
            Shape::Array(inner) | Shape::Record(inner) | Shape::Optional { inner, .. } => {
                inner.collect_references(out)
            }
            Shape::Object(object) => {
                for field in &object.fields {
                    field.shape.collect_references(out);
                }
            }
            Shape::Union(variants) => {
                for variant in variants {
                    variant.collect_references(out);
                }
            }
            Shape::Intersection(left, right) => {
                left.collect_references(out);
                right.collect_references(out);
            }
            Shape::String(_)
            | Shape::Integer
            | Shape::Number
            | Shape::Boolean
            | Shape::Unknown
            | Shape::Literal(_)
            | Shape::Enum(_) => {}
        }
    }

    /// Lowers an OpenAPI-style schema definition.
    ///
    /// Supports `$ref` (`#/components/schemas/<Name>`), `allOf`, `anyOf`,
    /// `oneOf`, `const`, string `enum`, `type`, `format`, `properties`,
    /// `required`, `default` and `additionalProperties`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidShape`] for anything outside that subset.
    ///
    /// # Examples
    ///
    /// ```
    /// use registry_contract_core::shape::{self, Shape};
    /// use serde_json::json;
    ///
    /// let lowered = Shape::from_definition(&json!({
    ///     "type": "object",
    ///     "required": ["name"],
    ///     "properties": {
    ///         "name": {"type": "string"},
    ///         "isRepeated": {"type": "boolean", "default": false}
    ///     }
    /// }))
    /// .unwrap();
    ///
    /// let expected = shape::object([
    ///     ("name", shape::string()),
    ///     ("isRepeated", shape::boolean().with_default(false)),
    /// ])
    /// .passthrough();
    /// assert_eq!(lowered, expected);
    /// ```
    pub fn from_definition(definition: &Value) -> Result<Shape, InvalidShape> {
        let object = match definition {
            Value::Object(object) => object,
            Value::Bool(true) => return Ok(Shape::Unknown),
            _ => return Err(InvalidShape::new("definition must be an object")),
        };

        if let Some(pointer) = object.get("$ref") {
            return lower_reference(pointer);
        }
        if let Some(parts) = object.get("allOf") {
            let mut shapes = lower_list(parts, "allOf")?.into_iter();
            let first = shapes
                .next()
                .ok_or_else(|| InvalidShape::new("allOf must not be empty"))?;
            return Ok(shapes.fold(first, intersection));
        }
        if let Some(variants) = object.get("anyOf").or_else(|| object.get("oneOf")) {
            let variants = lower_list(variants, "anyOf/oneOf")?;
            if variants.is_empty() {
                return Err(InvalidShape::new("anyOf/oneOf must not be empty"));
            }
            return Ok(Shape::Union(variants));
        }
        if let Some(value) = object.get("const") {
            return Ok(Shape::Literal(value.clone()));
        }
        if let Some(values) = object.get("enum") {
            return lower_enum(values);
        }

        match object.get("type") {
            Some(Value::String(kind)) => match kind.as_str() {
                "string" => Ok(Shape::String(
                    object
                        .get("format")
                        .and_then(Value::as_str)
                        .map(StringFormat::from_name)
                        .unwrap_or_default(),
                )),
                "integer" => Ok(Shape::Integer),
                "number" => Ok(Shape::Number),
                "boolean" => Ok(Shape::Boolean),
                "null" => Ok(Shape::Literal(Value::Null)),
                "array" => match object.get("items") {
                    Some(items) => Ok(array(Shape::from_definition(items)?)),
                    None => Ok(array(Shape::Unknown)),
                },
                "object" => lower_object(object),
                other => Err(InvalidShape::new(format!("unsupported type '{other}'"))),
            },
            Some(_) => Err(InvalidShape::new("type must be a string")),
            None if object.contains_key("properties")
                || object.contains_key("additionalProperties")
                || object.contains_key("required") =>
            {
                lower_object(object)
            }
            None => Ok(Shape::Unknown),
        }
    }
}

fn lower_reference(pointer: &Value) -> Result<Shape, InvalidShape> {
    let pointer = pointer
        .as_str()
        .ok_or_else(|| InvalidShape::new("$ref must be a string"))?;
    match pointer.strip_prefix(SCHEMA_REF_PREFIX) {
        Some(key) if !key.is_empty() => Ok(Shape::Ref(key.to_string())),
        _ => Err(InvalidShape::new(format!(
            "unsupported reference '{pointer}', expected '{SCHEMA_REF_PREFIX}<Name>'"
        ))),
    }
}

fn lower_list(parts: &Value, keyword: &str) -> Result<Vec<Shape>, InvalidShape> {
    parts
        .as_array()
        .ok_or_else(|| InvalidShape::new(format!("{keyword} must be an array")))?
        .iter()
        .map(Shape::from_definition)
        .collect()
}

fn lower_enum(values: &Value) -> Result<Shape, InvalidShape> {
    let values = values
        .as_array()
        .ok_or_else(|| InvalidShape::new("enum must be an array"))?;
    if values.is_empty() {
        return Err(InvalidShape::new("enum must not be empty"));
    }
    if values.iter().all(Value::is_string) {
        return Ok(enumeration(values.iter().filter_map(Value::as_str)));
    }
    Ok(union(values.iter().cloned().map(Shape::Literal)))
}

fn lower_object(object: &Map<String, Value>) -> Result<Shape, InvalidShape> {
    let required: Vec<&str> = match object.get("required") {
        None => Vec::new(),
        Some(Value::Array(names)) => names
            .iter()
            .map(|name| {
                name.as_str()
                    .ok_or_else(|| InvalidShape::new("required entries must be strings"))
            })
            .collect::<Result<_, _>>()?,
        Some(_) => return Err(InvalidShape::new("required must be an array")),
    };

    let properties = match object.get("properties") {
        None => None,
        Some(Value::Object(properties)) => Some(properties),
        Some(_) => return Err(InvalidShape::new("properties must be an object")),
    };

    let unknown = match object.get("additionalProperties") {
        None | Some(Value::Bool(true)) => UnknownFields::Passthrough,
        Some(Value::Bool(false)) => UnknownFields::Strip,
        Some(schema @ Value::Object(_)) => {
            if properties.is_some() || !required.is_empty() {
                return Err(InvalidShape::new(
                    "additionalProperties schema alongside properties is not supported",
                ));
            }
            return Ok(record(Shape::from_definition(schema)?));
        }
        Some(_) => {
            return Err(InvalidShape::new(
                "additionalProperties must be a boolean or an object",
            ));
        }
    };

    let mut fields = Vec::new();
    if let Some(properties) = properties {
        for (name, definition) in properties {
            let shape = Shape::from_definition(definition)
                .map_err(|e| InvalidShape::new(format!("property '{name}': {}", e.reason)))?;
            let shape = match definition.get("default") {
                Some(default) => shape.with_default(default.clone()),
                None if required.contains(&name.as_str()) => shape,
                None => shape.optional(),
            };
            fields.push(Field {
                name: name.clone(),
                shape,
            });
        }
    }
    for name in required {
        if !fields.iter().any(|f| f.name == name) {
            fields.push(Field {
                name: name.to_string(),
                shape: Shape::Unknown,
            });
        }
    }

    Ok(Shape::Object(ObjectShape { fields, unknown }))
}
