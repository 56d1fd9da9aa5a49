//! Rendering of filter values as SQL literals.
//!
//! Filter values arrive as JSON; the declared literal type decides how they
//! are spelled in the generated SQL. String values are single-quoted, arrays
//! and tuples render their elements recursively via the declared child type,
//! and everything else falls back to the raw textual form of the value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a filter literal.
///
/// Accepts both the shorthand form (`"string"`) and the nested form
/// (`{"type": "array", "childType": "string"}`) on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LiteralTypeRepr", into = "LiteralTypeRepr")]
pub enum LiteralType {
    String,
    Array(Option<Box<LiteralType>>),
    Tuple(Option<Box<LiteralType>>),
    /// Any other type name. Values of this type render in their raw form.
    Other(String),
}

impl LiteralType {
    pub fn array_of(child: LiteralType) -> Self {
        Self::Array(Some(Box::new(child)))
    }

    pub fn tuple_of(child: LiteralType) -> Self {
        Self::Tuple(Some(Box::new(child)))
    }

    fn by_name(name: &str, child: Option<Box<LiteralType>>) -> Self {
        match name {
            "string" => Self::String,
            "array" => Self::Array(child),
            "tuple" => Self::Tuple(child),
            other => Self::Other(other.to_string()),
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
            Self::Other(name) => name,
        }
    }
}

/// Renders a filter value as a SQL literal according to its declared type.
pub fn render_literal(value: &Value, value_type: Option<&LiteralType>) -> String {
    match value_type {
        Some(LiteralType::String) => format!("'{}'", raw_text(value)),
        Some(LiteralType::Array(child)) => {
            format!("ARRAY [{}]", render_elements(value, child.as_deref()))
        }
        Some(LiteralType::Tuple(child)) => {
            format!("({})", render_elements(value, child.as_deref()))
        }
        _ => raw_text(value),
    }
}

/// Renders the elements of an array or tuple value, joined by `", "`. A
/// non-array value is treated as a single element.
fn render_elements(value: &Value, child: Option<&LiteralType>) -> String {
    match value.as_array() {
        Some(items) => items
            .iter()
            .map(|item| render_literal(item, child))
            .collect::<Vec<_>>()
            .join(", "),
        None => render_literal(value, child),
    }
}

/// Textual form of a value without any SQL quoting. Strings render their
/// contents, everything else renders as its JSON text.
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Wire representation of [`LiteralType`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LiteralTypeRepr {
    Name(String),
    Nested {
        #[serde(rename = "type")]
        kind: String,
        #[serde(rename = "childType", default, skip_serializing_if = "Option::is_none")]
        child_type: Option<Box<LiteralTypeRepr>>,
    },
}

impl From<LiteralTypeRepr> for LiteralType {
    fn from(repr: LiteralTypeRepr) -> Self {
        match repr {
            LiteralTypeRepr::Name(name) => Self::by_name(&name, None),
            LiteralTypeRepr::Nested { kind, child_type } => {
                let child = child_type.map(|c| Box::new(LiteralType::from(*c)));
                Self::by_name(&kind, child)
            }
        }
    }
}

impl From<LiteralType> for LiteralTypeRepr {
    fn from(value_type: LiteralType) -> Self {
        let name = value_type.name().to_string();
        match value_type {
            LiteralType::Array(Some(child)) | LiteralType::Tuple(Some(child)) => Self::Nested {
                kind: name,
                child_type: Some(Box::new(LiteralTypeRepr::from(*child))),
            },
            _ => Self::Name(name),
        }
    }
}
