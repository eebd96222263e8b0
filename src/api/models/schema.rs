//! Typed tree for free-form request/response specifications and DTO schemas.
//!
//! Serialized untagged, so stored documents stay plain JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaNode {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Array(Vec<SchemaNode>),
    Object(BTreeMap<String, SchemaNode>),
}

impl SchemaNode {
    /// True for null, blank strings and empty containers.
    pub fn is_empty(&self) -> bool {
        match self {
            SchemaNode::Null => true,
            SchemaNode::String(s) => s.trim().is_empty(),
            SchemaNode::Array(items) => items.is_empty(),
            SchemaNode::Object(fields) => fields.is_empty(),
            SchemaNode::Boolean(_) | SchemaNode::Number(_) => false,
        }
    }

    /// Nesting depth; scalars are 0, each container level adds 1.
    pub fn depth(&self) -> usize {
        match self {
            SchemaNode::Array(items) => 1 + items.iter().map(SchemaNode::depth).max().unwrap_or(0),
            SchemaNode::Object(fields) => {
                1 + fields.values().map(SchemaNode::depth).max().unwrap_or(0)
            }
            _ => 0,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match self {
            SchemaNode::Object(fields) => fields.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Render as a TypeScript declaration named `name`.
    ///
    /// String leaves naming a primitive (`"string"`, `"integer"`, `"boolean"`, ...) are read as
    /// type descriptors; any other leaf is typed from its own value.
    pub fn to_type_declaration(&self, name: &str) -> String {
        let type_name = type_identifier(name);
        match self {
            SchemaNode::Object(fields) => {
                let mut out = format!("export interface {} {{\n", type_name);
                for (field, node) in fields {
                    out.push_str(&format!(
                        "  {}: {};\n",
                        property_name(field),
                        node.inline_type(1)
                    ));
                }
                out.push_str("}\n");
                out
            }
            other => format!("export type {} = {};\n", type_name, other.inline_type(0)),
        }
    }

    fn inline_type(&self, indent: usize) -> String {
        match self {
            SchemaNode::Null => "unknown".to_string(),
            SchemaNode::Boolean(_) => "boolean".to_string(),
            SchemaNode::Number(_) => "number".to_string(),
            SchemaNode::String(s) => descriptor_type(s).to_string(),
            SchemaNode::Array(items) => match items.first() {
                Some(first @ SchemaNode::Object(_)) => format!("Array<{}>", first.inline_type(indent)),
                Some(first) => format!("{}[]", first.inline_type(indent)),
                None => "unknown[]".to_string(),
            },
            SchemaNode::Object(fields) if fields.is_empty() => "Record<string, unknown>".to_string(),
            SchemaNode::Object(fields) => {
                let pad = "  ".repeat(indent + 1);
                let mut out = String::from("{\n");
                for (field, node) in fields {
                    out.push_str(&format!(
                        "{}{}: {};\n",
                        pad,
                        property_name(field),
                        node.inline_type(indent + 1)
                    ));
                }
                out.push_str(&"  ".repeat(indent));
                out.push('}');
                out
            }
        }
    }
}

fn descriptor_type(value: &str) -> &'static str {
    match value.trim().to_ascii_lowercase().as_str() {
        "number" | "integer" | "int" | "long" | "float" | "double" | "decimal" => "number",
        "boolean" | "bool" => "boolean",
        "null" => "null",
        "any" | "object" => "unknown",
        _ => "string",
    }
}

fn property_name(field: &str) -> String {
    let is_identifier = field
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false)
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if is_identifier {
        field.to_string()
    } else {
        format!("{:?}", field)
    }
}

fn type_identifier(name: &str) -> String {
    let mut out = String::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Dto");
    }
    out
}

impl From<serde_json::Value> for SchemaNode {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => SchemaNode::Null,
            serde_json::Value::Bool(b) => SchemaNode::Boolean(b),
            serde_json::Value::Number(n) => SchemaNode::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => SchemaNode::String(s),
            serde_json::Value::Array(items) => {
                SchemaNode::Array(items.into_iter().map(SchemaNode::from).collect())
            }
            serde_json::Value::Object(fields) => SchemaNode::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, SchemaNode::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<SchemaNode> for serde_json::Value {
    fn from(node: SchemaNode) -> Self {
        match node {
            SchemaNode::Null => serde_json::Value::Null,
            SchemaNode::Boolean(b) => serde_json::Value::Bool(b),
            SchemaNode::Number(n) => serde_json::Number::from_f64(n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            SchemaNode::String(s) => serde_json::Value::String(s),
            SchemaNode::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(serde_json::Value::from).collect())
            }
            SchemaNode::Object(fields) => serde_json::Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}
