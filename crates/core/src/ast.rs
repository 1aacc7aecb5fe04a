//! Shared types for the modlink linker.
//!
//! These types are produced by graph construction and consumed by every
//! linker pass. They live here so that pass modules can import them
//! without depending on the document loader.

use crate::config::LinkerConfig;
use crate::record::Record;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::fmt;

// ──────────────────────────────────────────────
// Values
// ──────────────────────────────────────────────

/// An opaque leaf of the value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
}

impl Scalar {
    /// Text rendering used when a scalar is spliced into a pattern or
    /// bound to an environment variable.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

/// A node of an entity value. Symbolic expressions are maps using the
/// reserved intrinsic keys, see [`crate::expr`].
#[derive(Debug)]
pub enum Value {
    /// Never valid once graph construction is done; every pass rejects it.
    Null,
    Scalar(Scalar),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Record(Box<dyn Record>),
}

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Null => Value::Null,
            Value::Scalar(s) => Value::Scalar(s.clone()),
            Value::List(items) => Value::List(items.clone()),
            Value::Map(map) => Value::Map(map.clone()),
            Value::Record(record) => Value::Record(record.clone_record()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.type_name() == b.type_name() && a.to_json() == b.to_json()
            }
            _ => false,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::String(s.into()))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Value::Scalar(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Short name of the node shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            serde_json::Value::Number(n) => Value::Scalar(Scalar::Number(n)),
            serde_json::Value::String(s) => Value::Scalar(Scalar::String(s)),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Scalar(Scalar::String(s)) => serde_json::Value::String(s.clone()),
            Value::Scalar(Scalar::Number(n)) => serde_json::Value::Number(n.clone()),
            Value::Scalar(Scalar::Bool(b)) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Record(record) => record.to_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl Serialize for Value {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ──────────────────────────────────────────────
// Entities
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Value,
    Input,
    Resource,
    Function,
    Package,
    Variable,
}

impl EntityKind {
    /// Only managed resources and deployable functions have a provider
    /// representation that exposes queryable attributes.
    pub fn exposes_attributes(self) -> bool {
        matches!(self, EntityKind::Resource | EntityKind::Function)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Value => "Value",
            EntityKind::Input => "Input",
            EntityKind::Resource => "Resource",
            EntityKind::Function => "Function",
            EntityKind::Package => "Package",
            EntityKind::Variable => "Variable",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior-modifier flag attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Pragma {
    /// Skip the type-catalog lookup for attribute references to this entity.
    NoTypeValidation,
    Other(String),
}

impl Pragma {
    pub fn as_str(&self) -> &str {
        match self {
            Pragma::NoTypeValidation => "no-type-validation",
            Pragma::Other(s) => s,
        }
    }
}

impl From<String> for Pragma {
    fn from(s: String) -> Self {
        match s.as_str() {
            "no-type-validation" => Pragma::NoTypeValidation,
            _ => Pragma::Other(s),
        }
    }
}

impl From<&str> for Pragma {
    fn from(s: &str) -> Self {
        Pragma::from(s.to_owned())
    }
}

impl From<Pragma> for String {
    fn from(p: Pragma) -> Self {
        p.as_str().to_owned()
    }
}

/// A named node of the module graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub full_name: String,
    pub kind: EntityKind,
    /// The value dependents receive when they reference this entity.
    pub reference: Value,
    /// Provider declaration of a Resource or Function entity.
    pub definition: Option<Value>,
    pub scope: Vec<String>,
    pub type_name: String,
    pub pragmas: Vec<Pragma>,
}

impl Entity {
    pub fn new(full_name: impl Into<String>, kind: EntityKind, reference: Value) -> Self {
        Entity {
            full_name: full_name.into(),
            kind,
            reference,
            definition: None,
            scope: Vec::new(),
            type_name: String::new(),
            pragmas: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_definition(mut self, definition: Value) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pragma(mut self, pragma: impl Into<Pragma>) -> Self {
        self.pragmas.push(pragma.into());
        self
    }

    pub fn has_pragma(&self, pragma: &Pragma) -> bool {
        self.pragmas.contains(pragma)
    }

    /// Provider identifier: the full name with separators removed.
    pub fn logical_id(&self, config: &LinkerConfig) -> String {
        self.full_name.replace(config.separator.as_str(), "")
    }

    /// Preserve-marked identifier used for references to this entity's
    /// provider resource until finalization strips the marker.
    pub fn resource_name(&self, config: &LinkerConfig) -> String {
        format!("{}{}", config.preserve_prefix, self.logical_id(config))
    }
}
