//! Structured records: typed provider declarations embedded in the value
//! tree.
//!
//! A record exposes its compound-typed fields by name so the tree walker
//! can recurse into them and write replacements back. Scalar fields are
//! never exposed.

use crate::ast::Value;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{json, Map};
use std::fmt;

pub trait Record: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    /// Compound fields in a fixed order, open for in-place rewriting.
    fn compound_fields_mut(&mut self) -> Vec<(&'static str, &mut Value)>;

    /// Wire rendering of the record.
    fn to_json(&self) -> serde_json::Value;

    fn clone_record(&self) -> Box<dyn Record>;
}

/// A provider resource declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub type_name: String,
    pub condition: Option<String>,
    pub depends_on: Vec<String>,
    pub deletion_policy: Option<String>,
    pub metadata: Value,
    pub properties: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawResource {
    #[serde(rename = "Type")]
    type_name: String,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    deletion_policy: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
    #[serde(default)]
    properties: Option<serde_json::Value>,
}

impl ResourceRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        ResourceRecord {
            type_name: type_name.into(),
            condition: None,
            depends_on: Vec::new(),
            deletion_policy: None,
            metadata: Value::Map(IndexMap::new()),
            properties: Value::Map(IndexMap::new()),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Value) -> Self {
        if let Value::Map(props) = &mut self.properties {
            props.insert(name.into(), value);
        }
        self
    }

    /// Parse a declaration of the form
    /// `{"Type": ..., "Properties": {...}, "DependsOn": [...], ...}`.
    pub fn from_json(json: serde_json::Value) -> Result<Self, String> {
        let raw: RawResource = serde_json::from_value(json).map_err(|e| e.to_string())?;
        let properties = match raw.properties {
            Some(p @ serde_json::Value::Object(_)) => Value::from_json(p),
            Some(other) => {
                return Err(format!(
                    "Properties must be a map, found {}",
                    Value::from_json(other).shape()
                ))
            }
            None => Value::Map(IndexMap::new()),
        };
        let metadata = match raw.metadata {
            Some(m @ serde_json::Value::Object(_)) => Value::from_json(m),
            Some(other) => {
                return Err(format!(
                    "Metadata must be a map, found {}",
                    Value::from_json(other).shape()
                ))
            }
            None => Value::Map(IndexMap::new()),
        };
        Ok(ResourceRecord {
            type_name: raw.type_name,
            condition: raw.condition,
            depends_on: raw.depends_on,
            deletion_policy: raw.deletion_policy,
            metadata,
            properties,
        })
    }
}

impl Record for ResourceRecord {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn compound_fields_mut(&mut self) -> Vec<(&'static str, &mut Value)> {
        vec![
            ("Metadata", &mut self.metadata),
            ("Properties", &mut self.properties),
        ]
    }

    fn to_json(&self) -> serde_json::Value {
        let mut m = Map::new();
        m.insert("Type".to_owned(), json!(self.type_name));
        if let Some(c) = &self.condition {
            m.insert("Condition".to_owned(), json!(c));
        }
        if !self.depends_on.is_empty() {
            m.insert("DependsOn".to_owned(), json!(self.depends_on));
        }
        if let Some(p) = &self.deletion_policy {
            m.insert("DeletionPolicy".to_owned(), json!(p));
        }
        if self.metadata.as_map().map_or(true, |md| !md.is_empty()) {
            m.insert("Metadata".to_owned(), self.metadata.to_json());
        }
        m.insert("Properties".to_owned(), self.properties.to_json());
        serde_json::Value::Object(m)
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_declaration() {
        let record = ResourceRecord::from_json(json!({
            "Type": "AWS::SQS::Queue",
            "DependsOn": ["Topic"],
            "Properties": {"QueueName": "jobs"}
        }))
        .unwrap();
        assert_eq!(record.type_name, "AWS::SQS::Queue");
        assert_eq!(record.depends_on, ["Topic"]);
        assert_eq!(
            record.to_json(),
            json!({
                "Type": "AWS::SQS::Queue",
                "DependsOn": ["Topic"],
                "Properties": {"QueueName": "jobs"}
            })
        );
    }

    #[test]
    fn rejects_non_map_properties() {
        let err = ResourceRecord::from_json(json!({"Type": "X", "Properties": [1]})).unwrap_err();
        assert!(err.contains("Properties must be a map"));
    }

    #[test]
    fn rejects_missing_type() {
        assert!(ResourceRecord::from_json(json!({"Properties": {}})).is_err());
    }
}
