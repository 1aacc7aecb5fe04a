//! Type-capability lookups used by attribute validation.

use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

pub trait TypeCatalog {
    fn is_attribute_supported(&self, type_name: &str, attribute: &str) -> bool;
}

/// Catalog backed by an explicit type → attribute table.
///
/// Deserializes from `{"types": {"<type>": ["Attr", ...]}, "allow_unknown_types": false}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticCatalog {
    #[serde(default)]
    types: HashMap<String, BTreeSet<String>>,
    /// When set, attributes of types absent from the table are accepted.
    #[serde(default)]
    allow_unknown_types: bool,
}

impl StaticCatalog {
    pub fn new() -> Self {
        StaticCatalog::default()
    }

    pub fn with_type<I, S>(mut self, type_name: impl Into<String>, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types
            .entry(type_name.into())
            .or_default()
            .extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn allow_unknown_types(mut self, allow: bool) -> Self {
        self.allow_unknown_types = allow;
        self
    }
}

impl TypeCatalog for StaticCatalog {
    fn is_attribute_supported(&self, type_name: &str, attribute: &str) -> bool {
        match self.types.get(type_name) {
            Some(attributes) => attributes.contains(attribute),
            None => self.allow_unknown_types,
        }
    }
}

/// Accepts every attribute of every type.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveCatalog;

impl TypeCatalog for PermissiveCatalog {
    fn is_attribute_supported(&self, _type_name: &str, _attribute: &str) -> bool {
        true
    }
}
