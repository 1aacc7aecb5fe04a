//! The module graph and the document format it is built from.
//!
//! A module document is the already-parsed declaration tree; children
//! receive hierarchical names joined with the configured separator.

use crate::ast::*;
use crate::config::LinkerConfig;
use crate::error::{LinkError, LinkErrorKind};
use crate::expr;
use crate::record::ResourceRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ──────────────────────────────────────────────
// Document
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleDocument {
    pub module: String,
    #[serde(default)]
    pub entities: Vec<EntityDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDocument {
    pub name: String,
    pub kind: EntityKind,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pragmas: Vec<Pragma>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityDocument>,
}

// ──────────────────────────────────────────────
// Graph
// ──────────────────────────────────────────────

/// Entities of one module in declaration order, keyed by full name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleGraph {
    pub name: String,
    entities: IndexMap<String, Entity>,
}

impl ModuleGraph {
    pub fn new(name: impl Into<String>) -> Self {
        ModuleGraph {
            name: name.into(),
            entities: IndexMap::new(),
        }
    }

    pub(crate) fn from_parts(name: String, entities: IndexMap<String, Entity>) -> Self {
        ModuleGraph { name, entities }
    }

    pub fn add(&mut self, entity: Entity) -> Result<(), LinkError> {
        // `.` splits a placeholder into name and attribute.
        if entity.full_name.is_empty() || entity.full_name.contains('.') {
            return Err(LinkError::new(
                0,
                LinkErrorKind::InvalidDeclaration,
                &entity.full_name,
                format!(
                    "invalid entity name '{}': names must be non-empty and cannot contain '.'",
                    entity.full_name
                ),
            ));
        }
        if self.entities.contains_key(&entity.full_name) {
            return Err(LinkError::new(
                0,
                LinkErrorKind::DuplicateName,
                &entity.full_name,
                format!("duplicate entity name '{}'", entity.full_name),
            ));
        }
        self.entities.insert(entity.full_name.clone(), entity);
        Ok(())
    }

    /// Builder-style [`ModuleGraph::add`] for tests and programmatic
    /// construction.
    ///
    /// # Panics
    ///
    /// Panics when [`ModuleGraph::add`] rejects the entity.
    pub fn with(mut self, entity: Entity) -> Self {
        if let Err(e) = self.add(entity) {
            panic!("ModuleGraph::with: {}", e.message);
        }
        self
    }

    /// Entities with a provider identity (inputs, resources, functions)
    /// whose logical ids coincide, e.g. `A::BC` and `AB::C`. Each later
    /// entity is reported against the first one holding the id.
    pub fn logical_id_collisions(&self, config: &LinkerConfig) -> Vec<LinkError> {
        let mut owners: HashMap<String, &str> = HashMap::new();
        let mut errors = Vec::new();
        for entity in self.entities.values() {
            if !matches!(
                entity.kind,
                EntityKind::Input | EntityKind::Resource | EntityKind::Function
            ) {
                continue;
            }
            let id = entity.logical_id(config);
            match owners.get(id.as_str()) {
                Some(first) => errors.push(
                    LinkError::new(
                        0,
                        LinkErrorKind::DuplicateName,
                        &entity.full_name,
                        format!(
                            "logical id '{}' of '{}' collides with '{}'",
                            id, entity.full_name, first
                        ),
                    )
                    .with_reference(first)
                    .with_related(vec![(*first).to_owned()]),
                ),
                None => {
                    owners.insert(id, &entity.full_name);
                }
            }
        }
        errors
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entities_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::Function)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, IndexMap<String, Entity>) {
        (self.name, self.entities)
    }

    /// Build the graph from a parsed document, reporting every invalid
    /// declaration.
    pub fn from_document(
        doc: ModuleDocument,
        config: &LinkerConfig,
    ) -> Result<ModuleGraph, Vec<LinkError>> {
        let mut graph = ModuleGraph::new(doc.module);
        let mut errors = Vec::new();
        for entity in doc.entities {
            add_declaration(&mut graph, entity, None, config, &mut errors);
        }
        errors.extend(graph.logical_id_collisions(config));
        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(errors)
        }
    }
}

fn add_declaration(
    graph: &mut ModuleGraph,
    doc: EntityDocument,
    parent: Option<&str>,
    config: &LinkerConfig,
    errors: &mut Vec<LinkError>,
) {
    let full_name = match parent {
        Some(parent) => format!("{}{}{}", parent, config.separator, doc.name),
        None => doc.name.clone(),
    };

    match build_entity(&full_name, &doc, config) {
        Ok(entity) => {
            if let Err(e) = graph.add(entity) {
                errors.push(e);
            }
        }
        Err(e) => errors.push(e),
    }

    for child in doc.entities {
        add_declaration(graph, child, Some(&full_name), config, errors);
    }
}

fn build_entity(
    full_name: &str,
    doc: &EntityDocument,
    config: &LinkerConfig,
) -> Result<Entity, LinkError> {
    let invalid = |message: String| {
        LinkError::new(0, LinkErrorKind::InvalidDeclaration, full_name, message)
    };

    let definition = match (&doc.resource, doc.kind) {
        (Some(resource), EntityKind::Resource | EntityKind::Function) => {
            let record = ResourceRecord::from_json(resource.clone())
                .map_err(|e| invalid(format!("invalid resource declaration: {}", e)))?;
            Some(Value::Record(Box::new(record)))
        }
        (Some(_), kind) => {
            return Err(invalid(format!("a {} cannot declare a resource", kind)));
        }
        (None, _) => None,
    };

    let type_name = match (&doc.type_name, &definition) {
        (Some(t), _) => t.clone(),
        (None, Some(Value::Record(record))) => record.type_name().to_owned(),
        _ => String::new(),
    };

    let mut entity = Entity::new(full_name, doc.kind, Value::Null)
        .with_type(type_name)
        .with_scope(doc.scope.iter().cloned());
    entity.pragmas = doc.pragmas.clone();
    entity.definition = definition;

    entity.reference = match (&doc.value, doc.kind) {
        (Some(value), _) => Value::from_json(value.clone()),
        // Dependents of a provider resource or parameter link to it by
        // identifier, never to its declaration.
        (None, EntityKind::Resource | EntityKind::Function | EntityKind::Input) => {
            expr::reference(entity.resource_name(config))
        }
        (None, kind) => {
            return Err(invalid(format!("{} '{}' has no value", kind, full_name)));
        }
    };

    Ok(entity)
}
