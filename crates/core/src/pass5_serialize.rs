//! Pass 5: Template serialization -- render the linked graph as a provider
//! template with parameters, resources, and function environments.

use crate::ast::*;
use crate::config::LinkerConfig;
use crate::graph::ModuleGraph;
use crate::pass4_environment::FunctionEnvironment;
use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

pub fn serialize_template(
    graph: &ModuleGraph,
    environments: &IndexMap<String, FunctionEnvironment>,
    config: &LinkerConfig,
) -> Json {
    let mut parameters = Map::new();
    let mut resources = Map::new();

    for entity in graph.entities() {
        match entity.kind {
            EntityKind::Input => {
                let type_name = if entity.type_name.is_empty() || entity.type_name == config.secret_type {
                    "String"
                } else {
                    entity.type_name.as_str()
                };
                let mut p = Map::new();
                p.insert("Type".to_owned(), json!(type_name));
                if entity.type_name == config.secret_type {
                    p.insert("NoEcho".to_owned(), json!(true));
                }
                parameters.insert(entity.logical_id(config), Json::Object(p));
            }
            EntityKind::Resource | EntityKind::Function => {
                let Some(definition) = &entity.definition else {
                    continue;
                };
                let mut rendered = definition.to_json();
                if let Some(env) = environments.get(&entity.full_name) {
                    inject_environment(&mut rendered, env);
                }
                resources.insert(entity.logical_id(config), rendered);
            }
            _ => {}
        }
    }

    let mut template = Map::new();
    template.insert(
        "AWSTemplateFormatVersion".to_owned(),
        json!(TEMPLATE_FORMAT_VERSION),
    );
    template.insert("Description".to_owned(), json!(graph.name));
    if !parameters.is_empty() {
        template.insert("Parameters".to_owned(), Json::Object(parameters));
    }
    template.insert("Resources".to_owned(), Json::Object(resources));
    Json::Object(template)
}

/// Merge bindings into `Properties.Environment.Variables`, keeping any
/// variables the declaration already sets.
fn inject_environment(resource: &mut Json, env: &FunctionEnvironment) {
    if env.variables.is_empty() {
        return;
    }
    let Some(resource) = resource.as_object_mut() else {
        return;
    };
    let properties = resource
        .entry("Properties")
        .or_insert_with(|| Json::Object(Map::new()));
    let Some(properties) = properties.as_object_mut() else {
        return;
    };
    let environment = properties
        .entry("Environment")
        .or_insert_with(|| Json::Object(Map::new()));
    let Some(environment) = environment.as_object_mut() else {
        return;
    };
    let variables = environment
        .entry("Variables")
        .or_insert_with(|| Json::Object(Map::new()));
    if let Some(variables) = variables.as_object_mut() {
        for (name, value) in &env.variables {
            variables.entry(name.clone()).or_insert_with(|| value.to_json());
        }
    }
}
