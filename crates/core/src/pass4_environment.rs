//! Pass 4: Scope propagation -- expand wildcard scopes, validate explicit
//! scope entries, and derive the environment bindings of every function.

use crate::ast::*;
use crate::config::LinkerConfig;
use crate::error::LinkError;
use crate::expr;
use crate::graph::ModuleGraph;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

/// Environment variables bound into one function.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionEnvironment {
    pub function: String,
    pub variables: IndexMap<String, Value>,
}

/// Replace wildcard entries with every function name and check explicit
/// entries. Scopes are rewritten in place; all errors are collected.
pub fn expand_scopes(graph: &mut ModuleGraph, config: &LinkerConfig) -> Result<(), Vec<LinkError>> {
    let functions: Vec<String> = graph.functions().map(|f| f.full_name.clone()).collect();
    let mut errors = Vec::new();

    for entity in graph.entities_mut() {
        if entity.scope.is_empty() {
            continue;
        }
        let mut expanded: IndexSet<String> = IndexSet::new();
        for entry in &entity.scope {
            if *entry == config.wildcard_scope {
                if functions.is_empty() {
                    tracing::warn!(entity = %entity.full_name, "wildcard scope matches no functions");
                }
                expanded.extend(functions.iter().cloned());
            } else if functions.contains(entry) {
                expanded.insert(entry.clone());
            } else {
                errors.push(LinkError::unknown_scope(&entity.full_name, entry));
            }
        }
        entity.scope = expanded.into_iter().collect();
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `STR_` or `SEC_` followed by the upper-cased full name, with the
/// separator and any other non-alphanumeric character replaced by `_`.
pub fn env_var_name(entity: &Entity, config: &LinkerConfig) -> String {
    let prefix = if entity.type_name == config.secret_type {
        &config.secret_env_prefix
    } else {
        &config.plain_env_prefix
    };
    let name: String = entity
        .full_name
        .replace(config.separator.as_str(), "_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{}{}", prefix, name)
}

fn env_value(value: &Value, config: &LinkerConfig) -> Value {
    match value {
        Value::Scalar(scalar) => Value::string(scalar.to_text()),
        Value::List(_) => expr::join(&config.list_delimiter, value.clone()),
        other => other.clone(),
    }
}

/// Bindings per function, keyed by function name in declaration order.
/// Expects scopes already expanded.
pub fn build_environments(
    graph: &ModuleGraph,
    config: &LinkerConfig,
) -> IndexMap<String, FunctionEnvironment> {
    let mut environments: IndexMap<String, FunctionEnvironment> = graph
        .functions()
        .map(|f| {
            (
                f.full_name.clone(),
                FunctionEnvironment {
                    function: f.full_name.clone(),
                    variables: IndexMap::new(),
                },
            )
        })
        .collect();

    for entity in graph.entities() {
        for function in &entity.scope {
            if let Some(env) = environments.get_mut(function) {
                env.variables
                    .insert(env_var_name(entity, config), env_value(&entity.reference, config));
            }
        }
    }
    environments
}

pub fn propagate(
    graph: &mut ModuleGraph,
    config: &LinkerConfig,
) -> Result<IndexMap<String, FunctionEnvironment>, Vec<LinkError>> {
    expand_scopes(graph, config)?;
    Ok(build_environments(graph, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkErrorKind;
    use serde_json::json;

    fn graph() -> ModuleGraph {
        ModuleGraph::new("m")
            .with(Entity::new("Api::Handler", EntityKind::Function, expr::reference("ApiHandler")))
            .with(Entity::new("Worker", EntityKind::Function, expr::reference("Worker")))
            .with(Entity::new("Table", EntityKind::Value, Value::string("t")).with_scope(["all"]))
            .with(
                Entity::new("Api::Key", EntityKind::Input, expr::reference("ApiKey"))
                    .with_type("Secret")
                    .with_scope(["Api::Handler"]),
            )
            .with(
                Entity::new("Hosts", EntityKind::Value, Value::from_json(json!(["a", "b"])))
                    .with_scope(["Worker", "all"]),
            )
    }

    #[test]
    fn wildcard_expands_to_every_function() {
        let mut g = graph();
        expand_scopes(&mut g, &LinkerConfig::default()).unwrap();
        assert_eq!(g.get("Table").unwrap().scope, ["Api::Handler", "Worker"]);
        assert_eq!(g.get("Hosts").unwrap().scope, ["Worker", "Api::Handler"]);
    }

    #[test]
    fn environment_names_and_values() {
        let config = LinkerConfig::default();
        let mut g = graph();
        let envs = propagate(&mut g, &config).unwrap();
        let handler = &envs["Api::Handler"].variables;
        assert_eq!(handler["STR_TABLE"], Value::string("t"));
        assert_eq!(handler["SEC_API_KEY"].to_json(), json!({"Ref": "ApiKey"}));
        assert_eq!(
            handler["STR_HOSTS"].to_json(),
            json!({"Fn::Join": [",", ["a", "b"]]})
        );
        let worker = &envs["Worker"].variables;
        assert_eq!(worker.keys().collect::<Vec<_>>(), ["STR_TABLE", "STR_HOSTS"]);
    }

    #[test]
    fn unknown_scope_entries_are_all_reported() {
        let mut g = ModuleGraph::new("m")
            .with(Entity::new("F", EntityKind::Function, expr::reference("F")))
            .with(Entity::new("V", EntityKind::Value, Value::string("v")).with_scope(["Nope", "V"]));
        let errors = expand_scopes(&mut g, &LinkerConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == LinkErrorKind::UnknownScope));
        assert_eq!(errors[0].reference.as_deref(), Some("Nope"));
    }
}
