//! Linker pipeline: module graph -> linked, finalized graph plus function
//! environments.
//!
//! This is a thin orchestrator that calls each pass module in order. A pass
//! only runs when every earlier pass succeeded.

use crate::ast::Entity;
use crate::catalog::TypeCatalog;
use crate::config::LinkerConfig;
use crate::error::LinkFailure;
use crate::graph::ModuleGraph;
use crate::pass1_classify;
use crate::pass2_resolve::{self, LinkStats};
use crate::pass3_finalize;
use crate::pass4_environment::{self, FunctionEnvironment};
use crate::pass5_serialize;
use indexmap::IndexMap;
use serde_json::{json, Map, Value as Json};

/// Output of a successful link run.
#[derive(Debug, Clone)]
pub struct LinkedModule {
    pub graph: ModuleGraph,
    pub environments: IndexMap<String, FunctionEnvironment>,
    pub stats: LinkStats,
}

/// Link `graph` and return the finalized graph, or every diagnostic of the
/// first failing pass.
pub fn link(
    graph: ModuleGraph,
    config: &LinkerConfig,
    catalog: &dyn TypeCatalog,
) -> Result<LinkedModule, LinkFailure> {
    let module = graph.name.clone();

    let collisions = graph.logical_id_collisions(config);
    if !collisions.is_empty() {
        return Err(LinkFailure::Diagnostics(collisions));
    }

    // Pass 1: free/bound split
    let partition = pass1_classify::partition(graph)?;

    // Pass 2: fixed-point resolution and definition linking
    let (mut graph, stats) = pass2_resolve::resolve(partition, config, catalog)?;

    // Pass 3: strip preserve markers
    pass3_finalize::finalize(&mut graph, config)?;

    // Pass 4: scopes and environments
    let environments =
        pass4_environment::propagate(&mut graph, config).map_err(LinkFailure::Diagnostics)?;

    tracing::info!(
        module = %module,
        entities = graph.len(),
        iterations = stats.iterations,
        functions = environments.len(),
        "module linked"
    );
    Ok(LinkedModule {
        graph,
        environments,
        stats,
    })
}

impl LinkedModule {
    /// Pass 5: the provider template.
    pub fn template(&self, config: &LinkerConfig) -> Json {
        pass5_serialize::serialize_template(&self.graph, &self.environments, config)
    }

    /// The linked entity graph, environments, and run statistics.
    pub fn to_json_value(&self) -> Json {
        let entities: Vec<Json> = self.graph.entities().map(entity_json).collect();
        let environments: Map<String, Json> = self
            .environments
            .iter()
            .map(|(name, env)| {
                let vars: Map<String, Json> = env
                    .variables
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                (name.clone(), Json::Object(vars))
            })
            .collect();
        json!({
            "module": self.graph.name,
            "entities": entities,
            "environments": environments,
            "stats": self.stats,
        })
    }
}

fn entity_json(entity: &Entity) -> Json {
    let mut m = Map::new();
    m.insert("name".to_owned(), json!(entity.full_name));
    m.insert("kind".to_owned(), json!(entity.kind));
    if !entity.type_name.is_empty() {
        m.insert("type".to_owned(), json!(entity.type_name));
    }
    m.insert("value".to_owned(), entity.reference.to_json());
    if let Some(definition) = &entity.definition {
        m.insert("resource".to_owned(), definition.to_json());
    }
    if !entity.scope.is_empty() {
        m.insert("scope".to_owned(), json!(entity.scope));
    }
    Json::Object(m)
}
