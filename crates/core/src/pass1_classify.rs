//! Pass 1: Entry classification -- split the graph into free entries
//! (fully resolved values) and bound entries (values that may still hold
//! symbolic references).
//!
//! Classification is a static shape check; nothing is substituted here.

use crate::ast::*;
use crate::error::StructuralError;
use crate::graph::ModuleGraph;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Free,
    Bound,
}

/// A scalar, or a list of scalars, is free. Every other shape is bound.
pub fn classify(name: &str, value: &Value) -> Result<Classification, StructuralError> {
    match value {
        Value::Null => Err(StructuralError::NullValue {
            location: name.to_owned(),
        }),
        Value::Scalar(_) => Ok(Classification::Free),
        Value::List(items) if items.iter().all(Value::is_scalar) => Ok(Classification::Free),
        Value::List(_) | Value::Map(_) | Value::Record(_) => Ok(Classification::Bound),
    }
}

/// Two disjoint maps covering every entity of the graph. Both keep
/// declaration order; `order` remembers it for reassembly.
#[derive(Debug, Clone)]
pub struct Partition {
    pub module: String,
    pub order: Vec<String>,
    pub free: IndexMap<String, Entity>,
    pub bound: IndexMap<String, Entity>,
}

pub fn partition(graph: ModuleGraph) -> Result<Partition, StructuralError> {
    let (module, entities) = graph.into_parts();
    let mut order = Vec::with_capacity(entities.len());
    let mut free = IndexMap::new();
    let mut bound = IndexMap::new();
    for (name, entity) in entities {
        order.push(name.clone());
        match classify(&name, &entity.reference)? {
            Classification::Free => {
                free.insert(name, entity);
            }
            Classification::Bound => {
                bound.insert(name, entity);
            }
        }
    }
    tracing::debug!(
        module = %module,
        free = free.len(),
        bound = bound.len(),
        "classified entries"
    );
    Ok(Partition {
        module,
        order,
        free,
        bound,
    })
}

impl Partition {
    /// Reassemble the graph in declaration order.
    pub fn into_graph(mut self) -> ModuleGraph {
        let mut entities = IndexMap::with_capacity(self.order.len());
        for name in self.order {
            let entity = self
                .free
                .shift_remove(&name)
                .or_else(|| self.bound.shift_remove(&name));
            if let Some(entity) = entity {
                entities.insert(name, entity);
            }
        }
        ModuleGraph::from_parts(self.module, entities)
    }
}
