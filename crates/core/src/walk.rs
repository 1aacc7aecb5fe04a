//! Post-order traversal over [`Value`] trees.
//!
//! Children are visited before their parent, so a visitor that replaces a
//! node sees already-rewritten children. Scalars pass through without a
//! visit. Record fields are reached through [`crate::record::Record`].

use crate::ast::Value;
use crate::error::StructuralError;
use std::fmt;

/// Location of a node: the root name followed by map keys, list indices,
/// and record field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn root(name: &str) -> Self {
        NodePath {
            segments: vec![name.to_owned()],
        }
    }

    fn push(&mut self, segment: impl Into<String>) {
        self.segments.push(segment.into());
    }

    fn pop(&mut self) {
        self.segments.pop();
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Walk `value` rooted at `root`, calling `visit` on every compound node.
/// The visitor replaces a node by assigning through the `&mut Value`.
pub fn walk<F>(value: &mut Value, root: &str, visit: &mut F) -> Result<(), StructuralError>
where
    F: FnMut(&mut Value, &NodePath) -> Result<(), StructuralError>,
{
    let mut path = NodePath::root(root);
    walk_node(value, &mut path, visit)
}

fn walk_node<F>(value: &mut Value, path: &mut NodePath, visit: &mut F) -> Result<(), StructuralError>
where
    F: FnMut(&mut Value, &NodePath) -> Result<(), StructuralError>,
{
    match value {
        Value::Null => {
            return Err(StructuralError::NullValue {
                location: path.to_string(),
            })
        }
        Value::Scalar(_) => return Ok(()),
        Value::List(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                path.push(i.to_string());
                walk_node(item, path, visit)?;
                path.pop();
            }
        }
        Value::Map(map) => {
            for (key, item) in map.iter_mut() {
                path.push(key.as_str());
                walk_node(item, path, visit)?;
                path.pop();
            }
        }
        Value::Record(record) => {
            for (field, item) in record.compound_fields_mut() {
                path.push(field);
                walk_node(item, path, visit)?;
                path.pop();
            }
        }
    }
    visit(value, path)
}
