//! The substitution visitor: rewrites symbolic forms against the current
//! free entries and records every reference it has to leave in place.

use super::attribute::validate_attribute;
use crate::ast::*;
use crate::catalog::TypeCatalog;
use crate::config::LinkerConfig;
use crate::error::{LinkError, StructuralError};
use crate::expr::{self, Form};
use crate::walk::{walk, NodePath};
use indexmap::IndexMap;

/// A reference the visitor could not substitute.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Unresolved {
    pub key: String,
    pub location: String,
}

impl Unresolved {
    fn new(key: &str, location: &str) -> Self {
        Unresolved {
            key: key.to_owned(),
            location: location.to_owned(),
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct Outcome {
    /// References to entities that are still bound.
    pub bound: Vec<Unresolved>,
    /// References to names absent from the graph.
    pub missing: Vec<Unresolved>,
    pub invalid: Vec<LinkError>,
}

impl Outcome {
    pub fn is_resolved(&self) -> bool {
        self.bound.is_empty() && self.missing.is_empty()
    }
}

enum Lookup<'e> {
    Exempt,
    Free(&'e Entity),
    Bound,
    Missing,
}

pub(super) struct Substitution<'a> {
    pub config: &'a LinkerConfig,
    pub catalog: &'a dyn TypeCatalog,
    pub free: &'a IndexMap<String, Entity>,
    pub bound: &'a IndexMap<String, Entity>,
}

impl<'a> Substitution<'a> {
    /// Rewrite `value` in place on behalf of `entity`.
    pub fn apply(&self, entity: &str, value: &mut Value, root: &str) -> Result<Outcome, StructuralError> {
        let mut outcome = Outcome::default();
        walk(value, root, &mut |node, path| {
            self.visit(entity, node, path, &mut outcome)
        })?;
        Ok(outcome)
    }

    fn visit(
        &self,
        entity: &str,
        node: &mut Value,
        path: &NodePath,
        outcome: &mut Outcome,
    ) -> Result<(), StructuralError> {
        let replacement = match Form::recognize(node, path)? {
            None => None,
            Some(Form::Reference(key)) => self.reference(key, path, outcome),
            Some(Form::Attribute(key, attribute)) => {
                self.attribute(entity, key, attribute, path, outcome)
            }
            Some(Form::Substitution(pattern, args)) => {
                self.substitution(entity, pattern, args, path, outcome)
            }
        };
        if let Some(value) = replacement {
            *node = value;
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Lookup<'a> {
        if self.config.is_exempt(key) {
            Lookup::Exempt
        } else if let Some(target) = self.free.get(key) {
            Lookup::Free(target)
        } else if self.bound.contains_key(key) {
            Lookup::Bound
        } else {
            Lookup::Missing
        }
    }

    fn reference(&self, key: &str, path: &NodePath, outcome: &mut Outcome) -> Option<Value> {
        match self.lookup(key) {
            Lookup::Free(target) => {
                tracing::trace!(reference = key, at = %path, "substituted reference");
                Some(target.reference.clone())
            }
            other => {
                record(other, key, &path.to_string(), outcome);
                None
            }
        }
    }

    fn attribute(
        &self,
        entity: &str,
        key: &str,
        attribute: &str,
        path: &NodePath,
        outcome: &mut Outcome,
    ) -> Option<Value> {
        let location = path.to_string();
        match self.lookup(key) {
            Lookup::Free(target) => {
                match validate_attribute(entity, target, attribute, &location, self.catalog) {
                    Ok(()) => Some(expr::attribute(target.resource_name(self.config), attribute)),
                    Err(e) => {
                        outcome.invalid.push(e);
                        None
                    }
                }
            }
            other => {
                record(other, key, &location, outcome);
                None
            }
        }
    }

    fn substitution(
        &self,
        entity: &str,
        pattern: &str,
        args: Option<&IndexMap<String, Value>>,
        path: &NodePath,
        outcome: &mut Outcome,
    ) -> Option<Value> {
        let location = path.to_string();
        let mut args: IndexMap<String, Value> = args.cloned().unwrap_or_default();
        let mut next = 0usize;
        let mut changed = false;

        let rewritten = expr::replace_placeholders(pattern, |name, attribute| {
            if args.contains_key(name) {
                return None;
            }
            let target = match self.lookup(name) {
                Lookup::Free(target) => target,
                other => {
                    record(other, name, &location, outcome);
                    return None;
                }
            };
            let text = match attribute {
                None => self.splice(&target.reference, &mut args, &mut next),
                Some(attribute) => {
                    match validate_attribute(entity, target, attribute, &location, self.catalog) {
                        Ok(()) => {
                            expr::placeholder(&target.resource_name(self.config), Some(attribute))
                        }
                        Err(e) => {
                            outcome.invalid.push(e);
                            return None;
                        }
                    }
                }
            };
            changed = true;
            Some(text)
        });

        if args.is_empty() && !expr::has_placeholders(&rewritten) {
            return Some(Value::string(rewritten));
        }
        changed.then(|| expr::substitution(rewritten, args))
    }

    /// Text for a placeholder whose target resolved to `value`. Scalars are
    /// spliced literally, references become placeholders of their own, and
    /// any other value is hoisted into a synthetic argument.
    fn splice(&self, value: &Value, args: &mut IndexMap<String, Value>, next: &mut usize) -> String {
        if let Value::Scalar(scalar) = value {
            return scalar.to_text();
        }
        match Form::peek(value) {
            Some(Form::Reference(key)) => expr::placeholder(key, None),
            Some(Form::Attribute(key, attribute)) => expr::placeholder(key, Some(attribute)),
            _ => {
                let name = loop {
                    let candidate = format!("{}{}", self.config.synthetic_arg_prefix, *next);
                    *next += 1;
                    if !args.contains_key(&candidate) {
                        break candidate;
                    }
                };
                args.insert(name.clone(), value.clone());
                expr::placeholder(&name, None)
            }
        }
    }
}

fn record(lookup: Lookup<'_>, key: &str, location: &str, outcome: &mut Outcome) {
    match lookup {
        Lookup::Bound => outcome.bound.push(Unresolved::new(key, location)),
        Lookup::Missing => outcome.missing.push(Unresolved::new(key, location)),
        Lookup::Exempt | Lookup::Free(_) => {}
    }
}
