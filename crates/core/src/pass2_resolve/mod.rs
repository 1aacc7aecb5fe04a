//! Pass 2: Fixed-point resolution -- substitute bound entries against the
//! free ones and promote every entry whose references all resolved,
//! until an iteration promotes nothing.
//!
//! Each iteration walks a snapshot of the bound keys in declaration order.
//! Substitutions only see entries that were free when the iteration began;
//! promotions take effect at its end. An entry moves from bound to free at
//! most once.

mod attribute;
mod report;
mod substitute;

use crate::ast::*;
use crate::catalog::TypeCatalog;
use crate::config::LinkerConfig;
use crate::error::{LinkError, LinkFailure, StructuralError};
use crate::graph::ModuleGraph;
use crate::pass1_classify::Partition;
use indexmap::IndexMap;
use serde::Serialize;
use substitute::{Outcome, Substitution};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub initially_free: usize,
    pub iterations: usize,
    pub promoted: usize,
}

pub struct Resolver<'a> {
    config: &'a LinkerConfig,
    catalog: &'a dyn TypeCatalog,
    state: Partition,
    /// Outcome of the latest attempt for each entry that is still bound.
    attempts: IndexMap<String, Outcome>,
    diagnostics: Vec<LinkError>,
    stats: LinkStats,
    settled: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(partition: Partition, config: &'a LinkerConfig, catalog: &'a dyn TypeCatalog) -> Self {
        let stats = LinkStats {
            initially_free: partition.free.len(),
            ..LinkStats::default()
        };
        Resolver {
            config,
            catalog,
            state: partition,
            attempts: IndexMap::new(),
            diagnostics: Vec::new(),
            stats,
            settled: false,
        }
    }

    pub fn free(&self) -> &IndexMap<String, Entity> {
        &self.state.free
    }

    pub fn bound(&self) -> &IndexMap<String, Entity> {
        &self.state.bound
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Run one iteration and return the number of promoted entries.
    pub fn step(&mut self) -> Result<usize, StructuralError> {
        let keys: Vec<String> = self.state.bound.keys().cloned().collect();
        let mut promotions = Vec::new();

        for key in keys {
            let Some(entity) = self.state.bound.get(&key) else {
                continue;
            };
            let mut value = entity.reference.clone();
            let outcome = Substitution {
                config: self.config,
                catalog: self.catalog,
                free: &self.state.free,
                bound: &self.state.bound,
            }
            .apply(&key, &mut value, &key)?;

            if outcome.is_resolved() {
                promotions.push((key, value, outcome));
            } else {
                if let Some(entity) = self.state.bound.get_mut(&key) {
                    entity.reference = value;
                }
                self.attempts.insert(key, outcome);
            }
        }

        let promoted = promotions.len();
        for (key, value, outcome) in promotions {
            if let Some(mut entity) = self.state.bound.shift_remove(&key) {
                entity.reference = value;
                tracing::trace!(entity = %key, "promoted to free");
                self.diagnostics.extend(outcome.invalid);
                self.attempts.shift_remove(&key);
                self.state.free.insert(key, entity);
            }
        }

        self.stats.iterations += 1;
        self.stats.promoted += promoted;
        if promoted == 0 || self.state.bound.is_empty() {
            self.settled = true;
        }
        tracing::debug!(
            iteration = self.stats.iterations,
            promoted,
            remaining = self.state.bound.len(),
            "resolver iteration"
        );
        Ok(promoted)
    }

    /// Iterate until no bound entries remain or an iteration makes no
    /// progress.
    pub fn run(&mut self) -> Result<(), StructuralError> {
        while !self.state.bound.is_empty() {
            if self.step()? == 0 {
                break;
            }
        }
        self.settled = true;
        Ok(())
    }

    /// Link resource definitions, report every unresolved entry, and hand
    /// back the graph when nothing failed.
    pub fn finish(mut self) -> Result<(ModuleGraph, LinkStats), LinkFailure> {
        if !self.settled {
            self.run()?;
        }
        let mut diagnostics = std::mem::take(&mut self.diagnostics);
        diagnostics.extend(report::unresolved(&self.state.bound, &mut self.attempts));
        diagnostics.extend(self.link_definitions()?);

        if !diagnostics.is_empty() {
            return Err(LinkFailure::Diagnostics(diagnostics));
        }
        Ok((self.state.into_graph(), self.stats))
    }

    /// Substitute inside the provider declarations of free entries.
    /// References to entries that stayed bound are skipped; those entries
    /// are already reported.
    fn link_definitions(&mut self) -> Result<Vec<LinkError>, StructuralError> {
        let mut errors = Vec::new();
        for name in &self.state.order {
            let Some(mut definition) = self
                .state
                .free
                .get(name)
                .and_then(|e| e.definition.clone())
            else {
                continue;
            };
            let outcome = Substitution {
                config: self.config,
                catalog: self.catalog,
                free: &self.state.free,
                bound: &self.state.bound,
            }
            .apply(name, &mut definition, name)?;

            errors.extend(
                outcome
                    .missing
                    .iter()
                    .map(|u| LinkError::missing_reference(name, &u.key, &u.location)),
            );
            errors.extend(outcome.invalid);
            if let Some(entity) = self.state.free.get_mut(name) {
                entity.definition = Some(definition);
            }
        }
        Ok(errors)
    }
}

pub fn resolve(
    partition: Partition,
    config: &LinkerConfig,
    catalog: &dyn TypeCatalog,
) -> Result<(ModuleGraph, LinkStats), LinkFailure> {
    let mut resolver = Resolver::new(partition, config, catalog);
    resolver.run()?;
    resolver.finish()
}
