//! Diagnostics for entries left bound at the fixed point.

use super::substitute::{Outcome, Unresolved};
use crate::ast::Entity;
use crate::error::{LinkError, LinkErrorKind};
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Missing references and invalid attributes are reported per reference.
/// Strongly connected components of the stuck dependency graph (more than
/// one member, or a self-reference) are one circular-dependency error each.
/// Entries outside every cycle that only wait on stuck entries are reported
/// as blocked.
pub(super) fn unresolved(
    bound: &IndexMap<String, Entity>,
    attempts: &mut IndexMap<String, Outcome>,
) -> Vec<LinkError> {
    let mut errors = Vec::new();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(bound.len(), 0);
    for i in 0..bound.len() {
        graph.add_node(i);
    }
    let mut edges: Vec<Vec<Unresolved>> = vec![Vec::new(); bound.len()];
    let mut self_reported = vec![false; bound.len()];

    for (i, name) in bound.keys().enumerate() {
        let Some(outcome) = attempts.shift_remove(name) else {
            continue;
        };
        for u in &outcome.missing {
            errors.push(LinkError::missing_reference(name, &u.key, &u.location));
        }
        self_reported[i] = !outcome.missing.is_empty();
        errors.extend(outcome.invalid);
        for u in outcome.bound {
            if let Some(j) = bound.get_index_of(&u.key) {
                graph.update_edge(NodeIndex::new(i), NodeIndex::new(j), ());
            }
            edges[i].push(u);
        }
    }

    let mut in_cycle = vec![false; bound.len()];
    let mut cycles: Vec<Vec<usize>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| match scc.as_slice() {
            [only] => graph.contains_edge(*only, *only),
            _ => true,
        })
        .map(|scc| {
            let mut members: Vec<usize> = scc.into_iter().map(NodeIndex::index).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort_unstable_by_key(|members| members[0]);

    for members in &cycles {
        for &m in members {
            in_cycle[m] = true;
        }
        let names: Vec<&str> = members
            .iter()
            .filter_map(|&k| bound.get_index(k).map(|(name, _)| name.as_str()))
            .collect();
        let mut chain = Vec::new();
        let mut head: Option<&Unresolved> = None;
        for &m in members {
            let Some((from, _)) = bound.get_index(m) else {
                continue;
            };
            for u in &edges[m] {
                let inside = bound
                    .get_index_of(&u.key)
                    .is_some_and(|j| members.binary_search(&j).is_ok());
                if inside {
                    chain.push(format!("{} -> {}", from, u.key));
                    head.get_or_insert(u);
                }
            }
        }
        let Some((first, related)) = names.split_first() else {
            continue;
        };

        let mut error = LinkError::new(
            2,
            LinkErrorKind::CircularDependency,
            first,
            format!(
                "circular dependency between {}: {}",
                names.join(", "),
                chain.join(", ")
            ),
        )
        .with_related(related.iter().map(|s| (*s).to_owned()).collect());
        if let Some(head) = head {
            error = error.with_reference(&head.key).with_location(&head.location);
        }
        errors.push(error);
    }

    for (i, name) in bound.keys().enumerate() {
        if in_cycle[i] || self_reported[i] || edges[i].is_empty() {
            continue;
        }
        let waits_on: IndexSet<&str> = edges[i].iter().map(|u| u.key.as_str()).collect();
        let head = &edges[i][0];
        errors.push(
            LinkError::new(
                2,
                LinkErrorKind::BlockedDependency,
                name,
                format!(
                    "'{}' waits on unresolved {}",
                    name,
                    waits_on
                        .iter()
                        .map(|k| format!("'{}'", k))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )
            .with_reference(&head.key)
            .with_location(&head.location)
            .with_related(waits_on.iter().map(|k| (*k).to_owned()).collect()),
        );
    }

    errors
}
