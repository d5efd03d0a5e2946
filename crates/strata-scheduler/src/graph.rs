//! Sanity checks over registered view graphs.
//!
//! The per-view coordination protocol assumes the dependency graph is a DAG
//! and that storage paths are disjoint across distinct views. Both are
//! preconditions on the view definitions; this module verifies them once
//! when a root view first enters the scheduler, so a bad definition fails
//! fast instead of wedging a coordinator round.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use strata_core::ViewId;

use crate::error::{Error, Result};
use crate::view::ViewSpec;

/// Validates the dependency graph reachable from `root`.
///
/// Checks, in order:
/// 1. No two distinct views (different identity) claim the same
///    `full_path`.
/// 2. The graph is acyclic.
///
/// # Errors
///
/// Returns [`Error::PathOverlap`] or [`Error::CycleDetected`].
pub fn validate(root: &Arc<ViewSpec>) -> Result<()> {
    let mut graph: DiGraph<ViewId, ()> = DiGraph::new();
    let mut indices: HashMap<ViewId, NodeIndex> = HashMap::new();
    let mut names: HashMap<ViewId, String> = HashMap::new();
    let mut paths: HashMap<String, ViewId> = HashMap::new();

    let mut stack: Vec<Arc<ViewSpec>> = vec![Arc::clone(root)];
    while let Some(view) = stack.pop() {
        let id = view.id();
        if indices.contains_key(&id) {
            continue;
        }

        if let Some(&other) = paths.get(&view.full_path) {
            if other != id {
                return Err(Error::PathOverlap {
                    path: view.full_path.clone(),
                    first: names.get(&other).cloned().unwrap_or_else(|| other.to_string()),
                    second: view.name.clone(),
                });
            }
        }
        paths.insert(view.full_path.clone(), id);
        names.insert(id, view.name.clone());

        let idx = graph.add_node(id);
        indices.insert(id, idx);

        for dep in &view.dependencies {
            stack.push(Arc::clone(dep));
        }
    }

    // Second pass for edges, now that every node has an index.
    let mut stack: Vec<Arc<ViewSpec>> = vec![Arc::clone(root)];
    let mut visited: HashSet<ViewId> = HashSet::new();
    while let Some(view) = stack.pop() {
        let id = view.id();
        if !visited.insert(id) {
            continue;
        }
        let from = indices[&id];
        for dep in &view.dependencies {
            let to = indices[&dep.id()];
            graph.add_edge(from, to, ());
            stack.push(Arc::clone(dep));
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        let id = graph[cycle.node_id()];
        Error::CycleDetected {
            view: names.get(&id).cloned().unwrap_or_else(|| id.to_string()),
        }
    })?;

    Ok(())
}
