//! Project dependency graph and topological scheduler.
//!
//! Builds a directed graph with an edge from each dependency to its
//! dependent and produces a build order. Ties between independent projects
//! are broken by workspace registration order, so build logs are
//! reproducible across runs.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;

use crate::core::workspace::Workspace;

/// Error producing a build order.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The project set contains a dependency cycle. Building must not
    /// proceed for any project.
    #[error("dependency cycle involving projects: {}", members.join(" -> "))]
    Cycle { members: Vec<String> },
    /// A project names a dependency that was never registered.
    #[error("project `{project}` depends on unknown project `{dependency}`")]
    UnknownDependency { project: String, dependency: String },
}

/// Compute the build order for all projects in the workspace.
///
/// Returns project names with every dependency before its dependents.
/// A cycle is a fatal diagnostic: the caller must treat the error as
/// "do not proceed", never as an empty schedule.
pub fn sorted_projects(ws: &Workspace) -> Result<Vec<String>, GraphError> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

    for project in ws.projects() {
        let node = graph.add_node(project.name.as_str());
        nodes.insert(project.name.as_str(), node);
    }

    for project in ws.projects() {
        for dep in &project.dependencies {
            let &dep_node =
                nodes
                    .get(dep.as_str())
                    .ok_or_else(|| GraphError::UnknownDependency {
                        project: project.name.clone(),
                        dependency: dep.clone(),
                    })?;
            let dependent = nodes[project.name.as_str()];
            // Edge points dependency -> dependent: build the dependency first.
            graph.update_edge(dep_node, dependent, ());
        }
    }

    // Kahn's algorithm with an index-ordered ready set. Node indices follow
    // registration order, so picking the smallest ready index each round
    // gives the documented deterministic tie-break.
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| {
            graph
                .neighbors_directed(n, petgraph::Direction::Incoming)
                .count()
        })
        .collect();

    let mut ready: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .collect();
    let mut order = Vec::with_capacity(graph.node_count());

    loop {
        let pos = match ready.iter().enumerate().min_by_key(|(_, n)| n.index()) {
            Some((pos, _)) => pos,
            None => break,
        };
        let node = ready.swap_remove(pos);
        order.push(graph[node].to_string());

        for next in graph.neighbors_directed(node, petgraph::Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(next);
            }
        }
    }

    if order.len() != graph.node_count() {
        // Everything still carrying an in-degree sits on or behind a cycle.
        let members = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] > 0)
            .map(|n| graph[n].to_string())
            .collect();
        return Err(GraphError::Cycle { members });
    }

    Ok(order)
}
