//! Generation order
//!
//! Two orderings over the built types, both deterministic:
//! - inheritance order: bases before derived (Kahn's algorithm, ties by id)
//! - dependency order: referenced before referrer over the SCC condensation,
//!   so members of one reference cycle stay adjacent

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use petgraph::algo::{condensation, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use super::{GeneratedType, TypeId, TypeKind};

/// Bases before derived. `Err` carries the types left on an inheritance cycle.
pub(crate) fn inheritance_order(types: &[GeneratedType]) -> Result<Vec<TypeId>, Vec<TypeId>> {
    let mut graph: DiGraph<TypeId, ()> = DiGraph::with_capacity(types.len(), 0);
    let nodes: Vec<NodeIndex> = types.iter().map(|t| graph.add_node(t.id)).collect();
    for ty in types {
        for base in &ty.base_types {
            if let Some(from) = nodes.get(base.0) {
                graph.update_edge(*from, nodes[ty.id.0], ());
            }
        }
    }

    let order = kahn(&graph);
    if order.len() == types.len() {
        return Ok(order);
    }
    let placed: Vec<TypeId> = order;
    Err(types.iter().map(|t| t.id).filter(|id| !placed.contains(id)).collect())
}

/// Referenced before referrer; cycle members adjacent, bases first within a cycle
pub(crate) fn dependency_order(types: &[GeneratedType]) -> Vec<TypeId> {
    let graph = dependency_graph(types);
    let condensed = condensation(graph, true);

    // One node per SCC, self-loops and parallel edges dropped.
    let scc: DiGraph<Vec<TypeId>, ()> = condensed.map(
        |_, members| {
            let mut members = members.clone();
            members.sort();
            members
        },
        |_, _| (),
    );

    let mut out = Vec::with_capacity(types.len());
    let mut indegree: Vec<usize> = scc
        .node_indices()
        .map(|n| scc.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<(TypeId, NodeIndex)>> = scc
        .node_indices()
        .filter(|n| indegree[n.index()] == 0)
        .map(|n| Reverse((scc[n][0], n)))
        .collect();

    while let Some(Reverse((_, n))) = ready.pop() {
        out.extend(bases_first(&scc[n], types));
        let targets: Vec<NodeIndex> = scc.neighbors_directed(n, Direction::Outgoing).collect();
        for m in targets {
            indegree[m.index()] -= 1;
            if indegree[m.index()] == 0 {
                ready.push(Reverse((scc[m][0], m)));
            }
        }
    }
    out
}

/// Strongly connected groups of the reference graph that form a cycle
pub(crate) fn cycle_groups(types: &[GeneratedType]) -> Vec<Vec<TypeId>> {
    let graph = dependency_graph(types);
    let mut groups: Vec<Vec<TypeId>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut ids: Vec<TypeId> = scc.into_iter().map(|n| graph[n]).collect();
            ids.sort();
            ids
        })
        .collect();
    groups.sort();
    groups
}

/// Edge dependency → dependent for every class base and reference.
/// A union base is not a dependency of its members: the union depends on them.
fn dependency_graph(types: &[GeneratedType]) -> DiGraph<TypeId, ()> {
    let mut graph: DiGraph<TypeId, ()> = DiGraph::with_capacity(types.len(), 0);
    let nodes: Vec<NodeIndex> = types.iter().map(|t| graph.add_node(t.id)).collect();
    for ty in types {
        let class_bases = ty
            .base_types
            .iter()
            .copied()
            .filter(|b| types.get(b.0).is_some_and(|t| t.kind != TypeKind::Interface));
        for dep in class_bases.chain(ty.field_dependencies()) {
            if let Some(from) = nodes.get(dep.0) {
                graph.update_edge(*from, nodes[ty.id.0], ());
            }
        }
    }
    graph
}

fn kahn(graph: &DiGraph<TypeId, ()>) -> Vec<TypeId> {
    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut ready: BinaryHeap<Reverse<(TypeId, NodeIndex)>> = graph
        .node_indices()
        .filter(|n| indegree[n.index()] == 0)
        .map(|n| Reverse((graph[n], n)))
        .collect();

    let mut out = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((id, n))) = ready.pop() {
        out.push(id);
        let targets: Vec<NodeIndex> = graph.neighbors_directed(n, Direction::Outgoing).collect();
        for m in targets {
            indegree[m.index()] -= 1;
            if indegree[m.index()] == 0 {
                ready.push(Reverse((graph[m], m)));
            }
        }
    }
    out
}

/// Order one SCC: class bases before derived, union members before their union
fn bases_first(members: &[TypeId], types: &[GeneratedType]) -> Vec<TypeId> {
    let mut graph: DiGraph<TypeId, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = members.iter().map(|id| graph.add_node(*id)).collect();
    let index_of = |id: &TypeId| members.iter().position(|m| m == id);

    for (i, id) in members.iter().enumerate() {
        let Some(ty) = types.get(id.0) else { continue };
        for base in &ty.base_types {
            let is_union = types.get(base.0).is_some_and(|b| b.kind == TypeKind::Interface);
            if let (false, Some(pos)) = (is_union, index_of(base)) {
                graph.update_edge(nodes[pos], nodes[i], ());
            }
        }
        if let (TypeKind::Interface, Some(disc)) = (ty.kind, &ty.discriminator) {
            for (_, member) in &disc.mapping {
                if let Some(pos) = index_of(member) {
                    graph.update_edge(nodes[pos], nodes[i], ());
                }
            }
        }
    }

    let ordered = kahn(&graph);
    if ordered.len() == members.len() {
        ordered
    } else {
        members.to_vec()
    }
}
