use crate::store::error::ConfigError;
use crate::store::types::{EqId, VarId};
use crate::store::Tree;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

/// Requested outputs valid for the tree's release, in declared output order.
pub fn roots(tree: &Tree) -> Vec<VarId> {
    let mut roots: Vec<VarId> = tree
        .variables()
        .filter(|(_, v)| v.is_user_output && v.release.contains(tree.release()))
        .map(|(id, _)| id)
        .collect();
    roots.sort_by_key(|id| tree.var(*id).output_order);
    roots
}

/// Every variable reachable upstream from `roots` through active producers
/// that has no active producer itself and is not a constant.
///
/// Returned in declared input order, each variable once.
pub fn leaves(tree: &Tree, roots: &[VarId]) -> Vec<VarId> {
    let mut visited = HashSet::new();
    let mut leaves = Vec::new();
    let mut stack: Vec<VarId> = roots.to_vec();

    while let Some(var) = stack.pop() {
        if !visited.insert(var) {
            continue;
        }
        let v = tree.var(var);
        match v.active_producer() {
            Some(eq) => stack.extend(tree.equation(eq).inputs.iter().copied()),
            None if !v.is_constant => leaves.push(var),
            None => {}
        }
    }

    leaves.sort_by_key(|id| tree.var(*id).input_order);
    leaves
}

/// Identifies every equation downstream from the given variables, active or
/// not. This is exactly the set a value change marks dirty in a clean tree.
pub fn consumer_closure(tree: &Tree, start: &[VarId]) -> HashSet<EqId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start.to_vec());
    let mut seen_vars = HashSet::new();

    while let Some(var) = queue.pop_front() {
        if !seen_vars.insert(var) {
            continue;
        }
        for &eq in tree.var(var).consumers() {
            if visited.insert(eq) {
                queue.extend(tree.equation(eq).outputs.iter().copied());
            }
        }
    }
    visited
}

/// Rejects a configuration whose active equations form a cycle.
///
/// Edges run input -> output through each active equation.
pub fn check_acyclic(tree: &Tree) -> Result<(), ConfigError> {
    let mut graph: DiGraph<VarId, EqId> = DiGraph::new();
    let mut nodes: HashMap<VarId, NodeIndex> = HashMap::new();
    let mut node = |graph: &mut DiGraph<VarId, EqId>, var: VarId| *nodes.entry(var).or_insert_with(|| graph.add_node(var));

    for (id, eq) in tree.equations().filter(|(_, e)| e.active) {
        for &output in &eq.outputs {
            let to = node(&mut graph, output);
            for &input in &eq.inputs {
                let from = node(&mut graph, input);
                graph.add_edge(from, to, id);
            }
        }
    }

    toposort(&graph, None).map(|_| ()).map_err(|cycle| {
        let var = graph[cycle.node_id()];
        ConfigError::Cycle(tree.var(var).name.clone())
    })
}
