//! Graph algorithms for the module hierarchy.
//!
//! Modules form a forest through `parent_id`. These helpers build a
//! parent -> child graph with petgraph and look for cycles in it.

use crate::models::Module;
use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use std::collections::HashSet;
use uuid::Uuid;

/// One cycle in the module hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleCycle {
    /// Module the search started from; always a member of the cycle.
    pub start: Uuid,
    /// Cycle members in parent -> child order, beginning with `start`.
    pub path: Vec<Uuid>,
}

/// Build the parent -> child graph. Parents outside the slice are ignored.
pub fn hierarchy_graph(modules: &[Module]) -> DiGraphMap<Uuid, ()> {
    let mut graph = DiGraphMap::new();
    for module in modules {
        graph.add_node(module.id);
    }
    for module in modules {
        if let Some(parent_id) = module.parent_id {
            if graph.contains_node(parent_id) {
                graph.add_edge(parent_id, module.id, ());
            }
        }
    }
    graph
}

/// Find every cycle in the hierarchy.
///
/// Depth-first search with a visited set and an on-stack set. Roots are
/// searched first, then any module still unvisited, in slice order: a cycle has
/// no root above it, so it only shows up from the second pass.
pub fn find_hierarchy_cycles(modules: &[Module]) -> Vec<ModuleCycle> {
    let graph = hierarchy_graph(modules);
    let starts = modules
        .iter()
        .filter(|m| m.parent_id.is_none_or(|p| !graph.contains_node(p)))
        .chain(modules.iter())
        .map(|m| m.id);

    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut on_stack: HashSet<Uuid> = HashSet::new();
    let mut cycles = Vec::new();

    for start in starts {
        if !visited.insert(start) {
            continue;
        }
        on_stack.insert(start);
        let mut path = vec![start];
        let mut stack = vec![graph.neighbors(start)];

        loop {
            let Some(children) = stack.last_mut() else {
                break;
            };
            match children.next() {
                Some(child) if on_stack.contains(&child) => {
                    let from = path.iter().position(|n| *n == child).unwrap_or(0);
                    cycles.push(ModuleCycle {
                        start: child,
                        path: path[from..].to_vec(),
                    });
                }
                Some(child) => {
                    if visited.insert(child) {
                        on_stack.insert(child);
                        path.push(child);
                        stack.push(graph.neighbors(child));
                    }
                }
                None => {
                    stack.pop();
                    if let Some(done) = path.pop() {
                        on_stack.remove(&done);
                    }
                }
            }
        }
    }

    cycles
}

/// Whether re-parenting `module_id` under `new_parent` would close a cycle.
pub fn would_create_cycle(modules: &[Module], module_id: Uuid, new_parent: Option<Uuid>) -> bool {
    let Some(new_parent) = new_parent else {
        return false;
    };
    if new_parent == module_id {
        return true;
    }
    let graph = hierarchy_graph(modules);
    graph.contains_node(module_id)
        && graph.contains_node(new_parent)
        && has_path_connecting(&graph, module_id, new_parent, None)
}
