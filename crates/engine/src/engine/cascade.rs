//! Cascade dependency analysis.
//!
//! Consumers declare, per input, which slots go stale when that input
//! changes. Taken over every registered action this forms a directed graph
//! over slot names (`input -> dep`). Cascading walks it, so it must stay
//! acyclic; registration checks that here.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};

use crate::action::Action;

/// Slot name to the slots it invalidates, merged across all actions.
pub(crate) fn invalidation_edges<'a>(actions: impl IntoIterator<Item = &'a Action>) -> IndexMap<&'a str, IndexSet<&'a str>> {
    let mut edges: IndexMap<&str, IndexSet<&str>> = IndexMap::new();
    for action in actions {
        for input in action.input_declarations() {
            if input.deps.is_empty() {
                continue;
            }
            edges.entry(input.name.as_str()).or_default().extend(input.deps.iter().map(String::as_str));
        }
    }
    edges
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Active,
    Done,
}

/// First cycle found in the invalidation graph, as a closed path
/// (`a -> b -> a`), or `None` when the graph is acyclic.
pub(crate) fn find_cycle(edges: &IndexMap<&str, IndexSet<&str>>) -> Option<Vec<String>> {
    let mut visits: HashMap<&str, Visit> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    for &start in edges.keys() {
        if let Some(cycle) = visit(start, edges, &mut visits, &mut path) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    name: &'a str,
    edges: &IndexMap<&'a str, IndexSet<&'a str>>,
    visits: &mut HashMap<&'a str, Visit>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match visits.get(name) {
        Some(Visit::Done) => return None,
        Some(Visit::Active) => {
            let start = path.iter().position(|&entry| entry == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|entry| entry.to_string()).collect();
            cycle.push(name.to_string());
            return Some(cycle);
        }
        None => {}
    }

    visits.insert(name, Visit::Active);
    path.push(name);
    for &dep in edges.get(name).into_iter().flatten() {
        if let Some(cycle) = visit(dep, edges, visits, path) {
            return Some(cycle);
        }
    }
    path.pop();
    visits.insert(name, Visit::Done);
    None
}

/// Every slot reachable from `origin` in the invalidation graph, in the
/// order a depth-first cascade removes them.
pub(crate) fn stale_slots(edges: &IndexMap<&str, IndexSet<&str>>, origin: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut pending: Vec<&str> = edges.get(origin).map(|deps| deps.iter().rev().copied().collect()).unwrap_or_default();
    while let Some(name) = pending.pop() {
        if !seen.insert(name) {
            continue;
        }
        order.push(name.to_string());
        if let Some(deps) = edges.get(name) {
            pending.extend(deps.iter().rev().copied());
        }
    }
    order
}
