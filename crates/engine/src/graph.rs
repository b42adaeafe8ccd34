//! Producer/consumer graph between registered actions.
//!
//! The graph is derived data: the engine keeps it in sync as actions are
//! registered and only reads it back to render a diagram. Nodes live in a
//! vector and are referenced by index; a key lookup maps node names to those
//! indices so re-registering a name updates the existing node in place.

use std::{collections::HashMap, fmt};

use indexmap::IndexMap;

use crate::action::Action;

/// Separator drawn between a node's name and each block of its info.
const INFO_SEPARATOR: &str = "+++++++++++++";

/// Something that can be drawn as a diagram node.
pub trait Displayable {
    /// Unique node key and label.
    fn name(&self) -> &str;
    /// Blocks of diagnostic text shown under the label.
    fn info(&self) -> Vec<String>;
}

/// Snapshot of an action for diagram purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionNode {
    pub name: String,
    pub inputs: String,
    pub outputs: String,
}

impl From<&Action> for ActionNode {
    fn from(action: &Action) -> Self {
        let [inputs, outputs] = action.get_info();
        Self {
            name: action.name().to_string(),
            inputs,
            outputs,
        }
    }
}

impl Displayable for ActionNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> Vec<String> {
        vec![self.inputs.clone(), self.outputs.clone()]
    }
}

/// Directed graph whose edges carry labels; several labels may connect the
/// same ordered pair of nodes.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N, E = String> {
    nodes: Vec<N>,
    index: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    edges: IndexMap<(usize, usize), Vec<E>>,
}

impl<N, E> Default for DependencyGraph<N, E> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            edges: IndexMap::new(),
        }
    }
}

impl<N: Displayable, E: PartialEq> DependencyGraph<N, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `node`, replacing any node with the same name. Returns its index.
    pub fn add_node(&mut self, node: N) -> usize {
        if let Some(&position) = self.index.get(node.name()) {
            self.nodes[position] = node;
            return position;
        }
        let position = self.nodes.len();
        self.index.insert(node.name().to_string(), position);
        self.nodes.push(node);
        self.adjacency.push(Vec::new());
        position
    }

    /// Connect `from` to `to`, adding either endpoint when missing.
    pub fn add_edge(&mut self, from: N, to: N, label: E) {
        let from = self.add_node(from);
        let to = self.add_node(to);
        self.connect(from, to, label);
    }

    /// Connect two existing nodes by index. Repeating an existing label is a no-op.
    pub fn connect(&mut self, from: usize, to: usize, label: E) {
        if !self.adjacency[from].contains(&to) {
            self.adjacency[from].push(to);
        }
        let labels = self.edges.entry((from, to)).or_default();
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    /// Drop every edge touching `name`, keeping the node itself.
    pub fn detach(&mut self, name: &str) {
        let Some(&position) = self.index.get(name) else {
            return;
        };
        self.adjacency[position].clear();
        for neighbors in &mut self.adjacency {
            neighbors.retain(|&neighbor| neighbor != position);
        }
        self.edges.retain(|&(from, to), _| from != position && to != position);
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get_nodes(&self) -> &[N] {
        &self.nodes
    }

    /// Labels of every edge leaving `name`, grouped by target in insertion order.
    pub fn get_edges(&self, name: &str) -> Vec<&E> {
        let Some(from) = self.node_index(name) else {
            return Vec::new();
        };
        self.adjacency[from]
            .iter()
            .filter_map(|&to| self.edges.get(&(from, to)))
            .flatten()
            .collect()
    }

    /// Nodes reachable from `name` over a single edge.
    pub fn get_neighbors(&self, name: &str) -> Vec<&N> {
        self.node_index(name)
            .map(|from| self.adjacency[from].iter().map(|&to| &self.nodes[to]).collect())
            .unwrap_or_default()
    }

    /// Number of labelled edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }
}

impl<N: Displayable, E: fmt::Display> DependencyGraph<N, E> {
    /// Render the graph as a Mermaid `graph TD` diagram.
    ///
    /// Every node gets a block with its info, isolated nodes included,
    /// followed by one `from -- label --> to` line per labelled edge.
    pub fn render_mermaid(&self) -> String {
        let separator = format!("{INFO_SEPARATOR}\n");
        let mut lines = vec!["graph TD\n".to_string()];
        for node in &self.nodes {
            let name = node.name();
            let info = node.info().join(separator.as_str());
            lines.push(format!("{name}({name} \n {INFO_SEPARATOR} \n {info})"));
        }
        for (&(from, to), labels) in &self.edges {
            for label in labels {
                lines.push(format!("{} -- {label} --> {}", self.nodes[from].name(), self.nodes[to].name()));
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> ActionNode {
        ActionNode {
            name: name.to_string(),
            inputs: "None\n".to_string(),
            outputs: "None\n".to_string(),
        }
    }

    #[test]
    fn add_edge_creates_missing_endpoints() {
        let mut graph: DependencyGraph<ActionNode> = DependencyGraph::new();
        graph.add_edge(node("fetch"), node("parse"), "page".to_string());

        assert_eq!(graph.get_nodes().len(), 2);
        assert_eq!(graph.get_edges("fetch"), vec!["page"]);
        assert_eq!(graph.get_neighbors("fetch").iter().map(|n| n.name.as_str()).collect::<Vec<_>>(), vec!["parse"]);
        assert!(graph.get_neighbors("parse").is_empty());
    }

    #[test]
    fn one_edge_per_shared_label() {
        let mut graph: DependencyGraph<ActionNode> = DependencyGraph::new();
        graph.add_edge(node("a"), node("b"), "x".to_string());
        graph.add_edge(node("a"), node("b"), "y".to_string());
        graph.add_edge(node("a"), node("b"), "x".to_string());

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.get_neighbors("a").len(), 1);
    }

    #[test]
    fn detach_keeps_the_node() {
        let mut graph: DependencyGraph<ActionNode> = DependencyGraph::new();
        graph.add_edge(node("a"), node("b"), "x".to_string());
        graph.add_edge(node("b"), node("c"), "y".to_string());
        graph.detach("b");

        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.get_nodes().len(), 3);
        assert!(graph.get_neighbors("a").is_empty());
    }

    #[test]
    fn mermaid_lists_isolated_nodes_and_edges() {
        let mut graph: DependencyGraph<ActionNode> = DependencyGraph::new();
        graph.add_edge(node("fetch"), node("parse"), "page".to_string());
        graph.add_node(node("idle"));

        let rendered = graph.render_mermaid();
        assert!(rendered.starts_with("graph TD\n"));
        assert!(rendered.contains("idle(idle \n +++++++++++++ \n None\n+++++++++++++\nNone\n)"));
        assert!(rendered.contains("fetch -- page --> parse"));
        assert!(!rendered.contains("idle --"));
    }
}
