//! Record of which expansion discovered which.
//!
//! Uses `petgraph::DiGraph` with one node per expansion (weighted by its
//! generated name) and an edge from the expansion whose body first requested
//! another to that expansion. Entry points have no incoming edge, so every
//! node has at most one parent and walking parents always ends at a root.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct InstantiationGraph {
    graph: DiGraph<String, ()>,
    nodes: FxHashMap<String, NodeIndex>,
}

impl InstantiationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, actual_name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(actual_name) {
            return idx;
        }
        let idx = self.graph.add_node(actual_name.to_string());
        self.nodes.insert(actual_name.to_string(), idx);
        idx
    }

    /// Record an entry point.
    pub fn add_root(&mut self, actual_name: &str) {
        self.node(actual_name);
    }

    /// Record that lowering `parent` created `child`.
    pub fn add_discovery(&mut self, parent: &str, child: &str) {
        let from = self.node(parent);
        let to = self.node(child);
        self.graph.add_edge(from, to, ());
    }

    pub fn contains(&self, actual_name: &str) -> bool {
        self.nodes.contains_key(actual_name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn parent(&self, actual_name: &str) -> Option<&str> {
        let idx = *self.nodes.get(actual_name)?;
        let parent = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .next()?;
        self.graph.node_weight(parent).map(String::as_str)
    }

    /// Names expanding `actual_name`, from its entry point down to it.
    pub fn chain_to(&self, actual_name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut current = Some(actual_name);
        while let Some(name) = current {
            if !self.contains(name) || chain.len() > self.len() {
                break;
            }
            chain.push(name.to_string());
            current = self.parent(name);
        }
        chain.reverse();
        chain
    }

    /// Names `actual_name` requested directly, in discovery order.
    pub fn children(&self, actual_name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(actual_name) else {
            return Vec::new();
        };
        // petgraph walks outgoing edges newest first
        let mut children: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .filter_map(|n| self.graph.node_weight(n).map(String::as_str))
            .collect();
        children.reverse();
        children
    }
}
