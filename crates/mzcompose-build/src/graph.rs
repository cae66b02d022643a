//! Image dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from image-to-image dependencies and
//! resolves the order in which images must be fingerprinted and acquired.

use std::collections::BTreeMap;

use mzcompose_common::error::{ComposeError, Result};
use petgraph::graph::NodeIndex;

/// A dependency graph of images.
#[derive(Debug, Default)]
pub struct ImageGraph {
    graph: petgraph::Graph<String, ()>,
    nodes: BTreeMap<String, NodeIndex>,
}

impl ImageGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an image node, returning the existing node if already present.
    pub fn add_image(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        let _ = self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Records that `dependent` is built on top of `dependency`.
    ///
    /// The edge points from `dependency` to `dependent` so that a
    /// topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: &str, dependency: &str) {
        let dependent = self.add_image(dependent);
        let dependency = self.add_image(dependency);
        let _ = self.graph.add_edge(dependency, dependent, ());
    }

    /// Returns every image with its dependencies ahead of it.
    ///
    /// # Errors
    ///
    /// Returns an error naming an image on the cycle if the graph is cyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                Err(ComposeError::Config {
                    message: format!("cyclic image dependency involving {name:?}"),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = ImageGraph::new();
        assert!(graph.resolve_order().expect("should resolve").is_empty());
    }

    #[test]
    fn adding_an_image_twice_reuses_the_node() {
        let mut graph = ImageGraph::new();
        let a = graph.add_image("ubuntu-base");
        let b = graph.add_image("ubuntu-base");
        assert_eq!(a, b);
        assert_eq!(graph.resolve_order().expect("resolve"), vec!["ubuntu-base"]);
    }

    #[test]
    fn dependencies_come_first() {
        let mut graph = ImageGraph::new();
        graph.add_dependency("materialized", "ubuntu-base");
        graph.add_dependency("testdrive", "ubuntu-base");
        graph.add_dependency("testdrive", "materialized");

        let order = graph.resolve_order().expect("should resolve");
        let pos = |name: &str| order.iter().position(|n| n == name).expect(name);
        assert!(pos("ubuntu-base") < pos("materialized"));
        assert!(pos("materialized") < pos("testdrive"));
    }

    #[test]
    fn cycle_detection() {
        let mut graph = ImageGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");

        let msg = graph.resolve_order().unwrap_err().to_string();
        assert!(msg.contains("cyclic"), "got: {msg}");
    }
}
