//! Prefetch tree.
//!
//! Eager-fetch directives accumulate into a tree of relationship segments
//! rooted at an unnamed node with an empty path. Adding a path creates any
//! missing intermediate nodes as phantoms and reuses nodes that already
//! exist, so overlapping fetch joins share their common prefix.
//!
//! The tree lives in a `petgraph` graph with a path → node index map:
//!
//! ```text
//! (root "")
//!   └── paintings            phantom=false, joint
//!         └── toGallery      phantom=true
//!               └── paintingArray  phantom=false, joint
//! ```

use std::collections::HashMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// How a prefetched relationship is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefetchSemantics {
    #[default]
    Undefined,
    /// Fetched in the same query through a join.
    Joint,
    /// Fetched by a separate query.
    Disjoint,
    /// Fetched by a separate query keyed on ids of the parent rows.
    DisjointById,
}

impl PrefetchSemantics {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefetchSemantics::Undefined => "undefined",
            PrefetchSemantics::Joint => "joint",
            PrefetchSemantics::Disjoint => "disjoint",
            PrefetchSemantics::DisjointById => "disjoint_by_id",
        }
    }
}

impl fmt::Display for PrefetchSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the prefetch tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchNode {
    /// Last segment of `path`; empty for the root.
    pub name: String,
    /// Path relative to the root variable.
    pub path: String,
    pub semantics: PrefetchSemantics,
    /// Exists only to connect deeper nodes.
    pub phantom: bool,
    /// Identification variable owning the fetch, once materialized.
    pub entity_id: Option<String>,
}

impl PrefetchNode {
    fn phantom(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            semantics: PrefetchSemantics::Undefined,
            phantom: true,
            entity_id: None,
        }
    }
}

/// Tree of eager-fetch paths.
#[derive(Debug, Clone)]
pub struct PrefetchTree {
    graph: DiGraph<PrefetchNode, ()>,
    root: NodeIndex,
    node_indices: HashMap<String, NodeIndex>,
}

impl Default for PrefetchTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefetchTree {
    pub fn new() -> Self {
        let mut graph = DiGraph::new();
        let root = graph.add_node(PrefetchNode::phantom("", String::new()));
        let mut node_indices = HashMap::new();
        node_indices.insert(String::new(), root);
        Self {
            graph,
            root,
            node_indices,
        }
    }

    /// Add a relative path, creating phantom intermediates as needed.
    ///
    /// Returns the leaf. Adding a path that already exists returns its node
    /// unchanged.
    pub fn add_path(&mut self, relative_path: &str) -> NodeIndex {
        let mut current = self.root;
        let mut prefix = String::new();

        for segment in relative_path.split('.').filter(|s| !s.is_empty()) {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);

            current = match self.node_indices.get(&prefix) {
                Some(&idx) => idx,
                None => {
                    let idx = self
                        .graph
                        .add_node(PrefetchNode::phantom(segment, prefix.clone()));
                    self.graph.add_edge(current, idx, ());
                    self.node_indices.insert(prefix.clone(), idx);
                    idx
                }
            };
        }
        current
    }

    /// Mutable access to a node, for marking it materialized.
    pub fn node_mut(&mut self, idx: NodeIndex) -> Option<&mut PrefetchNode> {
        self.graph.node_weight_mut(idx)
    }

    pub fn node(&self, path: &str) -> Option<&PrefetchNode> {
        self.node_indices
            .get(path)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    pub fn root(&self) -> &PrefetchNode {
        &self.graph[self.root]
    }

    /// Children of the node at `path`, in insertion order.
    pub fn children(&self, path: &str) -> Vec<&PrefetchNode> {
        match self.node_indices.get(path) {
            Some(&idx) => self.child_indices(idx).map(|c| &self.graph[c]).collect(),
            None => vec![],
        }
    }

    /// All nodes except the root, in pre-order.
    pub fn nodes(&self) -> Vec<&PrefetchNode> {
        let mut out = Vec::with_capacity(self.graph.node_count());
        let mut stack: Vec<NodeIndex> = self.child_indices(self.root).collect();
        stack.reverse();
        while let Some(idx) = stack.pop() {
            out.push(&self.graph[idx]);
            let mut children: Vec<NodeIndex> = self.child_indices(idx).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Nodes to be materialized, in pre-order.
    pub fn non_phantom(&self) -> Vec<&PrefetchNode> {
        self.nodes().into_iter().filter(|n| !n.phantom).collect()
    }

    /// Number of nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.graph.node_count() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn child_indices(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> {
        // petgraph yields outgoing edges newest first.
        let mut children: Vec<NodeIndex> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.target())
            .collect();
        children.sort();
        children.into_iter()
    }
}

impl Serialize for PrefetchTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let nodes = self.nodes();
        let mut seq = serializer.serialize_seq(Some(nodes.len()))?;
        for node in nodes {
            seq.serialize_element(node)?;
        }
        seq.end()
    }
}
