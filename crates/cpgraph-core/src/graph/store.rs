//! Owned data-flow graph with an explicit canonical order.
//!
//! Nodes live in a `BTreeMap` keyed by node key (data node key or module
//! stable id), edges in a `BTreeMap` keyed by [`EdgeKey`]. Iteration order is
//! therefore always lexicographic by node key and by
//! `(source, target, edge_kind)`, whatever order the graph was built or
//! rewritten in. Two adjacency indices mirror the edge map so incoming and
//! outgoing lookups don't scan every edge; all mutations go through this
//! module so the three stay in step.
//!
//! ## Live view
//!
//! Highlight-mode filters tag elements with `filtered = true` instead of
//! removing them. A node is *live* when it is not tagged; an edge is live when
//! it is not tagged and both endpoints are live. Filter passes only ever look
//! at the live view.

#![allow(clippy::module_name_repetitions)]

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::GraphError;
use crate::identity::HASH_HEX_LEN;
use crate::model::RefKind;
use crate::normalize::{DataKind, is_list, node_key};

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// One uniquely named data item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataNode {
    /// `"{kind}__{name}"`.
    pub key: String,
    /// Display name (the unprefixed data name).
    pub name: String,
    pub kind: DataKind,
    pub filtered: bool,
}

/// One pipeline module, possibly folded from several records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleNode {
    pub stable_id: String,
    pub type_name: String,
    /// Ordinals of every record that resolved to this node.
    pub ordinals: BTreeSet<u32>,
    /// True if any folded record was enabled.
    pub enabled: bool,
    pub filtered: bool,
}

impl ModuleNode {
    /// Display ordinal: the highest ordinal folded into this node.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinals.last().copied().unwrap_or_default()
    }

    /// `"Resize #4"`, with `" (disabled)"` appended for disabled modules.
    #[must_use]
    pub fn label(&self) -> String {
        let mut label = format!("{} #{}", self.type_name, self.ordinal());
        if !self.enabled {
            label.push_str(" (disabled)");
        }
        label
    }
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum Node {
    Data(DataNode),
    Module(ModuleNode),
}

impl Node {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Data(d) => &d.key,
            Self::Module(m) => &m.stable_id,
        }
    }

    #[must_use]
    pub const fn is_filtered(&self) -> bool {
        match self {
            Self::Data(d) => d.filtered,
            Self::Module(m) => m.filtered,
        }
    }

    const fn set_filtered(&mut self) {
        match self {
            Self::Data(d) => d.filtered = true,
            Self::Module(m) => m.filtered = true,
        }
    }

    #[must_use]
    pub const fn as_data(&self) -> Option<&DataNode> {
        match self {
            Self::Data(d) => Some(d),
            Self::Module(_) => None,
        }
    }

    #[must_use]
    pub const fn as_module(&self) -> Option<&ModuleNode> {
        match self {
            Self::Module(m) => Some(m),
            Self::Data(_) => None,
        }
    }

    /// Display text: data name, or module label.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Data(d) => d.name.clone(),
            Self::Module(m) => m.label(),
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Kind of a data-flow edge.
///
/// Variants are declared in label order so the derived `Ord` agrees with the
/// lexicographic order of [`EdgeKind::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    ListInput,
    Output,
    ScalarInput,
}

impl EdgeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListInput => "list_input",
            Self::Output => "output",
            Self::ScalarInput => "scalar_input",
        }
    }

    /// Edge kind for a module input of reference kind `kind`.
    #[must_use]
    pub const fn for_input(kind: RefKind) -> Self {
        if is_list(kind) {
            Self::ListInput
        } else {
            Self::ScalarInput
        }
    }

    #[must_use]
    pub const fn is_input(self) -> bool {
        !matches!(self, Self::Output)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an edge. Field order gives the canonical edge order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
}

impl EdgeKey {
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} [{}]", self.source, self.target, self.kind)
    }
}

/// Mutable attributes carried by an edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EdgeAttrs {
    /// Ordinals of the module records that contributed this edge.
    pub via_ordinals: BTreeSet<u32>,
    pub filtered: bool,
}

// ---------------------------------------------------------------------------
// PipelineGraph
// ---------------------------------------------------------------------------

/// Directed data-flow multigraph of data nodes and module nodes.
///
/// Edges always join a data node and a module node: inputs run data → module,
/// outputs module → data. Parallel edges are allowed only when their kinds
/// differ.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineGraph {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<EdgeKey, EdgeAttrs>,
    outgoing: BTreeMap<String, BTreeSet<EdgeKey>>,
    incoming: BTreeMap<String, BTreeSet<EdgeKey>>,
}

impl PipelineGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, ordered by key.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn data_nodes(&self) -> impl Iterator<Item = &DataNode> {
        self.nodes.values().filter_map(Node::as_data)
    }

    pub fn module_nodes(&self) -> impl Iterator<Item = &ModuleNode> {
        self.nodes.values().filter_map(Node::as_module)
    }

    /// All edges, ordered by `(source, target, kind)`.
    pub fn edges(&self) -> impl Iterator<Item = (&EdgeKey, &EdgeAttrs)> {
        self.edges.iter()
    }

    #[must_use]
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.get(key)
    }

    #[must_use]
    pub fn data_node(&self, key: &str) -> Option<&DataNode> {
        self.nodes.get(key).and_then(Node::as_data)
    }

    #[must_use]
    pub fn module_node(&self, stable_id: &str) -> Option<&ModuleNode> {
        self.nodes.get(stable_id).and_then(Node::as_module)
    }

    #[must_use]
    pub fn contains_node(&self, key: &str) -> bool {
        self.nodes.contains_key(key)
    }

    #[must_use]
    pub fn edge(&self, key: &EdgeKey) -> Option<&EdgeAttrs> {
        self.edges.get(key)
    }

    #[must_use]
    pub fn contains_edge(&self, key: &EdgeKey) -> bool {
        self.edges.contains_key(key)
    }

    /// Edges leaving `key`, in canonical order.
    pub fn outgoing(&self, key: &str) -> impl Iterator<Item = &EdgeKey> {
        self.outgoing.get(key).into_iter().flatten()
    }

    /// Edges entering `key`, in canonical order.
    pub fn incoming(&self, key: &str) -> impl Iterator<Item = &EdgeKey> {
        self.incoming.get(key).into_iter().flatten()
    }

    /// Every edge touching `key`, deduplicated and in canonical order.
    #[must_use]
    pub fn incident(&self, key: &str) -> BTreeSet<EdgeKey> {
        self.outgoing(key)
            .chain(self.incoming(key))
            .cloned()
            .collect()
    }

    /// Number of elements tagged by highlight-mode filters.
    #[must_use]
    pub fn filtered_counts(&self) -> (usize, usize) {
        let nodes = self.nodes.values().filter(|n| n.is_filtered()).count();
        let edges = self.edges.values().filter(|e| e.filtered).count();
        (nodes, edges)
    }

    // -- live view ----------------------------------------------------------

    /// True if `key` exists and is not tagged.
    #[must_use]
    pub fn is_live_node(&self, key: &str) -> bool {
        self.nodes.get(key).is_some_and(|n| !n.is_filtered())
    }

    /// True if the edge exists, is not tagged, and both endpoints are live.
    #[must_use]
    pub fn is_live_edge(&self, key: &EdgeKey) -> bool {
        self.edges.get(key).is_some_and(|attrs| !attrs.filtered)
            && self.is_live_node(&key.source)
            && self.is_live_node(&key.target)
    }

    pub fn live_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(|n| !n.is_filtered())
    }

    pub fn live_outgoing(&self, key: &str) -> impl Iterator<Item = &EdgeKey> {
        self.outgoing(key).filter(|e| self.is_live_edge(e))
    }

    pub fn live_incoming(&self, key: &str) -> impl Iterator<Item = &EdgeKey> {
        self.incoming(key).filter(|e| self.is_live_edge(e))
    }

    // -- mutation -----------------------------------------------------------

    /// Return the key of the data node for `(kind, name)`, creating it if
    /// absent.
    ///
    /// # Errors
    ///
    /// [`GraphError::KeyConflict`] if a module node already owns the key.
    pub fn ensure_data_node(&mut self, kind: DataKind, name: &str) -> Result<String, GraphError> {
        let key = node_key(kind, name);
        match self.nodes.get(&key) {
            Some(Node::Data(_)) => {}
            Some(Node::Module(_)) => return Err(GraphError::KeyConflict { key }),
            None => {
                self.nodes.insert(
                    key.clone(),
                    Node::Data(DataNode {
                        key: key.clone(),
                        name: name.to_string(),
                        kind,
                        filtered: false,
                    }),
                );
            }
        }
        Ok(key)
    }

    /// Insert a module node, or fold `ordinal` into the existing node with the
    /// same stable id. Returns `true` when an existing node was reused.
    ///
    /// # Errors
    ///
    /// [`GraphError::KeyConflict`] if a data node owns `stable_id`;
    /// [`GraphError::MalformedGraphInvariant`] if the existing module has a
    /// different type.
    pub fn upsert_module(
        &mut self,
        stable_id: &str,
        type_name: &str,
        ordinal: u32,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        match self.nodes.get_mut(stable_id) {
            Some(Node::Module(existing)) => {
                if existing.type_name != type_name {
                    return Err(GraphError::malformed(format!(
                        "module {stable_id} has type {} but record #{ordinal} is {type_name}",
                        existing.type_name
                    )));
                }
                existing.ordinals.insert(ordinal);
                existing.enabled |= enabled;
                Ok(true)
            }
            Some(Node::Data(_)) => Err(GraphError::KeyConflict {
                key: stable_id.to_string(),
            }),
            None => {
                self.nodes.insert(
                    stable_id.to_string(),
                    Node::Module(ModuleNode {
                        stable_id: stable_id.to_string(),
                        type_name: type_name.to_string(),
                        ordinals: BTreeSet::from([ordinal]),
                        enabled,
                        filtered: false,
                    }),
                );
                Ok(false)
            }
        }
    }

    /// Add an edge, or record another contributing ordinal on an existing one.
    ///
    /// # Errors
    ///
    /// [`GraphError::MalformedGraphInvariant`] if either endpoint is missing.
    pub fn add_edge(&mut self, key: EdgeKey, via_ordinal: Option<u32>) -> Result<(), GraphError> {
        for endpoint in [&key.source, &key.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(GraphError::malformed(format!(
                    "edge {key} references missing node {endpoint}"
                )));
            }
        }
        self.outgoing
            .entry(key.source.clone())
            .or_default()
            .insert(key.clone());
        self.incoming
            .entry(key.target.clone())
            .or_default()
            .insert(key.clone());
        let attrs = self.edges.entry(key).or_default();
        if let Some(ordinal) = via_ordinal {
            attrs.via_ordinals.insert(ordinal);
        }
        Ok(())
    }

    /// Remove an edge. Returns `false` if it was not present.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> bool {
        if self.edges.remove(key).is_none() {
            return false;
        }
        if let Some(set) = self.outgoing.get_mut(&key.source) {
            set.remove(key);
            if set.is_empty() {
                self.outgoing.remove(&key.source);
            }
        }
        if let Some(set) = self.incoming.get_mut(&key.target) {
            set.remove(key);
            if set.is_empty() {
                self.incoming.remove(&key.target);
            }
        }
        true
    }

    /// Remove a node and every incident edge. Returns the removed edges.
    pub fn remove_node(&mut self, key: &str) -> BTreeSet<EdgeKey> {
        let incident = self.incident(key);
        for edge in &incident {
            self.remove_edge(edge);
        }
        self.nodes.remove(key);
        incident
    }

    /// Tag a node as filtered. Returns `false` if the node does not exist.
    pub fn mark_node(&mut self, key: &str) -> bool {
        self.nodes.get_mut(key).map(Node::set_filtered).is_some()
    }

    /// Tag an edge as filtered. Returns `false` if the edge does not exist.
    pub fn mark_edge(&mut self, key: &EdgeKey) -> bool {
        self.edges
            .get_mut(key)
            .map(|attrs| attrs.filtered = true)
            .is_some()
    }

    // -- invariants & canonical form -----------------------------------------

    /// Verify internal consistency.
    ///
    /// # Errors
    ///
    /// [`GraphError::MalformedGraphInvariant`] describing the first violation.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        for (key, node) in &self.nodes {
            if node.key() != key {
                return Err(GraphError::malformed(format!(
                    "node stored under {key} reports key {}",
                    node.key()
                )));
            }
            match node {
                Node::Data(d) => {
                    if node_key(d.kind, &d.name) != d.key {
                        return Err(GraphError::malformed(format!(
                            "data node {key} does not match its kind and name"
                        )));
                    }
                }
                Node::Module(m) => {
                    let well_formed = m
                        .stable_id
                        .strip_prefix(m.type_name.as_str())
                        .and_then(|rest| rest.strip_prefix('_'))
                        .is_some_and(|hex| hex.len() == HASH_HEX_LEN);
                    if !well_formed || m.ordinals.is_empty() {
                        return Err(GraphError::malformed(format!(
                            "module node {key} is not a valid stable id for {}",
                            m.type_name
                        )));
                    }
                }
            }
        }

        for key in self.edges.keys() {
            let (Some(source), Some(target)) =
                (self.nodes.get(&key.source), self.nodes.get(&key.target))
            else {
                return Err(GraphError::malformed(format!(
                    "edge {key} references a node not present in the graph"
                )));
            };
            let oriented = match key.kind {
                EdgeKind::Output => {
                    matches!((source, target), (Node::Module(_), Node::Data(_)))
                }
                EdgeKind::ScalarInput | EdgeKind::ListInput => {
                    matches!((source, target), (Node::Data(_), Node::Module(_)))
                }
            };
            if !oriented {
                return Err(GraphError::malformed(format!(
                    "edge {key} does not join a data node and a module node in its direction"
                )));
            }
            let indexed = self.outgoing.get(&key.source).is_some_and(|s| s.contains(key))
                && self.incoming.get(&key.target).is_some_and(|s| s.contains(key));
            if !indexed {
                return Err(GraphError::malformed(format!(
                    "edge {key} missing from adjacency index"
                )));
            }
        }

        let indexed_edges: usize = self.outgoing.values().map(BTreeSet::len).sum();
        let reverse_edges: usize = self.incoming.values().map(BTreeSet::len).sum();
        if indexed_edges != self.edges.len() || reverse_edges != self.edges.len() {
            return Err(GraphError::malformed(format!(
                "adjacency index holds {indexed_edges}/{reverse_edges} edges, graph holds {}",
                self.edges.len()
            )));
        }
        Ok(())
    }

    /// Canonical text listing: one line per node, then one per edge, in
    /// canonical order. Tagged elements carry a ` filtered` suffix.
    #[must_use]
    pub fn canonical_listing(&self) -> String {
        let mut out = String::new();
        for node in self.nodes.values() {
            let kind = match node {
                Node::Data(d) => d.kind.prefix(),
                Node::Module(_) => "module",
            };
            let _ = write!(out, "node {} {kind}", node.key());
            if node.is_filtered() {
                out.push_str(" filtered");
            }
            out.push('\n');
        }
        for (key, attrs) in &self.edges {
            let _ = write!(out, "edge {} {} {}", key.source, key.target, key.kind);
            if attrs.filtered {
                out.push_str(" filtered");
            }
            out.push('\n');
        }
        out
    }

    /// `sha256:<hex>` of [`canonical_listing`](Self::canonical_listing).
    ///
    /// Equal hashes mean structurally identical graphs.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_listing().as_bytes());
        format!("sha256:{:x}", hasher.finalize())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PipelineGraph {
        let mut g = PipelineGraph::new();
        let dna = g.ensure_data_node(DataKind::Image, "DNA").expect("data");
        let small = g.ensure_data_node(DataKind::Image, "SmallDNA").expect("data");
        g.upsert_module("Resize_2d0f531b", "Resize", 2, true)
            .expect("module");
        g.add_edge(
            EdgeKey::new(&dna, "Resize_2d0f531b", EdgeKind::ScalarInput),
            Some(2),
        )
        .expect("edge");
        g.add_edge(
            EdgeKey::new("Resize_2d0f531b", &small, EdgeKind::Output),
            Some(2),
        )
        .expect("edge");
        g
    }

    #[test]
    fn edge_kind_order_matches_labels() {
        let mut kinds = vec![EdgeKind::ScalarInput, EdgeKind::Output, EdgeKind::ListInput];
        kinds.sort();
        let labels: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        let mut sorted = labels.clone();
        sorted.sort_unstable();
        assert_eq!(labels, sorted);
    }

    #[test]
    fn iteration_is_key_ordered_not_insertion_ordered() {
        let mut g = PipelineGraph::new();
        g.ensure_data_node(DataKind::Object, "Zeta").expect("data");
        g.ensure_data_node(DataKind::Image, "Alpha").expect("data");
        g.ensure_data_node(DataKind::Image, "Beta").expect("data");
        let keys: Vec<&str> = g.nodes().map(Node::key).collect();
        assert_eq!(keys, ["image__Alpha", "image__Beta", "object__Zeta"]);
    }

    #[test]
    fn data_nodes_are_created_once() {
        let mut g = PipelineGraph::new();
        let a = g.ensure_data_node(DataKind::Image, "DNA").expect("data");
        let b = g.ensure_data_node(DataKind::Image, "DNA").expect("data");
        assert_eq!(a, b);
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn module_upsert_folds_ordinals() {
        let mut g = sample();
        let merged = g
            .upsert_module("Resize_2d0f531b", "Resize", 9, false)
            .expect("module");
        assert!(merged);
        let m = g.module_node("Resize_2d0f531b").expect("module exists");
        assert_eq!(m.ordinals, BTreeSet::from([2, 9]));
        assert_eq!(m.ordinal(), 9);
        assert!(m.enabled, "one enabled record keeps the node enabled");
        assert_eq!(m.label(), "Resize #9");
    }

    #[test]
    fn module_cannot_take_a_data_key() {
        let mut g = sample();
        let err = g
            .upsert_module("image__DNA", "image_", 1, true)
            .expect_err("conflict");
        assert!(matches!(err, GraphError::KeyConflict { .. }));
    }

    #[test]
    fn edge_to_missing_node_is_malformed() {
        let mut g = sample();
        let err = g
            .add_edge(
                EdgeKey::new("image__Nope", "Resize_2d0f531b", EdgeKind::ScalarInput),
                None,
            )
            .expect_err("missing endpoint");
        assert!(matches!(err, GraphError::MalformedGraphInvariant { .. }));
    }

    #[test]
    fn parallel_edges_of_different_kinds_coexist() {
        let mut g = sample();
        g.add_edge(
            EdgeKey::new("image__DNA", "Resize_2d0f531b", EdgeKind::ListInput),
            Some(2),
        )
        .expect("edge");
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.outgoing("image__DNA").count(), 2);
        g.check_invariants().expect("consistent");
    }

    #[test]
    fn remove_node_takes_incident_edges() {
        let mut g = sample();
        let removed = g.remove_node("Resize_2d0f531b");
        assert_eq!(removed.len(), 2);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node_count(), 2);
        g.check_invariants().expect("consistent");
    }

    #[test]
    fn marked_node_hides_its_edges_from_live_view() {
        let mut g = sample();
        assert!(g.mark_node("image__DNA"));
        assert!(!g.is_live_node("image__DNA"));
        assert_eq!(g.live_incoming("Resize_2d0f531b").count(), 0);
        assert_eq!(g.live_outgoing("Resize_2d0f531b").count(), 1);
        assert_eq!(g.filtered_counts(), (1, 0));
    }

    #[test]
    fn invariant_check_detects_misoriented_edge() {
        let mut g = sample();
        g.add_edge(
            EdgeKey::new("image__DNA", "Resize_2d0f531b", EdgeKind::Output),
            None,
        )
        .expect("endpoints exist");
        assert!(matches!(
            g.check_invariants(),
            Err(GraphError::MalformedGraphInvariant { .. })
        ));
    }

    #[test]
    fn canonical_listing_and_hash_are_stable() {
        let g = sample();
        assert_eq!(
            g.canonical_listing(),
            "node Resize_2d0f531b module\n\
             node image__DNA image\n\
             node image__SmallDNA image\n\
             edge Resize_2d0f531b image__SmallDNA output\n\
             edge image__DNA Resize_2d0f531b scalar_input\n"
        );
        assert_eq!(g.content_hash(), sample().content_hash());
        assert!(g.content_hash().starts_with("sha256:"));
    }
}
