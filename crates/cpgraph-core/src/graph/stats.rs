//! Summary statistics for a pipeline graph.
//!
//! Counts come straight from the owned store. Connectivity questions
//! (weak components, cycles) are answered on a `petgraph` view built by
//! [`to_petgraph`]; the view is throwaway and never fed back into the store,
//! so its index order has no bearing on canonical output.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::{connected_components, is_cyclic_directed};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

use crate::graph::store::{EdgeKind, PipelineGraph};
use crate::normalize::DataKind;

/// Summary of a [`PipelineGraph`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSummary {
    pub node_count: usize,
    pub edge_count: usize,
    pub module_count: usize,
    pub enabled_module_count: usize,
    pub disabled_module_count: usize,
    /// Data node count per kind. Kinds with no nodes are omitted.
    pub data_counts: BTreeMap<DataKind, usize>,
    /// Nodes tagged by highlight-mode filters.
    pub filtered_node_count: usize,
    /// Edges tagged by highlight-mode filters.
    pub filtered_edge_count: usize,
    /// Weakly connected components over the whole graph.
    pub component_count: usize,
    /// True if no module feeds (transitively) into its own inputs.
    pub acyclic: bool,
    pub content_hash: String,
}

impl GraphSummary {
    #[must_use]
    pub fn from_graph(graph: &PipelineGraph) -> Self {
        let mut data_counts = BTreeMap::new();
        for data in graph.data_nodes() {
            *data_counts.entry(data.kind).or_insert(0) += 1;
        }
        let module_count = graph.module_nodes().count();
        let enabled_module_count = graph.module_nodes().filter(|m| m.enabled).count();
        let (filtered_node_count, filtered_edge_count) = graph.filtered_counts();

        let view = to_petgraph(graph);

        Self {
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            module_count,
            enabled_module_count,
            disabled_module_count: module_count - enabled_module_count,
            data_counts,
            filtered_node_count,
            filtered_edge_count,
            component_count: connected_components(&view),
            acyclic: !is_cyclic_directed(&view),
            content_hash: graph.content_hash(),
        }
    }
}

/// Copy `graph` into a `petgraph` directed graph.
///
/// Node weights are node keys and edge weights are edge kinds. Nodes are
/// added in canonical order, so index `i` is the `i`-th key. Tagged elements
/// are included.
#[must_use]
pub fn to_petgraph(graph: &PipelineGraph) -> DiGraph<String, EdgeKind> {
    let mut view = DiGraph::with_capacity(graph.node_count(), graph.edge_count());
    let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(graph.node_count());
    for node in graph.nodes() {
        index.insert(node.key(), view.add_node(node.key().to_string()));
    }
    for (key, _) in graph.edges() {
        if let (Some(&a), Some(&b)) = (index.get(key.source.as_str()), index.get(key.target.as_str()))
        {
            view.add_edge(a, b, key.kind);
        }
    }
    view
}

/// Data nodes nothing produces (pipeline inputs), in canonical order.
///
/// With `live_only`, tagged nodes are skipped and tagged edges do not count,
/// so a node whose only producer was filtered becomes a source.
#[must_use]
pub fn source_data_keys(graph: &PipelineGraph, live_only: bool) -> Vec<&str> {
    graph
        .data_nodes()
        .filter(|d| !(live_only && d.filtered))
        .map(|d| d.key.as_str())
        .filter(|k| {
            if live_only {
                graph.live_incoming(k).next().is_none()
            } else {
                graph.incoming(k).next().is_none()
            }
        })
        .collect()
}

/// Data nodes nothing consumes (pipeline results), in canonical order.
#[must_use]
pub fn sink_data_keys(graph: &PipelineGraph, live_only: bool) -> Vec<&str> {
    graph
        .data_nodes()
        .filter(|d| !(live_only && d.filtered))
        .map(|d| d.key.as_str())
        .filter(|k| {
            if live_only {
                graph.live_outgoing(k).next().is_none()
            } else {
                graph.outgoing(k).next().is_none()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build::{BuildOptions, build};
    use crate::graph::store::Node;
    use crate::model::{ModuleRecord, RefKind};

    fn two_chains() -> PipelineGraph {
        let records = [
            ModuleRecord::new(1, "Load").with_output(RefKind::Image, "DNA"),
            ModuleRecord::new(2, "Resize")
                .with_input(RefKind::Image, "DNA")
                .with_output(RefKind::Image, "SmallDNA"),
            ModuleRecord::new(3, "Identify")
                .with_input(RefKind::Image, "Actin")
                .with_output(RefKind::Object, "Cells")
                .with_enabled(false),
        ];
        build(
            &records,
            BuildOptions {
                include_disabled: true,
                ..BuildOptions::default()
            },
        )
        .expect("build")
    }

    #[test]
    fn counts_by_type() {
        let s = GraphSummary::from_graph(&two_chains());
        assert_eq!(s.module_count, 3);
        assert_eq!(s.enabled_module_count, 2);
        assert_eq!(s.disabled_module_count, 1);
        assert_eq!(s.data_counts.get(&DataKind::Image), Some(&3));
        assert_eq!(s.data_counts.get(&DataKind::Object), Some(&1));
        assert_eq!(s.data_counts.get(&DataKind::Measurement), None);
        assert_eq!(s.edge_count, 5);
    }

    #[test]
    fn connectivity_through_petgraph_view() {
        let s = GraphSummary::from_graph(&two_chains());
        assert_eq!(s.component_count, 2);
        assert!(s.acyclic);
    }

    #[test]
    fn in_place_update_is_a_cycle() {
        let rec = ModuleRecord::new(1, "CorrectIllumination")
            .with_input(RefKind::Image, "DNA")
            .with_output(RefKind::Image, "DNA");
        let g = build(&[rec], BuildOptions::default()).expect("build");
        assert!(!GraphSummary::from_graph(&g).acyclic);
    }

    #[test]
    fn petgraph_view_preserves_canonical_node_order() {
        let g = two_chains();
        let view = to_petgraph(&g);
        let weights: Vec<&str> = view.node_weights().map(String::as_str).collect();
        let keys: Vec<&str> = g.nodes().map(Node::key).collect();
        assert_eq!(weights, keys);
        assert_eq!(view.edge_count(), g.edge_count());
    }

    #[test]
    fn sources_are_unproduced_data() {
        let g = two_chains();
        assert_eq!(source_data_keys(&g, false), ["image__Actin"]);
        assert_eq!(sink_data_keys(&g, false), ["image__SmallDNA", "object__Cells"]);
    }

    #[test]
    fn live_sources_ignore_tagged_producers() {
        let mut g = two_chains();
        let load_edge = g
            .edges()
            .find(|(k, _)| k.target == "image__DNA")
            .map(|(k, _)| k.clone())
            .expect("load output");
        g.mark_edge(&load_edge);
        g.mark_node("image__Actin");
        assert_eq!(source_data_keys(&g, true), ["image__DNA"]);
        assert_eq!(source_data_keys(&g, false), ["image__Actin"]);
    }
}
