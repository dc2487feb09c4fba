//! Unused-data removal.
//!
//! A live data node of a selected kind is unused when no live edge leaves it,
//! i.e. no module consumes it. Nodes that are only produced, and nodes with
//! no edges at all, both qualify. Module nodes are never selected.
//!
//! One application reaches a fixed point: removing an unused data node only
//! removes edges *into* it, which cannot take the last consumer away from any
//! other data node.

use std::collections::BTreeSet;

use tracing::instrument;

use crate::error::GraphError;
use crate::filter::{GraphFilter, Selection};
use crate::graph::store::PipelineGraph;
use crate::normalize::DataKind;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnusedDataFilter {
    pub kinds: BTreeSet<DataKind>,
}

impl UnusedDataFilter {
    #[must_use]
    pub fn new(kinds: impl IntoIterator<Item = DataKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }
}

impl GraphFilter for UnusedDataFilter {
    fn name(&self) -> &'static str {
        "unused_data"
    }

    #[instrument(skip_all, fields(kinds = ?self.kinds))]
    fn select(&self, graph: &PipelineGraph) -> Result<Selection, GraphError> {
        let nodes = graph
            .data_nodes()
            .filter(|d| !d.filtered && self.kinds.contains(&d.kind))
            .filter(|d| graph.live_outgoing(&d.key).next().is_none())
            .map(|d| d.key.clone())
            .collect();
        Ok(Selection::nodes(nodes))
    }
}
