//! Root reachability pruning.
//!
//! Roots are data node *names* (case-sensitive, no kind prefix): a root named
//! `Cells` matches both `image__Cells` and `object__Cells`. Every live node
//! reachable by following live edges forward from a matched root survives;
//! everything else is selected. An empty root set selects nothing.

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, instrument};

use crate::error::GraphError;
use crate::filter::{GraphFilter, Selection};
use crate::graph::store::PipelineGraph;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReachabilityFilter {
    pub roots: BTreeSet<String>,
}

impl ReachabilityFilter {
    #[must_use]
    pub fn new<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Live data node keys whose display name is one of the roots.
    #[must_use]
    pub fn matched_keys(&self, graph: &PipelineGraph) -> BTreeSet<String> {
        graph
            .data_nodes()
            .filter(|d| !d.filtered && self.roots.contains(&d.name))
            .map(|d| d.key.clone())
            .collect()
    }

    /// Root names that matched no live data node, sorted.
    #[must_use]
    pub fn unmatched_roots(&self, graph: &PipelineGraph) -> Vec<String> {
        let matched: BTreeSet<&str> = graph
            .data_nodes()
            .filter(|d| !d.filtered)
            .map(|d| d.name.as_str())
            .collect();
        self.roots
            .iter()
            .filter(|r| !matched.contains(r.as_str()))
            .cloned()
            .collect()
    }

    /// The error a caller can log for unmatched roots, if there are any.
    #[must_use]
    pub fn unmatched_warning(&self, graph: &PipelineGraph) -> Option<GraphError> {
        let names = self.unmatched_roots(graph);
        (!names.is_empty()).then_some(GraphError::UnknownRootNode { names })
    }

    /// Live nodes reachable from the matched roots, roots included.
    #[must_use]
    pub fn reachable(&self, graph: &PipelineGraph) -> BTreeSet<String> {
        let mut seen = self.matched_keys(graph);
        let mut queue: VecDeque<String> = seen.iter().cloned().collect();
        while let Some(key) = queue.pop_front() {
            for edge in graph.live_outgoing(&key) {
                if seen.insert(edge.target.clone()) {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        seen
    }
}

impl GraphFilter for ReachabilityFilter {
    fn name(&self) -> &'static str {
        "reachability"
    }

    #[instrument(skip_all, fields(roots = self.roots.len()))]
    fn select(&self, graph: &PipelineGraph) -> Result<Selection, GraphError> {
        if self.roots.is_empty() {
            return Ok(Selection::nodes(BTreeSet::new()));
        }
        if let Some(warning) = self.unmatched_warning(graph) {
            debug!(%warning, "some reachability roots matched nothing");
        }
        let reachable = self.reachable(graph);
        let unreachable = graph
            .live_nodes()
            .map(|n| n.key())
            .filter(|k| !reachable.contains(*k))
            .map(str::to_string)
            .collect();
        Ok(Selection::nodes(unreachable))
    }
}
