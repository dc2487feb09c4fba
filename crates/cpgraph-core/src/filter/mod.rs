//! Graph-rewriting filter passes.
//!
//! # Contract
//!
//! Every pass takes a graph and returns a fresh graph plus what it affected
//! ([`FilterOutcome`]); the input is never modified. A pass first *selects*
//! the nodes and edges it targets by looking only at the live view of the
//! graph (see [`crate::graph::store`]), then the shared [`apply_selection`]
//! either deletes them ([`FilterMode::Delete`]) or tags them `filtered = true`
//! ([`FilterMode::Highlight`]). Edges incident to a selected node are part of
//! the affected set in both modes, so the affected set never depends on the
//! mode; only the retained elements do.
//!
//! Passes never fail because nothing matched; they fail only when the input
//! graph breaks its own invariants.
//!
//! # Passes
//!
//! | pass | selects | counts |
//! |------|---------|--------|
//! | [`exclude::ModuleTypeFilter`] | modules of the listed types | nodes |
//! | [`reachability::ReachabilityFilter`] | nodes not reachable from the roots | nodes |
//! | [`duplicate_parent::DuplicateParentFilter`] | all but the last producer edge | edges |
//! | [`unused::UnusedDataFilter`] | data nodes nobody consumes | nodes |
//!
//! [`plan::FilterPlan`] runs the requested passes in that order.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info_span};

use crate::error::GraphError;
use crate::graph::store::{EdgeKey, PipelineGraph};

pub mod duplicate_parent;
pub mod exclude;
pub mod plan;
pub mod reachability;
pub mod unused;

pub use duplicate_parent::DuplicateParentFilter;
pub use exclude::ModuleTypeFilter;
pub use plan::{FilterPlan, PassReport, PlanOutcome};
pub use reachability::ReachabilityFilter;
pub use unused::UnusedDataFilter;

/// Delete matched elements, or keep and tag them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Delete,
    Highlight,
}

impl FilterMode {
    #[must_use]
    pub const fn from_highlight(highlight: bool) -> Self {
        if highlight { Self::Highlight } else { Self::Delete }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Delete => "delete",
            Self::Highlight => "highlight",
        })
    }
}

/// Which element count a pass reports as its `affected_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountUnit {
    Nodes,
    Edges,
}

/// The elements a pass targets, before the mode is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub nodes: BTreeSet<String>,
    pub edges: BTreeSet<EdgeKey>,
    pub unit: CountUnit,
}

impl Selection {
    #[must_use]
    pub const fn nodes(nodes: BTreeSet<String>) -> Self {
        Self {
            nodes,
            edges: BTreeSet::new(),
            unit: CountUnit::Nodes,
        }
    }

    #[must_use]
    pub const fn edges(edges: BTreeSet<EdgeKey>) -> Self {
        Self {
            nodes: BTreeSet::new(),
            edges,
            unit: CountUnit::Edges,
        }
    }
}

/// Everything a pass removed or tagged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Affected {
    pub nodes: BTreeSet<String>,
    /// Selected edges plus the live edges incident to selected nodes.
    pub edges: BTreeSet<EdgeKey>,
}

impl Affected {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Result of running one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub graph: PipelineGraph,
    pub affected: Affected,
    /// Nodes or edges removed (delete mode) or tagged (highlight mode),
    /// per the pass's [`CountUnit`].
    pub affected_count: usize,
}

/// A graph-rewriting pass.
pub trait GraphFilter {
    /// Short stable name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Choose the elements to affect, looking only at the live view.
    ///
    /// # Errors
    ///
    /// Only on malformed graph state.
    fn select(&self, graph: &PipelineGraph) -> Result<Selection, GraphError>;

    /// Run the pass and return a fresh graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::MalformedGraphInvariant`] if `graph` is inconsistent.
    fn apply(&self, graph: &PipelineGraph, mode: FilterMode) -> Result<FilterOutcome, GraphError> {
        let _span = info_span!("filter", pass = self.name(), %mode).entered();
        graph.check_invariants()?;
        let selection = self.select(graph)?;
        let outcome = apply_selection(graph, selection, mode);
        debug!(
            pass = self.name(),
            affected = outcome.affected_count,
            "pass complete"
        );
        Ok(outcome)
    }
}

/// Apply a selection to a copy of `graph` in the given mode.
#[must_use]
pub fn apply_selection(graph: &PipelineGraph, selection: Selection, mode: FilterMode) -> FilterOutcome {
    let Selection { nodes, edges, unit } = selection;

    let mut affected = Affected {
        nodes: nodes
            .into_iter()
            .filter(|k| graph.is_live_node(k))
            .collect(),
        edges: edges.into_iter().filter(|e| graph.is_live_edge(e)).collect(),
    };
    for key in &affected.nodes {
        affected
            .edges
            .extend(graph.incident(key).into_iter().filter(|e| graph.is_live_edge(e)));
    }

    let mut next = graph.clone();
    match mode {
        FilterMode::Delete => {
            for edge in &affected.edges {
                next.remove_edge(edge);
            }
            for key in &affected.nodes {
                next.remove_node(key);
            }
        }
        FilterMode::Highlight => {
            for edge in &affected.edges {
                next.mark_edge(edge);
            }
            for key in &affected.nodes {
                next.mark_node(key);
            }
        }
    }

    let affected_count = match unit {
        CountUnit::Nodes => affected.nodes.len(),
        CountUnit::Edges => affected.edges.len(),
    };
    FilterOutcome {
        graph: next,
        affected,
        affected_count,
    }
}
