//! The filter pipeline.
//!
//! Passes always run in the same order regardless of how they were requested:
//!
//! 1. module-type exclusion
//! 2. root reachability
//! 3. duplicate-parent resolution
//! 4. unused-data removal
//!
//! Exclusion runs first so excluded modules cannot keep data reachable or
//! used; unused-data runs last so it sees the edges every earlier pass left.
//! A pass whose parameters are empty is skipped and does not appear in the
//! report.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{info, instrument};

use crate::error::GraphError;
use crate::filter::{
    Affected, DuplicateParentFilter, FilterMode, GraphFilter, ModuleTypeFilter, ReachabilityFilter,
    UnusedDataFilter,
};
use crate::graph::store::PipelineGraph;
use crate::normalize::DataKind;

/// Which passes to run and with what parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPlan {
    pub excluded_types: BTreeSet<String>,
    pub roots: BTreeSet<String>,
    /// Resolve data names produced by several modules. On by default.
    pub single_parent: bool,
    pub unused_kinds: BTreeSet<DataKind>,
}

impl Default for FilterPlan {
    fn default() -> Self {
        Self {
            excluded_types: BTreeSet::new(),
            roots: BTreeSet::new(),
            single_parent: true,
            unused_kinds: BTreeSet::new(),
        }
    }
}

/// What one pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub name: &'static str,
    pub affected_count: usize,
    pub affected: Affected,
}

/// Result of running a whole [`FilterPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanOutcome {
    pub graph: PipelineGraph,
    pub mode: FilterMode,
    pub passes: Vec<PassReport>,
    /// Roots that matched no live data node when reachability ran.
    pub unmatched_roots: Vec<String>,
}

impl PlanOutcome {
    #[must_use]
    pub fn pass(&self, name: &str) -> Option<&PassReport> {
        self.passes.iter().find(|p| p.name == name)
    }
}

impl FilterPlan {
    #[must_use]
    pub fn with_excluded_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_types.extend(types.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_single_parent(mut self, on: bool) -> Self {
        self.single_parent = on;
        self
    }

    #[must_use]
    pub fn with_unused_kinds(mut self, kinds: impl IntoIterator<Item = DataKind>) -> Self {
        self.unused_kinds.extend(kinds);
        self
    }

    /// True when no pass would run.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.excluded_types.is_empty()
            && self.roots.is_empty()
            && !self.single_parent
            && self.unused_kinds.is_empty()
    }

    /// Run every requested pass in order and return the final graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::MalformedGraphInvariant`] if `graph`, or any
    /// intermediate graph, is inconsistent. Unknown roots are not an error;
    /// they are returned in [`PlanOutcome::unmatched_roots`].
    #[instrument(skip_all, fields(%mode))]
    pub fn run(&self, graph: &PipelineGraph, mode: FilterMode) -> Result<PlanOutcome, GraphError> {
        let mut current = graph.clone();
        current.check_invariants()?;
        let mut passes = Vec::new();
        let mut unmatched_roots = Vec::new();

        let mut step = |filter: &dyn GraphFilter, current: &mut PipelineGraph| -> Result<(), GraphError> {
            let out = filter.apply(current, mode)?;
            info!(
                pass = filter.name(),
                affected = out.affected_count,
                "filter pass"
            );
            passes.push(PassReport {
                name: filter.name(),
                affected_count: out.affected_count,
                affected: out.affected,
            });
            *current = out.graph;
            Ok(())
        };

        if !self.excluded_types.is_empty() {
            step(&ModuleTypeFilter::new(self.excluded_types.iter().cloned()), &mut current)?;
        }
        if !self.roots.is_empty() {
            let filter = ReachabilityFilter::new(self.roots.iter().cloned());
            unmatched_roots = filter.unmatched_roots(&current);
            step(&filter, &mut current)?;
        }
        if self.single_parent {
            step(&DuplicateParentFilter, &mut current)?;
        }
        if !self.unused_kinds.is_empty() {
            step(&UnusedDataFilter::new(self.unused_kinds.iter().copied()), &mut current)?;
        }

        Ok(PlanOutcome {
            graph: current,
            mode,
            passes,
            unmatched_roots,
        })
    }
}
