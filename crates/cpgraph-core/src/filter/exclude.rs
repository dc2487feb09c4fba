//! Module-type exclusion.

use std::collections::BTreeSet;

use tracing::instrument;

use crate::error::GraphError;
use crate::filter::{GraphFilter, Selection};
use crate::graph::store::PipelineGraph;

/// Removes (or tags) module nodes whose type is in `excluded_types`, along
/// with their incident edges. Type names match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTypeFilter {
    pub excluded_types: BTreeSet<String>,
}

impl ModuleTypeFilter {
    #[must_use]
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_types: types.into_iter().map(Into::into).collect(),
        }
    }
}

impl GraphFilter for ModuleTypeFilter {
    fn name(&self) -> &'static str {
        "exclude_module_types"
    }

    #[instrument(skip_all, fields(types = self.excluded_types.len()))]
    fn select(&self, graph: &PipelineGraph) -> Result<Selection, GraphError> {
        let nodes = graph
            .module_nodes()
            .filter(|m| !m.filtered && self.excluded_types.contains(&m.type_name))
            .map(|m| m.stable_id.clone())
            .collect();
        Ok(Selection::nodes(nodes))
    }
}
