//! Duplicate-parent resolution ("last producer wins").
//!
//! A data name produced by more than one module is treated as redefined: only
//! the output edge from the producer with the highest ordinal is kept and the
//! other producer edges are selected. Records folded into one module node
//! share a single output edge, so they never conflict with each other.

use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::error::GraphError;
use crate::filter::{GraphFilter, Selection};
use crate::graph::store::{EdgeKey, EdgeKind, PipelineGraph};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateParentFilter;

impl GraphFilter for DuplicateParentFilter {
    fn name(&self) -> &'static str {
        "duplicate_parent"
    }

    #[instrument(skip_all)]
    fn select(&self, graph: &PipelineGraph) -> Result<Selection, GraphError> {
        let mut losers = BTreeSet::new();
        for data in graph.data_nodes().filter(|d| !d.filtered) {
            let mut producers: Vec<(u32, &EdgeKey)> = Vec::new();
            for edge in graph.live_incoming(&data.key) {
                if edge.kind != EdgeKind::Output {
                    continue;
                }
                let module = graph.module_node(&edge.source).ok_or_else(|| {
                    GraphError::malformed(format!(
                        "output edge {edge} does not start at a module node"
                    ))
                })?;
                producers.push((module.ordinal(), edge));
            }
            if producers.len() < 2 {
                continue;
            }
            // Ties on ordinal fall back to edge order so the result is stable.
            producers.sort();
            if let Some((winner, _)) = producers.pop() {
                debug!(data = %data.key, winner, dropped = producers.len(), "resolved duplicate producers");
            }
            losers.extend(producers.into_iter().map(|(_, e)| e.clone()));
        }
        Ok(Selection::edges(losers))
    }
}
