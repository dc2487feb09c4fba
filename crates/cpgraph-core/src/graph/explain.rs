//! Human-facing diagnostics: stable id provenance and a connections listing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::store::{Node, PipelineGraph};
use crate::normalize::DataKind;

/// For every module node, the original ordinals that folded into it.
///
/// Ordinals are ascending; ids are in canonical order. A list with more than
/// one entry marks an identity collision (intended or not).
#[must_use]
pub fn explain_ids(graph: &PipelineGraph) -> BTreeMap<String, Vec<u32>> {
    graph
        .module_nodes()
        .map(|m| (m.stable_id.clone(), m.ordinals.iter().copied().collect()))
        .collect()
}

/// Direction of a [`Connection`] relative to its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Input,
    Output,
}

/// One edge, described for people.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub flow: Flow,
    pub data_name: String,
    pub data_kind: DataKind,
    pub list: bool,
    pub module_label: String,
    pub filtered: bool,
}

impl Connection {
    /// `DNA (image) → [Resize #2]` or `[Resize #2] → SmallDNA (image)`.
    #[must_use]
    pub fn describe(&self) -> String {
        let kind = if self.list {
            format!("{} list", self.data_kind)
        } else {
            self.data_kind.to_string()
        };
        match self.flow {
            Flow::Input => format!("{} ({kind}) → [{}]", self.data_name, self.module_label),
            Flow::Output => format!("[{}] → {} ({kind})", self.module_label, self.data_name),
        }
    }
}

/// Every edge of `graph` as a [`Connection`], in canonical edge order.
#[must_use]
pub fn connections(graph: &PipelineGraph) -> Vec<Connection> {
    graph
        .edges()
        .filter_map(|(key, attrs)| {
            let source = graph.node(&key.source)?;
            let target = graph.node(&key.target)?;
            let (flow, data, module) = match (source, target) {
                (Node::Data(d), Node::Module(m)) => (Flow::Input, d, m),
                (Node::Module(m), Node::Data(d)) => (Flow::Output, d, m),
                _ => return None,
            };
            Some(Connection {
                flow,
                data_name: data.name.clone(),
                data_kind: data.kind,
                list: key.kind == crate::graph::store::EdgeKind::ListInput,
                module_label: module.label(),
                filtered: attrs.filtered,
            })
        })
        .collect()
}
