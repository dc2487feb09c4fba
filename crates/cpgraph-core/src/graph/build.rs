//! Graph construction from module records.
//!
//! # Overview
//!
//! For every qualifying record the builder:
//!
//! 1. skips it if it is disabled and disabled modules are not requested;
//! 2. drops the references the [`DataTypeFilter`] does not admit;
//! 3. normalizes the survivors to data node keys and derives the module's
//!    stable id from its type and the key sets;
//! 4. creates the module node, or folds the record into the existing node
//!    with the same id;
//! 5. adds one input edge per input (scalar or list) and one output edge per
//!    output.
//!
//! Because identity is content-derived and the store is key-ordered, the
//! resulting graph does not depend on record order.
//!
//! ## Error policy
//!
//! [`GraphBuilder::add_record`] validates a record completely before touching
//! the graph, so a rejected record leaves no partial state behind. Whether to
//! keep going after a rejection is the caller's choice: [`build`] stops at the
//! first error, a caller that prefers skip-and-warn drives the builder itself.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::GraphError;
use crate::graph::store::{EdgeKey, EdgeKind, PipelineGraph};
use crate::identity;
use crate::model::{DataRef, ModuleRecord, RefKind};
use crate::normalize::normalize;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which reference kinds are turned into nodes and edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTypeFilter {
    #[default]
    All,
    /// Images and image lists.
    ImagesOnly,
    /// Scalar objects only; object lists are dropped with the other lists.
    ObjectsOnly,
    /// Everything except image and object lists.
    NoLists,
}

impl DataTypeFilter {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ImagesOnly => "images_only",
            Self::ObjectsOnly => "objects_only",
            Self::NoLists => "no_lists",
        }
    }

    /// True if references of `kind` survive this filter.
    #[must_use]
    pub const fn admits(self, kind: RefKind) -> bool {
        match self {
            Self::All => true,
            Self::ImagesOnly => matches!(kind, RefKind::Image | RefKind::ImageList),
            Self::ObjectsOnly => matches!(kind, RefKind::Object),
            Self::NoLists => !kind.is_list(),
        }
    }
}

impl fmt::Display for DataTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all" => Ok(Self::All),
            "images_only" => Ok(Self::ImagesOnly),
            "objects_only" => Ok(Self::ObjectsOnly),
            "no_lists" => Ok(Self::NoLists),
            other => Err(format!(
                "unknown data type filter '{other}' (expected all, images_only, objects_only, no_lists)"
            )),
        }
    }
}

/// Options for [`build`] and [`GraphBuilder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Add disabled modules (flagged `enabled = false`) instead of skipping them.
    pub include_disabled: bool,
    pub data_type_filter: DataTypeFilter,
    /// Keep modules whose I/O is empty after filtering as isolated nodes.
    pub keep_isolated_modules: bool,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// What happened to a record passed to [`GraphBuilder::add_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new module node was created.
    Added { stable_id: String },
    /// The record folded into an existing node with the same stable id.
    Merged { stable_id: String },
    /// Disabled and `include_disabled` is off.
    SkippedDisabled,
    /// No references survived the data-type filter.
    SkippedNoIo,
}

/// Incremental graph builder.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    options: BuildOptions,
    graph: PipelineGraph,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            graph: PipelineGraph::new(),
        }
    }

    #[must_use]
    pub const fn options(&self) -> BuildOptions {
        self.options
    }

    /// Add one record to the graph.
    ///
    /// # Errors
    ///
    /// - [`GraphError::InvalidDataRef`] if a surviving reference has an empty
    ///   name. The graph is left unchanged.
    /// - [`GraphError::KeyConflict`] if the record's stable id clashes with a
    ///   data node key (or a data key with a module id). The graph is left
    ///   unchanged.
    pub fn add_record(&mut self, record: &ModuleRecord) -> Result<RecordOutcome, GraphError> {
        if !record.enabled && !self.options.include_disabled {
            debug!(
                ordinal = record.ordinal,
                module = %record.type_name,
                "skipping disabled module"
            );
            return Ok(RecordOutcome::SkippedDisabled);
        }

        let filter = self.options.data_type_filter;
        let inputs: Vec<&DataRef> = record
            .inputs
            .iter()
            .filter(|r| filter.admits(r.kind))
            .collect();
        let outputs: Vec<&DataRef> = record
            .outputs
            .iter()
            .filter(|r| filter.admits(r.kind))
            .collect();

        if let Some(bad) = inputs.iter().chain(&outputs).find(|r| r.name.trim().is_empty()) {
            return Err(GraphError::InvalidDataRef {
                ordinal: record.ordinal,
                reason: format!("{} reference with an empty name", bad.kind),
            });
        }

        if inputs.is_empty() && outputs.is_empty() && !self.options.keep_isolated_modules {
            debug!(
                ordinal = record.ordinal,
                module = %record.type_name,
                "skipping module with no relevant I/O"
            );
            return Ok(RecordOutcome::SkippedNoIo);
        }

        let input_keys: BTreeSet<String> =
            inputs.iter().map(|r| normalize(r.kind, &r.name)).collect();
        let output_keys: BTreeSet<String> =
            outputs.iter().map(|r| normalize(r.kind, &r.name)).collect();
        let stable_id = identity::derive(
            &record.type_name,
            input_keys.iter().map(String::as_str),
            output_keys.iter().map(String::as_str),
        );

        self.check_conflicts(&stable_id, input_keys.iter().chain(&output_keys))?;

        let merged = self.graph.upsert_module(
            &stable_id,
            &record.type_name,
            record.ordinal,
            record.enabled,
        )?;

        for input in &inputs {
            let key = self.graph.ensure_data_node(input.kind.base(), &input.name)?;
            self.graph.add_edge(
                EdgeKey::new(key, stable_id.as_str(), EdgeKind::for_input(input.kind)),
                Some(record.ordinal),
            )?;
        }
        for output in &outputs {
            let key = self.graph.ensure_data_node(output.kind.base(), &output.name)?;
            self.graph.add_edge(
                EdgeKey::new(stable_id.as_str(), key, EdgeKind::Output),
                Some(record.ordinal),
            )?;
        }

        if merged {
            debug!(ordinal = record.ordinal, %stable_id, "folded into existing module");
            Ok(RecordOutcome::Merged { stable_id })
        } else {
            debug!(ordinal = record.ordinal, %stable_id, "added module");
            Ok(RecordOutcome::Added { stable_id })
        }
    }

    fn check_conflicts<'a>(
        &self,
        stable_id: &str,
        data_keys: impl Iterator<Item = &'a String>,
    ) -> Result<(), GraphError> {
        if self.graph.data_node(stable_id).is_some() {
            return Err(GraphError::KeyConflict {
                key: stable_id.to_string(),
            });
        }
        for key in data_keys {
            if key == stable_id || self.graph.module_node(key).is_some() {
                return Err(GraphError::KeyConflict { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Borrow the graph built so far.
    #[must_use]
    pub const fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    #[must_use]
    pub fn finish(self) -> PipelineGraph {
        self.graph
    }
}

/// Build a graph from `records`, stopping at the first rejected record.
///
/// # Errors
///
/// The first error returned by [`GraphBuilder::add_record`].
#[instrument(skip(records), fields(records = records.len()))]
pub fn build(records: &[ModuleRecord], options: BuildOptions) -> Result<PipelineGraph, GraphError> {
    let mut builder = GraphBuilder::new(options);
    for record in records {
        builder.add_record(record)?;
    }
    let graph = builder.finish();
    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph built"
    );
    Ok(graph)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::DataKind;

    fn resize(ordinal: u32) -> ModuleRecord {
        ModuleRecord::new(ordinal, "Resize")
            .with_input(RefKind::Image, "OrigDNA")
            .with_output(RefKind::Image, "SmallDNA")
    }

    #[test]
    fn position_does_not_change_identity() {
        let a = build(&[resize(1)], BuildOptions::default()).expect("build");
        let b = build(&[resize(20)], BuildOptions::default()).expect("build");
        let ida: Vec<&str> = a.module_nodes().map(|m| m.stable_id.as_str()).collect();
        let idb: Vec<&str> = b.module_nodes().map(|m| m.stable_id.as_str()).collect();
        assert_eq!(ida, ["Resize_2d0f531b"]);
        assert_eq!(ida, idb);
    }

    #[test]
    fn identical_records_merge() {
        let g = build(&[resize(1), resize(5)], BuildOptions::default()).expect("build");
        assert_eq!(g.module_nodes().count(), 1);
        assert_eq!(g.edge_count(), 2);
        let edge = EdgeKey::new("image__OrigDNA", "Resize_2d0f531b", EdgeKind::ScalarInput);
        assert_eq!(
            g.edge(&edge).expect("edge").via_ordinals,
            BTreeSet::from([1, 5])
        );
    }

    #[test]
    fn list_and_scalar_inputs_share_node_but_not_edge() {
        let rec = ModuleRecord::new(1, "Measure")
            .with_input(RefKind::Image, "DNA")
            .with_input(RefKind::ImageList, "DNA");
        let g = build(&[rec], BuildOptions::default()).expect("build");
        assert_eq!(g.data_nodes().count(), 1);
        let kinds: Vec<EdgeKind> = g.edges().map(|(k, _)| k.kind).collect();
        assert_eq!(kinds, [EdgeKind::ListInput, EdgeKind::ScalarInput]);
    }

    #[test]
    fn disabled_modules_follow_option() {
        let rec = resize(3).with_enabled(false);

        let skipped = build(&[rec.clone()], BuildOptions::default()).expect("build");
        assert!(skipped.is_empty());

        let opts = BuildOptions {
            include_disabled: true,
            ..BuildOptions::default()
        };
        let kept = build(&[rec], opts).expect("build");
        let module = kept.module_nodes().next().expect("module kept");
        assert!(!module.enabled);
        assert_eq!(module.label(), "Resize #3 (disabled)");
    }

    #[test]
    fn data_type_filter_changes_identity() {
        let rec = ModuleRecord::new(1, "IdentifyPrimaryObjects")
            .with_input(RefKind::Image, "DNA")
            .with_output(RefKind::Object, "Nuclei");

        let all = build(&[rec.clone()], BuildOptions::default()).expect("build");
        let images = build(
            &[rec],
            BuildOptions {
                data_type_filter: DataTypeFilter::ImagesOnly,
                ..BuildOptions::default()
            },
        )
        .expect("build");

        assert!(images.data_node("object__Nuclei").is_none());
        let id_all = &all.module_nodes().next().expect("module").stable_id;
        let id_img = &images.module_nodes().next().expect("module").stable_id;
        assert_ne!(id_all, id_img);
    }

    #[test]
    fn filter_admission_table() {
        use DataTypeFilter::{All, ImagesOnly, NoLists, ObjectsOnly};
        let admitted = |f: DataTypeFilter| -> Vec<RefKind> {
            RefKind::ALL.into_iter().filter(|k| f.admits(*k)).collect()
        };
        assert_eq!(admitted(All).len(), 5);
        assert_eq!(admitted(ImagesOnly), [RefKind::Image, RefKind::ImageList]);
        assert_eq!(admitted(ObjectsOnly), [RefKind::Object]);
        assert_eq!(
            admitted(NoLists),
            [RefKind::Image, RefKind::Object, RefKind::Measurement]
        );
    }

    #[test]
    fn filter_parses_cli_spellings() {
        assert_eq!("images-only".parse::<DataTypeFilter>(), Ok(DataTypeFilter::ImagesOnly));
        assert_eq!("NO_LISTS".parse::<DataTypeFilter>(), Ok(DataTypeFilter::NoLists));
        assert!("pixels".parse::<DataTypeFilter>().is_err());
    }

    #[test]
    fn modules_without_io_are_skipped_unless_requested() {
        let rec = ModuleRecord::new(4, "ExportToSpreadsheet");
        let mut builder = GraphBuilder::new(BuildOptions::default());
        assert_eq!(
            builder.add_record(&rec).expect("ok"),
            RecordOutcome::SkippedNoIo
        );

        let mut keep = GraphBuilder::new(BuildOptions {
            keep_isolated_modules: true,
            ..BuildOptions::default()
        });
        assert!(matches!(
            keep.add_record(&rec).expect("ok"),
            RecordOutcome::Added { .. }
        ));
        assert_eq!(keep.graph().node_count(), 1);
    }

    #[test]
    fn empty_name_rejects_record_without_partial_state() {
        let bad = ModuleRecord::new(2, "Threshold")
            .with_input(RefKind::Image, "DNA")
            .with_output(RefKind::Image, " ");
        let mut builder = GraphBuilder::new(BuildOptions::default());
        let err = builder.add_record(&bad).expect_err("rejected");
        assert!(matches!(err, GraphError::InvalidDataRef { ordinal: 2, .. }));
        assert!(builder.graph().is_empty());

        // skip-and-continue is possible at the caller
        builder.add_record(&resize(3)).expect("next record ok");
        assert_eq!(builder.graph().module_nodes().count(), 1);
    }

    #[test]
    fn measurements_become_their_own_kind() {
        let rec = ModuleRecord::new(7, "MeasureObjectSizeShape")
            .with_input(RefKind::Object, "Nuclei")
            .with_output(RefKind::Measurement, "AreaShape_Area");
        let g = build(&[rec], BuildOptions::default()).expect("build");
        let node = g
            .data_node("measurement__AreaShape_Area")
            .expect("measurement node");
        assert_eq!(node.kind, DataKind::Measurement);
        assert_eq!(node.name, "AreaShape_Area");
    }

    #[test]
    fn built_graph_satisfies_invariants() {
        let records = [
            ModuleRecord::new(1, "Load").with_output(RefKind::Image, "DNA"),
            resize(2),
            ModuleRecord::new(3, "Save").with_input(RefKind::Image, "SmallDNA"),
        ];
        let g = build(&records, BuildOptions::default()).expect("build");
        g.check_invariants().expect("invariants hold");
    }
}
