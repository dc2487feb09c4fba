//! Data-flow graph module.
//!
//! # Overview
//!
//! Module records are turned into a [`PipelineGraph`]: data nodes keyed
//! `kind__name`, module nodes keyed by a content-derived stable id, and typed
//! edges between them. The graph owns its canonical order (nodes by key,
//! edges by `(source, target, kind)`), so serializers can walk it directly and
//! produce identical output for structurally identical pipelines.
//!
//! ## Pipeline
//!
//! ```text
//! [ModuleRecord]
//!        ↓  build::build() / build::GraphBuilder
//! PipelineGraph
//!        ↓  crate::filter::FilterPlan::run()   (zero or more passes)
//! PipelineGraph (filtered or highlighted)
//!        ↓  explain::explain_ids(), stats::GraphSummary::from_graph()
//! diagnostics
//! ```
//!
//! ## Typical Usage
//!
//! ```rust
//! use cpgraph_core::graph::{BuildOptions, build, explain_ids};
//! use cpgraph_core::model::{ModuleRecord, RefKind};
//!
//! let records = vec![
//!     ModuleRecord::new(1, "Load").with_output(RefKind::Image, "DNA"),
//!     ModuleRecord::new(2, "Resize")
//!         .with_input(RefKind::Image, "DNA")
//!         .with_output(RefKind::Image, "SmallDNA"),
//! ];
//! let graph = build(&records, BuildOptions::default())?;
//! assert_eq!(graph.data_nodes().count(), 2);
//! assert_eq!(explain_ids(&graph).len(), 2);
//! # Ok::<(), cpgraph_core::GraphError>(())
//! ```

pub mod build;
pub mod explain;
pub mod stats;
pub mod store;

pub use build::{BuildOptions, DataTypeFilter, GraphBuilder, RecordOutcome, build};
pub use explain::{Connection, Flow, connections, explain_ids};
pub use stats::{GraphSummary, sink_data_keys, source_data_keys, to_petgraph};
pub use store::{DataNode, EdgeAttrs, EdgeKey, EdgeKind, ModuleNode, Node, PipelineGraph};
