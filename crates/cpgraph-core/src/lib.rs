#![forbid(unsafe_code)]
//! cpgraph-core library.
//!
//! Turns pipeline module records into a canonical data-flow graph and rewrites
//! that graph with filter passes. Parsing pipeline files and writing graph
//! formats live in the `cpgraph` binary; this crate only sees
//! [`model::ModuleRecord`]s and hands back [`graph::PipelineGraph`]s.
//!
//! # Conventions
//!
//! - **Errors**: Return [`GraphError`]; every variant carries an [`ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Ordering**: Use `BTreeMap`/`BTreeSet` anywhere iteration order can leak
//!   into output.

pub mod error;
pub mod filter;
pub mod graph;
pub mod identity;
pub mod model;
pub mod normalize;

pub use error::{ErrorCode, GraphError};
pub use filter::{FilterMode, FilterPlan, GraphFilter, PlanOutcome};
pub use graph::{BuildOptions, DataTypeFilter, PipelineGraph, build};
pub use model::{DataRef, ModuleRecord, RefKind};
pub use normalize::DataKind;
