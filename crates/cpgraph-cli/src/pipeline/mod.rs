//! Pipeline-file adapters.
//!
//! Each dialect decodes a JSON document into [`ModuleRecord`]s. Records that
//! cannot be decoded are returned as [`Rejected`] alongside the good ones so
//! the caller can choose between skip-and-warn and `--strict`.

pub mod cellprofiler;
pub mod depgraph;

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use cpgraph_core::{GraphError, ModuleRecord};
use tracing::{debug, instrument};

/// Which JSON shape the input file uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Dialect {
    /// A pipeline export: modules with typed settings.
    #[default]
    Pipeline,
    /// A dependency-graph export: modules with explicit input/output arrays.
    DependencyGraph,
}

/// A module that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub ordinal: u32,
    pub module_name: String,
    pub error: GraphError,
}

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}: {}", self.module_name, self.ordinal, self.error)
    }
}

/// Output of a dialect adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPipeline {
    pub records: Vec<ModuleRecord>,
    pub rejected: Vec<Rejected>,
}

impl FromIterator<Result<ModuleRecord, Rejected>> for LoadedPipeline {
    fn from_iter<I: IntoIterator<Item = Result<ModuleRecord, Rejected>>>(iter: I) -> Self {
        let mut loaded = Self::default();
        for item in iter {
            match item {
                Ok(record) => loaded.records.push(record),
                Err(rejected) => loaded.rejected.push(rejected),
            }
        }
        loaded
    }
}

/// Read and decode a pipeline file.
#[instrument(skip_all, fields(path = %path.display(), ?dialect))]
pub fn load(path: &Path, dialect: Dialect) -> Result<LoadedPipeline> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read pipeline file {}", path.display()))?;
    let loaded = parse(&text, dialect)
        .with_context(|| format!("failed to parse pipeline file {}", path.display()))?;
    debug!(
        records = loaded.records.len(),
        rejected = loaded.rejected.len(),
        "pipeline decoded"
    );
    Ok(loaded)
}

/// Decode pipeline JSON already in memory.
pub fn parse(text: &str, dialect: Dialect) -> Result<LoadedPipeline> {
    match dialect {
        Dialect::Pipeline => {
            let doc: cellprofiler::PipelineDoc = serde_json::from_str(text)?;
            Ok(doc.into_records().into_iter().map(Ok).collect())
        }
        Dialect::DependencyGraph => {
            let doc: depgraph::DepGraphDoc = serde_json::from_str(text)?;
            Ok(doc.into_records())
        }
    }
}
