//! Run summary output for pretty/text/JSON modes.
//!
//! # Output mode resolution
//!
//! Precedence (highest wins):
//! 1. `--format`
//! 2. `[defaults] format` in the config file
//! 3. `FORMAT` env var → `"pretty"` | `"text"` | `"json"`
//! 4. Default: [`OutputMode::Pretty`] if stdout is a TTY; [`OutputMode::Text`] if piped.

use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use cpgraph_core::filter::{FilterMode, PassReport};
use cpgraph_core::graph::{Connection, GraphSummary, PipelineGraph, connections, explain_ids};
use serde::{Deserialize, Serialize};

use crate::pipeline::Rejected;

const RULE_WIDTH: usize = 72;

/// Heading over a dashed rule.
fn pretty_section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    writeln!(w, "{:-<RULE_WIDTH$}", "")
}

fn pretty_kv(w: &mut dyn Write, key: &str, value: impl AsRef<str>) -> io::Result<()> {
    writeln!(w, "{:<12} {}", format!("{key}:"), value.as_ref())
}

/// The three output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Human-optimized output with sections.
    Pretty,
    /// Plain lines for pipes and diffs.
    Text,
    /// Machine-readable JSON.
    Json,
}

fn resolve_output_mode_inner(
    format_flag: Option<OutputMode>,
    config_default: Option<OutputMode>,
    format_env: Option<&str>,
    is_tty: bool,
) -> OutputMode {
    if let Some(mode) = format_flag.or(config_default) {
        return mode;
    }

    if let Some(val) = format_env {
        match val.to_lowercase().as_str() {
            "json" => return OutputMode::Json,
            "text" => return OutputMode::Text,
            "pretty" => return OutputMode::Pretty,
            _ => {} // unknown value, fall through to TTY detection
        }
    }

    if is_tty {
        OutputMode::Pretty
    } else {
        OutputMode::Text
    }
}

/// Resolve the output mode from flags, config, environment, and TTY defaults.
pub fn resolve_output_mode(
    format_flag: Option<OutputMode>,
    config_default: Option<OutputMode>,
) -> OutputMode {
    let env_val = std::env::var("FORMAT").ok();
    let is_tty = io::stdout().is_terminal();
    resolve_output_mode_inner(format_flag, config_default, env_val.as_deref(), is_tty)
}

/// One stable id and the records folded into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StableIdEntry {
    pub stable_id: String,
    pub label: String,
    pub ordinals: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedModule {
    pub ordinal: u32,
    pub module_name: String,
    pub error_code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl From<&Rejected> for SkippedModule {
    fn from(r: &Rejected) -> Self {
        Self {
            ordinal: r.ordinal,
            module_name: r.module_name.clone(),
            error_code: r.error.code().to_string(),
            message: r.error.to_string(),
            hint: r.error.hint(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub mode: FilterMode,
    pub passes: Vec<PassReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_roots: Vec<String>,
}

/// Everything a run prints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub pipeline: String,
    pub summary: GraphSummary,
    pub connections: Vec<Connection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<FilterReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedModule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_ids: Option<Vec<StableIdEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl RunReport {
    pub fn new(pipeline: impl Into<String>, graph: &PipelineGraph, explain: bool) -> Self {
        let stable_ids = explain.then(|| {
            explain_ids(graph)
                .into_iter()
                .map(|(stable_id, ordinals)| StableIdEntry {
                    label: graph
                        .module_node(&stable_id)
                        .map(cpgraph_core::graph::ModuleNode::label)
                        .unwrap_or_default(),
                    stable_id,
                    ordinals,
                })
                .collect()
        });
        Self {
            pipeline: pipeline.into(),
            summary: GraphSummary::from_graph(graph),
            connections: connections(graph),
            filters: None,
            skipped: Vec::new(),
            stable_ids,
            output: None,
        }
    }

    fn write_counts(&self, w: &mut dyn Write, indent: &str) -> io::Result<()> {
        let s = &self.summary;
        writeln!(
            w,
            "{indent}{} modules ({} enabled, {} disabled)",
            s.module_count, s.enabled_module_count, s.disabled_module_count
        )?;
        for (kind, count) in &s.data_counts {
            writeln!(w, "{indent}{count} {kind} nodes")?;
        }
        writeln!(w, "{indent}{} total connections", s.edge_count)?;
        if s.filtered_node_count + s.filtered_edge_count > 0 {
            writeln!(
                w,
                "{indent}{} nodes and {} connections marked filtered",
                s.filtered_node_count, s.filtered_edge_count
            )?;
        }
        Ok(())
    }

    fn write_connections(&self, w: &mut dyn Write, indent: &str) -> io::Result<()> {
        for c in &self.connections {
            let tag = if c.filtered { " [filtered]" } else { "" };
            writeln!(w, "{indent}{}{tag}", c.describe())?;
        }
        Ok(())
    }

    fn write_filters(&self, w: &mut dyn Write, indent: &str) -> io::Result<()> {
        let Some(filters) = &self.filters else {
            return Ok(());
        };
        for pass in &filters.passes {
            writeln!(w, "{indent}{:<22} {}", pass.name, pass.affected_count)?;
        }
        if !filters.unmatched_roots.is_empty() {
            writeln!(
                w,
                "{indent}unmatched roots: {}",
                filters.unmatched_roots.join(", ")
            )?;
        }
        Ok(())
    }

    fn write_stable_ids(&self, w: &mut dyn Write, indent: &str) -> io::Result<()> {
        for entry in self.stable_ids.iter().flatten() {
            write!(w, "{indent}{} → {}", entry.stable_id, entry.label)?;
            if entry.ordinals.len() > 1 {
                let all: Vec<String> = entry.ordinals.iter().map(|n| format!("#{n}")).collect();
                write!(w, " (merged: {})", all.join(", "))?;
            }
            writeln!(w)?;
        }
        Ok(())
    }

    fn write_skipped(&self, w: &mut dyn Write, indent: &str) -> io::Result<()> {
        for s in &self.skipped {
            writeln!(
                w,
                "{indent}{} #{} [{}] {}",
                s.module_name, s.ordinal, s.error_code, s.message
            )?;
            if let Some(hint) = s.hint {
                writeln!(w, "{indent}  hint: {hint}")?;
            }
        }
        Ok(())
    }

    /// Plain listing, close to what earlier versions of the tool printed.
    pub fn render_text(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "Pipeline: {}", self.pipeline)?;
        writeln!(w, "Graph contains:")?;
        self.write_counts(w, "  ")?;
        if !self.skipped.is_empty() {
            writeln!(w, "\nSkipped modules:")?;
            self.write_skipped(w, "  ")?;
        }
        if let Some(filters) = &self.filters {
            writeln!(w, "\nFilters ({}):", filters.mode)?;
            self.write_filters(w, "  ")?;
        }
        writeln!(w, "\nConnections:")?;
        self.write_connections(w, "  ")?;
        if self.stable_ids.is_some() {
            writeln!(w, "\nStable module ID mapping:")?;
            self.write_stable_ids(w, "  ")?;
        }
        if let Some(path) = &self.output {
            writeln!(w, "\nGraph saved to: {path}")?;
        }
        Ok(())
    }

    pub fn render_pretty(&self, w: &mut dyn Write) -> io::Result<()> {
        pretty_kv(w, "Pipeline", &self.pipeline)?;
        pretty_kv(w, "Hash", &self.summary.content_hash)?;
        pretty_kv(
            w,
            "Shape",
            format!(
                "{} component(s), {}",
                self.summary.component_count,
                if self.summary.acyclic { "acyclic" } else { "has cycles" }
            ),
        )?;
        if let Some(path) = &self.output {
            pretty_kv(w, "Output", path)?;
        }
        writeln!(w)?;
        pretty_section(w, "Graph")?;
        self.write_counts(w, "  ")?;
        if !self.skipped.is_empty() {
            writeln!(w)?;
            pretty_section(w, "Skipped modules")?;
            self.write_skipped(w, "  ")?;
        }
        if let Some(filters) = &self.filters {
            writeln!(w)?;
            pretty_section(w, &format!("Filters ({})", filters.mode))?;
            self.write_filters(w, "  ")?;
        }
        writeln!(w)?;
        pretty_section(w, "Connections")?;
        self.write_connections(w, "  ")?;
        if self.stable_ids.is_some() {
            writeln!(w)?;
            pretty_section(w, "Stable module IDs")?;
            self.write_stable_ids(w, "  ")?;
        }
        Ok(())
    }

    /// Render to stdout in `mode`.
    pub fn render(&self, mode: OutputMode) -> anyhow::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match mode {
            OutputMode::Json => {
                serde_json::to_writer_pretty(&mut out, self)?;
                writeln!(out)?;
            }
            OutputMode::Text => self.render_text(&mut out)?,
            OutputMode::Pretty => self.render_pretty(&mut out)?,
        }
        Ok(())
    }
}
