#![forbid(unsafe_code)]

mod config;
mod export;
mod output;
mod pipeline;
mod style;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cpgraph_core::filter::{FilterMode, FilterPlan};
use cpgraph_core::graph::{BuildOptions, DataTypeFilter, GraphBuilder, PipelineGraph};
use cpgraph_core::{DataKind, GraphError};
use output::{FilterReport, OutputMode, RunReport, SkippedModule};
use pipeline::{Dialect, LoadedPipeline};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;
use crate::export::ExportOptions;
use crate::style::StyleConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "cpgraph: data-flow graphs for image-analysis pipelines",
    long_about = None
)]
struct Cli {
    /// Pipeline file (JSON).
    pipeline: PathBuf,

    /// Write the graph here. Format follows the extension: .dot, .graphml, .gexf, .json.
    output: Option<PathBuf>,

    /// Input dialect.
    #[arg(long, value_enum)]
    dialect: Option<Dialect>,

    /// Shorthand for `--dialect dependency-graph`.
    #[arg(long, conflicts_with = "dialect")]
    dependency_graph: bool,

    /// Include disabled modules.
    #[arg(long)]
    include_disabled: bool,

    /// Which data kinds become nodes: all, images_only, objects_only, no_lists.
    #[arg(long)]
    data_type: Option<DataTypeFilter>,

    /// Keep only what is reachable from these data names (comma-separated).
    #[arg(long, value_delimiter = ',')]
    root_nodes: Vec<String>,

    /// Filter out images nothing consumes.
    #[arg(long)]
    remove_unused_images: bool,

    /// Filter out objects nothing consumes.
    #[arg(long)]
    remove_unused_objects: bool,

    /// Filter out measurements nothing consumes.
    #[arg(long)]
    remove_unused_measurements: bool,

    /// Filter out modules of these types (comma-separated).
    #[arg(long, value_delimiter = ',')]
    exclude_module_types: Vec<String>,

    /// Keep every producer of a data node, not just the latest one.
    #[arg(long)]
    no_single_parent: bool,

    /// Tag filtered elements instead of deleting them.
    #[arg(long)]
    highlight_filtered: bool,

    /// Print which module ordinals map to each stable id.
    #[arg(long)]
    explain_ids: bool,

    /// Leave provenance labels off edges.
    #[arg(long)]
    no_module_info: bool,

    /// Leave visual attributes out of the exported graph.
    #[arg(long)]
    no_formatting: bool,

    /// Export structure only, for diffing.
    #[arg(long)]
    ultra_minimal: bool,

    /// Pin source data to the top rank and sink data to the bottom (DOT).
    #[arg(long)]
    rank_nodes: bool,

    /// Ignore tagged elements when computing ranks.
    #[arg(long, requires = "rank_nodes")]
    rank_ignore_filtered: bool,

    /// Output format (pretty, text, json).
    #[arg(long, value_enum)]
    format: Option<OutputMode>,

    /// Abort on the first module that cannot be placed in the graph.
    #[arg(long)]
    strict: bool,

    /// Config file (default: ./cpgraph.toml, then the user config dir).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Suppress the summary.
    #[arg(short, long)]
    quiet: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn dialect(&self) -> Dialect {
        if self.dependency_graph {
            Dialect::DependencyGraph
        } else {
            self.dialect.unwrap_or_default()
        }
    }

    fn unused_kinds(&self) -> Vec<DataKind> {
        [
            (self.remove_unused_images, DataKind::Image),
            (self.remove_unused_objects, DataKind::Object),
            (self.remove_unused_measurements, DataKind::Measurement),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }

    fn build_options(&self, config: &Config) -> BuildOptions {
        BuildOptions {
            include_disabled: self.include_disabled
                || config.defaults.include_disabled.unwrap_or(false),
            data_type_filter: self
                .data_type
                .or(config.defaults.data_type)
                .unwrap_or_default(),
            keep_isolated_modules: false,
        }
    }

    fn filter_mode(&self, config: &Config) -> FilterMode {
        FilterMode::from_highlight(
            self.highlight_filtered || config.defaults.highlight_filtered.unwrap_or(false),
        )
    }

    fn filter_plan(&self) -> FilterPlan {
        let non_empty = |v: &[String]| -> Vec<String> {
            v.iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };
        FilterPlan::default()
            .with_excluded_types(non_empty(&self.exclude_module_types))
            .with_roots(non_empty(&self.root_nodes))
            .with_single_parent(!self.no_single_parent)
            .with_unused_kinds(self.unused_kinds())
    }

    fn export_options(&self, config: &Config) -> ExportOptions {
        ExportOptions {
            style: StyleConfig::with_overrides(&config.style),
            no_formatting: self.no_formatting,
            ultra_minimal: self.ultra_minimal,
            no_module_info: self.no_module_info,
            rank_nodes: self.rank_nodes,
            rank_ignore_filtered: self.rank_ignore_filtered,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("CPGRAPH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "cpgraph=debug,info"
        } else {
            "cpgraph=info,warn"
        })
    });

    let format = env::var("CPGRAPH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Feed every record to the builder, skipping or aborting on bad ones.
/// `E1001 Unrecognized data kind` and, when there is one, the hint line.
fn diagnosis(error: &GraphError) -> String {
    let code = error.code();
    error.hint().map_or_else(
        || format!("{code} {}", code.message()),
        |hint| format!("{code} {}\nhint: {hint}", code.message()),
    )
}

fn build_graph(
    loaded: &LoadedPipeline,
    options: BuildOptions,
    strict: bool,
) -> Result<(PipelineGraph, Vec<SkippedModule>)> {
    if let Some(rejected) = loaded.rejected.first().filter(|_| strict) {
        bail!("cannot decode module {rejected}\n{}", diagnosis(&rejected.error));
    }
    let mut skipped: Vec<SkippedModule> = loaded.rejected.iter().map(SkippedModule::from).collect();
    for rejected in &loaded.rejected {
        warn!(
            code = %rejected.error.code(),
            hint = rejected.error.hint().unwrap_or_default(),
            "skipping module {rejected}"
        );
    }

    let mut builder = GraphBuilder::new(options);
    for record in &loaded.records {
        match builder.add_record(record) {
            Ok(outcome) => debug!(ordinal = record.ordinal, ?outcome, "record processed"),
            Err(error) if strict || error.code().is_fatal() => {
                let why = diagnosis(&error);
                return Err(error).with_context(|| {
                    format!(
                        "cannot add module {} #{}\n{why}",
                        record.type_name, record.ordinal
                    )
                });
            }
            Err(error) => {
                warn!(
                    code = %error.code(),
                    hint = error.hint().unwrap_or_default(),
                    ordinal = record.ordinal,
                    module = %record.type_name,
                    "skipping module: {error}"
                );
                skipped.push(SkippedModule {
                    ordinal: record.ordinal,
                    module_name: record.type_name.clone(),
                    error_code: error.code().to_string(),
                    message: error.to_string(),
                    hint: error.hint(),
                });
            }
        }
    }
    let graph = builder.finish();
    graph.check_invariants()?;
    Ok((graph, skipped))
}

fn run(cli: &Cli) -> Result<()> {
    let loaded_config = config::load(cli.config.as_deref())?;
    if let Some(source) = &loaded_config.source {
        debug!(path = %source.display(), "config loaded");
    }
    let config = &loaded_config.config;

    let loaded = pipeline::load(&cli.pipeline, cli.dialect())?;
    let (graph, skipped) = build_graph(&loaded, cli.build_options(config), cli.strict)?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph built"
    );

    let plan = cli.filter_plan();
    let mode = cli.filter_mode(config);
    let outcome = plan.run(&graph, mode)?;
    if !outcome.unmatched_roots.is_empty() {
        let error = GraphError::UnknownRootNode {
            names: outcome.unmatched_roots.clone(),
        };
        warn!(code = %error.code(), "{error}");
    }

    let mut report = RunReport::new(
        cli.pipeline.display().to_string(),
        &outcome.graph,
        cli.explain_ids,
    );
    report.skipped = skipped;
    if !plan.is_noop() {
        report.filters = Some(FilterReport {
            mode,
            passes: outcome.passes.clone(),
            unmatched_roots: outcome.unmatched_roots.clone(),
        });
    }

    if let Some(path) = &cli.output {
        export::write(&outcome.graph, path, &cli.export_options(config))?;
        report.output = Some(path.display().to_string());
    }

    if !cli.quiet {
        let mode = output::resolve_output_mode(cli.format, config.defaults.format);
        report.render(mode)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    run(&cli)
}
