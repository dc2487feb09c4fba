//! Graph serializers.
//!
//! Every format is fed from the same flattened attribute view
//! ([`exported_nodes`], [`exported_edges`]) so that DOT, GraphML, GEXF and
//! JSON agree on what a node or edge carries. The graph itself already
//! iterates in canonical order; writers never reorder.

pub mod dot;
pub mod gexf;
pub mod graphml;
pub mod json;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use cpgraph_core::PipelineGraph;
use cpgraph_core::graph::{EdgeAttrs, EdgeKey, Node, sink_data_keys, source_data_keys};
use serde::Serialize;
use tracing::{info, warn};

use crate::style::StyleConfig;

/// Output file format, chosen from the output path's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Dot,
    GraphMl,
    Gexf,
    Json,
}

impl ExportFormat {
    /// Unknown or missing extensions fall back to GraphML.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("dot" | "gv") => Self::Dot,
            Some("graphml") => Self::GraphMl,
            Some("gexf") => Self::Gexf,
            Some("json") => Self::Json,
            other => {
                warn!(
                    extension = other.unwrap_or(""),
                    "unrecognized output extension, writing GraphML"
                );
                Self::GraphMl
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dot => "dot",
            Self::GraphMl => "graphml",
            Self::Gexf => "gexf",
            Self::Json => "json",
        }
    }
}

/// Knobs shared by all writers.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub style: StyleConfig,
    /// Omit visual attributes.
    pub no_formatting: bool,
    /// Nodes keep only `type`; edges keep nothing. For structural diffs.
    pub ultra_minimal: bool,
    /// Omit the `#n` provenance labels on edges.
    pub no_module_info: bool,
    /// DOT only: pin source data at the top rank and sink data at the bottom.
    pub rank_nodes: bool,
    /// Compute ranks over the untagged part of a highlighted graph.
    pub rank_ignore_filtered: bool,
}

impl ExportOptions {
    const fn formatting(&self) -> bool {
        !self.no_formatting && !self.ultra_minimal
    }
}

/// A single exported attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Text(String),
    Int(u32),
    Bool(bool),
}

impl AttrValue {
    pub fn render(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Int(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Type name in GraphML's vocabulary.
    pub const fn graphml_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Int(_) => "int",
            Self::Bool(_) => "boolean",
        }
    }

    /// Type name in GEXF's vocabulary.
    pub const fn gexf_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "string",
            Self::Int(_) => "integer",
            Self::Bool(_) => "boolean",
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

pub type Attrs = Vec<(&'static str, AttrValue)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedNode<'g> {
    pub key: &'g str,
    pub attrs: Attrs,
}

impl ExportedNode<'_> {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedEdge<'g> {
    pub key: &'g EdgeKey,
    pub attrs: Attrs,
}

impl ExportedEdge<'_> {
    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }
}

fn node_attrs(node: &Node, opts: &ExportOptions) -> Attrs {
    let mut attrs: Attrs = Vec::new();
    match node {
        Node::Data(d) => {
            attrs.push(("type", d.kind.prefix().into()));
            if opts.ultra_minimal {
                return attrs;
            }
            attrs.push(("label", d.name.as_str().into()));
        }
        Node::Module(m) => {
            attrs.push(("type", "module".into()));
            if opts.ultra_minimal {
                return attrs;
            }
            attrs.push(("label", m.label().into()));
            attrs.push(("module_name", m.type_name.as_str().into()));
            attrs.push(("module_num", AttrValue::Int(m.ordinal())));
            attrs.push(("stable_id", m.stable_id.as_str().into()));
            attrs.push(("enabled", AttrValue::Bool(m.enabled)));
        }
    }
    if node.is_filtered() {
        attrs.push(("filtered", AttrValue::Bool(true)));
    }
    if opts.formatting() {
        attrs.extend(
            opts.style
                .node(node)
                .attrs()
                .into_iter()
                .map(|(k, v)| (k, AttrValue::Text(v))),
        );
    }
    attrs
}

/// `"#2"` or `"#2, #5"`.
pub fn provenance_label(edge: &EdgeAttrs) -> String {
    edge.via_ordinals
        .iter()
        .map(|n| format!("#{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn edge_attrs(key: &EdgeKey, edge: &EdgeAttrs, opts: &ExportOptions) -> Attrs {
    let mut attrs: Attrs = Vec::new();
    if opts.ultra_minimal {
        return attrs;
    }
    attrs.push(("type", key.kind.as_str().into()));
    if !opts.no_module_info && !edge.via_ordinals.is_empty() {
        attrs.push(("label", provenance_label(edge).into()));
    }
    if edge.filtered {
        attrs.push(("filtered", AttrValue::Bool(true)));
    }
    if opts.formatting() {
        attrs.extend(
            opts.style
                .edge(key.kind, edge.filtered)
                .attrs()
                .into_iter()
                .map(|(k, v)| (k, AttrValue::Text(v))),
        );
    }
    attrs
}

/// Every node with its exported attributes, in canonical order.
pub fn exported_nodes<'g>(graph: &'g PipelineGraph, opts: &ExportOptions) -> Vec<ExportedNode<'g>> {
    graph
        .nodes()
        .map(|node| ExportedNode {
            key: node.key(),
            attrs: node_attrs(node, opts),
        })
        .collect()
}

/// Every edge with its exported attributes, in canonical order.
pub fn exported_edges<'g>(graph: &'g PipelineGraph, opts: &ExportOptions) -> Vec<ExportedEdge<'g>> {
    graph
        .edges()
        .map(|(key, edge)| ExportedEdge {
            key,
            attrs: edge_attrs(key, edge, opts),
        })
        .collect()
}

/// Distinct attribute names with the type of their first value, in first-seen order.
pub fn declarations<'a>(attrs: impl IntoIterator<Item = &'a Attrs>) -> Vec<(&'static str, &'a AttrValue)> {
    let mut seen: Vec<(&'static str, &AttrValue)> = Vec::new();
    for (name, value) in attrs.into_iter().flatten() {
        if !seen.iter().any(|(n, _)| n == name) {
            seen.push((name, value));
        }
    }
    seen
}

/// Source and sink data keys for rank pinning, or `None` when ranking is off.
pub fn rank_groups<'g>(graph: &'g PipelineGraph, opts: &ExportOptions) -> Option<(Vec<&'g str>, Vec<&'g str>)> {
    opts.rank_nodes.then(|| {
        (
            source_data_keys(graph, opts.rank_ignore_filtered),
            sink_data_keys(graph, opts.rank_ignore_filtered),
        )
    })
}

/// XML text and attribute escaping.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Serialize `graph` in `format` to `w`.
pub fn write_to(
    w: &mut dyn Write,
    graph: &PipelineGraph,
    format: ExportFormat,
    opts: &ExportOptions,
) -> io::Result<()> {
    match format {
        ExportFormat::Dot => dot::write(w, graph, opts),
        ExportFormat::GraphMl => graphml::write(w, graph, opts),
        ExportFormat::Gexf => gexf::write(w, graph, opts),
        ExportFormat::Json => json::write(w, graph, opts),
    }
}

/// Write `graph` to `path`, choosing the format from the extension.
pub fn write(graph: &PipelineGraph, path: &Path, opts: &ExportOptions) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(path);
    if opts.rank_nodes && format != ExportFormat::Dot {
        warn!(format = format.as_str(), "--rank-nodes only affects DOT output");
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_to(&mut w, graph, format, opts)
        .and_then(|()| w.flush())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), format = format.as_str(), "graph written");
    Ok(format)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cpgraph_core::filter::{FilterMode, FilterPlan};
    use cpgraph_core::graph::{BuildOptions, build};
    use cpgraph_core::{ModuleRecord, RefKind};

    pub(crate) fn render(graph: &PipelineGraph, format: ExportFormat, opts: &ExportOptions) -> String {
        let mut buf = Vec::new();
        write_to(&mut buf, graph, format, opts).expect("write");
        String::from_utf8(buf).expect("utf8")
    }

    /// Load → OrigDNA → Resize → SmallDNA → Save, plus an unused mask.
    pub(crate) fn sample_graph() -> PipelineGraph {
        let records = [
            ModuleRecord::new(1, "Load").with_output(RefKind::Image, "OrigDNA"),
            ModuleRecord::new(2, "Resize")
                .with_input(RefKind::Image, "OrigDNA")
                .with_output(RefKind::Image, "SmallDNA")
                .with_output(RefKind::Object, "Mask"),
            ModuleRecord::new(3, "Save").with_input(RefKind::ImageList, "SmallDNA"),
        ];
        build(&records, BuildOptions::default()).expect("build")
    }

    pub(crate) fn highlighted_graph() -> PipelineGraph {
        FilterPlan::default()
            .with_unused_kinds([cpgraph_core::DataKind::Object])
            .run(&sample_graph(), FilterMode::Highlight)
            .expect("plan")
            .graph
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("a.dot")), ExportFormat::Dot);
        assert_eq!(ExportFormat::from_path(Path::new("a.GV")), ExportFormat::Dot);
        assert_eq!(ExportFormat::from_path(Path::new("a.gexf")), ExportFormat::Gexf);
        assert_eq!(ExportFormat::from_path(Path::new("a.json")), ExportFormat::Json);
        assert_eq!(ExportFormat::from_path(Path::new("a.graphml")), ExportFormat::GraphMl);
    }

    #[test]
    fn unknown_extension_falls_back_to_graphml() {
        assert_eq!(ExportFormat::from_path(Path::new("a.png")), ExportFormat::GraphMl);
        assert_eq!(ExportFormat::from_path(Path::new("graph")), ExportFormat::GraphMl);
    }

    #[test]
    fn module_attributes() {
        let g = sample_graph();
        let nodes = exported_nodes(&g, &ExportOptions::default());
        let resize = nodes
            .iter()
            .find(|n| n.key.starts_with("Resize_"))
            .expect("resize");
        assert_eq!(resize.attr("type"), Some(&AttrValue::from("module")));
        assert_eq!(resize.attr("label"), Some(&AttrValue::from("Resize #2")));
        assert_eq!(resize.attr("module_num"), Some(&AttrValue::Int(2)));
        assert_eq!(resize.attr("enabled"), Some(&AttrValue::Bool(true)));
        assert_eq!(resize.attr("fillcolor"), Some(&AttrValue::from("lightblue")));
        assert_eq!(resize.attr("filtered"), None);
    }

    #[test]
    fn ultra_minimal_keeps_only_type() {
        let g = sample_graph();
        let opts = ExportOptions {
            ultra_minimal: true,
            ..ExportOptions::default()
        };
        for node in exported_nodes(&g, &opts) {
            assert_eq!(node.attrs.len(), 1, "{}", node.key);
            assert_eq!(node.attrs[0].0, "type");
        }
        assert!(exported_edges(&g, &opts).iter().all(|e| e.attrs.is_empty()));
    }

    #[test]
    fn no_formatting_drops_style_only() {
        let g = sample_graph();
        let opts = ExportOptions {
            no_formatting: true,
            ..ExportOptions::default()
        };
        let nodes = exported_nodes(&g, &opts);
        assert!(nodes.iter().all(|n| n.attr("fillcolor").is_none()));
        assert!(nodes.iter().all(|n| n.attr("label").is_some()));
    }

    #[test]
    fn edge_labels_carry_provenance_unless_disabled() {
        let g = sample_graph();
        let edges = exported_edges(&g, &ExportOptions::default());
        let into_save = edges
            .iter()
            .find(|e| e.key.target.starts_with("Save_"))
            .expect("edge");
        assert_eq!(into_save.attr("label"), Some(&AttrValue::from("#3")));
        assert_eq!(into_save.attr("type"), Some(&AttrValue::from("list_input")));
        assert_eq!(into_save.attr("style"), Some(&AttrValue::from("bold")));

        let opts = ExportOptions {
            no_module_info: true,
            ..ExportOptions::default()
        };
        assert!(exported_edges(&g, &opts).iter().all(|e| e.attr("label").is_none()));
    }

    #[test]
    fn highlighted_elements_get_filtered_style() {
        let g = highlighted_graph();
        let nodes = exported_nodes(&g, &ExportOptions::default());
        let mask = nodes.iter().find(|n| n.key == "object__Mask").expect("mask");
        assert_eq!(mask.attr("filtered"), Some(&AttrValue::Bool(true)));
        assert_eq!(mask.attr("style"), Some(&AttrValue::from("filled,dotted")));
        assert_eq!(mask.attr("shape"), Some(&AttrValue::from("ellipse")));
    }

    #[test]
    fn declarations_dedupe_in_first_seen_order() {
        let g = sample_graph();
        let nodes = exported_nodes(&g, &ExportOptions::default());
        let decls = declarations(nodes.iter().map(|n| &n.attrs));
        let names: Vec<&str> = decls.iter().map(|(n, _)| *n).collect();
        assert_eq!(&names[..2], ["type", "label"]);
        assert_eq!(names.iter().filter(|n| **n == "type").count(), 1);
        assert!(names.contains(&"module_num"));
    }

    #[test]
    fn xml_escaping() {
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
    }
}
