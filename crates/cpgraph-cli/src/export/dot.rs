//! Graphviz DOT writer.

use std::io::{self, Write};

use cpgraph_core::PipelineGraph;

use super::{Attrs, ExportOptions, exported_edges, exported_nodes, rank_groups};

fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

fn attr_list(attrs: &Attrs) -> String {
    if attrs.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = attrs
        .iter()
        .map(|(k, v)| format!("{k}={}", quote(&v.render())))
        .collect();
    format!(" [{}]", parts.join(", "))
}

fn rank_line(w: &mut dyn Write, rank: &str, keys: &[&str]) -> io::Result<()> {
    if keys.is_empty() {
        return Ok(());
    }
    let members: Vec<String> = keys.iter().map(|k| format!("{};", quote(k))).collect();
    writeln!(w, "  {{ rank={rank}; {} }}", members.join(" "))
}

pub fn write(w: &mut dyn Write, graph: &PipelineGraph, opts: &ExportOptions) -> io::Result<()> {
    writeln!(w, "digraph pipeline {{")?;
    for node in exported_nodes(graph, opts) {
        writeln!(w, "  {}{};", quote(node.key), attr_list(&node.attrs))?;
    }
    for edge in exported_edges(graph, opts) {
        writeln!(
            w,
            "  {} -> {}{};",
            quote(&edge.key.source),
            quote(&edge.key.target),
            attr_list(&edge.attrs)
        )?;
    }
    if let Some((sources, sinks)) = rank_groups(graph, opts) {
        rank_line(w, "source", &sources)?;
        rank_line(w, "sink", &sinks)?;
    }
    writeln!(w, "}}")
}
