//! GraphML writer.
//!
//! Keys are declared once per attribute name, nodes first, in first-seen
//! order, and numbered `d0`, `d1`, ... so the file is stable across runs.

use std::io::{self, Write};

use cpgraph_core::PipelineGraph;

use super::{Attrs, ExportOptions, declarations, escape_xml, exported_edges, exported_nodes};

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#;

struct KeyTable {
    /// `(domain, attr name)` → key id.
    ids: Vec<(&'static str, &'static str, String)>,
}

impl KeyTable {
    fn id(&self, domain: &str, name: &str) -> Option<&str> {
        self.ids
            .iter()
            .find(|(d, n, _)| *d == domain && *n == name)
            .map(|(_, _, id)| id.as_str())
    }
}

fn write_data(w: &mut dyn Write, keys: &KeyTable, domain: &str, attrs: &Attrs) -> io::Result<()> {
    for (name, value) in attrs {
        if let Some(id) = keys.id(domain, name) {
            writeln!(
                w,
                "      <data key=\"{id}\">{}</data>",
                escape_xml(&value.render())
            )?;
        }
    }
    Ok(())
}

pub fn write(w: &mut dyn Write, graph: &PipelineGraph, opts: &ExportOptions) -> io::Result<()> {
    let nodes = exported_nodes(graph, opts);
    let edges = exported_edges(graph, opts);

    writeln!(w, "{HEADER}")?;
    let mut keys = KeyTable { ids: Vec::new() };
    let domains = [
        ("node", declarations(nodes.iter().map(|n| &n.attrs))),
        ("edge", declarations(edges.iter().map(|e| &e.attrs))),
    ];
    for (domain, decls) in &domains {
        for (name, sample) in decls {
            let id = format!("d{}", keys.ids.len());
            writeln!(
                w,
                "  <key id=\"{id}\" for=\"{domain}\" attr.name=\"{name}\" attr.type=\"{}\"/>",
                sample.graphml_type()
            )?;
            keys.ids.push((*domain, *name, id));
        }
    }

    writeln!(w, "  <graph edgedefault=\"directed\">")?;
    for node in &nodes {
        writeln!(w, "    <node id=\"{}\">", escape_xml(node.key))?;
        write_data(w, &keys, "node", &node.attrs)?;
        writeln!(w, "    </node>")?;
    }
    for edge in &edges {
        writeln!(
            w,
            "    <edge source=\"{}\" target=\"{}\">",
            escape_xml(&edge.key.source),
            escape_xml(&edge.key.target)
        )?;
        write_data(w, &keys, "edge", &edge.attrs)?;
        writeln!(w, "    </edge>")?;
    }
    writeln!(w, "  </graph>")?;
    writeln!(w, "</graphml>")
}
