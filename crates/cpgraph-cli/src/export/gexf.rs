//! GEXF 1.2 writer.
//!
//! `label` becomes the element's own label; every other attribute goes
//! through declared `attvalues`.

use std::io::{self, Write};

use cpgraph_core::PipelineGraph;

use super::{AttrValue, Attrs, ExportOptions, declarations, escape_xml, exported_edges, exported_nodes};

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gexf xmlns="http://www.gexf.net/1.2draft" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.gexf.net/1.2draft http://www.gexf.net/1.2draft/gexf.xsd" version="1.2">"#;

/// Declared attribute names, position is the GEXF attribute id.
type Declared = Vec<&'static str>;

fn declare(w: &mut dyn Write, class: &str, decls: &[(&'static str, &AttrValue)]) -> io::Result<Declared> {
    let mut declared = Vec::new();
    if decls.iter().all(|(name, _)| *name == "label") {
        return Ok(declared);
    }
    writeln!(w, "    <attributes class=\"{class}\" mode=\"static\">")?;
    for (name, sample) in decls.iter().filter(|(name, _)| *name != "label") {
        writeln!(
            w,
            "      <attribute id=\"{}\" title=\"{name}\" type=\"{}\"/>",
            declared.len(),
            sample.gexf_type()
        )?;
        declared.push(*name);
    }
    writeln!(w, "    </attributes>")?;
    Ok(declared)
}

fn write_attvalues(w: &mut dyn Write, declared: &Declared, attrs: &Attrs) -> io::Result<()> {
    let values: Vec<(usize, &AttrValue)> = attrs
        .iter()
        .filter_map(|(name, value)| {
            declared
                .iter()
                .position(|d| d == name)
                .map(|id| (id, value))
        })
        .collect();
    if values.is_empty() {
        return Ok(());
    }
    writeln!(w, "        <attvalues>")?;
    for (id, value) in values {
        writeln!(
            w,
            "          <attvalue for=\"{id}\" value=\"{}\"/>",
            escape_xml(&value.render())
        )?;
    }
    writeln!(w, "        </attvalues>")
}

pub fn write(w: &mut dyn Write, graph: &PipelineGraph, opts: &ExportOptions) -> io::Result<()> {
    let nodes = exported_nodes(graph, opts);
    let edges = exported_edges(graph, opts);

    writeln!(w, "{HEADER}")?;
    writeln!(w, "  <graph defaultedgetype=\"directed\" mode=\"static\">")?;
    let node_attrs = declare(w, "node", &declarations(nodes.iter().map(|n| &n.attrs)))?;
    let edge_attrs = declare(w, "edge", &declarations(edges.iter().map(|e| &e.attrs)))?;

    writeln!(w, "    <nodes>")?;
    for node in &nodes {
        let label = node
            .attr("label")
            .map_or_else(|| node.key.to_string(), AttrValue::render);
        writeln!(
            w,
            "      <node id=\"{}\" label=\"{}\">",
            escape_xml(node.key),
            escape_xml(&label)
        )?;
        write_attvalues(w, &node_attrs, &node.attrs)?;
        writeln!(w, "      </node>")?;
    }
    writeln!(w, "    </nodes>")?;

    writeln!(w, "    <edges>")?;
    for (id, edge) in edges.iter().enumerate() {
        let label = edge
            .attr("label")
            .map(|l| format!(" label=\"{}\"", escape_xml(&l.render())))
            .unwrap_or_default();
        writeln!(
            w,
            "      <edge id=\"{id}\" source=\"{}\" target=\"{}\"{label}>",
            escape_xml(&edge.key.source),
            escape_xml(&edge.key.target)
        )?;
        write_attvalues(w, &edge_attrs, &edge.attrs)?;
        writeln!(w, "      </edge>")?;
    }
    writeln!(w, "    </edges>")?;
    writeln!(w, "  </graph>")?;
    writeln!(w, "</gexf>")
}
