//! Node-link JSON writer.
//!
//! ```json
//! { "directed": true, "content_hash": "sha256:...",
//!   "nodes": [{ "id": "image__DNA", "type": "image", ... }],
//!   "edges": [{ "source": "image__DNA", "target": "Resize_...", ... }] }
//! ```

use std::io::{self, Write};

use cpgraph_core::PipelineGraph;
use serde_json::{Map, Value, json};

use super::{Attrs, ExportOptions, exported_edges, exported_nodes};

fn object(fixed: &[(&str, &str)], attrs: &Attrs) -> Value {
    let mut map = Map::new();
    for (k, v) in fixed {
        map.insert(k.to_string(), Value::String(v.to_string()));
    }
    for (k, v) in attrs {
        map.insert((*k).to_string(), json!(v));
    }
    Value::Object(map)
}

pub fn to_value(graph: &PipelineGraph, opts: &ExportOptions) -> Value {
    let nodes: Vec<Value> = exported_nodes(graph, opts)
        .iter()
        .map(|n| object(&[("id", n.key)], &n.attrs))
        .collect();
    let edges: Vec<Value> = exported_edges(graph, opts)
        .iter()
        .map(|e| {
            object(
                &[("source", e.key.source.as_str()), ("target", e.key.target.as_str())],
                &e.attrs,
            )
        })
        .collect();
    json!({
        "directed": true,
        "content_hash": graph.content_hash(),
        "nodes": nodes,
        "edges": edges,
    })
}

pub fn write(w: &mut dyn Write, graph: &PipelineGraph, opts: &ExportOptions) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *w, &to_value(graph, opts))?;
    writeln!(w)
}
