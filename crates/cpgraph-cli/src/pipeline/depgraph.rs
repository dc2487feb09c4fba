//! Dependency-graph JSON dialect.
//!
//! ```json
//! {
//!   "metadata": { "total_modules": 2, "total_edges": 3 },
//!   "modules": [
//!     { "module_num": 1, "module_name": "IdentifyPrimaryObjects", "enabled": true,
//!       "inputs":  [{ "type": "image", "name": "DNA" }],
//!       "outputs": [{ "type": "object", "name": "Nuclei" },
//!                   { "type": "measurement", "name": "Count_Nuclei" }] }
//!   ]
//! }
//! ```
//!
//! Unlike the pipeline dialect, `type` is free text here, so a module can
//! carry a kind the core does not know. Such a module is rejected as a whole.
//!
//! Extra fields on modules and references (liveness annotations and the
//! like) are accepted and ignored. Their names are logged once at debug.

use std::collections::{BTreeMap, BTreeSet};

use cpgraph_core::{DataRef, GraphError, ModuleRecord, RefKind};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{LoadedPipeline, Rejected};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct DepGraphDoc {
    #[serde(default)]
    pub metadata: Option<Metadata>,
    pub modules: Vec<DepModule>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub total_modules: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct DepModule {
    pub module_num: u32,
    pub module_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub inputs: Vec<DepRef>,
    #[serde(default)]
    pub outputs: Vec<DepRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct DepRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DepRef {
    fn resolve(&self) -> Result<DataRef, GraphError> {
        Ok(DataRef::new(self.kind.parse::<RefKind>()?, self.name.clone()))
    }
}

impl DepModule {
    /// Names of fields this decoder does not use, on the module or its refs.
    fn ignored_fields(&self) -> impl Iterator<Item = &str> {
        let refs = self.inputs.iter().chain(&self.outputs);
        self.extra
            .keys()
            .chain(refs.flat_map(|r| r.extra.keys()))
            .map(String::as_str)
    }

    /// Decode one module, rejecting it on the first unknown kind.
    pub fn into_record(self) -> Result<ModuleRecord, Rejected> {
        let reject = |error: GraphError| Rejected {
            ordinal: self.module_num,
            module_name: self.module_name.clone(),
            error,
        };
        let inputs = self
            .inputs
            .iter()
            .map(DepRef::resolve)
            .collect::<Result<Vec<_>, _>>()
            .map_err(reject)?;
        let outputs = self
            .outputs
            .iter()
            .map(DepRef::resolve)
            .collect::<Result<Vec<_>, _>>()
            .map_err(reject)?;
        Ok(ModuleRecord {
            ordinal: self.module_num,
            type_name: self.module_name,
            enabled: self.enabled,
            inputs,
            outputs,
        })
    }
}

impl DepGraphDoc {
    pub fn into_records(self) -> LoadedPipeline {
        let declared = self.metadata.as_ref().and_then(|m| m.total_modules);
        if let Some(total) = declared.filter(|&n| n != self.modules.len()) {
            warn!(
                declared = total,
                found = self.modules.len(),
                "dependency graph metadata disagrees with module count"
            );
        }
        let ignored: BTreeSet<String> = self
            .modules
            .iter()
            .flat_map(DepModule::ignored_fields)
            .map(str::to_string)
            .collect();
        if !ignored.is_empty() {
            debug!(?ignored, "ignoring unrecognized module fields");
        }
        self.modules.into_iter().map(DepModule::into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(doc: serde_json::Value) -> LoadedPipeline {
        serde_json::from_value::<DepGraphDoc>(doc)
            .expect("doc")
            .into_records()
    }

    #[test]
    fn decodes_measurements_and_lists() {
        let loaded = decode(json!({
            "metadata": { "total_modules": 1, "total_edges": 3 },
            "modules": [{
                "module_num": 4,
                "module_name": "MeasureObjectIntensity",
                "inputs": [
                    { "type": "image_list", "name": "DNA" },
                    { "type": "object", "name": "Nuclei" }
                ],
                "outputs": [{ "type": "measurement", "name": "Intensity_DNA" }]
            }]
        }));
        assert!(loaded.rejected.is_empty());
        let rec = &loaded.records[0];
        assert!(rec.enabled, "enabled defaults to true");
        assert_eq!(rec.inputs[0], DataRef::new(RefKind::ImageList, "DNA"));
        assert_eq!(
            rec.outputs,
            [DataRef::new(RefKind::Measurement, "Intensity_DNA")]
        );
    }

    #[test]
    fn unknown_kind_rejects_only_that_module() {
        let loaded = decode(json!({
            "modules": [
                { "module_num": 1, "module_name": "Load",
                  "outputs": [{ "type": "image", "name": "DNA" }] },
                { "module_num": 2, "module_name": "Mystery",
                  "inputs": [{ "type": "pixel", "name": "DNA" }] }
            ]
        }));
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.rejected.len(), 1);
        let rejected = &loaded.rejected[0];
        assert_eq!(rejected.ordinal, 2);
        assert_eq!(
            rejected.error,
            GraphError::InvalidKind {
                kind: "pixel".into()
            }
        );
    }

    #[test]
    fn enabled_false_is_kept() {
        let loaded = decode(json!({
            "modules": [{ "module_num": 7, "module_name": "SaveImages", "enabled": false }]
        }));
        assert!(!loaded.records[0].enabled);
    }

    #[test]
    fn liveness_annotations_are_ignored() {
        let doc: DepGraphDoc = serde_json::from_value(json!({
            "modules": [{
                "module_num": 1, "module_name": "Threshold", "live": false,
                "inputs": [{ "type": "image", "name": "DNA", "is_live": true }],
                "outputs": [{ "type": "image", "name": "Mask" }]
            }]
        }))
        .expect("doc");
        let ignored: Vec<&str> = doc.modules[0].ignored_fields().collect();
        assert_eq!(ignored, ["live", "is_live"]);

        let loaded = doc.into_records();
        assert!(loaded.rejected.is_empty());
        assert_eq!(loaded.records[0].inputs, [DataRef::new(RefKind::Image, "DNA")]);
    }

    #[test]
    fn modules_array_is_required() {
        assert!(serde_json::from_value::<DepGraphDoc>(json!({ "metadata": {} })).is_err());
    }
}
