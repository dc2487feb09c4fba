//! CellProfiler JSON pipeline dialect.
//!
//! A module declares its data flow through settings whose `name` is the
//! fully-qualified class path of the setting type. Six class paths matter;
//! every other setting is ignored. Values of `""` or `"None"` mean "not set".
//! List subscribers hold comma-separated names.

use cpgraph_core::{DataRef, ModuleRecord, RefKind};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Input,
    Output,
}

const IMAGE_SUBSCRIBER: &str =
    "cellprofiler_core.setting.subscriber.image_subscriber._image_subscriber.ImageSubscriber";
const LABEL_SUBSCRIBER: &str = "cellprofiler_core.setting.subscriber._label_subscriber.LabelSubscriber";
const IMAGE_LIST_SUBSCRIBER: &str =
    "cellprofiler_core.setting.subscriber.list_subscriber._image_list_subscriber.ImageListSubscriber";
const LABEL_LIST_SUBSCRIBER: &str =
    "cellprofiler_core.setting.subscriber.list_subscriber._label_list_subscriber.LabelListSubscriber";
const IMAGE_NAME: &str = "cellprofiler_core.setting.text.alphanumeric.name.image_name._image_name.ImageName";
const LABEL_NAME: &str = "cellprofiler_core.setting.text.alphanumeric.name._label_name.LabelName";

const SETTING_KINDS: [(&str, Role, RefKind); 6] = [
    (IMAGE_SUBSCRIBER, Role::Input, RefKind::Image),
    (LABEL_SUBSCRIBER, Role::Input, RefKind::Object),
    (IMAGE_LIST_SUBSCRIBER, Role::Input, RefKind::ImageList),
    (LABEL_LIST_SUBSCRIBER, Role::Input, RefKind::ObjectList),
    (IMAGE_NAME, Role::Output, RefKind::Image),
    (LABEL_NAME, Role::Output, RefKind::Object),
];

fn classify(setting_type: &str) -> Option<(Role, RefKind)> {
    SETTING_KINDS
        .iter()
        .find(|(path, _, _)| *path == setting_type)
        .map(|&(_, role, kind)| (role, kind))
}

fn default_true() -> bool {
    true
}

fn default_module_name() -> String {
    "Unknown".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PipelineDoc {
    #[serde(default)]
    pub modules: Vec<ModuleDoc>,
}

#[derive(Debug, Deserialize)]
pub struct ModuleDoc {
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub settings: Vec<Setting>,
}

#[derive(Debug, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub module_num: u32,
    #[serde(default = "default_module_name")]
    pub module_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            module_num: 0,
            module_name: default_module_name(),
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Setting {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Setting {
    /// The setting's value when it names something.
    fn value_str(&self) -> Option<&str> {
        self.value
            .as_str()
            .filter(|v| !v.is_empty() && *v != "None")
    }
}

impl ModuleDoc {
    #[must_use]
    pub fn into_record(self) -> ModuleRecord {
        let Attributes {
            module_num,
            module_name,
            enabled,
        } = self.attributes;
        let mut record = ModuleRecord::new(module_num, module_name).with_enabled(enabled);
        for setting in &self.settings {
            let Some((role, kind)) = classify(&setting.name) else {
                continue;
            };
            let Some(value) = setting.value_str() else {
                continue;
            };
            let names: Vec<&str> = if kind.is_list() {
                value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect()
            } else {
                vec![value]
            };
            let target = match role {
                Role::Input => &mut record.inputs,
                Role::Output => &mut record.outputs,
            };
            target.extend(names.into_iter().map(|n| DataRef::new(kind, n)));
        }
        record
    }
}

impl PipelineDoc {
    #[must_use]
    pub fn into_records(self) -> Vec<ModuleRecord> {
        self.modules.into_iter().map(ModuleDoc::into_record).collect()
    }
}
