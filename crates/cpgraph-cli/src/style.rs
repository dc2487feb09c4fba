//! Visual attributes for exported graphs.
//!
//! The table is plain data handed to the exporters. Built-in defaults can be
//! overridden slot by slot, attribute by attribute, from the `[style]` section
//! of the config file:
//!
//! ```toml
//! [style.image]
//! fillcolor = "lightsteelblue"
//!
//! [style.filtered_node]
//! fontcolor = "gray40"
//! ```

use std::collections::BTreeMap;

use cpgraph_core::DataKind;
use cpgraph_core::graph::{EdgeKind, ModuleNode, Node};
use serde::{Deserialize, Serialize};

/// Things that can be styled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleSlot {
    Image,
    Object,
    Measurement,
    ModuleEnabled,
    ModuleDisabled,
    /// Laid over a node's own style when a highlight-mode filter tagged it.
    FilteredNode,
    FilteredEdge,
    ListEdge,
}

/// Graphviz-flavoured attributes. Unset attributes are not emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisualStyle {
    pub shape: Option<String>,
    pub style: Option<String>,
    pub fillcolor: Option<String>,
    pub fontname: Option<String>,
    pub fontcolor: Option<String>,
    pub color: Option<String>,
}

impl VisualStyle {
    fn with(shape: Option<&str>, style: &str, fillcolor: Option<&str>) -> Self {
        Self {
            shape: shape.map(str::to_string),
            style: Some(style.to_string()),
            fillcolor: fillcolor.map(str::to_string),
            ..Self::default()
        }
    }

    /// `self` with every attribute `top` sets replaced.
    #[must_use]
    pub fn overlay(&self, top: &Self) -> Self {
        let pick = |a: &Option<String>, b: &Option<String>| b.clone().or_else(|| a.clone());
        Self {
            shape: pick(&self.shape, &top.shape),
            style: pick(&self.style, &top.style),
            fillcolor: pick(&self.fillcolor, &top.fillcolor),
            fontname: pick(&self.fontname, &top.fontname),
            fontcolor: pick(&self.fontcolor, &top.fontcolor),
            color: pick(&self.color, &top.color),
        }
    }

    /// Set attributes as `(name, value)` pairs in a fixed order.
    #[must_use]
    pub fn attrs(&self) -> Vec<(&'static str, String)> {
        [
            ("shape", &self.shape),
            ("style", &self.style),
            ("fillcolor", &self.fillcolor),
            ("fontname", &self.fontname),
            ("fontcolor", &self.fontcolor),
            ("color", &self.color),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.clone().map(|v| (k, v)))
        .collect()
    }
}

/// The `[style]` config section: one optional table per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleOverrides {
    pub image: Option<VisualStyle>,
    pub object: Option<VisualStyle>,
    pub measurement: Option<VisualStyle>,
    pub module_enabled: Option<VisualStyle>,
    pub module_disabled: Option<VisualStyle>,
    pub filtered_node: Option<VisualStyle>,
    pub filtered_edge: Option<VisualStyle>,
    pub list_edge: Option<VisualStyle>,
}

impl StyleOverrides {
    fn iter(&self) -> impl Iterator<Item = (StyleSlot, &VisualStyle)> {
        [
            (StyleSlot::Image, &self.image),
            (StyleSlot::Object, &self.object),
            (StyleSlot::Measurement, &self.measurement),
            (StyleSlot::ModuleEnabled, &self.module_enabled),
            (StyleSlot::ModuleDisabled, &self.module_disabled),
            (StyleSlot::FilteredNode, &self.filtered_node),
            (StyleSlot::FilteredEdge, &self.filtered_edge),
            (StyleSlot::ListEdge, &self.list_edge),
        ]
        .into_iter()
        .filter_map(|(slot, style)| style.as_ref().map(|s| (slot, s)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleConfig {
    slots: BTreeMap<StyleSlot, VisualStyle>,
}

impl Default for StyleConfig {
    fn default() -> Self {
        let module = |fill: &str, style: &str| VisualStyle {
            fontname: Some("Helvetica-Bold".into()),
            ..VisualStyle::with(Some("box"), style, Some(fill))
        };
        let slots = BTreeMap::from([
            (StyleSlot::Image, VisualStyle::with(Some("ellipse"), "filled", Some("lightgray"))),
            (StyleSlot::Object, VisualStyle::with(Some("ellipse"), "filled", Some("lightgreen"))),
            (
                StyleSlot::Measurement,
                VisualStyle::with(Some("note"), "filled", Some("lightyellow")),
            ),
            (StyleSlot::ModuleEnabled, module("lightblue", "filled")),
            (StyleSlot::ModuleDisabled, module("lightpink", "filled,dashed")),
            (
                StyleSlot::FilteredNode,
                VisualStyle {
                    fontcolor: Some("gray55".into()),
                    color: Some("gray70".into()),
                    ..VisualStyle::with(None, "filled,dotted", Some("white"))
                },
            ),
            (
                StyleSlot::FilteredEdge,
                VisualStyle {
                    color: Some("gray70".into()),
                    ..VisualStyle::with(None, "dotted", None)
                },
            ),
            (StyleSlot::ListEdge, VisualStyle::with(None, "bold", None)),
        ]);
        Self { slots }
    }
}

impl StyleConfig {
    /// Built-in table with `overrides` laid over it.
    #[must_use]
    pub fn with_overrides(overrides: &StyleOverrides) -> Self {
        let mut config = Self::default();
        for (slot, top) in overrides.iter() {
            let merged = config.get(slot).overlay(top);
            config.slots.insert(slot, merged);
        }
        config
    }

    #[must_use]
    pub fn get(&self, slot: StyleSlot) -> VisualStyle {
        self.slots.get(&slot).cloned().unwrap_or_default()
    }

    #[must_use]
    pub const fn data_slot(kind: DataKind) -> StyleSlot {
        match kind {
            DataKind::Image => StyleSlot::Image,
            DataKind::Object => StyleSlot::Object,
            DataKind::Measurement => StyleSlot::Measurement,
        }
    }

    #[must_use]
    pub const fn module_slot(module: &ModuleNode) -> StyleSlot {
        if module.enabled {
            StyleSlot::ModuleEnabled
        } else {
            StyleSlot::ModuleDisabled
        }
    }

    /// Effective style of a node, filtered overlay included.
    #[must_use]
    pub fn node(&self, node: &Node) -> VisualStyle {
        let base = match node {
            Node::Data(d) => self.get(Self::data_slot(d.kind)),
            Node::Module(m) => self.get(Self::module_slot(m)),
        };
        if node.is_filtered() {
            base.overlay(&self.get(StyleSlot::FilteredNode))
        } else {
            base
        }
    }

    /// Effective style of an edge.
    #[must_use]
    pub fn edge(&self, kind: EdgeKind, filtered: bool) -> VisualStyle {
        let base = if kind == EdgeKind::ListInput {
            self.get(StyleSlot::ListEdge)
        } else {
            VisualStyle::default()
        };
        if filtered {
            base.overlay(&self.get(StyleSlot::FilteredEdge))
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_colours() {
        let s = StyleConfig::default();
        assert_eq!(s.get(StyleSlot::Image).fillcolor.as_deref(), Some("lightgray"));
        assert_eq!(s.get(StyleSlot::Object).fillcolor.as_deref(), Some("lightgreen"));
        assert_eq!(
            s.get(StyleSlot::ModuleDisabled).style.as_deref(),
            Some("filled,dashed")
        );
        assert_eq!(
            s.get(StyleSlot::ModuleEnabled).fontname.as_deref(),
            Some("Helvetica-Bold")
        );
    }

    #[test]
    fn overrides_touch_only_named_attributes() {
        let overrides = StyleOverrides {
            image: Some(VisualStyle {
                fillcolor: Some("pink".into()),
                ..VisualStyle::default()
            }),
            ..StyleOverrides::default()
        };
        let s = StyleConfig::with_overrides(&overrides);
        let image = s.get(StyleSlot::Image);
        assert_eq!(image.fillcolor.as_deref(), Some("pink"));
        assert_eq!(image.shape.as_deref(), Some("ellipse"));
        assert_eq!(s.get(StyleSlot::Object), StyleConfig::default().get(StyleSlot::Object));
    }

    #[test]
    fn filtered_overlay_keeps_shape() {
        let s = StyleConfig::default();
        let tagged = s.get(StyleSlot::Object).overlay(&s.get(StyleSlot::FilteredNode));
        assert_eq!(tagged.shape.as_deref(), Some("ellipse"));
        assert_eq!(tagged.fillcolor.as_deref(), Some("white"));
    }

    #[test]
    fn attrs_skip_unset_fields() {
        let attrs = StyleConfig::default().edge(EdgeKind::Output, false).attrs();
        assert!(attrs.is_empty());
        let attrs = StyleConfig::default().edge(EdgeKind::ListInput, true).attrs();
        assert_eq!(
            attrs,
            [("style", "dotted".to_string()), ("color", "gray70".to_string())]
        );
    }

    #[test]
    fn slot_names_parse_from_toml() {
        let parsed: StyleOverrides =
            toml::from_str("[module_enabled]\nfillcolor = \"azure\"\n").expect("toml");
        let s = StyleConfig::with_overrides(&parsed);
        assert_eq!(
            s.get(StyleSlot::ModuleEnabled).fillcolor.as_deref(),
            Some("azure")
        );
    }

    #[test]
    fn unknown_attributes_are_rejected() {
        assert!(toml::from_str::<StyleOverrides>("[image]\nfill = \"red\"\n").is_err());
    }
}
