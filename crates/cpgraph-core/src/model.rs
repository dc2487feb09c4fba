//! Input records handed to the builder by a pipeline-file adapter.
//!
//! Records are decoded once per pipeline and never mutated by the core. Both
//! the pipeline dialect and the dependency-graph dialect decode into the same
//! [`ModuleRecord`] shape; the core never sees which one was used.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::normalize::DataKind;

/// Declared kind of a data reference, before list-ness is folded away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Image,
    Object,
    ImageList,
    ObjectList,
    Measurement,
}

impl RefKind {
    pub const ALL: [Self; 5] = [
        Self::Image,
        Self::Object,
        Self::ImageList,
        Self::ObjectList,
        Self::Measurement,
    ];

    /// Stable lowercase label (`image_list`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Object => "object",
            Self::ImageList => "image_list",
            Self::ObjectList => "object_list",
            Self::Measurement => "measurement",
        }
    }

    /// The node kind a reference of this kind resolves to.
    #[must_use]
    pub const fn base(self) -> DataKind {
        match self {
            Self::Image | Self::ImageList => DataKind::Image,
            Self::Object | Self::ObjectList => DataKind::Object,
            Self::Measurement => DataKind::Measurement,
        }
    }

    #[must_use]
    pub const fn is_list(self) -> bool {
        matches!(self, Self::ImageList | Self::ObjectList)
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefKind {
    type Err = GraphError;

    /// Parse a kind label. Accepts the snake_case labels and `label` as an
    /// alias for `object` (segmentation outputs are "labels" in some exports).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Self::Image),
            "object" | "label" => Ok(Self::Object),
            "image_list" => Ok(Self::ImageList),
            "object_list" | "label_list" => Ok(Self::ObjectList),
            "measurement" => Ok(Self::Measurement),
            _ => Err(GraphError::InvalidKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// A named data item consumed or produced by a module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataRef {
    pub kind: RefKind,
    pub name: String,
}

impl DataRef {
    #[must_use]
    pub fn new(kind: RefKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    #[must_use]
    pub fn image(name: impl Into<String>) -> Self {
        Self::new(RefKind::Image, name)
    }

    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(RefKind::Object, name)
    }
}

/// One step of the source pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Position in the source pipeline. Display only; never part of identity.
    pub ordinal: u32,
    pub type_name: String,
    pub enabled: bool,
    pub inputs: Vec<DataRef>,
    pub outputs: Vec<DataRef>,
}

impl ModuleRecord {
    /// An enabled record with no declared I/O.
    #[must_use]
    pub fn new(ordinal: u32, type_name: impl Into<String>) -> Self {
        Self {
            ordinal,
            type_name: type_name.into(),
            enabled: true,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_input(mut self, kind: RefKind, name: impl Into<String>) -> Self {
        self.inputs.push(DataRef::new(kind, name));
        self
    }

    #[must_use]
    pub fn with_output(mut self, kind: RefKind, name: impl Into<String>) -> Self {
        self.outputs.push(DataRef::new(kind, name));
        self
    }

    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
