//! Data node normalization.
//!
//! A data reference is keyed `"{base_kind}__{name}"`. List-ness never reaches
//! the key, so an image-list reference to `DNA` and a scalar image reference
//! to `DNA` land on the same node `image__DNA`. The double underscore keeps
//! keys clear of DOT port syntax.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::RefKind;

/// Separator between kind prefix and name in a data node key.
pub const KEY_SEPARATOR: &str = "__";

/// Kind of a data node. List references collapse onto their base kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Image,
    Object,
    Measurement,
}

impl DataKind {
    pub const ALL: [Self; 3] = [Self::Image, Self::Object, Self::Measurement];

    /// Key prefix for nodes of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Object => "object",
            Self::Measurement => "measurement",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Canonical node key for a reference of `kind` named `name`.
#[must_use]
pub fn normalize(kind: RefKind, name: &str) -> String {
    node_key(kind.base(), name)
}

/// Edge tagging only. Never consulted for node identity.
#[must_use]
pub const fn is_list(kind: RefKind) -> bool {
    kind.is_list()
}

/// Assemble a data node key from an already-resolved base kind.
#[must_use]
pub fn node_key(kind: DataKind, name: &str) -> String {
    format!("{}{KEY_SEPARATOR}{name}", kind.prefix())
}
