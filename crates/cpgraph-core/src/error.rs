//! Error taxonomy for graph construction and filtering.
//!
//! Three failure families exist:
//!
//! - **Input errors** ([`GraphError::InvalidKind`], [`GraphError::InvalidDataRef`]):
//!   a module record referenced data the core cannot place in the graph. They
//!   stop processing of the current record only; whether the whole pipeline
//!   is abandoned is the caller's decision.
//! - **Soft mismatches** ([`GraphError::UnknownRootNode`]): never returned as a
//!   failure by a filter pass. Callers build one from the pass report when
//!   they want to warn about root names that matched nothing.
//! - **Invariant violations** ([`GraphError::MalformedGraphInvariant`],
//!   [`GraphError::KeyConflict`]): the graph is internally inconsistent. These
//!   indicate a bug and are always fatal.

use std::fmt;

/// Machine-readable error codes for [`GraphError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidKind,
    InvalidDataRef,
    UnknownRootNode,
    MalformedGraphInvariant,
    KeyConflict,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidKind => "E1001",
            Self::InvalidDataRef => "E1002",
            Self::UnknownRootNode => "E2001",
            Self::MalformedGraphInvariant => "E9001",
            Self::KeyConflict => "E9002",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidKind => "Unrecognized data kind",
            Self::InvalidDataRef => "Malformed data reference",
            Self::UnknownRootNode => "Root name matched no data node",
            Self::MalformedGraphInvariant => "Graph invariant violated",
            Self::KeyConflict => "Module id collides with a data node key",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidKind => {
                Some("Use one of: image, object, image_list, object_list, measurement.")
            }
            Self::InvalidDataRef => Some("Every input and output needs a non-empty name."),
            Self::UnknownRootNode => Some("Check spelling; root names are case-sensitive."),
            Self::MalformedGraphInvariant | Self::KeyConflict => {
                Some("This is a bug in cpgraph. Report it with the input pipeline.")
            }
        }
    }

    /// True for errors that must abort processing regardless of caller policy.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::MalformedGraphInvariant | Self::KeyConflict)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the graph builder, normalizer and filter passes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A data kind label was not one of the recognised kinds.
    #[error("unrecognized data kind '{kind}'")]
    InvalidKind {
        /// The label as it appeared in the input.
        kind: String,
    },

    /// A data reference could not be turned into a node.
    #[error("module #{ordinal}: {reason}")]
    InvalidDataRef {
        /// Ordinal of the record carrying the bad reference.
        ordinal: u32,
        /// What was wrong with it.
        reason: String,
    },

    /// One or more reachability roots matched no data node.
    #[error("root node(s) not found: {}", names.join(", "))]
    UnknownRootNode {
        /// The unmatched root names, sorted.
        names: Vec<String>,
    },

    /// Internal consistency failure.
    #[error("malformed graph: {detail}")]
    MalformedGraphInvariant {
        /// Which invariant failed and where.
        detail: String,
    },

    /// A module's stable id equals the key of an existing data node.
    #[error("module id '{key}' collides with an existing data node")]
    KeyConflict {
        /// The contested key.
        key: String,
    },
}

impl GraphError {
    /// Return the machine-readable error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidKind { .. } => ErrorCode::InvalidKind,
            Self::InvalidDataRef { .. } => ErrorCode::InvalidDataRef,
            Self::UnknownRootNode { .. } => ErrorCode::UnknownRootNode,
            Self::MalformedGraphInvariant { .. } => ErrorCode::MalformedGraphInvariant,
            Self::KeyConflict { .. } => ErrorCode::KeyConflict,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedGraphInvariant {
            detail: detail.into(),
        }
    }
}
