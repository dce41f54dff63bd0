//! Error taxonomy and diagnostics.
//!
//! Every failure surfaced by the crate is a [`CoherentError`]. Each variant maps
//! to a stable [`ErrorCode`] and can produce a [`Diagnostic`] carrying
//! suggestions and a documentation reference for external tooling.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::{json, Value};

/// Crate-wide result alias.
pub type Result<T, E = CoherentError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// CoherentError
// ---------------------------------------------------------------------------

/// Errors produced while normalizing, rendering, or hydrating trees.
#[derive(Debug, thiserror::Error)]
pub enum CoherentError {
    /// A node does not have the one-key shape, or its props are contradictory.
    #[error("invalid node structure at {path}: {message}")]
    Structure { path: String, message: String },

    /// A node is well-formed but cannot be serialized (bad tag or attribute name).
    #[error("cannot render `{tag}` at {path}: {message}")]
    Render {
        tag: String,
        path: String,
        message: String,
    },

    /// The freshly computed tree disagrees with the existing DOM.
    #[error("hydration mismatch at {path}: expected {expected}, found {found}")]
    HydrationMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// A state update was rejected (non-object patch, destroyed instance, ...).
    #[error("state update rejected: {0}")]
    StateUpdate(String),

    /// A user component reported a failure (or panicked under a boundary).
    #[error("component `{component}` failed: {message}")]
    Component { component: String, message: String },

    /// `render_sync` was handed an option that needs the async renderer.
    #[error("option `{0}` requires the async renderer")]
    AsyncOnlyOption(&'static str),

    /// The API was called with arguments that can never succeed.
    #[error("usage error: {0}")]
    Usage(String),

    /// A DOM selector could not be parsed.
    #[error("invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    /// Markup handed to the DOM parser could not be parsed.
    #[error("failed to parse markup: {0}")]
    Markup(String),

    /// A stylesheet listed in `css_files` could not be read.
    #[error("failed to read stylesheet {path}: {source}")]
    Stylesheet {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CoherentError {
    /// Build a structural error at `path`.
    pub fn structure(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Structure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Build a component failure. Intended for use inside user components.
    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Structure { .. } => ErrorCode::Structure,
            Self::Render { .. } => ErrorCode::Render,
            Self::HydrationMismatch { .. } => ErrorCode::HydrationMismatch,
            Self::StateUpdate(_) => ErrorCode::StateUpdate,
            Self::Component { .. } => ErrorCode::Component,
            Self::AsyncOnlyOption(_) | Self::Usage(_) | Self::Selector { .. } => ErrorCode::Usage,
            Self::Markup(_) => ErrorCode::Markup,
            Self::Stylesheet { .. } => ErrorCode::Resource,
            Self::Json(_) => ErrorCode::Serialization,
        }
    }

    /// Diagnostic record for external tooling.
    pub fn diagnostic(&self) -> Diagnostic {
        let code = self.code();
        let context = match self {
            Self::Structure { path, .. } => json!({ "path": path }),
            Self::Render { tag, path, .. } => json!({ "tag": tag, "path": path }),
            Self::HydrationMismatch {
                path,
                expected,
                found,
            } => json!({ "path": path, "expected": expected, "found": found }),
            Self::Component { component, .. } => json!({ "component": component }),
            Self::Selector { selector, .. } => json!({ "selector": selector }),
            Self::Stylesheet { path, .. } => json!({ "path": path.display().to_string() }),
            Self::AsyncOnlyOption(option) => json!({ "option": option }),
            _ => Value::Null,
        };
        Diagnostic {
            code,
            message: self.to_string(),
            suggestions: code.suggestions().iter().map(|s| (*s).to_owned()).collect(),
            documentation: code.documentation().to_owned(),
            context,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Stable identifiers for each error family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Structure,
    Render,
    HydrationMismatch,
    StateUpdate,
    Component,
    Usage,
    Markup,
    Resource,
    Serialization,
}

impl ErrorCode {
    /// The code as it appears in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structure => "COHERENT_STRUCTURE",
            Self::Render => "COHERENT_RENDER",
            Self::HydrationMismatch => "COHERENT_HYDRATION_MISMATCH",
            Self::StateUpdate => "COHERENT_STATE_UPDATE",
            Self::Component => "COHERENT_COMPONENT",
            Self::Usage => "COHERENT_USAGE",
            Self::Markup => "COHERENT_MARKUP",
            Self::Resource => "COHERENT_RESOURCE",
            Self::Serialization => "COHERENT_SERIALIZATION",
        }
    }

    fn suggestions(self) -> &'static [&'static str] {
        match self {
            Self::Structure => &[
                "Give every node exactly one key: the tag name or component",
                "Use either `text` or `html` on a node, not both",
            ],
            Self::Render => &[
                "Tag and attribute names must be plain identifiers such as `div` or `data-id`",
            ],
            Self::HydrationMismatch => &[
                "Render the server markup and the client tree from the same props",
                "Avoid reading time or randomness while rendering",
            ],
            Self::StateUpdate => &[
                "Pass a JSON object to set_state",
                "Do not call set_state after destroy()",
            ],
            Self::Component => &["Wrap the component in an error boundary to render a fallback"],
            Self::Usage => &["Check the argument shapes against the API documentation"],
            Self::Markup => &["Check that the markup was produced by the renderer"],
            Self::Resource => &["Check that stylesheet paths exist and are readable"],
            Self::Serialization => &["Check that hydration descriptors are valid JSON"],
        }
    }

    fn documentation(self) -> &'static str {
        match self {
            Self::Structure => "docs/errors.md#structure",
            Self::Render => "docs/errors.md#render",
            Self::HydrationMismatch => "docs/errors.md#hydration-mismatch",
            Self::StateUpdate => "docs/errors.md#state-update",
            Self::Component => "docs/errors.md#component",
            Self::Usage => "docs/errors.md#usage",
            Self::Markup => "docs/errors.md#markup",
            Self::Resource => "docs/errors.md#resource",
            Self::Serialization => "docs/errors.md#serialization",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// Structured description of an error, ready to hand to diagnostic tooling.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub message: String,
    pub suggestions: Vec<String>,
    pub documentation: String,
    pub context: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_error_message_names_path() {
        let err = CoherentError::structure("$.div.children[1]", "node has 2 keys");
        assert_eq!(
            err.to_string(),
            "invalid node structure at $.div.children[1]: node has 2 keys"
        );
        assert_eq!(err.code(), ErrorCode::Structure);
    }

    #[test]
    fn diagnostic_carries_code_and_context() {
        let err = CoherentError::HydrationMismatch {
            path: "$.div".into(),
            expected: "<span>".into(),
            found: "<p>".into(),
        };
        let diag = err.diagnostic();
        assert_eq!(diag.code.as_str(), "COHERENT_HYDRATION_MISMATCH");
        assert_eq!(diag.context["found"], "<p>");
        assert!(!diag.suggestions.is_empty());
        assert!(diag.documentation.contains("hydration-mismatch"));
    }

    #[test]
    fn async_only_option_is_a_usage_error() {
        let err = CoherentError::AsyncOnlyOption("css_files");
        assert_eq!(err.code(), ErrorCode::Usage);
        assert_eq!(err.diagnostic().context["option"], "css_files");
    }

    #[test]
    fn error_code_serializes_screaming_case() {
        let value = serde_json::to_value(ErrorCode::StateUpdate).unwrap();
        assert_eq!(value, "STATE_UPDATE");
    }
}
