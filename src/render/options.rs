//! RenderOptions: stylesheet injection and minification switches.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RenderOptions
// ---------------------------------------------------------------------------

/// Options accepted by [`render`](super::render) and
/// [`render_sync`](super::render_sync).
///
/// Deserializes from camelCase JSON (`cssFiles`, `cssLinks`, ...), so hosts
/// can keep it in their own configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Stylesheets read from disk and concatenated in order. Async only.
    pub css_files: Vec<PathBuf>,
    /// Stylesheet URLs emitted as `<link rel="stylesheet">` elements, in order.
    pub css_links: Vec<String>,
    /// Raw CSS appended after the file contents.
    pub css_inline: Option<String>,
    /// Strip comments and insignificant whitespace from the combined CSS.
    pub css_minify: bool,
    /// Compact whitespace between tags in the final markup.
    pub minify: bool,
}

impl RenderOptions {
    /// Create default options (no stylesheets, no minification).
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stylesheet path (builder).
    pub fn with_css_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.css_files.push(path.into());
        self
    }

    /// Append a stylesheet URL (builder).
    pub fn with_css_link(mut self, href: impl Into<String>) -> Self {
        self.css_links.push(href.into());
        self
    }

    /// Set the inline CSS (builder).
    pub fn with_css_inline(mut self, css: impl Into<String>) -> Self {
        self.css_inline = Some(css.into());
        self
    }

    /// Toggle CSS minification (builder).
    pub fn with_css_minify(mut self, on: bool) -> Self {
        self.css_minify = on;
        self
    }

    /// Toggle markup minification (builder).
    pub fn with_minify(mut self, on: bool) -> Self {
        self.minify = on;
        self
    }

    /// Name of the first option only the async renderer can honour.
    pub fn async_only_option(&self) -> Option<&'static str> {
        if !self.css_files.is_empty() {
            Some("css_files")
        } else {
            None
        }
    }

    /// Whether any stylesheet output will be injected.
    pub fn has_styles(&self) -> bool {
        !self.css_files.is_empty() || !self.css_links.is_empty() || self.css_inline.is_some()
    }
}
