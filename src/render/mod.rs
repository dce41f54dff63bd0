//! Rendering pipeline: serialization, stylesheets, minification, cache.

pub mod cache;
pub mod css;
pub mod html;
pub mod minify;
pub mod options;
pub mod renderer;

pub use cache::{CacheKey, CacheStats, RenderCache};
pub use html::{escape_attr, escape_text, render_nodes};
pub use options::RenderOptions;
pub use renderer::{render, render_sync, RenderReport, Renderer};
