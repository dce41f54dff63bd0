//! Renderer: tree expansion, serialization, stylesheet injection, caching.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cache::{CacheKey, RenderCache};
use super::css::{combine_css, inject_styles};
use super::html::render_nodes;
use super::minify::minify_html;
use super::options::RenderOptions;
use crate::component::expand;
use crate::context::{ContextStore, Scope};
use crate::error::{CoherentError, Result};
use crate::tree::{normalize, Tree};

/// Called before a render starts.
pub type BeforeRenderHook = dyn Fn(&Tree, &RenderOptions) + Send + Sync;

/// Called after a render produced markup.
pub type AfterRenderHook = dyn Fn(&RenderReport<'_>) + Send + Sync;

/// What an after-render hook observes.
#[derive(Debug, Clone, Copy)]
pub struct RenderReport<'a> {
    pub markup: &'a str,
    pub elapsed: Duration,
    pub cache_hit: bool,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// A configured renderer. Cheap to clone; clones share the cache.
#[derive(Clone, Default)]
pub struct Renderer {
    cache: Option<Arc<RenderCache>>,
    before: Vec<Arc<BeforeRenderHook>>,
    after: Vec<Arc<AfterRenderHook>>,
}

impl Renderer {
    /// Renderer without cache or hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `cache` for rendered documents (builder).
    pub fn with_cache(mut self, cache: Arc<RenderCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Register a before-render hook (builder).
    pub fn on_before_render<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Tree, &RenderOptions) + Send + Sync + 'static,
    {
        self.before.push(Arc::new(hook));
        self
    }

    /// Register an after-render hook (builder).
    pub fn on_after_render<F>(mut self, hook: F) -> Self
    where
        F: Fn(&RenderReport<'_>) + Send + Sync + 'static,
    {
        self.after.push(Arc::new(hook));
        self
    }

    /// The attached cache, if any.
    pub fn cache(&self) -> Option<&RenderCache> {
        self.cache.as_deref()
    }

    /// Render without suspending. Rejects options that need file I/O.
    pub fn render_sync(&self, tree: &Tree, options: &RenderOptions) -> Result<String> {
        if let Some(option) = options.async_only_option() {
            return Err(CoherentError::AsyncOnlyOption(option));
        }
        self.render_loaded(tree, options, &[])
    }

    /// Render, reading `css_files` first. Suspends only during those reads.
    pub async fn render(&self, tree: &Tree, options: &RenderOptions) -> Result<String> {
        let mut files = Vec::with_capacity(options.css_files.len());
        for path in &options.css_files {
            let css = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| CoherentError::Stylesheet {
                    path: path.clone(),
                    source,
                })?;
            tracing::trace!(path = %path.display(), bytes = css.len(), "loaded stylesheet");
            files.push(css);
        }
        self.render_loaded(tree, options, &files)
    }

    fn render_loaded(&self, tree: &Tree, options: &RenderOptions, files: &[String]) -> Result<String> {
        let span = tracing::debug_span!("render", minify = options.minify, cached = self.cache.is_some());
        let _entered = span.enter();
        let started = Instant::now();

        for hook in &self.before {
            hook(tree, options);
        }

        let css = combine_css(files, options.css_inline.as_deref(), options.css_minify);
        let key = match &self.cache {
            Some(_) => Some(CacheKey::compute(&normalize(tree)?, options, &css)),
            None => None,
        };

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(markup) = cache.get(key) {
                tracing::debug!(bytes = markup.len(), "render cache hit");
                self.report(&markup, started, true);
                return Ok(markup);
            }
        }

        // One store per call, living on this stack frame only.
        let store = ContextStore::new();
        let nodes = expand(tree, &Scope::new(&store))?;
        debug_assert!(store.is_empty(), "context bindings leaked out of the render");

        let mut markup = inject_styles(&render_nodes(&nodes)?, &options.css_links, &css);
        if options.minify {
            markup = minify_html(&markup);
        }

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, markup.clone());
        }
        tracing::debug!(
            bytes = markup.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "rendered"
        );
        self.report(&markup, started, false);
        Ok(markup)
    }

    fn report(&self, markup: &str, started: Instant, cache_hit: bool) {
        if self.after.is_empty() {
            return;
        }
        let report = RenderReport {
            markup,
            elapsed: started.elapsed(),
            cache_hit,
        };
        for hook in &self.after {
            hook(&report);
        }
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("cache", &self.cache.as_ref().map(|c| c.stats()))
            .field("before_hooks", &self.before.len())
            .field("after_hooks", &self.after.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Render `tree` to markup, loading stylesheets asynchronously.
pub async fn render(tree: &Tree, options: &RenderOptions) -> Result<String> {
    Renderer::new().render(tree, options).await
}

/// Render `tree` to markup without suspending.
pub fn render_sync(tree: &Tree, options: &RenderOptions) -> Result<String> {
    Renderer::new().render_sync(tree, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::tree::Props;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page() -> Tree {
        Tree::element(
            "html",
            Props::new()
                .child(Tree::element("head", Props::new().child(Tree::element("title", Props::new().text("t")))))
                .child(Tree::element("body", Props::new().child(Tree::element("p", Props::new().text("hi"))))),
        )
    }

    #[test]
    fn sync_render_with_links_and_inline_css() {
        let opts = RenderOptions::new()
            .with_css_link("/a.css")
            .with_css_inline("p { color: red; }")
            .with_css_minify(true);
        let html = render_sync(&page(), &opts).unwrap();
        assert_eq!(
            html,
            "<html><head><title>t</title><link rel=\"stylesheet\" href=\"/a.css\"><style>p{color:red}</style></head><body><p>hi</p></body></html>"
        );
    }

    #[test]
    fn sync_render_rejects_css_files() {
        let opts = RenderOptions::new().with_css_file("missing.css");
        let err = render_sync(&page(), &opts).unwrap_err();
        assert!(matches!(err, CoherentError::AsyncOnlyOption("css_files")));
    }

    #[test]
    fn cache_serves_repeat_renders() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let counted = Component::function("Counted", move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(Tree::element("b", Props::new().text("x")))
        });
        let renderer = Renderer::new().with_cache(Arc::new(RenderCache::new(8, None)));
        let tree = counted.node(Props::new());
        let a = renderer.render_sync(&tree, &RenderOptions::default()).unwrap();
        let b = renderer.render_sync(&tree, &RenderOptions::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = renderer.cache().unwrap().stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
    }

    #[test]
    fn cache_hits_for_equivalent_trees() {
        let renderer = Renderer::new().with_cache(Arc::new(RenderCache::new(8, None)));
        let plain = Tree::element("label", Props::new().class("x").set("for", "name"));
        let aliased = Tree::element(
            "label",
            Props::new().set("className", "x").set("htmlFor", "name").child(false),
        );
        let a = renderer.render_sync(&plain, &RenderOptions::default()).unwrap();
        let b = renderer.render_sync(&aliased, &RenderOptions::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(renderer.cache().unwrap().stats().hits, 1);
    }

    #[test]
    fn hooks_observe_renders() {
        let before = Arc::new(AtomicUsize::new(0));
        let hits = Arc::new(AtomicUsize::new(0));
        let (b, h) = (Arc::clone(&before), Arc::clone(&hits));
        let renderer = Renderer::new()
            .with_cache(Arc::new(RenderCache::default()))
            .on_before_render(move |_, _| {
                b.fetch_add(1, Ordering::SeqCst);
            })
            .on_after_render(move |report| {
                if report.cache_hit {
                    h.fetch_add(1, Ordering::SeqCst);
                }
            });
        let tree = Tree::tag("hr");
        renderer.render_sync(&tree, &RenderOptions::default()).unwrap();
        renderer.render_sync(&tree, &RenderOptions::default()).unwrap();
        assert_eq!(before.load(Ordering::SeqCst), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn minify_and_css_minify_are_independent() {
        let tree = Tree::element("div", Props::new().child("  ").child(Tree::tag("span")));
        let opts = RenderOptions::new().with_css_inline("a {  b: c; }").with_minify(true);
        let html = render_sync(&tree, &opts).unwrap();
        assert_eq!(html, "<style>a {  b: c; }</style><div><span></span></div>");
    }

    #[tokio::test]
    async fn async_render_reads_files_in_order() {
        let dir = std::env::temp_dir().join(format!("coherent-render-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let first = dir.join("first.css");
        let second = dir.join("second.css");
        tokio::fs::write(&first, "a{x:1}").await.unwrap();
        tokio::fs::write(&second, "b{y:2}").await.unwrap();

        let opts = RenderOptions::new()
            .with_css_file(&first)
            .with_css_file(&second)
            .with_css_inline("c{z:3}");
        let html = render(&Tree::tag("main"), &opts).await.unwrap();
        assert_eq!(html, "<style>a{x:1}\nb{y:2}\nc{z:3}</style><main></main>");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_stylesheet_is_reported() {
        let opts = RenderOptions::new().with_css_file("/definitely/not/here.css");
        let err = render(&Tree::tag("main"), &opts).await.unwrap_err();
        assert!(matches!(err, CoherentError::Stylesheet { .. }));
    }
}
