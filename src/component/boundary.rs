//! Error boundaries: contain failures of a subtree and render a fallback.
//!
//! A boundary moves between two states:
//!
//! - **Normal**: the wrapped component is invoked and its subtree expanded
//!   inside a guard. An error (or panic) anywhere below is captured.
//! - **Errored**: the fallback is rendered instead of the component, until
//!   `reset()` is called, a `reset_keys` prop differs from the snapshot taken
//!   when the error happened, or a retry attempt succeeds.
//!
//! Retries are bounded by [`RetryPolicy::max_attempts`]. With a zero delay
//! the boundary retries inline within the failing render; otherwise the first
//! render after the delay (or after [`RetryToken::retry`]) makes the attempt.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use super::component::{Component, Render};
use super::expand::expand;
use crate::context::Scope;
use crate::error::{CoherentError, Result};
use crate::tree::{Props, Tree};

/// Builds the fallback tree from the captured failure.
pub type FallbackFn = dyn Fn(&CoherentError, &ErrorInfo, &RetryToken) -> Tree + Send + Sync;

/// Observes captured failures. Its own errors and panics are logged, never propagated.
pub type ErrorHook = dyn Fn(&CoherentError, &ErrorInfo) -> Result<()> + Send + Sync;

/// Class of the default fallback element.
pub const FALLBACK_CLASS: &str = "coherent-error-boundary";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// What an errored boundary renders.
#[derive(Clone, Default)]
pub enum Fallback {
    /// A minimal alert marker.
    #[default]
    Default,
    /// A fixed tree.
    Tree(Tree),
    /// A tree computed from the failure.
    Render(Arc<FallbackFn>),
}

impl Fallback {
    /// The built-in fallback tree.
    pub fn default_tree() -> Tree {
        Tree::element(
            "div",
            Props::new()
                .class(FALLBACK_CLASS)
                .set("data-error-boundary", "true")
                .set("role", "alert")
                .text("Something went wrong."),
        )
    }

    fn build(&self, error: &CoherentError, info: &ErrorInfo, token: &RetryToken) -> Tree {
        match self {
            Self::Default => Self::default_tree(),
            Self::Tree(tree) => tree.clone(),
            Self::Render(render) => render(error, info, token),
        }
    }
}

impl fmt::Debug for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Tree(tree) => f.debug_tuple("Tree").field(tree).finish(),
            Self::Render(_) => f.write_str("Render(..)"),
        }
    }
}

/// Retry behaviour of an errored boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Retries enabled with the given attempt budget and no delay.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            enabled: true,
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    /// Set the delay between attempts (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Configuration for [`create_error_boundary`].
#[derive(Clone, Default)]
pub struct BoundaryOptions {
    pub fallback: Fallback,
    pub on_error: Option<Arc<ErrorHook>>,
    pub retry: RetryPolicy,
    pub reset_keys: Vec<String>,
}

impl BoundaryOptions {
    /// Default options: built-in fallback, no hook, no retries, no reset keys.
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a fixed tree when errored.
    pub fn with_fallback_tree(mut self, tree: Tree) -> Self {
        self.fallback = Fallback::Tree(tree);
        self
    }

    /// Compute the fallback from the failure.
    pub fn with_fallback<F>(mut self, render: F) -> Self
    where
        F: Fn(&CoherentError, &ErrorInfo, &RetryToken) -> Tree + Send + Sync + 'static,
    {
        self.fallback = Fallback::Render(Arc::new(render));
        self
    }

    /// Observe failures.
    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CoherentError, &ErrorInfo) -> Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Props whose change clears the errored state.
    pub fn with_reset_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl fmt::Debug for BoundaryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundaryOptions")
            .field("fallback", &self.fallback)
            .field("on_error", &self.on_error.is_some())
            .field("retry", &self.retry)
            .field("reset_keys", &self.reset_keys)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Context captured with a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Data props at the time of the failure.
    pub props_snapshot: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Components being invoked when the failure was captured, outermost first.
    pub pseudo_stack: Vec<String>,
}

/// Observable state of a boundary.
#[derive(Debug, Clone, Default)]
pub struct ErrorBoundaryState {
    pub has_error: bool,
    pub error: Option<Arc<CoherentError>>,
    pub error_info: Option<ErrorInfo>,
    /// Retry attempts made since the boundary last left the Normal state.
    pub attempt_count: u32,
    /// Values of the reset keys when the error was captured.
    pub reset_keys_snapshot: Vec<(String, Option<Value>)>,
    errored_at: Option<Instant>,
}

/// Handed to fallbacks: which attempt this is, and a way to ask for another.
#[derive(Debug, Clone)]
pub struct RetryToken {
    attempt: u32,
    max_attempts: u32,
    enabled: bool,
    requested: Arc<AtomicBool>,
}

impl RetryToken {
    /// Attempts made so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether another attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.enabled && self.attempt < self.max_attempts
    }

    /// Request an attempt on the next render, skipping the remaining delay.
    pub fn retry(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ErrorBoundary
// ---------------------------------------------------------------------------

struct BoundaryInner {
    component: Component,
    options: BoundaryOptions,
    name: String,
    state: Mutex<ErrorBoundaryState>,
    retry_requested: Arc<AtomicBool>,
}

/// A component wrapper that contains failures of its subtree.
///
/// Clones share state.
#[derive(Clone)]
pub struct ErrorBoundary {
    inner: Arc<BoundaryInner>,
}

enum Plan {
    Invoke,
    Fallback,
}

impl ErrorBoundary {
    /// Wrap `component`.
    pub fn new(component: Component, options: BoundaryOptions) -> Self {
        Self::named(format!("ErrorBoundary({})", component.name()), component, options)
    }

    fn named(name: String, component: Component, options: BoundaryOptions) -> Self {
        Self {
            inner: Arc::new(BoundaryInner {
                component,
                options,
                name,
                state: Mutex::new(ErrorBoundaryState::default()),
                retry_requested: Arc::new(AtomicBool::new(false)),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ErrorBoundaryState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the boundary is in the Errored state.
    pub fn has_error(&self) -> bool {
        self.lock().has_error
    }

    /// Return to the Normal state.
    pub fn reset(&self) {
        *self.lock() = ErrorBoundaryState::default();
        self.inner.retry_requested.store(false, Ordering::SeqCst);
        tracing::debug!(boundary = %self.inner.name, "boundary reset");
    }

    /// Snapshot of the current state.
    pub fn error_state(&self) -> ErrorBoundaryState {
        self.lock().clone()
    }

    /// A token for requesting a retry from outside a fallback.
    pub fn retry_token(&self) -> RetryToken {
        let state = self.lock();
        self.token(&state)
    }

    /// This boundary as a component.
    pub fn component(&self) -> Component {
        Component::object(self.clone())
    }

    /// The wrapped component.
    pub fn wrapped(&self) -> &Component {
        &self.inner.component
    }

    fn token(&self, state: &ErrorBoundaryState) -> RetryToken {
        let retry = self.inner.options.retry;
        RetryToken {
            attempt: state.attempt_count,
            max_attempts: retry.max_attempts,
            enabled: retry.enabled,
            requested: Arc::clone(&self.inner.retry_requested),
        }
    }

    /// Decide whether this render invokes the component or shows the fallback.
    fn plan(&self, props: &Props) -> Plan {
        let mut state = self.lock();
        if !state.has_error {
            return Plan::Invoke;
        }

        let keys_changed = state
            .reset_keys_snapshot
            .iter()
            .any(|(key, before)| props.get(key) != before.as_ref());
        if keys_changed {
            tracing::debug!(boundary = %self.inner.name, "reset key changed, leaving errored state");
            *state = ErrorBoundaryState::default();
            self.inner.retry_requested.store(false, Ordering::SeqCst);
            return Plan::Invoke;
        }

        let retry = self.inner.options.retry;
        if retry.enabled && state.attempt_count < retry.max_attempts {
            let requested = self.inner.retry_requested.swap(false, Ordering::SeqCst);
            let elapsed = state
                .errored_at
                .is_some_and(|at| at.elapsed() >= retry.delay);
            if requested || elapsed {
                state.attempt_count += 1;
                tracing::debug!(
                    boundary = %self.inner.name,
                    attempt = state.attempt_count,
                    "retrying after failure"
                );
                return Plan::Invoke;
            }
        }
        Plan::Fallback
    }

    /// Invoke and expand the wrapped component, converting panics to errors.
    fn guarded(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let tree = self.inner.component.invoke(props, scope)?;
            expand(&tree, scope).map(Tree::Resolved)
        }));
        match outcome {
            Ok(result) => result,
            Err(payload) => Err(CoherentError::component(
                self.inner.component.name(),
                format!("panicked: {}", panic_message(payload.as_ref())),
            )),
        }
    }

    fn record_failure(&self, error: CoherentError, props: &Props, scope: &Scope<'_>) {
        let mut pseudo_stack = scope.store().component_stack();
        pseudo_stack.push(self.inner.component.name().to_owned());
        let info = ErrorInfo {
            props_snapshot: props.values_json(),
            timestamp: unix_millis(),
            pseudo_stack,
        };
        tracing::warn!(
            boundary = %self.inner.name,
            error = %error,
            "component failed, rendering fallback"
        );

        let error = Arc::new(error);
        {
            let mut state = self.lock();
            if !state.has_error {
                state.attempt_count = 0;
            }
            state.has_error = true;
            state.error = Some(Arc::clone(&error));
            state.error_info = Some(info.clone());
            state.errored_at = Some(Instant::now());
            state.reset_keys_snapshot = self
                .inner
                .options
                .reset_keys
                .iter()
                .map(|key| (key.clone(), props.get(key).cloned()))
                .collect();
        }

        if let Some(hook) = &self.inner.options.on_error {
            match panic::catch_unwind(AssertUnwindSafe(|| hook(error.as_ref(), &info))) {
                Ok(Ok(())) => {}
                Ok(Err(hook_error)) => {
                    tracing::error!(boundary = %self.inner.name, error = %hook_error, "on_error hook failed");
                }
                Err(payload) => {
                    tracing::error!(
                        boundary = %self.inner.name,
                        panic = %panic_message(payload.as_ref()),
                        "on_error hook panicked"
                    );
                }
            }
        }
    }

    fn inline_retry_allowed(&self) -> bool {
        let retry = self.inner.options.retry;
        if !retry.enabled || !retry.delay.is_zero() {
            return false;
        }
        let mut state = self.lock();
        if state.attempt_count >= retry.max_attempts {
            return false;
        }
        state.attempt_count += 1;
        true
    }

    fn fallback(&self) -> Tree {
        let state = self.lock().clone();
        let token = self.token(&state);
        let (Some(error), Some(info)) = (state.error.as_deref(), state.error_info.as_ref()) else {
            return Fallback::default_tree();
        };
        self.inner.options.fallback.build(error, info, &token)
    }
}

impl Render for ErrorBoundary {
    fn render(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        if let Plan::Fallback = self.plan(props) {
            return Ok(self.fallback());
        }
        loop {
            match self.guarded(props, scope) {
                Ok(tree) => {
                    let mut state = self.lock();
                    if state.has_error {
                        tracing::debug!(boundary = %self.inner.name, "recovered");
                    }
                    state.has_error = false;
                    state.error = None;
                    state.error_info = None;
                    state.errored_at = None;
                    state.reset_keys_snapshot.clear();
                    return Ok(tree);
                }
                Err(error) => {
                    self.record_failure(error, props, scope);
                    if !self.inline_retry_allowed() {
                        return Ok(self.fallback());
                    }
                }
            }
        }
    }

    fn name(&self) -> &str {
        &self.inner.name
    }
}

impl fmt::Debug for ErrorBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorBoundary")
            .field("name", &self.inner.name)
            .field("state", &*self.lock())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Wrap `component` in a boundary.
pub fn create_error_boundary(component: Component, options: BoundaryOptions) -> ErrorBoundary {
    ErrorBoundary::new(component, options)
}

/// Wrap every component of a name map, sharing `options`.
pub fn with_error_boundaries(
    components: BTreeMap<String, Component>,
    options: &BoundaryOptions,
) -> BTreeMap<String, ErrorBoundary> {
    components
        .into_iter()
        .map(|(name, component)| {
            let boundary = ErrorBoundary::new(component, options.clone());
            (name, boundary)
        })
        .collect()
}

/// Wrap the application root.
pub fn global_error_boundary(root: Component, options: BoundaryOptions) -> ErrorBoundary {
    ErrorBoundary::named(format!("GlobalErrorBoundary({})", root.name()), root, options)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::tree::{normalize, Inner, VNode};
    use std::sync::atomic::AtomicU32;

    fn render(boundary: &ErrorBoundary, props: &Props) -> Vec<VNode> {
        let store = ContextStore::new();
        let tree = boundary.render(props, &Scope::new(&store)).unwrap();
        normalize(&tree).unwrap()
    }

    fn text(nodes: &[VNode]) -> String {
        match nodes[0].as_element().and_then(|e| e.inner.clone()) {
            Some(Inner::Text(t)) => t,
            _ => String::new(),
        }
    }

    fn flaky(fail_first: u32) -> (Component, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&calls);
        let component = Component::function("Flaky", move |_, _| {
            let n = seen.fetch_add(1, Ordering::SeqCst);
            if n < fail_first {
                Err(CoherentError::component("Flaky", format!("call {n} failed")))
            } else {
                Ok(Tree::element("p", Props::new().text("ok")))
            }
        });
        (component, calls)
    }

    #[test]
    fn failure_renders_default_fallback() {
        let (component, _) = flaky(u32::MAX);
        let boundary = create_error_boundary(component, BoundaryOptions::new());
        let nodes = render(&boundary, &Props::new());
        let el = nodes[0].as_element().unwrap();
        assert_eq!(el.attr("class").and_then(|v| v.as_str()), Some(FALLBACK_CLASS));
        assert!(boundary.has_error());
        let state = boundary.error_state();
        assert_eq!(state.error_info.unwrap().pseudo_stack, vec!["Flaky"]);
    }

    #[test]
    fn errored_boundary_does_not_reinvoke() {
        let (component, calls) = flaky(1);
        let boundary = create_error_boundary(component, BoundaryOptions::new());
        render(&boundary, &Props::new());
        render(&boundary, &Props::new());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        boundary.reset();
        assert_eq!(text(&render(&boundary, &Props::new())), "ok");
    }

    #[test]
    fn zero_delay_retry_recovers_inline() {
        let (component, calls) = flaky(1);
        let boundary = create_error_boundary(
            component,
            BoundaryOptions::new().with_retry(RetryPolicy::attempts(3)),
        );
        assert_eq!(text(&render(&boundary, &Props::new())), "ok");
        assert!(!boundary.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(boundary.error_state().attempt_count <= 3);
    }

    #[test]
    fn retries_stop_at_max_attempts() {
        let (component, calls) = flaky(u32::MAX);
        let boundary = create_error_boundary(
            component,
            BoundaryOptions::new().with_retry(RetryPolicy::attempts(2)),
        );
        render(&boundary, &Props::new());
        render(&boundary, &Props::new());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(boundary.error_state().attempt_count, 2);
    }

    #[test]
    fn delayed_retry_waits_for_token() {
        let (component, _) = flaky(1);
        let boundary = create_error_boundary(
            component,
            BoundaryOptions::new()
                .with_retry(RetryPolicy::attempts(3).with_delay(Duration::from_secs(3600)))
                .with_fallback(|_, _, token| {
                    Tree::element("p", Props::new().text(format!("attempt {}", token.attempt())))
                }),
        );
        assert_eq!(text(&render(&boundary, &Props::new())), "attempt 0");
        assert_eq!(text(&render(&boundary, &Props::new())), "attempt 0");
        boundary.retry_token().retry();
        assert_eq!(text(&render(&boundary, &Props::new())), "ok");
        assert_eq!(boundary.error_state().attempt_count, 1);
    }

    #[test]
    fn reset_keys_clear_only_on_change() {
        let (component, calls) = flaky(1);
        let boundary = create_error_boundary(
            component,
            BoundaryOptions::new().with_reset_keys(["k"]),
        );
        render(&boundary, &Props::new().set("k", 1));
        assert!(boundary.has_error());
        render(&boundary, &Props::new().set("k", 1));
        assert!(boundary.has_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(text(&render(&boundary, &Props::new().set("k", 2))), "ok");
        assert!(!boundary.has_error());
    }

    #[test]
    fn panics_are_contained() {
        let component = Component::function("Panicky", |_, _| -> Result<Tree> {
            panic!("kaboom");
        });
        let boundary = create_error_boundary(component, BoundaryOptions::new());
        render(&boundary, &Props::new());
        let error = boundary.error_state().error.unwrap();
        assert!(error.to_string().contains("kaboom"));
    }

    #[test]
    fn failing_on_error_hook_is_swallowed() {
        let (component, _) = flaky(u32::MAX);
        let boundary = create_error_boundary(
            component,
            BoundaryOptions::new().on_error(|_, _| Err(CoherentError::Usage("hook broke".into()))),
        );
        let nodes = render(&boundary, &Props::new());
        assert_eq!(text(&nodes), "Something went wrong.");
    }

    #[test]
    fn failures_below_the_wrapped_component_are_contained() {
        let child = Component::function("Child", |_, _| Err(CoherentError::component("Child", "nope")));
        let parent = Component::function("Parent", move |_, _| {
            Ok(Tree::element("section", Props::new().child(child.node(Props::new()))))
        });
        let boundary = create_error_boundary(parent, BoundaryOptions::new());
        let nodes = render(&boundary, &Props::new());
        assert_eq!(text(&nodes), "Something went wrong.");
    }

    #[test]
    fn bulk_helpers_wrap_each_component() {
        let mut map = BTreeMap::new();
        map.insert("a".to_owned(), flaky(0).0);
        map.insert("b".to_owned(), flaky(0).0);
        let wrapped = with_error_boundaries(map, &BoundaryOptions::new());
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped["a"].name(), "ErrorBoundary(Flaky)");
        let global = global_error_boundary(flaky(0).0, BoundaryOptions::new());
        assert_eq!(global.name(), "GlobalErrorBoundary(Flaky)");
    }
}
