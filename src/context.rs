//! Call-scoped context store and the render scope handed to components.
//!
//! A [`ContextStore`] is created for each top-level render (or hydration) and
//! lives on that call's stack. Bindings are pushed with
//! [`ContextStore::provide`], which returns a guard that pops the binding when
//! dropped, so the store unwinds on every exit path, including errors and
//! panics.

use std::cell::RefCell;
use std::fmt;

use serde_json::Value;

use crate::component::state::StateContainer;

// ---------------------------------------------------------------------------
// ContextStore
// ---------------------------------------------------------------------------

/// LIFO stack of context bindings plus the stack of components being invoked.
#[derive(Debug, Default)]
pub struct ContextStore {
    bindings: RefCell<Vec<(String, Value)>>,
    components: RefCell<Vec<String>>,
}

impl ContextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a binding. It stays visible until the returned guard is dropped.
    #[must_use = "the binding is popped as soon as the guard is dropped"]
    pub fn provide(&self, key: impl Into<String>, value: Value) -> ContextGuard<'_> {
        let mut bindings = self.bindings.borrow_mut();
        let depth = bindings.len();
        bindings.push((key.into(), value));
        ContextGuard { store: self, depth }
    }

    /// Innermost binding for `key`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        self.bindings
            .borrow()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Number of active bindings.
    pub fn depth(&self) -> usize {
        self.bindings.borrow().len()
    }

    /// Whether no binding is active.
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Record that `name` is being invoked until the guard drops.
    pub(crate) fn enter_component(&self, name: &str) -> ComponentGuard<'_> {
        let mut components = self.components.borrow_mut();
        let depth = components.len();
        components.push(name.to_owned());
        ComponentGuard { store: self, depth }
    }

    /// Names of the components currently being invoked, outermost first.
    pub fn component_stack(&self) -> Vec<String> {
        self.components.borrow().clone()
    }
}

/// Pops a context binding on drop.
pub struct ContextGuard<'a> {
    store: &'a ContextStore,
    depth: usize,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.store.bindings.borrow_mut().truncate(self.depth);
    }
}

impl fmt::Debug for ContextGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard").field("depth", &self.depth).finish()
    }
}

/// Pops a component-stack entry on drop.
pub(crate) struct ComponentGuard<'a> {
    store: &'a ContextStore,
    depth: usize,
}

impl Drop for ComponentGuard<'_> {
    fn drop(&mut self) {
        self.store.components.borrow_mut().truncate(self.depth);
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which side of the wire a tree is being computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// String emission.
    Server,
    /// Hydration / client-side rebuilds.
    Client,
}

/// What a component can see while it renders.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    store: &'a ContextStore,
    mode: RenderMode,
    state: Option<&'a StateContainer>,
}

impl<'a> Scope<'a> {
    /// Server-side scope over `store`.
    pub fn new(store: &'a ContextStore) -> Self {
        Self {
            store,
            mode: RenderMode::Server,
            state: None,
        }
    }

    /// Client-side scope over `store`.
    pub fn client(store: &'a ContextStore) -> Self {
        Self {
            store,
            mode: RenderMode::Client,
            state: None,
        }
    }

    /// The render mode.
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Whether this is a client-side computation.
    pub fn is_client(&self) -> bool {
        self.mode == RenderMode::Client
    }

    /// The underlying store.
    pub fn store(&self) -> &'a ContextStore {
        self.store
    }

    /// Innermost binding for `key`, if any.
    pub fn context(&self, key: &str) -> Option<Value> {
        self.store.lookup(key)
    }

    /// Innermost binding for `key`, or `default`.
    pub fn use_context(&self, key: &str, default: impl Into<Value>) -> Value {
        self.store.lookup(key).unwrap_or_else(|| default.into())
    }

    /// The long-lived container offered to the next state decorator.
    pub fn offered_state(&self) -> Option<&'a StateContainer> {
        self.state
    }

    /// A copy of this scope offering `state` to the next state decorator.
    pub fn with_state<'b>(&self, state: &'b StateContainer) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            store: self.store,
            mode: self.mode,
            state: Some(state),
        }
    }

    /// A copy of this scope that offers no state.
    pub fn without_state(&self) -> Self {
        Self {
            state: None,
            ..*self
        }
    }
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("mode", &self.mode)
            .field("depth", &self.store.depth())
            .field("offers_state", &self.state.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_resolves_innermost() {
        let store = ContextStore::new();
        let _outer = store.provide("theme", json!("dark"));
        {
            let _inner = store.provide("theme", json!("light"));
            assert_eq!(store.lookup("theme"), Some(json!("light")));
        }
        assert_eq!(store.lookup("theme"), Some(json!("dark")));
    }

    #[test]
    fn guard_drop_unwinds_to_previous_depth() {
        let store = ContextStore::new();
        {
            let _a = store.provide("a", json!(1));
            let _b = store.provide("b", json!(2));
            assert_eq!(store.depth(), 2);
        }
        assert!(store.is_empty());
    }

    #[test]
    fn unwinds_on_early_return() {
        fn fails(store: &ContextStore) -> Result<(), ()> {
            let _g = store.provide("k", json!(true));
            Err(())
        }
        let store = ContextStore::new();
        assert!(fails(&store).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn use_context_default() {
        let store = ContextStore::new();
        let scope = Scope::new(&store);
        assert_eq!(scope.use_context("missing", "fallback"), json!("fallback"));
    }

    #[test]
    fn shadowing_is_not_overwrite() {
        let store = ContextStore::new();
        let outer = store.provide("user", json!("ada"));
        let inner = store.provide("user", json!("grace"));
        drop(inner);
        assert_eq!(store.lookup("user"), Some(json!("ada")));
        drop(outer);
        assert_eq!(store.lookup("user"), None);
    }

    #[test]
    fn component_stack_tracks_nesting() {
        let store = ContextStore::new();
        let _a = store.enter_component("App");
        {
            let _b = store.enter_component("Button");
            assert_eq!(store.component_stack(), vec!["App", "Button"]);
        }
        assert_eq!(store.component_stack(), vec!["App"]);
    }

    #[test]
    fn scope_modes() {
        let store = ContextStore::new();
        assert!(!Scope::new(&store).is_client());
        assert!(Scope::client(&store).is_client());
    }
}
