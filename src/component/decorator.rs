//! Decorators as data, folded into wrapper components at composition time.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::boundary::{BoundaryOptions, ErrorBoundary};
use super::component::{Component, Render};
use super::state::StateContainer;
use crate::context::Scope;
use crate::error::Result;
use crate::tree::{Props, Tree};

/// The wrapped component's invocation, handed to custom decorators.
pub type Next<'a> = &'a dyn Fn(&Props, &Scope<'_>) -> Result<Tree>;

/// Signature of a custom decorator.
pub type WrapFn = dyn Fn(&Props, &Scope<'_>, Next<'_>) -> Result<Tree> + Send + Sync;

/// One higher-order transform.
#[derive(Clone)]
pub enum Decorator {
    /// Inject a state container seeded with these values.
    WithState(Map<String, Value>),
    /// Contain failures of the wrapped component.
    Boundary(BoundaryOptions),
    /// Arbitrary wrapper around the inner invocation.
    Custom { name: String, wrap: Arc<WrapFn> },
}

impl Decorator {
    /// State decorator. A non-object `initial` starts with empty state.
    pub fn with_state(initial: Value) -> Self {
        match initial {
            Value::Object(map) => Self::WithState(map),
            _ => Self::WithState(Map::new()),
        }
    }

    /// Error-boundary decorator.
    pub fn boundary(options: BoundaryOptions) -> Self {
        Self::Boundary(options)
    }

    /// Custom decorator.
    pub fn custom<F>(name: impl Into<String>, wrap: F) -> Self
    where
        F: Fn(&Props, &Scope<'_>, Next<'_>) -> Result<Tree> + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            wrap: Arc::new(wrap),
        }
    }

    fn apply(self, inner: Component) -> Component {
        match self {
            Self::WithState(initial) => Component::object(StateDecorated { inner, initial }),
            Self::Boundary(options) => Component::object(ErrorBoundary::new(inner, options)),
            Self::Custom { name, wrap } => {
                let name = format!("{name}({})", inner.name());
                Component::object(CustomDecorated { inner, name, wrap })
            }
        }
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithState(initial) => f.debug_tuple("WithState").field(initial).finish(),
            Self::Boundary(options) => f.debug_tuple("Boundary").field(options).finish(),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

/// Fold `decorators` around `component`. The first decorator is outermost.
pub fn compose(component: Component, decorators: impl IntoIterator<Item = Decorator>) -> Component {
    let decorators: Vec<Decorator> = decorators.into_iter().collect();
    decorators
        .into_iter()
        .rev()
        .fold(component, |inner, decorator| decorator.apply(inner))
}

// ---------------------------------------------------------------------------
// Wrappers
// ---------------------------------------------------------------------------

struct StateDecorated {
    inner: Component,
    initial: Map<String, Value>,
}

impl Render for StateDecorated {
    fn render(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        // A hydrated instance offers its long-lived container; otherwise the
        // container lives for this call only.
        let state = match scope.offered_state() {
            Some(state) => {
                state.seed(&self.initial);
                state.clone()
            }
            None => StateContainer::from_map(self.initial.clone()),
        };
        let props = props.clone().with_state(state);
        self.inner.invoke(&props, &scope.without_state())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

struct CustomDecorated {
    inner: Component,
    name: String,
    wrap: Arc<WrapFn>,
}

impl Render for CustomDecorated {
    fn render(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        let next: Next<'_> = &|props, scope| self.inner.invoke(props, scope);
        (self.wrap)(props, scope, next)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextStore;
    use crate::tree::{normalize, VNode};
    use serde_json::json;
    use std::sync::Mutex;

    fn text_of(tree: &Tree) -> String {
        let nodes = normalize(tree).unwrap();
        match &nodes[0] {
            VNode::Element(e) => match &e.inner {
                Some(crate::tree::Inner::Text(t)) => t.clone(),
                _ => String::new(),
            },
            _ => String::new(),
        }
    }

    #[test]
    fn first_decorator_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tracer = |label: &'static str, log: Arc<Mutex<Vec<String>>>| {
            Decorator::custom(label, move |props, scope, next| {
                log.lock().unwrap().push(format!("enter {label}"));
                let out = next(props, scope);
                log.lock().unwrap().push(format!("exit {label}"));
                out
            })
        };
        let base = Component::function("Base", |_, _| Ok(Tree::Empty));
        let composed = compose(
            base,
            [tracer("outer", Arc::clone(&log)), tracer("inner", Arc::clone(&log))],
        );
        let store = ContextStore::new();
        composed.invoke(&Props::new(), &Scope::new(&store)).unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["enter outer", "enter inner", "exit inner", "exit outer"]
        );
        assert_eq!(composed.name(), "outer(inner(Base))");
    }

    #[test]
    fn with_state_injects_fresh_container_per_call() {
        let counter = Component::function("Counter", |props, _| {
            let state = props.state().expect("state injected");
            let n = state.get_key("count").and_then(|v| v.as_i64()).unwrap_or(-1);
            state.set(json!({ "count": n + 1 }))?;
            Ok(Tree::element("span", Props::new().text(n.to_string())))
        })
        .with_state(json!({ "count": 0 }));

        let store = ContextStore::new();
        let scope = Scope::new(&store);
        let first = counter.invoke(&Props::new(), &scope).unwrap();
        let second = counter.invoke(&Props::new(), &scope).unwrap();
        assert_eq!(text_of(&first), "0");
        assert_eq!(text_of(&second), "0");
    }

    #[test]
    fn with_state_adopts_offered_container() {
        let counter = Component::function("Counter", |props, _| {
            let n = props.state_value("count").unwrap_or(Value::Null);
            Ok(Tree::element("span", Props::new().text(n.to_string())))
        })
        .with_state(json!({ "count": 0, "step": 1 }));

        let live = StateContainer::from_value(json!({ "count": 7 }));
        let store = ContextStore::new();
        let scope = Scope::client(&store);
        let tree = counter.invoke(&Props::new(), &scope.with_state(&live)).unwrap();
        assert_eq!(text_of(&tree), "7");
        assert_eq!(live.get(), json!({ "count": 7, "step": 1 }));
    }

    #[test]
    fn custom_decorator_can_rewrite_props() {
        let echo = Component::function("Echo", |props, _| {
            Ok(Tree::element("p", Props::new().text(props.get_str("msg").unwrap_or(""))))
        })
        .decorate([Decorator::custom("Shout", |props, scope, next| {
            let loud = props.get_str("msg").unwrap_or("").to_uppercase();
            next(&props.clone().set("msg", loud), scope)
        })]);
        let store = ContextStore::new();
        let tree = echo
            .invoke(&Props::new().set("msg", "hi"), &Scope::new(&store))
            .unwrap();
        assert_eq!(text_of(&tree), "HI");
    }
}
