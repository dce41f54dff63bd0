//! Components: one `invoke` contract over function and object components.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::boundary::{BoundaryOptions, ErrorBoundary};
use super::decorator::{compose, Decorator};
use crate::context::Scope;
use crate::error::Result;
use crate::tree::{Props, Tree};

/// Signature of a function component.
pub type RenderFn = dyn Fn(&Props, &Scope<'_>) -> Result<Tree> + Send + Sync;

/// An object component: anything that can render props into a tree.
pub trait Render: Send + Sync {
    /// Produce the tree for `props`.
    fn render(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree>;

    /// Display name used in diagnostics and hydration markers.
    fn name(&self) -> &str;
}

/// A named closure.
#[derive(Clone)]
pub struct FunctionComponent {
    name: Arc<str>,
    func: Arc<RenderFn>,
}

/// A component reference usable as a node key.
#[derive(Clone)]
pub enum Component {
    Function(FunctionComponent),
    Object(Arc<dyn Render>),
}

impl Component {
    /// Wrap a closure.
    pub fn function<F>(name: impl AsRef<str>, func: F) -> Self
    where
        F: Fn(&Props, &Scope<'_>) -> Result<Tree> + Send + Sync + 'static,
    {
        Self::Function(FunctionComponent {
            name: Arc::from(name.as_ref()),
            func: Arc::new(func),
        })
    }

    /// Wrap an object component.
    pub fn object<R: Render + 'static>(component: R) -> Self {
        Self::Object(Arc::new(component))
    }

    /// Wrap an already shared object component.
    pub fn from_arc(component: Arc<dyn Render>) -> Self {
        Self::Object(component)
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Function(f) => &f.name,
            Self::Object(o) => o.name(),
        }
    }

    /// Render `props`, recording the component on the scope's component stack.
    pub fn invoke(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        let _entered = scope.store().enter_component(self.name());
        match self {
            Self::Function(f) => (f.func)(props, scope),
            Self::Object(o) => o.render(props, scope),
        }
    }

    /// Address of the shared implementation; equal for clones of one component.
    pub fn identity(&self) -> usize {
        match self {
            Self::Function(f) => Arc::as_ptr(&f.func) as *const () as usize,
            Self::Object(o) => Arc::as_ptr(o) as *const () as usize,
        }
    }

    /// Whether both references share an implementation.
    pub fn same_as(&self, other: &Component) -> bool {
        self.identity() == other.identity()
    }

    /// A node invoking this component with `props`.
    pub fn node(&self, props: Props) -> Tree {
        Tree::component(self.clone(), props)
    }

    /// Apply decorators; the first one is outermost.
    pub fn decorate(self, decorators: impl IntoIterator<Item = Decorator>) -> Self {
        compose(self, decorators)
    }

    /// Shorthand for `decorate([Decorator::with_state(initial)])`.
    pub fn with_state(self, initial: Value) -> Self {
        self.decorate([Decorator::with_state(initial)])
    }

    /// Wrap in an error boundary.
    pub fn with_error_boundary(self, options: BoundaryOptions) -> Self {
        Self::object(ErrorBoundary::new(self, options))
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Function(_) => "Function",
            Self::Object(_) => "Object",
        };
        write!(f, "Component::{kind}({})", self.name())
    }
}
