//! Component composition: invocation, decorators, state, boundaries, expansion.

pub mod boundary;
#[allow(clippy::module_inception)]
pub mod component;
pub mod decorator;
pub mod expand;
pub mod state;

pub use boundary::{
    create_error_boundary, global_error_boundary, with_error_boundaries, BoundaryOptions,
    ErrorBoundary, ErrorBoundaryState, ErrorInfo, Fallback, RetryPolicy, RetryToken,
};
pub use component::{Component, FunctionComponent, Render, RenderFn};
pub use decorator::{compose, Decorator, Next};
pub use expand::{expand, expand_at};
pub use state::{StateContainer, SubscriptionId};
