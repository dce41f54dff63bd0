//! # coherent
//!
//! Plain object trees rendered to HTML on the server and hydrated on the
//! client with targeted DOM patches.
//!
//! A UI is described as nested [`Tree`] values: one-key nodes whose key is a
//! tag or a [`Component`] and whose value is a [`Props`] bag. The same tree is
//! serialized to markup by the renderer and matched against that markup by
//! the hydration engine, which then applies state changes as direct patches
//! instead of re-rendering.
//!
//! ## Core Systems
//!
//! - **[`tree`]**: raw trees, props, canonical nodes, normalization
//! - **[`context`]**: per-call context store and render scope
//! - **[`component`]**: components, decorators, state containers, error boundaries
//! - **[`render`]**: sync/async HTML renderer, stylesheet injection, minification, cache
//! - **[`dom`]**: slotmap-backed document with a markup parser, selectors and events
//! - **[`hydrate`]**: positional matching, event wiring, patch rules, keyed lists, bootstrap
//! - **[`testing`]**: headless pilot and snapshot helpers
//! - **[`error`]**: error taxonomy and diagnostics

// Foundation
pub mod error;
pub mod tree;

// Composition
pub mod component;
pub mod context;

// Server side
pub mod render;

// Client side
pub mod dom;
pub mod hydrate;

// Test support
pub mod testing;

pub use component::{
    create_error_boundary, BoundaryOptions, Component, Decorator, ErrorBoundary, Render,
    StateContainer,
};
pub use context::{ContextStore, Scope};
pub use dom::Document;
pub use error::{CoherentError, Result};
pub use hydrate::{
    auto_hydrate, hydrate, hydrate_all, hydrate_by_selector, hydrate_with, make_hydratable,
    EventContext, HydratableOptions, HydrateOptions, HydratedInstance, HydrationRegistry,
    HydrationReport,
};
pub use render::{render, render_sync, RenderCache, RenderOptions, Renderer};
pub use tree::{Props, Tree};

// Proc macros (feature-gated)
#[cfg(feature = "macros")]
pub use coherent_macros::view;
