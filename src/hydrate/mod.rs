//! Client hydration: match server markup, wire events, patch on state change.

pub mod bootstrap;
pub mod engine;
pub mod patch;

pub use bootstrap::{
    auto_hydrate, make_hydratable, Hydratable, HydratableOptions, HydrationDescriptor,
    HydrationRegistry, COMPONENT_ATTR, DESCRIPTOR_ATTR,
};
pub use engine::{
    hydrate, hydrate_all, hydrate_by_selector, hydrate_with, EventContext, HydrateOptions,
    HydratedInstance, HydrationReport, Mismatch,
};
pub use patch::{display_value, ListBinding, ListItem, PatchRule, PatchTable, PatchTarget, Target};
