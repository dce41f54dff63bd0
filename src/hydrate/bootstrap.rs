//! Server-to-client handoff: hydration markers and automatic hydration.
//!
//! A [`Hydratable`] renders like its component, then stamps the first
//! element with the component name and a JSON descriptor of props and state.
//! [`auto_hydrate`] finds those markers in a document and hydrates each one
//! with the component registered under that name.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::engine::{hydrate_with, HydrateOptions, HydrationReport};
use crate::component::{expand_at, Component, Render, StateContainer};
use crate::context::Scope;
use crate::dom::{Document, NodeId};
use crate::error::{CoherentError, Result};
use crate::tree::{Props, Tree, VNode};

/// Attribute naming the component that rendered an element.
pub const COMPONENT_ATTR: &str = "data-coherent-component";

/// Attribute carrying the [`HydrationDescriptor`] as JSON.
pub const DESCRIPTOR_ATTR: &str = "data-coherent-state";

/// What the client needs to hydrate one marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydrationDescriptor {
    pub component_name: String,
    #[serde(default)]
    pub props: Value,
    #[serde(default)]
    pub initial_state: Value,
}

impl HydrationDescriptor {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Configuration for [`make_hydratable`].
#[derive(Debug, Clone, Default)]
pub struct HydratableOptions {
    /// Registry name; defaults to the component's name.
    pub component_name: Option<String>,
    /// State rendered on the server and handed to the client.
    pub initial_state: Option<Value>,
    /// Options used when the marker is hydrated.
    pub client: HydrateOptions,
}

impl HydratableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.component_name = Some(name.into());
        self
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    pub fn with_client(mut self, client: HydrateOptions) -> Self {
        self.client = client;
        self
    }
}

/// A component whose rendered markup carries a hydration marker.
#[derive(Clone)]
pub struct Hydratable {
    component: Component,
    options: HydratableOptions,
}

/// Wrap `component` so that it can be found and hydrated on the client.
pub fn make_hydratable(component: Component, options: HydratableOptions) -> Hydratable {
    Hydratable { component, options }
}

impl Hydratable {
    pub fn is_hydratable(&self) -> bool {
        true
    }

    /// The registry name.
    pub fn name(&self) -> &str {
        self.options
            .component_name
            .as_deref()
            .unwrap_or_else(|| self.component.name())
    }

    /// The wrapped component.
    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn client_options(&self) -> &HydrateOptions {
        &self.options.client
    }

    /// Descriptor for `props` with the configured initial state.
    ///
    /// Children are carried along so the client rebuilds the same tree. Props
    /// holding handlers or component children cannot be described and fail
    /// with a structure error.
    pub fn hydration_data(&self, props: &Props) -> Result<HydrationDescriptor> {
        Ok(HydrationDescriptor {
            component_name: self.name().to_owned(),
            props: props.to_json()?,
            initial_state: self
                .options
                .initial_state
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
        })
    }

    /// Render the component and mark its first element.
    ///
    /// The descriptor records the state as it stands after rendering, so
    /// defaults filled in by state decorators reach the client too.
    pub fn render_with_hydration(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        let state = StateContainer::from_value(
            self.options
                .initial_state
                .clone()
                .unwrap_or_else(|| Value::Object(Map::new())),
        );
        let scope = scope.with_state(&state);
        let tree = self
            .component
            .invoke(&props.clone().with_state(state.clone()), &scope)?;
        let mut nodes = expand_at(&tree, &format!("$.<{}>", self.name()), &scope)?;

        let descriptor = HydrationDescriptor {
            initial_state: state.get(),
            ..self.hydration_data(props)?
        };
        let element = nodes
            .iter_mut()
            .find_map(VNode::as_element_mut)
            .ok_or_else(|| CoherentError::component(self.name(), "rendered no element to carry the hydration marker"))?;
        element.set_attr(COMPONENT_ATTR, self.name());
        element.set_attr(DESCRIPTOR_ATTR, descriptor.to_json()?);
        Ok(Tree::Resolved(nodes))
    }

    /// A node rendering this hydratable with `props`.
    pub fn node(&self, props: Props) -> Tree {
        Component::object(self.clone()).node(props)
    }
}

impl Render for Hydratable {
    fn render(&self, props: &Props, scope: &Scope<'_>) -> Result<Tree> {
        self.render_with_hydration(props, scope)
    }

    fn name(&self) -> &str {
        Hydratable::name(self)
    }
}

impl fmt::Debug for Hydratable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hydratable")
            .field("name", &self.name())
            .field("options", &self.options)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Hydratables by name.
#[derive(Debug, Clone, Default)]
pub struct HydrationRegistry {
    entries: BTreeMap<String, Hydratable>,
}

impl HydrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the hydratable's name, replacing an earlier entry.
    pub fn register(&mut self, hydratable: Hydratable) -> &mut Self {
        self.entries.insert(hydratable.name().to_owned(), hydratable);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Hydratable> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Hydrate every marker in `document` whose name is registered.
///
/// Markers inside another marker belong to their outer component and are
/// skipped, as are markers with unknown names. A marker that fails to
/// hydrate is reported without stopping the others.
pub fn auto_hydrate(document: &Document, registry: &HydrationRegistry) -> Result<HydrationReport> {
    let span = tracing::debug_span!("auto_hydrate", registered = registry.len());
    let _entered = span.enter();

    let markers = document.query_selector_all(&format!("[{COMPONENT_ATTR}]"))?;
    let mut report = HydrationReport::default();
    for &marker in &markers {
        if has_marked_ancestor(document, marker) {
            report.skipped.push(marker);
            continue;
        }
        let name = document.attr(marker, COMPONENT_ATTR).unwrap_or_default();
        let Some(hydratable) = registry.get(&name) else {
            warn!(component = %name, "no hydratable registered; marker skipped");
            report.skipped.push(marker);
            continue;
        };
        match hydrate_marker(document, marker, hydratable) {
            Ok(instance) => report.instances.push(instance),
            Err(err) => {
                warn!(%err, component = %name, "marker failed to hydrate");
                report.failures.push((marker, err));
            }
        }
    }
    debug!(
        hydrated = report.instances.len(),
        skipped = report.skipped.len(),
        failed = report.failures.len(),
        "auto hydration finished"
    );
    Ok(report)
}

fn has_marked_ancestor(document: &Document, node: NodeId) -> bool {
    let mut current = document.parent(node);
    while let Some(n) = current {
        if document.has_attr(n, COMPONENT_ATTR) {
            return true;
        }
        current = document.parent(n);
    }
    false
}

fn hydrate_marker(
    document: &Document,
    marker: NodeId,
    hydratable: &Hydratable,
) -> Result<super::engine::HydratedInstance> {
    let descriptor = match document.attr(marker, DESCRIPTOR_ATTR) {
        Some(json) => HydrationDescriptor::parse(&json)?,
        None => hydratable.hydration_data(&Props::new())?,
    };
    let props = match &descriptor.props {
        Value::Null => Props::new(),
        value => Props::from_json(value)?,
    };
    let mut options = hydratable.client_options().clone();
    if !descriptor.initial_state.is_null() {
        options.initial_state = Some(descriptor.initial_state);
    }
    hydrate_with(document, marker, hydratable.component(), props, options)
}
