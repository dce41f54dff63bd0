//! Hydration engine: attach a component's behaviour to markup already in a
//! [`Document`].
//!
//! The component is rendered again on the client and the result is matched
//! against the existing nodes position by position. Matching nodes are kept
//! and receive event listeners; a disagreement replaces the offending
//! subtree with freshly built nodes. Afterwards every state change is applied
//! to the document through the patch table, `data-ref` text, `data-bind`
//! values and keyed lists, without rendering the component again.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use super::patch::{
    display_value, ListBinding, ListItem, PatchRule, PatchTable, PatchTarget, Target, ACTION_ATTR,
    BIND_ATTR, EVENT_ATTR, KEY_ATTR,
};
use crate::component::{expand_at, Component, StateContainer, SubscriptionId};
use crate::context::{ContextStore, Scope};
use crate::dom::{Document, DomEvent, ListenerId, NodeData, NodeId};
use crate::error::{CoherentError, Result};
use crate::render::html::{attr_value, is_valid_attr_name, AttrValue};
use crate::tree::{Element, Handler, Inner, Props, VNode};

/// Event type wired for `data-action` elements without `data-event`.
pub const DEFAULT_ACTION_EVENT: &str = "click";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Client-side configuration of one hydrated instance.
#[derive(Clone, Default)]
pub struct HydrateOptions {
    /// State the instance starts from. State decorators only fill in keys
    /// missing here.
    pub initial_state: Option<Value>,
    /// Direct patch rules, applied for every changed key.
    pub patches: PatchTable,
    /// Keyed list bindings.
    pub lists: Vec<ListBinding>,
    actions: Vec<(String, Handler)>,
}

impl HydrateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_state(mut self, state: Value) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add one patch rule.
    pub fn with_patch(mut self, rule: PatchRule) -> Self {
        self.patches.push(rule);
        self
    }

    /// Replace the patch table.
    pub fn with_patches(mut self, patches: PatchTable) -> Self {
        self.patches = patches;
        self
    }

    pub fn with_list(mut self, list: ListBinding) -> Self {
        self.lists.push(list);
        self
    }

    /// Register the handler run by `data-action="<name>"` elements.
    pub fn with_action<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut EventContext<'_>) + Send + Sync + 'static,
    {
        let name = name.into();
        let handler: Handler = Arc::new(handler);
        match self.actions.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = handler,
            None => self.actions.push((name, handler)),
        }
        self
    }

    /// The handler registered for `name`.
    pub fn action(&self, name: &str) -> Option<&Handler> {
        self.actions.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }
}

impl fmt::Debug for HydrateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HydrateOptions")
            .field("initial_state", &self.initial_state)
            .field("patches", &self.patches.len())
            .field("lists", &self.lists)
            .field("actions", &actions)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Event context
// ---------------------------------------------------------------------------

/// What an event handler receives.
pub struct EventContext<'a> {
    event: &'a mut DomEvent,
    document: &'a Document,
    instance: &'a HydratedInstance,
    item_key: Option<&'a str>,
}

impl<'a> EventContext<'a> {
    pub fn event(&self) -> &DomEvent {
        &*self.event
    }

    pub fn event_type(&self) -> &str {
        self.event.event_type()
    }

    pub fn target(&self) -> NodeId {
        self.event.target()
    }

    /// The node the handler is attached to.
    pub fn current_target(&self) -> NodeId {
        self.event.current_target()
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn instance(&self) -> &'a HydratedInstance {
        self.instance
    }

    /// Key of the list item the handler belongs to, if any.
    pub fn item_key(&self) -> Option<&'a str> {
        self.item_key
    }

    /// Current value of the element the handler is attached to.
    pub fn value(&self) -> String {
        self.document.value(self.current_target())
    }

    /// Snapshot of the instance state.
    pub fn state(&self) -> Value {
        self.instance.get_state()
    }

    /// Merge `patch` into the instance state.
    pub fn set_state(&self, patch: Value) -> Result<Vec<String>> {
        self.instance.set_state(patch)
    }

    pub fn prevent_default(&mut self) {
        self.event.prevent_default();
    }

    pub fn stop_propagation(&mut self) {
        self.event.stop_propagation();
    }
}

impl fmt::Debug for EventContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("event", &self.event)
            .field("item_key", &self.item_key)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

/// A disagreement found while matching, recovered by subtree replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub path: String,
    pub expected: String,
    pub found: String,
}

impl From<Mismatch> for CoherentError {
    fn from(m: Mismatch) -> Self {
        CoherentError::HydrationMismatch {
            path: m.path,
            expected: m.expected,
            found: m.found,
        }
    }
}

#[derive(Debug, Clone)]
struct AttachedListener {
    node: NodeId,
    event_type: String,
    id: ListenerId,
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Instances reachable from state subscribers on this thread.
    static LIVE: RefCell<HashMap<u64, Weak<InstanceInner>>> = RefCell::new(HashMap::new());
}

struct InstanceInner {
    id: u64,
    document: Document,
    element: Cell<NodeId>,
    component: Component,
    props: Props,
    options: HydrateOptions,
    state: RefCell<Option<StateContainer>>,
    subscription: Cell<Option<SubscriptionId>>,
    hydrated: Cell<bool>,
    listeners: RefCell<Vec<AttachedListener>>,
    mismatches: RefCell<Vec<Mismatch>>,
    /// Last item value seen per (list binding index, item key).
    fingerprints: RefCell<HashMap<(usize, String), Value>>,
}

impl InstanceInner {
    fn detach_listeners(&self) {
        for listener in self.listeners.take() {
            self.document.remove_event_listener(listener.id);
        }
    }

    /// Release everything the instance attached. Safe to call repeatedly.
    fn teardown(&self) {
        self.detach_listeners();
        let state = self.state.borrow_mut().take();
        if let (Some(state), Some(subscription)) = (state, self.subscription.take()) {
            state.unsubscribe(subscription);
        }
        let id = self.id;
        let _ = LIVE.try_with(|live| {
            if let Ok(mut live) = live.try_borrow_mut() {
                live.remove(&id);
            }
        });
        self.fingerprints.borrow_mut().clear();
    }
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Handle to a hydrated component.
///
/// Clones share the instance. Dropping the last handle tears the instance
/// down the way [`destroy`](Self::destroy) does.
#[derive(Clone)]
pub struct HydratedInstance {
    inner: Rc<InstanceInner>,
}

impl HydratedInstance {
    /// Root element of the instance. Changes when the root is replaced.
    pub fn element(&self) -> NodeId {
        self.inner.element.get()
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn component(&self) -> &Component {
        &self.inner.component
    }

    pub fn props(&self) -> &Props {
        &self.inner.props
    }

    pub fn options(&self) -> &HydrateOptions {
        &self.inner.options
    }

    /// The state container, until the instance is destroyed.
    pub fn state(&self) -> Option<StateContainer> {
        self.inner.state.borrow().clone()
    }

    /// Snapshot of the state; `null` once destroyed.
    pub fn get_state(&self) -> Value {
        self.state().map_or(Value::Null, |state| state.get())
    }

    pub fn is_hydrated(&self) -> bool {
        self.inner.hydrated.get()
    }

    /// Listeners the engine attached, as (node, event type).
    pub fn event_listeners(&self) -> Vec<(NodeId, String)> {
        self.inner
            .listeners
            .borrow()
            .iter()
            .map(|l| (l.node, l.event_type.clone()))
            .collect()
    }

    /// Mismatches recovered so far.
    pub fn mismatches(&self) -> Vec<Mismatch> {
        self.inner.mismatches.borrow().clone()
    }

    /// Elements carrying `data-ref="<name>"` inside the instance.
    pub fn refs(&self, name: &str) -> Vec<NodeId> {
        Target::reference(name).resolve(self.document(), self.element())
    }

    /// Whether both handles share one instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Merge `patch` into the state and apply the resulting DOM patches.
    pub fn set_state(&self, patch: Value) -> Result<Vec<String>> {
        let state = self
            .state()
            .filter(|_| self.is_hydrated())
            .ok_or_else(|| CoherentError::StateUpdate("instance has been destroyed".into()))?;
        state.set(patch)
    }

    /// Re-apply every patch rule and list binding to the current state.
    pub fn update(&self) -> Result<()> {
        let state = self.live_state()?.get();
        let keys: Vec<String> = state
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        self.patch_keys(&state, &keys);
        for (index, list) in self.inner.options.lists.iter().enumerate() {
            self.reconcile(index, list, &state);
        }
        Ok(())
    }

    /// Render the component again and replace the whole subtree.
    pub fn rerender(&self) -> Result<()> {
        let state = self.live_state()?;
        let document = self.document();
        let old = self.element();
        if document.parent(old).is_none() {
            return Err(CoherentError::Usage(format!(
                "cannot rerender `{}`: its root element is no longer attached",
                self.inner.component.name()
            )));
        }
        let root = single_root(self.fresh_nodes(&state)?, self.inner.component.name())?;

        self.inner.detach_listeners();
        let fresh = self.build(&root, None);
        document.replace(old, fresh);
        self.inner.element.set(fresh);
        self.wire_declarative(fresh);
        self.inner.fingerprints.borrow_mut().clear();
        self.seed_lists(&state.get());
        debug!(component = self.inner.component.name(), "rerendered");
        Ok(())
    }

    /// Remove engine-attached listeners and drop the state. Idempotent.
    pub fn destroy(&self) {
        if !self.inner.hydrated.replace(false) {
            return;
        }
        self.inner.teardown();
        debug!(component = self.inner.component.name(), "destroyed");
    }

    fn live_state(&self) -> Result<StateContainer> {
        self.state().filter(|_| self.is_hydrated()).ok_or_else(|| {
            CoherentError::Usage(format!(
                "instance of `{}` has been destroyed",
                self.inner.component.name()
            ))
        })
    }

    // -- rendering ----------------------------------------------------------

    fn fresh_nodes(&self, state: &StateContainer) -> Result<Vec<VNode>> {
        let store = ContextStore::new();
        let scope = Scope::client(&store);
        let scope = scope.with_state(state);
        let props = self.inner.props.clone().with_state(state.clone());
        let component = &self.inner.component;
        let tree = component.invoke(&props, &scope)?;
        expand_at(&tree, &format!("$.<{}>", component.name()), &scope)
    }

    /// Create detached nodes for `vnode`, attaching its handlers.
    fn build(&self, vnode: &Element, item_key: Option<&str>) -> NodeId {
        let document = self.document();
        let mut data = NodeData::element(&vnode.tag);
        for (name, value) in &vnode.attrs {
            if !is_valid_attr_name(name) {
                continue;
            }
            match attr_value(name, value) {
                AttrValue::Omit => {}
                AttrValue::Bare => data.set_attr(name.as_str(), ""),
                AttrValue::Text(text) => data.set_attr(name.as_str(), text),
            }
        }
        if let Some(key) = &vnode.key {
            data.set_attr(KEY_ATTR, key.as_str());
        }
        let node = document.create(data);

        match &vnode.inner {
            Some(Inner::Text(text)) => {
                let text = document.create(NodeData::text(text.as_str()));
                document.append_child(node, text);
            }
            Some(Inner::Html(html)) => {
                if let Err(err) = document.append_html(node, html) {
                    warn!(%err, tag = %vnode.tag, "inner html could not be parsed");
                }
            }
            None => {}
        }

        let key = vnode.key.as_deref().or(item_key);
        for child in &vnode.children {
            match child {
                VNode::Element(element) => {
                    let child = self.build(element, key);
                    document.append_child(node, child);
                }
                VNode::Text(text) => {
                    let text = document.create(NodeData::text(text.as_str()));
                    document.append_child(node, text);
                }
                VNode::Component { .. } | VNode::Provider { .. } => {}
            }
        }
        self.attach_handlers(node, vnode, key);
        node
    }

    // -- matching -----------------------------------------------------------

    fn match_root(&self, vnode: &Element, node: NodeId) -> Result<NodeId> {
        let path = format!("$.<{}>", self.inner.component.name());
        let document = self.document();
        let found = document.tag(node);
        if found.as_deref().is_some_and(|tag| tag.eq_ignore_ascii_case(&vnode.tag)) {
            return Ok(self.match_element(vnode, node, &path, None));
        }
        let mismatch = Mismatch {
            path,
            expected: format!("<{}>", vnode.tag),
            found: found.map_or_else(|| "a non-element node".to_owned(), |tag| format!("<{tag}>")),
        };
        if document.parent(node).is_none() {
            return Err(mismatch.into());
        }
        Ok(self.replace_subtree(vnode, node, mismatch, None))
    }

    /// Pair `vnode` with `node`, returning the node that ends up in the document.
    fn match_element(&self, vnode: &Element, node: NodeId, path: &str, item_key: Option<&str>) -> NodeId {
        let document = self.document();
        let descend = !matches!(vnode.inner, Some(Inner::Html(_)));
        let expected: Vec<&Element> = vnode.element_children().collect();
        let existing = document.element_children(node);

        if descend && expected.len() != existing.len() {
            let mismatch = Mismatch {
                path: path.to_owned(),
                expected: format!("{} element children", expected.len()),
                found: existing.len().to_string(),
            };
            return self.replace_subtree(vnode, node, mismatch, item_key);
        }

        if let Some(key) = &vnode.key {
            document.set_attr(node, KEY_ATTR, key);
        }
        let key = vnode.key.as_deref().or(item_key);
        self.attach_handlers(node, vnode, key);
        if !descend {
            return node;
        }

        for (i, (child, child_node)) in expected.into_iter().zip(existing).enumerate() {
            let child_path = format!("{path}.children[{i}]");
            match document.tag(child_node) {
                Some(tag) if tag.eq_ignore_ascii_case(&child.tag) => {
                    self.match_element(child, child_node, &child_path, key);
                }
                found => {
                    let mismatch = Mismatch {
                        path: child_path,
                        expected: format!("<{}>", child.tag),
                        found: format!("<{}>", found.unwrap_or_default()),
                    };
                    self.replace_subtree(child, child_node, mismatch, key);
                }
            }
        }
        node
    }

    fn replace_subtree(&self, vnode: &Element, old: NodeId, mismatch: Mismatch, item_key: Option<&str>) -> NodeId {
        warn!(
            path = %mismatch.path,
            expected = %mismatch.expected,
            found = %mismatch.found,
            "hydration mismatch; replacing subtree"
        );
        self.inner.mismatches.borrow_mut().push(mismatch);
        let fresh = self.build(vnode, item_key);
        self.document().replace(old, fresh);
        self.forget_removed_listeners();
        fresh
    }

    // -- listeners ----------------------------------------------------------

    fn attach_handlers(&self, node: NodeId, vnode: &Element, item_key: Option<&str>) {
        for (event_type, handler) in &vnode.handlers {
            self.listen(node, event_type, Arc::clone(handler), item_key.map(str::to_owned));
        }
    }

    fn listen(&self, node: NodeId, event_type: &str, handler: Handler, item_key: Option<String>) {
        let weak = Rc::downgrade(&self.inner);
        let id = self.document().add_event_listener(node, event_type, move |event, document| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.hydrated.get() {
                return;
            }
            let instance = HydratedInstance { inner };
            let mut ctx = EventContext {
                event,
                document,
                instance: &instance,
                item_key: item_key.as_deref(),
            };
            handler(&mut ctx);
        });
        self.inner.listeners.borrow_mut().push(AttachedListener {
            node,
            event_type: event_type.to_owned(),
            id,
        });
    }

    fn forget_removed_listeners(&self) {
        let document = self.document();
        self.inner
            .listeners
            .borrow_mut()
            .retain(|l| document.contains(l.node));
    }

    /// Wire `data-action` and `data-bind` elements under `root`.
    fn wire_declarative(&self, root: NodeId) {
        let document = self.document();

        for node in Target::selector(format!("[{ACTION_ATTR}]")).resolve(document, root) {
            let Some(name) = document.attr(node, ACTION_ATTR) else {
                continue;
            };
            let Some(handler) = self.inner.options.action(&name).cloned() else {
                warn!(action = %name, component = self.inner.component.name(), "no handler registered for action");
                continue;
            };
            let event_type = document
                .attr(node, EVENT_ATTR)
                .unwrap_or_else(|| DEFAULT_ACTION_EVENT.to_owned());
            self.listen(node, &event_type, handler, self.item_key_of(node));
        }

        for node in Target::selector(format!("[{BIND_ATTR}]")).resolve(document, root) {
            let Some(state_key) = document.attr(node, BIND_ATTR) else {
                continue;
            };
            let handler: Handler = Arc::new(move |ctx: &mut EventContext<'_>| {
                let current = ctx.state().get(&state_key).cloned();
                let value = coerce_input(ctx.value(), current.as_ref());
                let mut patch = Map::new();
                patch.insert(state_key.clone(), value);
                if let Err(err) = ctx.set_state(Value::Object(patch)) {
                    warn!(%err, key = %state_key, "bound input could not update state");
                }
            });
            self.listen(node, "input", handler, self.item_key_of(node));
        }
    }

    /// Nearest `data-key` from `node` up to the instance root.
    fn item_key_of(&self, node: NodeId) -> Option<String> {
        let document = self.document();
        let root = self.element();
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(key) = document.attr(n, KEY_ATTR) {
                return Some(key);
            }
            if n == root {
                break;
            }
            current = document.parent(n);
        }
        None
    }

    // -- patching -----------------------------------------------------------

    fn apply_changes(&self, state: &Value, changed: &[String]) {
        if !self.is_hydrated() {
            return;
        }
        let span = tracing::debug_span!("patch", component = self.inner.component.name(), keys = ?changed);
        let _entered = span.enter();
        self.patch_keys(state, changed);
        for (index, list) in self.inner.options.lists.iter().enumerate() {
            if changed.iter().any(|key| list.watches(key)) {
                self.reconcile(index, list, state);
            }
        }
    }

    fn patch_keys(&self, state: &Value, keys: &[String]) {
        let document = self.document();
        let root = self.element();
        let options = &self.inner.options;
        let bound = Target::selector(format!("[{BIND_ATTR}]")).resolve(document, root);

        for key in keys {
            let value = state.get(key).cloned().unwrap_or(Value::Null);
            let mut has_rule = false;
            for rule in options.patches.rules_for(key) {
                has_rule = true;
                for node in rule.target.resolve(document, root) {
                    rule.apply(&PatchTarget::new(document, node), &value);
                }
            }
            if !has_rule && !options.lists.iter().any(|list| list.state_key == *key) {
                let text = display_value(&value);
                for node in Target::reference(key.as_str()).resolve(document, root) {
                    PatchTarget::new(document, node).set_text(&text);
                }
            }
            for &node in &bound {
                if document.attr(node, BIND_ATTR).as_deref() == Some(key.as_str()) {
                    PatchTarget::new(document, node).set_value(&display_value(&value));
                }
            }
        }
    }

    /// Record the current items of every list so unchanged nodes can be reused.
    fn seed_lists(&self, state: &Value) {
        let mut fingerprints = self.inner.fingerprints.borrow_mut();
        for (index, list) in self.inner.options.lists.iter().enumerate() {
            for item in list.visible_items(state) {
                fingerprints.insert((index, item.key), item.value);
            }
        }
    }

    fn reconcile(&self, index: usize, list: &ListBinding, state: &Value) {
        let document = self.document();
        let items = list.visible_items(state);

        for container in list.container.resolve(document, self.element()) {
            let existing: HashMap<String, NodeId> = document
                .element_children(container)
                .into_iter()
                .filter_map(|child| document.attr(child, KEY_ATTR).map(|key| (key, child)))
                .collect();

            let mut seen = HashSet::new();
            let mut ordered = Vec::with_capacity(items.len());
            for item in &items {
                if !seen.insert(item.key.as_str()) {
                    warn!(key = %item.key, list = %list.state_key, "duplicate list key; item skipped");
                    continue;
                }
                let unchanged = self
                    .inner
                    .fingerprints
                    .borrow()
                    .get(&(index, item.key.clone()))
                    .is_some_and(|previous| *previous == item.value);
                match existing.get(&item.key) {
                    Some(&node) if unchanged => ordered.push(node),
                    previous => match self.build_item(list, item, container) {
                        Ok(node) => ordered.push(node),
                        Err(err) => {
                            warn!(%err, key = %item.key, list = %list.state_key, "list item failed to render");
                            ordered.extend(previous.copied());
                        }
                    },
                }
            }

            for child in document.children(container) {
                if !ordered.contains(&child) {
                    document.remove(child);
                }
            }
            for &node in &ordered {
                document.append_child(container, node);
            }
            debug!(list = %list.state_key, items = ordered.len(), "list reconciled");
        }

        self.forget_removed_listeners();
        let mut fingerprints = self.inner.fingerprints.borrow_mut();
        fingerprints.retain(|(list_index, _), _| *list_index != index);
        for item in items {
            fingerprints.insert((index, item.key), item.value);
        }
    }

    /// Build, attach and wire the node for one list item.
    fn build_item(&self, list: &ListBinding, item: &ListItem, container: NodeId) -> Result<NodeId> {
        let tree = list.render(item);
        let store = ContextStore::new();
        let scope = Scope::client(&store);
        let path = format!("$.{}[{}]", list.state_key, item.index);
        let root = single_root(expand_at(&tree, &path, &scope)?, &path)?;
        let node = self.build(&root, Some(&item.key));
        let document = self.document();
        document.set_attr(node, KEY_ATTR, &item.key);
        document.append_child(container, node);
        self.wire_declarative(node);
        Ok(node)
    }
}

impl fmt::Debug for HydratedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydratedInstance")
            .field("component", &self.inner.component.name())
            .field("element", &self.inner.element.get())
            .field("hydrated", &self.inner.hydrated.get())
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("mismatches", &self.inner.mismatches.borrow().len())
            .finish()
    }
}

fn single_root(nodes: Vec<VNode>, name: &str) -> Result<Element> {
    let mut elements = nodes.into_iter().filter_map(|node| match node {
        VNode::Element(element) => Some(element),
        _ => None,
    });
    match (elements.next(), elements.next()) {
        (Some(root), None) => Ok(root),
        (first, _) => Err(CoherentError::HydrationMismatch {
            path: name.to_owned(),
            expected: "a single root element".into(),
            found: if first.is_none() { "none" } else { "several" }.into(),
        }),
    }
}

/// Keep numbers numeric when a bound input edits a numeric key.
fn coerce_input(raw: String, current: Option<&Value>) -> Value {
    if matches!(current, Some(Value::Number(_))) {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Number(i.into());
        }
        if let Some(n) = trimmed.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw)
}

fn on_state_change(id: u64, state: &Value, changed: &[String]) {
    let inner = LIVE
        .try_with(|live| live.borrow().get(&id).and_then(Weak::upgrade))
        .ok()
        .flatten();
    if let Some(inner) = inner {
        HydratedInstance { inner }.apply_changes(state, changed);
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// [`hydrate_with`] using default options.
pub fn hydrate(document: &Document, element: NodeId, component: &Component, props: Props) -> Result<HydratedInstance> {
    hydrate_with(document, element, component, props, HydrateOptions::default())
}

/// Attach `component` to the markup rooted at `element`.
///
/// State updates are applied on the thread that hydrated the instance.
pub fn hydrate_with(
    document: &Document,
    element: NodeId,
    component: &Component,
    props: Props,
    options: HydrateOptions,
) -> Result<HydratedInstance> {
    let span = tracing::debug_span!("hydrate", component = component.name());
    let _entered = span.enter();

    if !document.is_connected(element) {
        return Err(CoherentError::Usage(format!(
            "cannot hydrate `{}`: the element is not part of the document",
            component.name()
        )));
    }

    let state = StateContainer::from_value(
        options
            .initial_state
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new())),
    );
    let instance = HydratedInstance {
        inner: Rc::new(InstanceInner {
            id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            document: document.clone(),
            element: Cell::new(element),
            component: component.clone(),
            props,
            options,
            state: RefCell::new(Some(state.clone())),
            subscription: Cell::new(None),
            hydrated: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
            mismatches: RefCell::new(Vec::new()),
            fingerprints: RefCell::new(HashMap::new()),
        }),
    };

    let root = single_root(instance.fresh_nodes(&state)?, &format!("$.<{}>", component.name()))?;
    let element = instance.match_root(&root, element)?;
    instance.inner.element.set(element);
    instance.wire_declarative(element);
    instance.seed_lists(&state.get());

    let id = instance.inner.id;
    let subscription = state.subscribe(move |value, changed| on_state_change(id, value, changed));
    instance.inner.subscription.set(Some(subscription));
    LIVE.with(|live| live.borrow_mut().insert(id, Rc::downgrade(&instance.inner)));
    instance.inner.hydrated.set(true);

    debug!(
        listeners = instance.inner.listeners.borrow().len(),
        mismatches = instance.inner.mismatches.borrow().len(),
        "hydrated"
    );
    Ok(instance)
}

/// Outcome of hydrating several elements.
#[derive(Debug, Default)]
pub struct HydrationReport {
    pub instances: Vec<HydratedInstance>,
    pub failures: Vec<(NodeId, CoherentError)>,
    /// Elements that were not attempted.
    pub skipped: Vec<NodeId>,
}

impl HydrationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    fn record(&mut self, element: NodeId, result: Result<HydratedInstance>) {
        match result {
            Ok(instance) => self.instances.push(instance),
            Err(err) => {
                warn!(%err, "hydration failed; continuing with the remaining elements");
                self.failures.push((element, err));
            }
        }
    }
}

/// Hydrate `elements[i]` with `components[i]` and `props[i]`.
///
/// `props` may be empty, in which case every component gets default props.
pub fn hydrate_all(
    document: &Document,
    elements: &[NodeId],
    components: &[Component],
    props: Vec<Props>,
) -> Result<HydrationReport> {
    if elements.len() != components.len() {
        return Err(CoherentError::Usage(format!(
            "hydrate_all got {} elements but {} components",
            elements.len(),
            components.len()
        )));
    }
    if !props.is_empty() && props.len() != elements.len() {
        return Err(CoherentError::Usage(format!(
            "hydrate_all got {} elements but {} props",
            elements.len(),
            props.len()
        )));
    }
    let mut props = props.into_iter();
    let mut report = HydrationReport::default();
    for (&element, component) in elements.iter().zip(components) {
        let props = props.next().unwrap_or_default();
        report.record(element, hydrate(document, element, component, props));
    }
    Ok(report)
}

/// Hydrate every element matching `selector` with `component`.
pub fn hydrate_by_selector(
    document: &Document,
    selector: &str,
    component: &Component,
    props: Props,
) -> Result<HydrationReport> {
    let elements = document.query_selector_all(selector)?;
    let mut report = HydrationReport::default();
    for element in elements {
        report.record(element, hydrate(document, element, component, props.clone()));
    }
    Ok(report)
}
