//! Declarative patch rules and keyed list bindings.
//!
//! A [`PatchTable`] maps state keys to DOM targets and update functions. The
//! engine runs the rules for every changed key instead of re-rendering.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::dom::{Document, NodeId, SelectorList};
use crate::tree::props::scalar_text;
use crate::tree::Tree;

/// Attribute naming a direct-patch target.
pub const REF_ATTR: &str = "data-ref";

/// Attribute binding a form control's value to a state key.
pub const BIND_ATTR: &str = "data-bind";

/// Attribute naming a declarative action.
pub const ACTION_ATTR: &str = "data-action";

/// Attribute overriding the event type of a declarative action.
pub const EVENT_ATTR: &str = "data-event";

/// Attribute carrying a list item's key in the document.
pub const KEY_ATTR: &str = "data-key";

/// Update function of a patch rule.
pub type PatchFn = dyn Fn(&PatchTarget<'_>, &Value) + Send + Sync;

/// Renders one list item.
pub type ItemFn = dyn Fn(&Value, usize) -> Tree + Send + Sync;

/// Derives a list item's key.
pub type KeyFn = dyn Fn(&Value, usize) -> String + Send + Sync;

/// Keeps a list item; receives the item and the whole state.
pub type FilterFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Orders two list items.
pub type SortFn = dyn Fn(&Value, &Value) -> Ordering + Send + Sync;

/// Display form of a state value for text content and form values.
pub fn display_value(value: &Value) -> String {
    scalar_text(value).unwrap_or_else(|| match value {
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Where a rule applies, relative to the instance root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Elements carrying `data-ref="<name>"`.
    Ref(String),
    /// Elements matching a selector.
    Selector(String),
}

impl Target {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    pub fn selector(selector: impl Into<String>) -> Self {
        Self::Selector(selector.into())
    }

    /// Matching nodes in `root`'s subtree, `root` included, in document order.
    ///
    /// Ref names are compared with the attribute value as is, so any
    /// characters are allowed in them.
    pub fn resolve(&self, document: &Document, root: NodeId) -> Vec<NodeId> {
        match self {
            Self::Ref(name) => document.with_dom(|dom| dom.query_by_attr_within(root, REF_ATTR, name)),
            Self::Selector(selector) => {
                let selectors = match SelectorList::parse(selector) {
                    Ok(selectors) => selectors,
                    Err(err) => {
                        tracing::warn!(%err, "patch target could not be resolved");
                        return Vec::new();
                    }
                };
                document.with_dom(|dom| {
                    let mut nodes = dom.select(root, &selectors);
                    if selectors.matches(dom, root) {
                        nodes.insert(0, root);
                    }
                    nodes
                })
            }
        }
    }
}

/// One node a rule is applied to, with the operations rules may use.
#[derive(Debug, Clone, Copy)]
pub struct PatchTarget<'a> {
    document: &'a Document,
    node: NodeId,
}

impl<'a> PatchTarget<'a> {
    pub fn new(document: &'a Document, node: NodeId) -> Self {
        Self { document, node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn text(&self) -> String {
        self.document.text_content(self.node)
    }

    pub fn set_text(&self, text: &str) {
        if self.text() != text {
            self.document.set_text_content(self.node, text);
        }
    }

    pub fn attr(&self, name: &str) -> Option<String> {
        self.document.attr(self.node, name)
    }

    pub fn set_attr(&self, name: &str, value: &str) {
        self.document.set_attr(self.node, name, value);
    }

    pub fn remove_attr(&self, name: &str) {
        self.document.remove_attr(self.node, name);
    }

    pub fn set_class(&self, class: &str, on: bool) {
        self.document.set_class(self.node, class, on);
    }

    /// Set a form value unless the control currently has focus.
    pub fn set_value(&self, value: &str) {
        if !self.document.is_focused(self.node) {
            self.document.set_value(self.node, value);
        }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// State key → target → update function.
#[derive(Clone)]
pub struct PatchRule {
    pub state_key: String,
    pub target: Target,
    apply: Arc<PatchFn>,
}

impl PatchRule {
    pub fn new<F>(state_key: impl Into<String>, target: Target, apply: F) -> Self
    where
        F: Fn(&PatchTarget<'_>, &Value) + Send + Sync + 'static,
    {
        Self {
            state_key: state_key.into(),
            target,
            apply: Arc::new(apply),
        }
    }

    /// Text content follows the value.
    pub fn text(state_key: impl Into<String>, target: Target) -> Self {
        Self::new(state_key, target, |t, v| t.set_text(&display_value(v)))
    }

    /// An attribute follows the value; `null` and `false` remove it.
    pub fn attr(state_key: impl Into<String>, target: Target, attr: impl Into<String>) -> Self {
        let attr = attr.into();
        Self::new(state_key, target, move |t, v| match v {
            Value::Null | Value::Bool(false) => t.remove_attr(&attr),
            Value::Bool(true) => t.set_attr(&attr, ""),
            other => t.set_attr(&attr, &display_value(other)),
        })
    }

    /// A class is present while the value is truthy.
    pub fn class(state_key: impl Into<String>, target: Target, class: impl Into<String>) -> Self {
        let class = class.into();
        Self::new(state_key, target, move |t, v| t.set_class(&class, truthy(v)))
    }

    /// Run the rule against one node.
    pub fn apply(&self, target: &PatchTarget<'_>, value: &Value) {
        (self.apply)(target, value);
    }
}

impl fmt::Debug for PatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchRule")
            .field("state_key", &self.state_key)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Truthiness of a state value: `null`, `false`, `0` and `""` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Ordered patch rules.
#[derive(Debug, Clone, Default)]
pub struct PatchTable {
    rules: Vec<PatchRule>,
}

impl PatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule (builder).
    pub fn rule(mut self, rule: PatchRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: PatchRule) {
        self.rules.push(rule);
    }

    /// Rules for `state_key`, in insertion order.
    pub fn rules_for<'a>(&'a self, state_key: &'a str) -> impl Iterator<Item = &'a PatchRule> + 'a {
        self.rules.iter().filter(move |rule| rule.state_key == state_key)
    }

    pub fn has_rules_for(&self, state_key: &str) -> bool {
        self.rules_for(state_key).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// One visible list item.
#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub key: String,
    /// Position in the unfiltered state array.
    pub index: usize,
    pub value: Value,
}

/// Binds an array-valued state key to the children of a container.
///
/// Items are filtered, sorted, and keyed. On change, nodes of unchanged
/// items are kept (and moved into order), changed items are rebuilt, and
/// items that disappeared are removed.
#[derive(Clone)]
pub struct ListBinding {
    pub state_key: String,
    pub container: Target,
    dependencies: Vec<String>,
    render_item: Arc<ItemFn>,
    key: Arc<KeyFn>,
    filter: Option<Arc<FilterFn>>,
    sort: Option<Arc<SortFn>>,
}

impl ListBinding {
    /// Bind `state_key` to `container`, rendering each item with `render_item`.
    ///
    /// Items are keyed by their `id` (or `key`) field, falling back to the
    /// position.
    pub fn new<F>(state_key: impl Into<String>, container: Target, render_item: F) -> Self
    where
        F: Fn(&Value, usize) -> Tree + Send + Sync + 'static,
    {
        Self {
            state_key: state_key.into(),
            container,
            dependencies: Vec::new(),
            render_item: Arc::new(render_item),
            key: Arc::new(default_key),
            filter: None,
            sort: None,
        }
    }

    /// Custom key function (builder).
    pub fn with_key<F>(mut self, key: F) -> Self
    where
        F: Fn(&Value, usize) -> String + Send + Sync + 'static,
    {
        self.key = Arc::new(key);
        self
    }

    /// Keep only items passing `filter` (builder).
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Order visible items with `sort` (builder). The sort is stable.
    pub fn with_sort<F>(mut self, sort: F) -> Self
    where
        F: Fn(&Value, &Value) -> Ordering + Send + Sync + 'static,
    {
        self.sort = Some(Arc::new(sort));
        self
    }

    /// Also reconcile when `state_key` changes, e.g. a filter setting (builder).
    pub fn depends_on(mut self, state_key: impl Into<String>) -> Self {
        self.dependencies.push(state_key.into());
        self
    }

    /// Whether a change to `state_key` affects this list.
    pub fn watches(&self, state_key: &str) -> bool {
        self.state_key == state_key || self.dependencies.iter().any(|d| d == state_key)
    }

    /// Filtered, sorted, keyed items for the current state.
    pub fn visible_items(&self, state: &Value) -> Vec<ListItem> {
        let items = match state.get(&self.state_key) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        let mut visible: Vec<(usize, &Value)> = items
            .iter()
            .enumerate()
            .filter(|(_, item)| self.filter.as_ref().map_or(true, |f| f(item, state)))
            .collect();
        if let Some(sort) = &self.sort {
            visible.sort_by(|(_, a), (_, b)| sort(a, b));
        }
        visible
            .into_iter()
            .map(|(index, item)| ListItem {
                key: (self.key)(item, index),
                index,
                value: item.clone(),
            })
            .collect()
    }

    /// Keyed tree for one item.
    pub fn render(&self, item: &ListItem) -> Tree {
        match (self.render_item)(&item.value, item.index) {
            Tree::Node(mut entries) if entries.len() == 1 => {
                let (node_key, props) = entries.remove(0);
                Tree::Node(vec![(node_key, props.key(item.key.clone()))])
            }
            other => other,
        }
    }

    /// Keyed trees for every visible item, for components rendering the list.
    pub fn render_all(&self, state: &Value) -> Vec<Tree> {
        self.visible_items(state).iter().map(|item| self.render(item)).collect()
    }
}

fn default_key(item: &Value, index: usize) -> String {
    item.get("id")
        .or_else(|| item.get("key"))
        .and_then(scalar_text)
        .unwrap_or_else(|| index.to_string())
}

impl fmt::Debug for ListBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListBinding")
            .field("state_key", &self.state_key)
            .field("container", &self.container)
            .field("filtered", &self.filter.is_some())
            .field("sorted", &self.sort.is_some())
            .finish()
    }
}
