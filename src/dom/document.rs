//! Shared document handle with event listeners and focus.
//!
//! [`Document`] wraps a [`Dom`] in `Rc<RefCell<..>>` so listeners can reach
//! back into the document while an event is being delivered. No borrow is
//! held while a listener runs.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use slotmap::{new_key_type, SlotMap};

use super::event::{bubble_path, DomEvent};
use super::node::{NodeData, NodeId};
use super::parser::{parse_html, parse_into};
use super::selector::SelectorList;
use super::tree::Dom;
use crate::error::Result;

new_key_type! {
    /// Handle returned by [`Document::add_event_listener`].
    pub struct ListenerId;
}

/// Event listener callback.
pub type Listener = Rc<dyn Fn(&mut DomEvent, &Document)>;

struct ListenerEntry {
    node: NodeId,
    event_type: String,
    callback: Listener,
}

struct DocumentInner {
    dom: Dom,
    listeners: SlotMap<ListenerId, ListenerEntry>,
    focused: Option<NodeId>,
}

/// A mutable document. Clones share the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Document {
    /// An empty document.
    pub fn new() -> Self {
        Self::from_dom(Dom::with_document())
    }

    /// Parse markup into a new document.
    pub fn parse(html: &str) -> Result<Self> {
        Ok(Self::from_dom(parse_html(html)?))
    }

    pub fn from_dom(dom: Dom) -> Self {
        Self {
            inner: Rc::new(RefCell::new(DocumentInner {
                dom,
                listeners: SlotMap::with_key(),
                focused: None,
            })),
        }
    }

    /// The document root. Falls back to a fresh root if none is set.
    pub fn root(&self) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        match inner.dom.root() {
            Some(root) => root,
            None => inner.dom.insert(NodeData::document()),
        }
    }

    /// Whether two handles refer to the same document.
    pub fn ptr_eq(&self, other: &Document) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with shared access to the tree.
    pub fn with_dom<R>(&self, f: impl FnOnce(&Dom) -> R) -> R {
        f(&self.inner.borrow().dom)
    }

    /// Run `f` with exclusive access to the tree.
    ///
    /// Listener bookkeeping is not updated; use [`Document::remove`] to drop
    /// nodes that may carry listeners.
    pub fn with_dom_mut<R>(&self, f: impl FnOnce(&mut Dom) -> R) -> R {
        f(&mut self.inner.borrow_mut().dom)
    }

    // -- queries ------------------------------------------------------------

    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        self.with_dom(|dom| dom.query_selector(selector))
    }

    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        self.with_dom(|dom| dom.query_selector_all(selector))
    }

    /// Descendants of `scope` matching `selector`, in document order.
    pub fn select_within(&self, scope: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.with_dom(|dom| dom.select(scope, &selectors)))
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.with_dom(|dom| dom.query_by_id(id))
    }

    // -- structure ----------------------------------------------------------

    pub fn contains(&self, node: NodeId) -> bool {
        self.with_dom(|dom| dom.contains(node))
    }

    /// Whether `node` is reachable from the root.
    pub fn is_connected(&self, node: NodeId) -> bool {
        let root = self.root();
        self.with_dom(|dom| dom.contains(node) && dom.is_inclusive_descendant(node, root))
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with_dom(|dom| dom.parent(node))
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_dom(|dom| dom.children(node).to_vec())
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_dom(|dom| dom.element_children(node))
    }

    /// Create a detached node.
    pub fn create(&self, data: NodeData) -> NodeId {
        self.with_dom_mut(|dom| dom.insert(data))
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.create(NodeData::element(tag))
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.with_dom_mut(|dom| dom.reparent(child, parent));
    }

    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.with_dom_mut(|dom| dom.insert_before(parent, child, reference));
    }

    /// Parse `html` and append the nodes to `parent`.
    pub fn append_html(&self, parent: NodeId, html: &str) -> Result<Vec<NodeId>> {
        self.with_dom_mut(|dom| parse_into(dom, parent, html))
    }

    /// Remove `node` and its subtree, dropping their listeners.
    pub fn remove(&self, node: NodeId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !inner.dom.contains(node) {
            return false;
        }
        let doomed = inner.dom.walk_depth_first(node);
        inner.listeners.retain(|_, entry| !doomed.contains(&entry.node));
        if inner.focused.is_some_and(|f| doomed.contains(&f)) {
            inner.focused = None;
        }
        inner.dom.remove(node).is_some()
    }

    /// Put detached `replacement` where `old` is and remove `old`.
    pub fn replace(&self, old: NodeId, replacement: NodeId) {
        let parent = self.parent(old);
        match parent {
            Some(parent) => self.insert_before(parent, replacement, Some(old)),
            None => self.with_dom_mut(|dom| {
                if dom.root() == Some(old) {
                    dom.set_root(replacement);
                }
            }),
        }
        self.remove(old);
    }

    /// Remove every child of `node`.
    pub fn clear_children(&self, node: NodeId) {
        for child in self.children(node) {
            self.remove(child);
        }
    }

    // -- node data ----------------------------------------------------------

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.with_dom(|dom| dom.get(node).and_then(NodeData::tag).map(str::to_owned))
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_dom(|dom| dom.get(node).and_then(|d| d.attr(name)).map(str::to_owned))
    }

    pub fn has_attr(&self, node: NodeId, name: &str) -> bool {
        self.with_dom(|dom| dom.get(node).is_some_and(|d| d.has_attr(name)))
    }

    pub fn set_attr(&self, node: NodeId, name: &str, value: &str) {
        self.update(node, |data| data.set_attr(name, value));
    }

    pub fn remove_attr(&self, node: NodeId, name: &str) {
        self.update(node, |data| {
            data.remove_attr(name);
        });
    }

    pub fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.with_dom(|dom| dom.get(node).is_some_and(|d| d.has_class(class)))
    }

    pub fn set_class(&self, node: NodeId, class: &str, on: bool) {
        self.update(node, |data| data.set_class(class, on));
    }

    pub fn toggle_class(&self, node: NodeId, class: &str) {
        self.update(node, |data| data.toggle_class(class));
    }

    fn update(&self, node: NodeId, f: impl FnOnce(&mut NodeData)) {
        self.with_dom_mut(|dom| {
            if let Some(data) = dom.get_mut(node) {
                f(data);
            }
        });
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.with_dom(|dom| dom.text_content(node))
    }

    /// Replace the children of `node` with `text`, dropping their listeners.
    pub fn set_text_content(&self, node: NodeId, text: &str) {
        self.clear_children(node);
        self.with_dom_mut(|dom| dom.set_text_content(node, text));
    }

    pub fn outer_html(&self, node: NodeId) -> String {
        self.with_dom(|dom| dom.outer_html(node))
    }

    pub fn inner_html(&self, node: NodeId) -> String {
        self.with_dom(|dom| dom.inner_html(node))
    }

    /// Markup for the whole document.
    pub fn to_html(&self) -> String {
        let root = self.root();
        self.outer_html(root)
    }

    // -- form state ---------------------------------------------------------

    /// Live value of a form control.
    ///
    /// Falls back to the `value` attribute, then to the text of a `textarea`.
    pub fn value(&self, node: NodeId) -> String {
        self.with_dom(|dom| {
            let Some(data) = dom.get(node) else {
                return String::new();
            };
            if let Some(value) = &data.value {
                return value.clone();
            }
            if data.tag() == Some("textarea") {
                return dom.text_content(node);
            }
            data.attr("value").unwrap_or_default().to_owned()
        })
    }

    /// Set the live value of a form control. No event is fired.
    pub fn set_value(&self, node: NodeId, value: &str) {
        self.update(node, |data| data.value = Some(value.to_owned()));
    }

    /// Move focus to `node`, firing `blur` and `focus`.
    pub fn focus(&self, node: NodeId) {
        if !self.contains(node) || self.is_focused(node) {
            return;
        }
        self.blur();
        self.inner.borrow_mut().focused = Some(node);
        self.dispatch(DomEvent::new("focus", node));
    }

    /// Clear focus, firing `blur` on the focused node.
    pub fn blur(&self) {
        let previous = self.inner.borrow_mut().focused.take();
        if let Some(node) = previous {
            self.dispatch(DomEvent::new("blur", node));
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.inner.borrow().focused
    }

    pub fn is_focused(&self, node: NodeId) -> bool {
        self.focused() == Some(node)
    }

    // -- events -------------------------------------------------------------

    /// Register `callback` for `event_type` events reaching `node`.
    pub fn add_event_listener<F>(&self, node: NodeId, event_type: &str, callback: F) -> ListenerId
    where
        F: Fn(&mut DomEvent, &Document) + 'static,
    {
        self.inner.borrow_mut().listeners.insert(ListenerEntry {
            node,
            event_type: event_type.to_owned(),
            callback: Rc::new(callback),
        })
    }

    /// Unregister a listener. Returns whether it was registered.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.inner.borrow_mut().listeners.remove(id).is_some()
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Number of listeners registered on `node`.
    pub fn listeners_on(&self, node: NodeId) -> usize {
        self.inner
            .borrow()
            .listeners
            .values()
            .filter(|entry| entry.node == node)
            .count()
    }

    /// Deliver `event` along its bubble path and return it.
    ///
    /// Listeners on each node run in registration order. A listener removed
    /// by an earlier one in the same dispatch is skipped.
    pub fn dispatch(&self, mut event: DomEvent) -> DomEvent {
        let path = self.with_dom(|dom| bubble_path(dom, event.target()));
        let path = if event.bubbles() { &path[..] } else { &path[..path.len().min(1)] };

        for &node in path {
            let callbacks: Vec<(ListenerId, Listener)> = self
                .inner
                .borrow()
                .listeners
                .iter()
                .filter(|(_, entry)| entry.node == node && entry.event_type == event.event_type())
                .map(|(id, entry)| (id, Rc::clone(&entry.callback)))
                .collect();
            if callbacks.is_empty() {
                continue;
            }
            event.set_current_target(node);
            for (id, callback) in callbacks {
                if !self.inner.borrow().listeners.contains_key(id) {
                    continue;
                }
                callback(&mut event, self);
            }
            if event.propagation_stopped() {
                break;
            }
        }
        event
    }

    /// Fire a plain event of `event_type` at `node`.
    pub fn fire(&self, node: NodeId, event_type: &str) -> DomEvent {
        self.dispatch(DomEvent::new(event_type, node))
    }

    pub fn click(&self, node: NodeId) -> DomEvent {
        self.fire(node, "click")
    }

    /// Set the value of `node` and fire `input`, as typing would.
    pub fn input(&self, node: NodeId, value: &str) -> DomEvent {
        self.set_value(node, value);
        self.fire(node, "input")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("nodes", &inner.dom.len())
            .field("listeners", &inner.listeners.len())
            .field("focused", &inner.focused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    fn doc() -> Document {
        Document::parse(
            "<div id=\"app\"><ul><li data-key=\"a\"><button>x</button></li></ul><input value=\"hi\"></div>",
        )
        .unwrap()
    }

    fn first(doc: &Document, selector: &str) -> NodeId {
        doc.query_selector(selector).unwrap().unwrap()
    }

    #[test]
    fn listeners_bubble_in_order() {
        let doc = doc();
        let log = Rc::new(RefCell::new(Vec::new()));
        for (selector, name) in [("button", "button"), ("li", "li"), ("#app", "app")] {
            let log = Rc::clone(&log);
            doc.add_event_listener(first(&doc, selector), "click", move |event, _| {
                log.borrow_mut().push((name, event.current_target()));
            });
        }
        let button = first(&doc, "button");
        doc.click(button);
        let names: Vec<&str> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["button", "li", "app"]);
    }

    #[test]
    fn stop_propagation_halts_bubbling() {
        let doc = doc();
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        doc.add_event_listener(first(&doc, "li"), "click", |event, _| event.stop_propagation());
        doc.add_event_listener(first(&doc, "#app"), "click", move |_, _| *h.borrow_mut() += 1);
        let event = doc.click(first(&doc, "button"));
        assert!(event.propagation_stopped());
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn listeners_may_mutate_the_document() {
        let doc = doc();
        let button = first(&doc, "button");
        doc.add_event_listener(button, "click", |event, doc| {
            doc.set_text_content(event.target(), "clicked");
        });
        doc.click(button);
        assert_eq!(doc.text_content(button), "clicked");
    }

    #[test]
    fn removing_nodes_drops_their_listeners() {
        let doc = doc();
        let li = first(&doc, "li");
        doc.add_event_listener(first(&doc, "button"), "click", |_, _| {});
        doc.add_event_listener(li, "click", |_, _| {});
        assert_eq!(doc.listener_count(), 2);
        assert!(doc.remove(li));
        assert_eq!(doc.listener_count(), 0);
        assert!(!doc.remove(li));
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let doc = doc();
        let button = first(&doc, "button");
        let victim: Rc<RefCell<Option<ListenerId>>> = Rc::default();
        let v = Rc::clone(&victim);
        doc.add_event_listener(button, "click", move |_, doc| {
            if let Some(id) = *v.borrow() {
                doc.remove_event_listener(id);
            }
        });
        let ran = Rc::new(RefCell::new(false));
        let r = Rc::clone(&ran);
        let id = doc.add_event_listener(button, "click", move |_, _| *r.borrow_mut() = true);
        *victim.borrow_mut() = Some(id);
        doc.click(button);
        assert!(!*ran.borrow());
    }

    #[test]
    fn values_and_focus() {
        let doc = doc();
        let input = first(&doc, "input");
        assert_eq!(doc.value(input), "hi");
        let seen = Rc::new(RefCell::new(String::new()));
        let s = Rc::clone(&seen);
        doc.add_event_listener(input, "input", move |event, doc| {
            *s.borrow_mut() = doc.value(event.target());
        });
        doc.input(input, "typed");
        assert_eq!(*seen.borrow(), "typed");
        assert_eq!(doc.attr(input, "value").as_deref(), Some("hi"));

        doc.focus(input);
        assert!(doc.is_focused(input));
        doc.blur();
        assert_eq!(doc.focused(), None);
    }

    #[test]
    fn replace_and_serialize() {
        let doc = doc();
        let li = first(&doc, "li");
        let ul = doc.parent(li).unwrap();
        let fresh = doc.create_element("li");
        doc.set_attr(fresh, "data-key", "b");
        doc.replace(li, fresh);
        assert_eq!(doc.inner_html(ul), "<li data-key=\"b\"></li>");
        let added = doc.append_html(ul, "<li>c</li>").unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(doc.element_children(ul).len(), 2);
        assert!(doc.to_html().starts_with("<div id=\"app\">"));
    }
}
