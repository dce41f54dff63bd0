//! Tree operations: insert, remove, reparent, walk, serialize.

use std::collections::VecDeque;

use slotmap::{SecondaryMap, SlotMap};

use super::node::{NodeData, NodeKind, NodeId};
use crate::render::html::{escape_attr, escape_text, is_void};

/// Empty slice constant for returning when a node has no children.
const EMPTY_CHILDREN: &[NodeId] = &[];

/// Elements whose text children are serialized verbatim.
pub(crate) const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

/// The document tree, backed by a slotmap arena.
///
/// All nodes live in a single `SlotMap`. Parent/child relationships are stored
/// in secondary maps so that node removal is O(subtree size) and lookup is O(1).
/// Nodes inserted with [`Dom::insert`] are detached until attached with
/// [`Dom::reparent`] or [`Dom::insert_before`].
pub struct Dom {
    pub(crate) nodes: SlotMap<NodeId, NodeData>,
    children: SecondaryMap<NodeId, Vec<NodeId>>,
    parent: SecondaryMap<NodeId, NodeId>,
    root: Option<NodeId>,
}

impl Dom {
    /// Create an empty DOM.
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            children: SecondaryMap::new(),
            parent: SecondaryMap::new(),
            root: None,
        }
    }

    /// Create a DOM holding only a document root.
    pub fn with_document() -> Self {
        let mut dom = Self::new();
        dom.insert(NodeData::document());
        dom
    }

    /// Insert a detached node (no parent).
    ///
    /// If no root has been set yet, this node becomes the root.
    pub fn insert(&mut self, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    /// Insert a node as the last child of `parent`.
    ///
    /// A missing `parent` leaves the new node detached.
    pub fn insert_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.nodes.insert(data);
        self.children.insert(id, Vec::new());
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(id);
            self.parent.insert(id, parent);
        }
        id
    }

    /// Remove a node and all its descendants.
    ///
    /// Returns the `NodeData` for the removed node, or `None` if it didn't exist.
    pub fn remove(&mut self, id: NodeId) -> Option<NodeData> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        self.detach(id);

        if self.root == Some(id) {
            self.root = None;
        }

        let mut to_remove = VecDeque::new();
        to_remove.push_back(id);
        let mut removed_root_data = None;

        while let Some(current) = to_remove.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                to_remove.extend(kids);
            }
            self.parent.remove(current);
            let data = self.nodes.remove(current);
            if current == id {
                removed_root_data = data;
            }
        }

        removed_root_data
    }

    /// Unlink `node` from its parent, keeping its subtree.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(old_parent) = self.parent.remove(node) {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&child| child != node);
            }
        }
    }

    /// Move `node` to become the last child of `new_parent`.
    ///
    /// The node keeps its subtree intact. Moving a node under itself or one
    /// of its descendants is ignored.
    pub fn reparent(&mut self, node: NodeId, new_parent: NodeId) {
        if !self.can_adopt(new_parent, node) {
            return;
        }
        self.detach(node);
        self.parent.insert(node, new_parent);
        if let Some(siblings) = self.children.get_mut(new_parent) {
            siblings.push(node);
        }
    }

    /// Move `node` into `parent` right before `reference`.
    ///
    /// Appends when `reference` is `None` or not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) {
        if !self.can_adopt(parent, node) || Some(node) == reference {
            return;
        }
        self.detach(node);
        self.parent.insert(node, parent);
        if let Some(siblings) = self.children.get_mut(parent) {
            let at = reference
                .and_then(|r| siblings.iter().position(|&c| c == r))
                .unwrap_or(siblings.len());
            siblings.insert(at, node);
        }
    }

    /// Put detached `replacement` where `old` is, then remove `old`.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> Option<NodeData> {
        let parent = self.parent(old);
        match parent {
            Some(parent) => self.insert_before(parent, replacement, Some(old)),
            None if self.root == Some(old) => self.root = Some(replacement),
            None => {}
        }
        self.remove(old)
    }

    /// Remove every child of `node`.
    pub fn clear_children(&mut self, node: NodeId) {
        for child in self.children(node).to_vec() {
            self.remove(child);
        }
    }

    fn can_adopt(&self, parent: NodeId, node: NodeId) -> bool {
        self.nodes.contains_key(parent)
            && self.nodes.contains_key(node)
            && parent != node
            && !self.ancestors(parent).contains(&node)
    }

    /// Get the parent of a node, if it has one.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent.get(id).copied()
    }

    /// Get the children of a node. Returns an empty slice if the node has no children
    /// or does not exist.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(EMPTY_CHILDREN)
    }

    /// Children that are elements, in order.
    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.get(child).is_some_and(NodeData::is_element))
            .collect()
    }

    /// Walk from `id` up to the root, collecting ancestor node ids.
    ///
    /// The returned vec does **not** include `id` itself; it starts with the
    /// immediate parent and ends at the root.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(p) = self.parent.get(current).copied() {
            result.push(p);
            current = p;
        }
        result
    }

    /// Whether `node` is `ancestor` or lives below it.
    pub fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// Immutable access to a node's data.
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id)
    }

    /// Mutable access to a node's data.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id)
    }

    /// The current root node, if set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Explicitly set the root node.
    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the DOM is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the DOM contains a node with the given id.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Pre-order depth-first traversal starting from `start`.
    pub fn walk_depth_first(&self, start: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            result.push(current);
            // Reverse so the first child is visited first.
            for &child in self.children(current).iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    // -- text ---------------------------------------------------------------

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.walk_depth_first(id)
            .into_iter()
            .filter_map(|node| self.get(node).and_then(NodeData::text_data))
            .collect()
    }

    /// Replace the children of `id` with a single text node.
    ///
    /// An empty string leaves no children at all.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        if !self.contains(id) {
            return;
        }
        self.clear_children(id);
        if !text.is_empty() {
            self.insert_child(id, NodeData::text(text));
        }
    }

    // -- serialization ------------------------------------------------------

    /// Markup for `id` and its subtree.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(&mut out, id, false);
        out
    }

    /// Markup for the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let raw = self
            .get(id)
            .and_then(NodeData::tag)
            .is_some_and(|tag| RAW_TEXT_TAGS.contains(&tag));
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(&mut out, child, raw);
        }
        out
    }

    fn write_node(&self, out: &mut String, id: NodeId, raw: bool) {
        let Some(data) = self.get(id) else {
            return;
        };
        match &data.kind {
            NodeKind::Document => {
                for &child in self.children(id) {
                    self.write_node(out, child, false);
                }
            }
            NodeKind::Text(text) if raw => out.push_str(text),
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
            NodeKind::Doctype(text) => {
                out.push_str("<!");
                out.push_str(text);
                out.push('>');
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in &data.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void(tag) {
                    return;
                }
                out.push_str(&self.inner_html(id));
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Build a small test tree:
    /// ```text
    ///       root
    ///      /    \
    ///    a        b
    ///   / \
    ///  c   d
    /// ```
    fn build_tree() -> (Dom, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let root = dom.insert(NodeData::element("main").with_id("root"));
        let a = dom.insert_child(root, NodeData::element("section").with_id("a").with_class("left"));
        let b = dom.insert_child(root, NodeData::element("section").with_id("b").with_class("right"));
        let c = dom.insert_child(a, NodeData::element("button").with_id("c"));
        let d = dom.insert_child(a, NodeData::element("label").with_id("d"));
        (dom, root, a, b, c, d)
    }

    #[test]
    fn insert_sets_root() {
        let mut dom = Dom::new();
        let id = dom.insert(NodeData::document());
        assert_eq!(dom.root(), Some(id));
        let _second = dom.insert(NodeData::element("div"));
        assert_eq!(dom.root(), Some(id));
    }

    #[test]
    fn insert_child_parent_relationship() {
        let (dom, root, a, _b, c, _d) = build_tree();
        assert_eq!(dom.parent(a), Some(root));
        assert_eq!(dom.parent(c), Some(a));
        assert_eq!(dom.parent(root), None);
    }

    #[test]
    fn children_list() {
        let (dom, root, a, b, c, d) = build_tree();
        assert_eq!(dom.children(root), &[a, b]);
        assert_eq!(dom.children(a), &[c, d]);
        assert!(dom.children(c).is_empty());
    }

    #[test]
    fn element_children_skip_text() {
        let (mut dom, root, a, b, ..) = build_tree();
        dom.insert_child(root, NodeData::text("\n"));
        assert_eq!(dom.element_children(root), vec![a, b]);
    }

    #[test]
    fn ancestors() {
        let (dom, root, a, _b, c, _d) = build_tree();
        assert_eq!(dom.ancestors(c), vec![a, root]);
        assert!(dom.ancestors(root).is_empty());
        assert!(dom.is_inclusive_descendant(c, root));
        assert!(dom.is_inclusive_descendant(a, a));
    }

    #[test]
    fn remove_subtree() {
        let (mut dom, root, a, b, c, d) = build_tree();
        let removed = dom.remove(a);
        assert_eq!(removed.and_then(|n| n.id().map(str::to_owned)).as_deref(), Some("a"));
        assert!(!dom.contains(c));
        assert!(!dom.contains(d));
        assert_eq!(dom.children(root), &[b]);
        assert_eq!(dom.len(), 2);
        assert!(dom.remove(a).is_none());
    }

    #[test]
    fn remove_root() {
        let (mut dom, root, ..) = build_tree();
        dom.remove(root);
        assert!(dom.is_empty());
        assert_eq!(dom.root(), None);
    }

    #[test]
    fn reparent_moves_subtree() {
        let (mut dom, root, a, b, c, _d) = build_tree();
        dom.reparent(c, b);
        assert_eq!(dom.parent(c), Some(b));
        assert!(!dom.children(a).contains(&c));
        assert_eq!(dom.ancestors(c), vec![b, root]);
    }

    #[test]
    fn reparent_into_own_subtree_is_ignored() {
        let (mut dom, root, a, _b, c, _d) = build_tree();
        dom.reparent(a, c);
        assert_eq!(dom.parent(a), Some(root));
    }

    #[test]
    fn insert_before_orders_siblings() {
        let (mut dom, _root, a, _b, c, d) = build_tree();
        let e = dom.insert(NodeData::element("em"));
        dom.insert_before(a, e, Some(d));
        assert_eq!(dom.children(a), &[c, e, d]);
        dom.insert_before(a, c, None);
        assert_eq!(dom.children(a), &[e, d, c]);
    }

    #[test]
    fn replace_takes_position() {
        let (mut dom, _root, a, _b, c, d) = build_tree();
        let e = dom.insert(NodeData::element("em"));
        dom.replace(c, e);
        assert_eq!(dom.children(a), &[e, d]);
        assert!(!dom.contains(c));
    }

    #[test]
    fn walk_is_pre_order() {
        let (dom, root, a, b, c, d) = build_tree();
        assert_eq!(dom.walk_depth_first(root), vec![root, a, c, d, b]);
        assert_eq!(dom.walk_depth_first(a), vec![a, c, d]);
    }

    #[test]
    fn text_content_round_trip() {
        let (mut dom, _root, a, _b, c, d) = build_tree();
        dom.insert_child(c, NodeData::text("Save"));
        dom.insert_child(d, NodeData::text(" me"));
        assert_eq!(dom.text_content(a), "Save me");
        dom.set_text_content(a, "gone");
        assert_eq!(dom.children(a).len(), 1);
        assert_eq!(dom.text_content(a), "gone");
        dom.set_text_content(a, "");
        assert!(dom.children(a).is_empty());
    }

    #[test]
    fn serializes_markup() {
        let mut dom = Dom::with_document();
        let root = dom.root().unwrap();
        let div = dom.insert_child(root, NodeData::element("div").with_attr("title", "a \"b\""));
        dom.insert_child(div, NodeData::text("1 < 2"));
        dom.insert_child(div, NodeData::element("br"));
        dom.insert_child(div, NodeData::element("input").with_attr("disabled", ""));
        let style = dom.insert_child(root, NodeData::element("style"));
        dom.insert_child(style, NodeData::text("a>b{}"));
        assert_eq!(
            dom.outer_html(root),
            "<div title=\"a &quot;b&quot;\">1 &lt; 2<br><input disabled></div><style>a>b{}</style>"
        );
        assert_eq!(dom.inner_html(div), "1 &lt; 2<br><input disabled>");
    }
}
