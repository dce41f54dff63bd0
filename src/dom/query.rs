//! DOM queries: by id, class, tag, selector; generic predicate matching.
//!
//! Every query walks the attached tree from the root in document order, so
//! detached nodes are never returned.

use super::node::{NodeData, NodeId};
use super::selector::SelectorList;
use super::tree::Dom;
use crate::error::Result;

impl Dom {
    /// Find the first element whose `id` attribute matches.
    pub fn query_by_id(&self, id: &str) -> Option<NodeId> {
        self.iter_nodes()
            .find(|(_, data)| data.id() == Some(id))
            .map(|(node_id, _)| node_id)
    }

    /// Find all elements that have the given CSS class.
    pub fn query_by_class(&self, class: &str) -> Vec<NodeId> {
        self.query_all(|data| data.has_class(class))
    }

    /// Find all elements with the given tag name.
    pub fn query_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.query_all(|data| data.tag().is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// Find all nodes matching an arbitrary predicate.
    pub fn query_all(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeId> {
        self.iter_nodes()
            .filter(|(_, data)| predicate(data))
            .map(|(node_id, _)| node_id)
            .collect()
    }

    /// `scope` and its descendants whose `name` attribute equals `value`.
    pub fn query_by_attr_within(&self, scope: NodeId, name: &str, value: &str) -> Vec<NodeId> {
        self.walk_depth_first(scope)
            .into_iter()
            .filter(|&node| self.get(node).and_then(|data| data.attr(name)) == Some(value))
            .collect()
    }

    /// Descendants of `scope` (excluding `scope`) matching `selectors`.
    pub fn select(&self, scope: NodeId, selectors: &SelectorList) -> Vec<NodeId> {
        self.walk_depth_first(scope)
            .into_iter()
            .skip(1)
            .filter(|&node| selectors.matches(self, node))
            .collect()
    }

    /// First descendant of `scope` matching `selectors`.
    pub fn select_first(&self, scope: NodeId, selectors: &SelectorList) -> Option<NodeId> {
        self.walk_depth_first(scope)
            .into_iter()
            .skip(1)
            .find(|&node| selectors.matches(self, node))
    }

    /// Parse `selector` and match it against the whole document.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.root().map(|root| self.select(root, &selectors)).unwrap_or_default())
    }

    /// Parse `selector` and return the first match in the document.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let selectors = SelectorList::parse(selector)?;
        Ok(self.root().and_then(|root| self.select_first(root, &selectors)))
    }

    /// Attached `(NodeId, &NodeData)` pairs in document order.
    fn iter_nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> {
        self.root()
            .map(|root| self.walk_depth_first(root))
            .unwrap_or_default()
            .into_iter()
            .filter_map(move |id| self.get(id).map(|data| (id, data)))
    }
}

#[cfg(test)]
mod tests {
    use crate::dom::node::NodeData;
    use crate::dom::tree::Dom;
    use crate::error::CoherentError;

    /// ```text
    ///       document
    ///      /       \
    ///   nav#sidebar  section#main.content
    ///   /     \
    /// button   button
    /// #save    #cancel
    /// .primary .danger
    /// .btn     .btn
    /// ```
    fn build_query_tree() -> Dom {
        let mut dom = Dom::with_document();
        let root = dom.root().unwrap();
        let a = dom.insert_child(root, NodeData::element("nav").with_id("sidebar").with_class("nav"));
        dom.insert_child(root, NodeData::element("section").with_id("main").with_class("content"));
        dom.insert_child(
            a,
            NodeData::element("button").with_id("save").with_class("primary").with_class("btn"),
        );
        dom.insert_child(
            a,
            NodeData::element("button").with_id("cancel").with_class("danger").with_class("btn"),
        );
        dom
    }

    #[test]
    fn query_by_id() {
        let dom = build_query_tree();
        let id = dom.query_by_id("sidebar").unwrap();
        assert_eq!(dom.get(id).unwrap().tag(), Some("nav"));
        assert!(dom.query_by_id("nonexistent").is_none());
    }

    #[test]
    fn query_by_class_and_tag() {
        let dom = build_query_tree();
        assert_eq!(dom.query_by_class("btn").len(), 2);
        assert!(dom.query_by_class("nonexistent").is_empty());
        assert_eq!(dom.query_by_tag("BUTTON").len(), 2);
    }

    #[test]
    fn detached_nodes_are_invisible() {
        let mut dom = build_query_tree();
        dom.insert(NodeData::element("button").with_class("btn"));
        assert_eq!(dom.query_by_class("btn").len(), 2);
    }

    #[test]
    fn query_all_custom_predicate() {
        let dom = build_query_tree();
        let results = dom.query_all(|data| data.id().is_some_and(|id| id.starts_with('s')));
        // "sidebar" and "save", in document order
        assert_eq!(results.len(), 2);
        assert_eq!(dom.get(results[1]).unwrap().id(), Some("save"));
    }

    #[test]
    fn selector_queries() {
        let dom = build_query_tree();
        let found = dom.query_selector_all("#sidebar > .btn").unwrap();
        assert_eq!(found.len(), 2);
        let first = dom.query_selector("button.danger").unwrap().unwrap();
        assert_eq!(dom.get(first).unwrap().id(), Some("cancel"));
        assert!(dom.query_selector("table").unwrap().is_none());
        assert!(matches!(
            dom.query_selector("..").unwrap_err(),
            CoherentError::Selector { .. }
        ));
    }

    #[test]
    fn query_on_empty_dom() {
        let dom = Dom::new();
        assert!(dom.query_by_id("x").is_none());
        assert!(dom.query_all(|_| true).is_empty());
        assert!(dom.query_selector_all("*").unwrap().is_empty());
    }
}
