//! DOM events and bubble path computation.

use serde_json::Value;

use super::node::NodeId;
use super::tree::Dom;

/// Event types that are delivered to their target only.
const NON_BUBBLING: &[&str] = &["focus", "blur", "load", "mouseenter", "mouseleave"];

/// An event travelling through the document.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    event_type: String,
    target: NodeId,
    current_target: NodeId,
    bubbles: bool,
    detail: Value,
    default_prevented: bool,
    propagation_stopped: bool,
}

impl DomEvent {
    /// A new event aimed at `target`.
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        let event_type = event_type.into();
        let bubbles = !NON_BUBBLING.contains(&event_type.as_str());
        Self {
            event_type,
            target,
            current_target: target,
            bubbles,
            detail: Value::Null,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    /// Attach a payload (builder).
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    pub(crate) fn set_current_target(&mut self, node: NodeId) {
        self.current_target = node;
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop delivery to ancestors once the current node's listeners ran.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

/// Compute the bubble path from `start` up to the root (inclusive).
///
/// Returns `[start, parent, grandparent, ..., root]`.
/// If `start` does not exist in the DOM, returns an empty vec.
pub fn bubble_path(dom: &Dom, start: NodeId) -> Vec<NodeId> {
    if !dom.contains(start) {
        return Vec::new();
    }
    let mut path = vec![start];
    path.extend(dom.ancestors(start));
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeData;
    use serde_json::json;

    fn build_tree() -> (Dom, NodeId, NodeId, NodeId) {
        let mut dom = Dom::new();
        let root = dom.insert(NodeData::element("main"));
        let a = dom.insert_child(root, NodeData::element("div"));
        let c = dom.insert_child(a, NodeData::element("button"));
        (dom, root, a, c)
    }

    #[test]
    fn bubble_path_from_leaf() {
        let (dom, root, a, c) = build_tree();
        assert_eq!(bubble_path(&dom, c), vec![c, a, root]);
        assert_eq!(bubble_path(&dom, root), vec![root]);
    }

    #[test]
    fn bubble_path_nonexistent_node() {
        let (mut dom, ..) = build_tree();
        let stale = dom.insert(NodeData::element("p"));
        dom.remove(stale);
        assert!(bubble_path(&dom, stale).is_empty());
    }

    #[test]
    fn event_flags() {
        let (_, _, _, c) = build_tree();
        let mut event = DomEvent::new("click", c).with_detail(json!({"x": 1}));
        assert!(event.bubbles());
        assert_eq!(event.detail()["x"], 1);
        event.prevent_default();
        event.stop_propagation();
        assert!(event.default_prevented() && event.propagation_stopped());
        assert!(!DomEvent::new("focus", c).bubbles());
    }
}
