//! Canonical nodes produced by the normalizer.

use std::fmt;

use serde_json::Value;

use super::props::{Handler, Props};
use crate::component::Component;

/// Normalized node.
///
/// After expansion only `Element` and `Text` remain; `Component` and
/// `Provider` exist between normalization and expansion.
#[derive(Clone)]
pub enum VNode {
    Element(Element),
    Text(String),
    Component { component: Component, props: Props },
    Provider {
        key: String,
        value: Value,
        children: Vec<VNode>,
    },
}

impl VNode {
    /// The element, if this is one.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to the element, if this is one.
    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Self::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for VNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(e) => e.fmt(f),
            Self::Text(t) => write!(f, "Text({t:?})"),
            Self::Component { component, props } => f
                .debug_struct("Component")
                .field("name", &component.name())
                .field("props", props)
                .finish(),
            Self::Provider {
                key,
                value,
                children,
            } => f
                .debug_struct("Provider")
                .field("key", key)
                .field("value", value)
                .field("children", children)
                .finish(),
        }
    }
}

/// Inner content of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Inner {
    /// Escaped on output.
    Text(String),
    /// Emitted verbatim; the caller vouches for it.
    Html(String),
}

/// A normalized element.
#[derive(Clone, Default)]
pub struct Element {
    /// Tag name as written.
    pub tag: String,
    /// Attributes in insertion order, reserved props removed.
    pub attrs: Vec<(String, Value)>,
    /// `text` or `html` content, emitted before children.
    pub inner: Option<Inner>,
    /// Child nodes, flattened and null-filtered.
    pub children: Vec<VNode>,
    /// Event handlers keyed by event type.
    pub handlers: Vec<(String, Handler)>,
    /// Stable list identity.
    pub key: Option<String>,
}

impl Element {
    /// Create an element with no attributes or content.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Look up an attribute.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Set an attribute, replacing an existing one in place.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name, value));
        }
    }

    /// Child elements only (text children skipped), in order.
    pub fn element_children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(VNode::as_element)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<&str> = self.handlers.iter().map(|(e, _)| e.as_str()).collect();
        f.debug_struct("Element")
            .field("tag", &self.tag)
            .field("attrs", &self.attrs)
            .field("inner", &self.inner)
            .field("children", &self.children)
            .field("handlers", &handlers)
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_attr_replaces() {
        let mut el = Element::new("div");
        el.set_attr("class", "a");
        el.set_attr("id", "x");
        el.set_attr("class", "b");
        assert_eq!(el.attrs.len(), 2);
        assert_eq!(el.attr("class"), Some(&json!("b")));
    }

    #[test]
    fn element_children_skip_text() {
        let mut el = Element::new("p");
        el.children.push(VNode::Text("hi".into()));
        el.children.push(VNode::Element(Element::new("b")));
        let tags: Vec<&str> = el.element_children().map(|e| e.tag.as_str()).collect();
        assert_eq!(tags, vec!["b"]);
    }
}
