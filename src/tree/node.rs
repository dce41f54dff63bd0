//! Raw trees as authors write them: one-key nodes, lists, text, and nulls.

use std::fmt;

use serde_json::{Map, Number, Value};

use super::props::{kind_of, Props};
use super::vnode::{Element, Inner, VNode};
use crate::component::Component;
use crate::error::{CoherentError, Result};

// ---------------------------------------------------------------------------
// NodeKey
// ---------------------------------------------------------------------------

/// The key half of a node: what the props bag belongs to.
#[derive(Clone)]
pub enum NodeKey {
    /// An HTML tag name.
    Tag(String),
    /// A component invoked with the props.
    Component(Component),
    /// A context binding visible to the node's children while they render.
    Provider { key: String, value: Value },
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => write!(f, "Tag({tag})"),
            Self::Component(c) => write!(f, "Component({})", c.name()),
            Self::Provider { key, value } => write!(f, "Provider({key}={value})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// An unvalidated tree description.
///
/// `Node` holds a list of key/props entries so that malformed input (zero or
/// several keys) can be represented and rejected by the normalizer.
#[derive(Clone, Debug, Default)]
pub enum Tree {
    /// `null` / `undefined`: renders nothing.
    #[default]
    Empty,
    /// Booleans render nothing; they appear from `cond && node` style input.
    Bool(bool),
    /// Bare text leaf.
    Text(String),
    /// Bare number leaf, rendered as text.
    Number(Number),
    /// Ordered sequence of trees.
    List(Vec<Tree>),
    /// A mapping from key to props; valid only with exactly one entry.
    Node(Vec<(NodeKey, Props)>),
    /// Canonical nodes that were already normalized and expanded.
    Resolved(Vec<VNode>),
}

impl Tree {
    /// `{ tag: props }`.
    pub fn element(tag: impl Into<String>, props: Props) -> Self {
        Self::Node(vec![(NodeKey::Tag(tag.into()), props)])
    }

    /// `{ tag: {} }`.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self::element(tag, Props::new())
    }

    /// `{ Component: props }`.
    pub fn component(component: Component, props: Props) -> Self {
        Self::Node(vec![(NodeKey::Component(component), props)])
    }

    /// A context provider scoping `key = value` to `children`.
    pub fn provider<I, T>(key: impl Into<String>, value: impl Into<Value>, children: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tree>,
    {
        Self::Node(vec![(
            NodeKey::Provider {
                key: key.into(),
                value: value.into(),
            },
            Props::new().children(children),
        )])
    }

    /// A text leaf.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// A list of trees.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Tree>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// A raw mapping with arbitrary entries (possibly invalid).
    pub fn from_entries(entries: Vec<(NodeKey, Props)>) -> Self {
        Self::Node(entries)
    }

    /// Whether this tree renders nothing by itself.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty | Self::Bool(_) => true,
            Self::List(items) => items.iter().all(Tree::is_empty),
            Self::Resolved(nodes) => nodes.is_empty(),
            _ => false,
        }
    }

    /// Serialize into the plain JSON form read by [`Tree::from_json`].
    ///
    /// Component nodes, context providers and event handlers exist only in
    /// this process; they are rejected with the path of the offending node.
    pub fn to_json(&self) -> Result<Value> {
        self.to_json_at("$")
    }

    pub(crate) fn to_json_at(&self, path: &str) -> Result<Value> {
        Ok(match self {
            Self::Empty => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(n) => Value::Number(n.clone()),
            Self::List(items) => Value::Array(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| item.to_json_at(&format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Node(entries) => {
                let mut map = Map::new();
                for (key, props) in entries {
                    match key {
                        NodeKey::Tag(tag) => {
                            map.insert(tag.clone(), props.to_json_at(&format!("{path}.{tag}"))?);
                        }
                        NodeKey::Component(component) => return Err(component_error(component.name(), path)),
                        NodeKey::Provider { key, .. } => return Err(provider_error(key, path)),
                    }
                }
                Value::Object(map)
            }
            Self::Resolved(nodes) => match nodes.as_slice() {
                [node] => vnode_to_json(node, path)?,
                nodes => Value::Array(
                    nodes
                        .iter()
                        .enumerate()
                        .map(|(i, node)| vnode_to_json(node, &format!("{path}[{i}]")))
                        .collect::<Result<Vec<_>>>()?,
                ),
            },
        })
    }

    /// Parse a plain JSON description.
    ///
    /// Objects are nodes (each key a tag), arrays are lists, strings and numbers
    /// are text. A string in props position is shorthand for `{ text: ... }`.
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(match value {
            Value::Null => Self::Empty,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.clone()),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(
                items
                    .iter()
                    .map(Tree::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                let mut entries = Vec::with_capacity(map.len());
                for (tag, props) in map {
                    let props = match props {
                        Value::String(text) => Props::new().text(text.clone()),
                        Value::Null => Props::new(),
                        Value::Object(_) => Props::from_json(props)?,
                        other => {
                            return Err(CoherentError::structure(
                                format!("$.{tag}"),
                                format!("props must be an object or a string, got {}", kind_of(other)),
                            ))
                        }
                    };
                    entries.push((NodeKey::Tag(tag.clone()), props));
                }
                Self::Node(entries)
            }
        })
    }
}

fn component_error(name: &str, path: &str) -> CoherentError {
    CoherentError::structure(format!("{path}.<{name}>"), "component nodes cannot be serialized")
}

fn provider_error(key: &str, path: &str) -> CoherentError {
    CoherentError::structure(path, format!("the `{key}` context provider cannot be serialized"))
}

fn vnode_to_json(node: &VNode, path: &str) -> Result<Value> {
    match node {
        VNode::Text(text) => Ok(Value::String(text.clone())),
        VNode::Element(element) => element_to_json(element, path),
        VNode::Component { component, .. } => Err(component_error(component.name(), path)),
        VNode::Provider { key, .. } => Err(provider_error(key, path)),
    }
}

fn element_to_json(element: &Element, path: &str) -> Result<Value> {
    let path = format!("{path}.{}", element.tag);
    if let Some((event, _)) = element.handlers.first() {
        return Err(CoherentError::structure(
            path,
            format!("the `{event}` handler cannot be serialized"),
        ));
    }
    let mut props: Map<String, Value> = element.attrs.iter().cloned().collect();
    if let Some(key) = &element.key {
        props.insert("key".to_owned(), Value::String(key.clone()));
    }
    match &element.inner {
        Some(Inner::Text(text)) => props.insert("text".to_owned(), Value::String(text.clone())),
        Some(Inner::Html(html)) => props.insert("html".to_owned(), Value::String(html.clone())),
        None => None,
    };
    if !element.children.is_empty() {
        let children = element
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| vnode_to_json(child, &format!("{path}.children[{i}]")))
            .collect::<Result<Vec<_>>>()?;
        props.insert("children".to_owned(), Value::Array(children));
    }
    let mut map = Map::new();
    map.insert(element.tag.clone(), Value::Object(props));
    Ok(Value::Object(map))
}

impl From<&str> for Tree {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Tree {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for Tree {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! tree_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Tree {
            fn from(n: $ty) -> Self {
                Self::Number(Number::from(n))
            }
        })*
    };
}

tree_from_int!(i32, i64, u32, u64, usize);

impl From<f64> for Tree {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Self::Empty, Self::Number)
    }
}

impl<T: Into<Tree>> From<Option<T>> for Tree {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Tree>> From<Vec<T>> for Tree {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<VNode> for Tree {
    fn from(node: VNode) -> Self {
        Self::Resolved(vec![node])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn to_json_mirrors_from_json() {
        let value = json!({
            "ul": {
                "class": "list",
                "children": [{ "li": { "text": "a", "key": "1" } }, "b", 3, null, [false]],
            }
        });
        let tree = Tree::from_json(&value).unwrap();
        assert_eq!(tree.to_json().unwrap(), value);
    }

    #[test]
    fn to_json_rejects_components_and_providers() {
        let card = Component::function("Card", |_, _| Ok(Tree::Empty));
        let tree = Tree::element("div", Props::new().child(card.node(Props::new())));
        let err = tree.to_json().unwrap_err();
        assert!(matches!(err, CoherentError::Structure { ref path, .. } if path == "$.div.children[0].<Card>"));

        let provided = Tree::provider("theme", "dark", [Tree::text("x")]);
        assert!(provided.to_json().is_err());
    }

    #[test]
    fn element_builder_has_one_entry() {
        let tree = Tree::element("div", Props::new().class("x"));
        match tree {
            Tree::Node(entries) => {
                assert_eq!(entries.len(), 1);
                assert!(matches!(&entries[0].0, NodeKey::Tag(t) if t == "div"));
            }
            other => panic!("expected node, got {other:?}"),
        }
    }

    #[test]
    fn from_json_object_and_array() {
        let tree = Tree::from_json(&json!({
            "ul": { "children": [{ "li": "one" }, { "li": { "text": "two" } }] }
        }))
        .unwrap();
        let Tree::Node(entries) = tree else {
            panic!("expected node");
        };
        assert_eq!(entries[0].1.children_ref().len(), 2);
    }

    #[test]
    fn from_json_string_props_is_text_shorthand() {
        let Tree::Node(entries) = Tree::from_json(&json!({ "p": "hi" })).unwrap() else {
            panic!("expected node");
        };
        assert_eq!(entries[0].1.get_str("text"), Some("hi"));
    }

    #[test]
    fn from_json_keeps_multi_key_objects_for_the_normalizer() {
        let Tree::Node(entries) = Tree::from_json(&json!({ "a": {}, "b": {} })).unwrap() else {
            panic!("expected node");
        };
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn from_json_rejects_numeric_props() {
        assert!(Tree::from_json(&json!({ "p": 5 })).is_err());
    }

    #[test]
    fn option_and_vec_conversions() {
        assert!(matches!(Tree::from(None::<&str>), Tree::Empty));
        assert!(matches!(Tree::from(Some("x")), Tree::Text(_)));
        assert!(matches!(Tree::from(vec!["a", "b"]), Tree::List(v) if v.len() == 2));
    }

    #[test]
    fn is_empty_looks_through_lists() {
        assert!(Tree::list(vec![Tree::Empty, Tree::Bool(false)]).is_empty());
        assert!(!Tree::list(vec![Tree::Empty, Tree::text("x")]).is_empty());
    }
}
