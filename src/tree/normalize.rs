//! Structural validation and flattening of raw trees.
//!
//! `normalize` turns a [`Tree`] into canonical [`VNode`]s. It never invokes
//! components; component and provider nodes survive as-is for the expansion
//! step. The pass is pure: equal input yields equal output.

use serde_json::Value;

use super::node::{NodeKey, Tree};
use super::props::{display_number, kind_of, scalar_text, Props, RESERVED_PROPS};
use super::vnode::{Element, Inner, VNode};
use crate::error::{CoherentError, Result};

/// Normalize a tree rooted at `$`.
pub fn normalize(tree: &Tree) -> Result<Vec<VNode>> {
    normalize_at(tree, "$")
}

/// Normalize a tree, reporting errors relative to `path`.
pub fn normalize_at(tree: &Tree, path: &str) -> Result<Vec<VNode>> {
    let mut out = Vec::new();
    normalize_into(tree, path, &mut out)?;
    Ok(out)
}

fn normalize_into(tree: &Tree, path: &str, out: &mut Vec<VNode>) -> Result<()> {
    match tree {
        Tree::Empty | Tree::Bool(_) => {}
        Tree::Text(text) => out.push(VNode::Text(text.clone())),
        Tree::Number(n) => out.push(VNode::Text(display_number(n))),
        Tree::List(items) => normalize_sequence(items, path, out)?,
        Tree::Resolved(nodes) => out.extend(nodes.iter().cloned()),
        Tree::Node(entries) => {
            let [(key, props)] = entries.as_slice() else {
                let keys: Vec<String> = entries.iter().map(|(k, _)| key_label(k)).collect();
                return Err(CoherentError::structure(
                    path,
                    format!(
                        "a node must have exactly one key, found {} ({})",
                        entries.len(),
                        keys.join(", ")
                    ),
                ));
            };
            out.push(normalize_node(key, props, path)?);
        }
    }
    Ok(())
}

/// Flatten exactly one level of nesting; deeper nesting is rejected.
fn normalize_sequence(items: &[Tree], path: &str, out: &mut Vec<VNode>) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        match item {
            Tree::List(nested) => {
                for (j, inner) in nested.iter().enumerate() {
                    let inner_path = format!("{item_path}[{j}]");
                    if matches!(inner, Tree::List(_)) {
                        return Err(CoherentError::structure(
                            inner_path,
                            "sequences may nest at most one level deep",
                        ));
                    }
                    normalize_into(inner, &inner_path, out)?;
                }
            }
            other => normalize_into(other, &item_path, out)?,
        }
    }
    Ok(())
}

fn normalize_node(key: &NodeKey, props: &Props, path: &str) -> Result<VNode> {
    match key {
        NodeKey::Tag(tag) => normalize_element(tag, props, &format!("{path}.{tag}")).map(VNode::Element),
        NodeKey::Component(component) => Ok(VNode::Component {
            component: component.clone(),
            props: props.clone(),
        }),
        NodeKey::Provider { key, value } => {
            let child_path = format!("{path}.provider({key}).children");
            let mut children = Vec::new();
            normalize_sequence(props.children_ref(), &child_path, &mut children)?;
            Ok(VNode::Provider {
                key: key.clone(),
                value: value.clone(),
                children,
            })
        }
    }
}

fn normalize_element(tag: &str, props: &Props, path: &str) -> Result<Element> {
    let text = content_value(props, "text", path)?;
    let html = content_value(props, "html", path)?;
    let inner = match (text, html) {
        (Some(_), Some(_)) => {
            return Err(CoherentError::structure(
                path,
                "`text` and `html` are mutually exclusive",
            ))
        }
        (Some(text), None) => Some(Inner::Text(text)),
        (None, Some(html)) => Some(Inner::Html(html)),
        (None, None) => None,
    };

    let mut element = Element::new(tag);
    element.inner = inner;
    element.key = props.get("key").and_then(scalar_text);
    for (name, value) in props.values() {
        if RESERVED_PROPS.contains(&name) {
            continue;
        }
        element.set_attr(canonical_attr(name), value.clone());
    }
    element.handlers = props.handlers().to_vec();

    let child_path = format!("{path}.children");
    normalize_sequence(props.children_ref(), &child_path, &mut element.children)?;
    Ok(element)
}

fn content_value(props: &Props, name: &str, path: &str) -> Result<Option<String>> {
    match props.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => scalar_text(value).map(Some).ok_or_else(|| {
            CoherentError::structure(
                path,
                format!("`{name}` must be a scalar, got {}", kind_of(value)),
            )
        }),
    }
}

fn canonical_attr(name: &str) -> &str {
    match name {
        "className" => "class",
        "htmlFor" => "for",
        other => other,
    }
}

fn key_label(key: &NodeKey) -> String {
    match key {
        NodeKey::Tag(tag) => tag.clone(),
        NodeKey::Component(c) => c.name().to_owned(),
        NodeKey::Provider { key, .. } => format!("provider({key})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::NodeKey;
    use serde_json::json;

    fn tags(nodes: &[VNode]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| match n {
                VNode::Element(e) => e.tag.clone(),
                VNode::Text(t) => format!("#{t}"),
                _ => "?".into(),
            })
            .collect()
    }

    #[test]
    fn drops_nulls_and_booleans() {
        let tree = Tree::element(
            "div",
            Props::new().children(vec![
                Tree::Empty,
                Tree::element("span", Props::new().text("a")),
                Tree::Bool(false),
                Tree::Empty,
                Tree::element("span", Props::new().text("b")),
            ]),
        );
        let nodes = normalize(&tree).unwrap();
        let div = nodes[0].as_element().unwrap();
        assert_eq!(tags(&div.children), vec!["span", "span"]);
        assert_eq!(div.children[1].as_element().unwrap().inner, Some(Inner::Text("b".into())));
    }

    #[test]
    fn flattens_one_level_in_order() {
        let tree = Tree::element(
            "ul",
            Props::new()
                .child(Tree::tag("a"))
                .child(Tree::list(vec![Tree::tag("b"), Tree::tag("c")]))
                .child(Tree::tag("d")),
        );
        let nodes = normalize(&tree).unwrap();
        assert_eq!(tags(&nodes[0].as_element().unwrap().children), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn rejects_deeper_nesting() {
        let tree = Tree::element(
            "ul",
            Props::new().child(Tree::list(vec![Tree::list(vec![Tree::tag("x")])])),
        );
        let err = normalize(&tree).unwrap_err();
        assert!(err.to_string().contains("$.ul.children[0][0]"), "{err}");
    }

    #[test]
    fn bare_strings_and_numbers_become_text() {
        let tree = Tree::element("p", Props::new().child("n = ").child(5).child(2.5));
        let nodes = normalize(&tree).unwrap();
        assert_eq!(tags(&nodes[0].as_element().unwrap().children), vec!["#n = ", "#5", "#2.5"]);
    }

    #[test]
    fn rejects_zero_keys() {
        let err = normalize(&Tree::from_entries(vec![])).unwrap_err();
        assert!(matches!(err, CoherentError::Structure { ref path, .. } if path == "$"));
    }

    #[test]
    fn rejects_multiple_keys_with_path() {
        let tree = Tree::element(
            "div",
            Props::new().child(Tree::tag("ok")).child(Tree::from_entries(vec![
                (NodeKey::Tag("a".into()), Props::new()),
                (NodeKey::Tag("b".into()), Props::new()),
            ])),
        );
        let err = normalize(&tree).unwrap_err();
        match err {
            CoherentError::Structure { path, message } => {
                assert_eq!(path, "$.div.children[1]");
                assert!(message.contains("exactly one key"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rejects_text_and_html_together() {
        let tree = Tree::element("div", Props::new().text("a").html("<b>b</b>"));
        let err = normalize(&tree).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn rejects_object_text() {
        let tree = Tree::element("div", Props::new().set("text", json!({ "a": 1 })));
        assert!(normalize(&tree).is_err());
    }

    #[test]
    fn reserved_props_are_not_attributes() {
        let tree = Tree::element(
            "li",
            Props::new().key("k1").text("x").set("className", "item").set("htmlFor", "f"),
        );
        let nodes = normalize(&tree).unwrap();
        let li = nodes[0].as_element().unwrap();
        assert_eq!(li.key.as_deref(), Some("k1"));
        let names: Vec<&str> = li.attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["class", "for"]);
    }

    #[test]
    fn handlers_carry_over() {
        let tree = Tree::element("button", Props::new().on("onClick", |_| {}));
        let nodes = normalize(&tree).unwrap();
        assert_eq!(nodes[0].as_element().unwrap().handlers[0].0, "click");
    }

    #[test]
    fn provider_children_are_normalized() {
        let tree = Tree::provider("theme", "dark", vec![Tree::tag("a"), Tree::Empty]);
        let nodes = normalize(&tree).unwrap();
        match &nodes[0] {
            VNode::Provider { key, children, .. } => {
                assert_eq!(key, "theme");
                assert_eq!(children.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn normalize_is_deterministic() {
        let tree = Tree::from_json(&json!({
            "div": { "id": "x", "children": [{ "p": "a" }, null, "b"] }
        }))
        .unwrap();
        let a = format!("{:?}", normalize(&tree).unwrap());
        let b = format!("{:?}", normalize(&tree).unwrap());
        assert_eq!(a, b);
    }
}
