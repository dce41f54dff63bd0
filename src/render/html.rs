//! Markup serialization of expanded nodes.
//!
//! Pre-order, depth-first: open tag and attributes, then `text` (escaped) or
//! `html` (verbatim), then children, then the closing tag. Void elements never
//! get a body or a closing tag.

use std::fmt::Write as _;

use serde_json::{Map, Value};

use crate::error::{CoherentError, Result};
use crate::tree::props::display_number;
use crate::tree::{Inner, VNode};

/// Elements that never have content or a closing tag.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Whether `tag` is a void element.
pub fn is_void(tag: &str) -> bool {
    VOID_TAGS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Escape text content.
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    push_escaped(&mut out, input);
    out
}

/// Escape an attribute value for use inside double quotes.
pub fn escape_attr(input: &str) -> String {
    escape_text(input)
}

fn push_escaped(out: &mut String, input: &str) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// `[A-Za-z][A-Za-z0-9-]*`, optionally with one `:` namespace separator.
pub fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && tag.matches(':').count() <= 1
        && !tag.ends_with(':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
}

/// Attribute names may not contain whitespace, quotes, `>`, `/`, `=` or controls.
pub fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && !name.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '"' | '\'' | '>' | '/' | '=' | '<')
        })
}

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// How a prop value appears on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrValue {
    /// Not emitted (`null`, `false`).
    Omit,
    /// Emitted bare (`true`).
    Bare,
    /// Emitted with this (unescaped) value.
    Text(String),
}

pub(crate) fn attr_value(name: &str, value: &Value) -> AttrValue {
    match value {
        Value::Null | Value::Bool(false) => AttrValue::Omit,
        Value::Bool(true) => AttrValue::Bare,
        Value::String(s) => AttrValue::Text(s.clone()),
        Value::Number(n) => AttrValue::Text(display_number(n)),
        Value::Array(items) if name == "class" => {
            let names: Vec<String> = items.iter().filter_map(class_token).collect();
            AttrValue::Text(names.join(" "))
        }
        Value::Object(map) if name == "class" => {
            let names: Vec<&str> = map
                .iter()
                .filter(|(_, on)| truthy(on))
                .map(|(k, _)| k.as_str())
                .collect();
            AttrValue::Text(names.join(" "))
        }
        Value::Object(map) if name == "style" => AttrValue::Text(style_declarations(map)),
        other => AttrValue::Text(other.to_string()),
    }
}

fn class_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(display_number(n)),
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64() != Some(0.0),
        _ => true,
    }
}

/// `{ fontSize: "12px", color: "red" }` → `font-size: 12px; color: red`.
fn style_declarations(map: &Map<String, Value>) -> String {
    let mut decls = Vec::with_capacity(map.len());
    for (prop, value) in map {
        let value = match value {
            Value::Null | Value::Bool(false) => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => display_number(n),
            other => other.to_string(),
        };
        decls.push(format!("{}: {value}", kebab_case(prop)));
    }
    decls.join("; ")
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize expanded nodes to markup.
pub fn render_nodes(nodes: &[VNode]) -> Result<String> {
    let mut out = String::new();
    write_nodes(&mut out, nodes, "$")?;
    Ok(out)
}

fn write_nodes(out: &mut String, nodes: &[VNode], path: &str) -> Result<()> {
    for (i, node) in nodes.iter().enumerate() {
        let node_path = if nodes.len() == 1 && path == "$" {
            path.to_owned()
        } else {
            format!("{path}[{i}]")
        };
        write_node(out, node, &node_path)?;
    }
    Ok(())
}

fn write_node(out: &mut String, node: &VNode, path: &str) -> Result<()> {
    let element = match node {
        VNode::Text(text) => {
            push_escaped(out, text);
            return Ok(());
        }
        VNode::Element(element) => element,
        VNode::Component { component, .. } => {
            return Err(render_error(component.name(), path, "component nodes must be expanded first"))
        }
        VNode::Provider { key, .. } => {
            return Err(render_error(
                &format!("provider({key})"),
                path,
                "provider nodes must be expanded first",
            ))
        }
    };

    let tag = element.tag.as_str();
    let path = format!("{path}.{tag}");
    if !is_valid_tag(tag) {
        return Err(render_error(tag, &path, "invalid tag name"));
    }

    out.push('<');
    out.push_str(tag);
    for (name, value) in &element.attrs {
        if !is_valid_attr_name(name) {
            return Err(render_error(tag, &path, &format!("invalid attribute name `{name}`")));
        }
        match attr_value(name, value) {
            AttrValue::Omit => {}
            AttrValue::Bare => {
                let _ = write!(out, " {name}");
            }
            AttrValue::Text(text) => {
                let _ = write!(out, " {name}=\"");
                push_escaped(out, &text);
                out.push('"');
            }
        }
    }
    out.push('>');

    if is_void(tag) {
        return Ok(());
    }

    match &element.inner {
        Some(Inner::Text(text)) => push_escaped(out, text),
        Some(Inner::Html(html)) => out.push_str(html),
        None => {}
    }
    write_nodes(out, &element.children, &format!("{path}.children"))?;

    let _ = write!(out, "</{tag}>");
    Ok(())
}

fn render_error(tag: &str, path: &str, message: &str) -> CoherentError {
    CoherentError::Render {
        tag: tag.to_owned(),
        path: path.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{normalize, Props, Tree};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn html(tree: Tree) -> String {
        render_nodes(&normalize(&tree).unwrap()).unwrap()
    }

    #[test]
    fn escapes_text() {
        assert_eq!(
            html(Tree::element("p", Props::new().text("<script>"))),
            "<p>&lt;script&gt;</p>"
        );
    }

    #[test]
    fn raw_html_is_verbatim() {
        assert_eq!(
            html(Tree::element("div", Props::new().html("<b>x</b>"))),
            "<div><b>x</b></div>"
        );
    }

    #[test]
    fn attributes_are_escaped() {
        assert_eq!(
            html(Tree::element("a", Props::new().set("title", "\"hi\" & 'bye'"))),
            "<a title=\"&quot;hi&quot; &amp; &#39;bye&#39;\"></a>"
        );
    }

    #[test]
    fn boolean_attributes() {
        let tree = Tree::element(
            "input",
            Props::new()
                .set("type", "checkbox")
                .set("checked", true)
                .set("disabled", false)
                .set("value", Value::Null),
        );
        assert_eq!(html(tree), "<input type=\"checkbox\" checked>");
    }

    #[test]
    fn void_tags_ignore_children() {
        let tree = Tree::element("br", Props::new().text("ignored"));
        assert_eq!(html(tree), "<br>");
    }

    #[test]
    fn class_arrays_and_style_objects() {
        let tree = Tree::element(
            "div",
            Props::new()
                .set("class", json!(["btn", null, "primary", false]))
                .set("style", json!({ "fontSize": "12px", "marginTop": 4, "color": null })),
        );
        assert_eq!(
            html(tree),
            "<div class=\"btn primary\" style=\"font-size: 12px; margin-top: 4\"></div>"
        );
    }

    #[test]
    fn class_object_keeps_truthy_names() {
        let tree = Tree::element(
            "li",
            Props::new().set("className", json!({ "done": true, "active": false })),
        );
        assert_eq!(html(tree), "<li class=\"done\"></li>");
    }

    #[test]
    fn other_objects_are_json_encoded() {
        let tree = Tree::element("div", Props::new().set("data-config", json!({ "a": 1 })));
        assert_eq!(html(tree), "<div data-config=\"{&quot;a&quot;:1}\"></div>");
    }

    #[test]
    fn text_then_children() {
        let tree = Tree::element(
            "p",
            Props::new().text("a").child(Tree::element("b", Props::new().text("c"))),
        );
        assert_eq!(html(tree), "<p>a<b>c</b></p>");
    }

    #[test]
    fn invalid_tag_is_a_render_error() {
        let nodes = normalize(&Tree::element(
            "div",
            Props::new().child(Tree::tag("bad tag")),
        ))
        .unwrap();
        let err = render_nodes(&nodes).unwrap_err();
        match err {
            CoherentError::Render { tag, path, .. } => {
                assert_eq!(tag, "bad tag");
                assert_eq!(path, "$.div.children[0].bad tag");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn invalid_attribute_is_a_render_error() {
        let nodes = normalize(&Tree::element("div", Props::new().set("on\"x", "1"))).unwrap();
        assert!(matches!(render_nodes(&nodes), Err(CoherentError::Render { .. })));
    }

    #[test]
    fn names() {
        assert!(is_valid_tag("my-widget"));
        assert!(is_valid_tag("svg:rect"));
        assert!(!is_valid_tag("1div"));
        assert!(!is_valid_tag(""));
        assert!(is_valid_attr_name("data-id"));
        assert!(is_valid_attr_name("@click"));
        assert!(!is_valid_attr_name("a b"));
    }
}
