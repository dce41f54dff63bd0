//! Snapshot rendering helpers.
//!
//! Functions for turning trees into markup and markup into documents, so
//! tests can assert on server output and then drive the same nodes on the
//! client.

use crate::dom::{Document, NodeId};
use crate::error::{CoherentError, Result};
use crate::render::{render_sync, RenderOptions};
use crate::tree::Tree;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render `tree` with default options.
pub fn render_to_string(tree: &Tree) -> Result<String> {
    render_sync(tree, &RenderOptions::default())
}

/// Render `tree`, parse the markup, and return the document with its first
/// top-level element.
pub fn server_document(tree: &Tree) -> Result<(Document, NodeId)> {
    let html = render_to_string(tree)?;
    let document = Document::parse(&html)?;
    let root = document
        .element_children(document.root())
        .first()
        .copied()
        .ok_or_else(|| CoherentError::Usage("rendered markup contains no element".into()))?;
    Ok((document, root))
}

/// Markup of `document` with one element per line, indented by depth.
///
/// Text is kept on the line of its element. Useful for readable snapshots
/// of larger documents.
pub fn outline(document: &Document) -> String {
    let mut out = String::new();
    for child in document.element_children(document.root()) {
        outline_node(document, child, 0, &mut out);
    }
    out
}

fn outline_node(document: &Document, node: NodeId, depth: usize, out: &mut String) {
    let Some(tag) = document.tag(node) else {
        return;
    };
    let children = document.element_children(node);
    out.push_str(&"  ".repeat(depth));
    if children.is_empty() {
        out.push_str(&document.outer_html(node));
        out.push('\n');
        return;
    }
    let open = document.outer_html(node);
    let end = open.find('>').map_or(open.len(), |i| i + 1);
    out.push_str(&open[..end]);
    out.push('\n');
    for child in children {
        outline_node(document, child, depth + 1, out);
    }
    out.push_str(&"  ".repeat(depth));
    out.push_str(&format!("</{tag}>\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Props;

    #[test]
    fn server_document_finds_root() {
        let tree = Tree::element("main", Props::new().id("app").child(Tree::text("hi")));
        let (doc, root) = server_document(&tree).unwrap();
        assert_eq!(doc.attr(root, "id").as_deref(), Some("app"));
        assert_eq!(doc.text_content(root), "hi");
    }

    #[test]
    fn server_document_without_element_is_an_error() {
        assert!(server_document(&Tree::text("plain")).is_err());
    }

    #[test]
    fn outline_indents_elements() {
        let doc = Document::parse("<ul class=\"a\"><li>one</li><li>two</li></ul>").unwrap();
        insta::assert_snapshot!(outline(&doc), @r#"
        <ul class="a">
          <li>one</li>
          <li>two</li>
        </ul>
        "#);
    }
}
