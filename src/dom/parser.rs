//! Tree construction: markup tokens to a [`Dom`].
//!
//! A forgiving subset of the HTML tree builder: void elements never take
//! children, unmatched close tags are ignored, and the common implied end
//! tags (`p`, `li`, `option`, `tr`, `td`/`th`, `dt`/`dd`) are applied.

use super::node::{NodeData, NodeId};
use super::tokenizer::{HtmlToken, Tokenizer};
use super::tree::Dom;
use crate::error::{CoherentError, Result};
use crate::render::html::is_void;

/// Deepest element nesting accepted before parsing fails.
pub const MAX_DEPTH: usize = 512;

/// Start tags that implicitly close an open `p`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "details", "div", "dl", "fieldset", "figure",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p",
    "pre", "section", "table", "ul",
];

/// Parse markup into a document. The root is a document node.
pub fn parse_html(input: &str) -> Result<Dom> {
    let mut dom = Dom::with_document();
    let root = dom
        .root()
        .ok_or_else(|| CoherentError::Markup("document root missing".into()))?;
    parse_into(&mut dom, root, input)?;
    Ok(dom)
}

/// Parse markup and append the resulting nodes to `parent`.
///
/// Returns the top-level nodes that were created, in order.
pub fn parse_into(dom: &mut Dom, parent: NodeId, input: &str) -> Result<Vec<NodeId>> {
    let mut builder = Builder {
        dom,
        base: parent,
        stack: Vec::new(),
        created: Vec::new(),
    };
    for token in Tokenizer::new(input) {
        builder.push(token)?;
    }
    Ok(builder.created)
}

struct Builder<'d> {
    dom: &'d mut Dom,
    base: NodeId,
    /// Open elements with their tag names, outermost first.
    stack: Vec<(NodeId, String)>,
    created: Vec<NodeId>,
}

impl Builder<'_> {
    fn current(&self) -> NodeId {
        self.stack.last().map_or(self.base, |(id, _)| *id)
    }

    fn append(&mut self, data: NodeData) -> NodeId {
        let parent = self.current();
        let id = self.dom.insert_child(parent, data);
        if self.stack.is_empty() {
            self.created.push(id);
        }
        id
    }

    fn push(&mut self, token: HtmlToken<'_>) -> Result<()> {
        match token {
            HtmlToken::Text(text) => {
                if !text.is_empty() {
                    self.append(NodeData::text(text.into_owned()));
                }
            }
            HtmlToken::Comment(text) => {
                self.append(NodeData::comment(text));
            }
            HtmlToken::Doctype(text) => {
                self.append(NodeData::doctype(text));
            }
            HtmlToken::Close(name) => self.close(&name),
            HtmlToken::Open {
                name,
                attrs,
                self_closing,
            } => {
                self.imply_end_tags(&name);
                let mut data = NodeData::element(&name);
                data.attrs = attrs;
                let id = self.append(data);
                if !is_void(&name) && !self_closing {
                    if self.stack.len() >= MAX_DEPTH {
                        return Err(CoherentError::Markup(format!(
                            "elements nested deeper than {MAX_DEPTH} levels"
                        )));
                    }
                    self.stack.push((id, name));
                }
            }
        }
        Ok(())
    }

    /// Pop up to and including the innermost open `name`, if any.
    fn close(&mut self, name: &str) {
        if let Some(pos) = self.stack.iter().rposition(|(_, tag)| tag == name) {
            self.stack.truncate(pos);
        }
    }

    fn imply_end_tags(&mut self, opening: &str) {
        let (targets, boundary): (&[&str], &[&str]) = match opening {
            "li" => (&["li"], &["ul", "ol"]),
            "dt" | "dd" => (&["dt", "dd"], &["dl"]),
            "option" => (&["option"], &["select", "datalist"]),
            "tr" => (&["tr"], &["table", "thead", "tbody", "tfoot"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            tag if CLOSES_P.contains(&tag) => (&["p"], &["div", "section", "article", "main", "body"]),
            _ => return,
        };
        for (i, (_, tag)) in self.stack.iter().enumerate().rev() {
            if targets.contains(&tag.as_str()) {
                self.stack.truncate(i);
                return;
            }
            if boundary.contains(&tag.as_str()) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(input: &str) -> String {
        let dom = parse_html(input).unwrap();
        dom.outer_html(dom.root().unwrap())
    }

    #[test]
    fn parses_nested_elements() {
        let dom = parse_html("<div id=\"app\"><p>Hi <b>there</b></p></div>").unwrap();
        let app = dom.query_by_id("app").unwrap();
        assert_eq!(dom.get(app).unwrap().tag(), Some("div"));
        assert_eq!(dom.text_content(app), "Hi there");
        assert_eq!(dom.element_children(app).len(), 1);
    }

    #[test]
    fn serialization_round_trips_rendered_markup() {
        let html = "<ul class=\"list\"><li data-key=\"1\">a &amp; b</li><li data-key=\"2\"><input value=\"x\" disabled></li></ul>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn void_and_self_closing_elements_take_no_children() {
        let dom = parse_html("<div><br><img src=a.png/>text</div>").unwrap();
        let div = dom.query_by_tag("div")[0];
        assert_eq!(dom.children(div).len(), 3);
        assert_eq!(dom.get(dom.query_by_tag("img")[0]).unwrap().attr("src"), Some("a.png/"));
    }

    #[test]
    fn implied_end_tags() {
        assert_eq!(
            round_trip("<ul><li>a<li>b</ul><p>one<p>two<div>x</div>"),
            "<ul><li>a</li><li>b</li></ul><p>one</p><p>two</p><div>x</div>"
        );
        assert_eq!(
            round_trip("<table><tr><td>1<td>2<tr><td>3</table>"),
            "<table><tr><td>1</td><td>2</td></tr><tr><td>3</td></tr></table>"
        );
    }

    #[test]
    fn stray_close_tags_are_ignored() {
        assert_eq!(round_trip("<div></span>a</div></div>"), "<div>a</div>");
    }

    #[test]
    fn raw_text_is_kept() {
        let html = "<style>a>b{color:red}</style><script>if (a < b) {}</script>";
        assert_eq!(round_trip(html), html);
    }

    #[test]
    fn parse_into_reports_top_level_nodes() {
        let mut dom = Dom::with_document();
        let root = dom.root().unwrap();
        let created = parse_into(&mut dom, root, "<li>a</li> <li>b</li>").unwrap();
        assert_eq!(created.len(), 3);
        assert_eq!(dom.element_children(root).len(), 2);
    }

    #[test]
    fn excessive_nesting_is_an_error() {
        let html = "<div>".repeat(MAX_DEPTH + 1);
        assert!(matches!(parse_html(&html), Err(CoherentError::Markup(_))));
    }
}
