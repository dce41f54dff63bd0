//! Markup minification: compact whitespace between tags.
//!
//! Whitespace runs collapse to one space. A whitespace-only run is removed
//! when it touches a block-level or non-rendered element (or the start or end
//! of the input), since it cannot show there; between inline elements it
//! stays as a single space. Tags, comments, and the bodies of `pre`,
//! `textarea`, `script` and `style` are copied untouched.

/// Elements whose content is whitespace-sensitive or not markup.
const PRESERVE: &[&str] = &["pre", "textarea", "script", "style"];

/// Elements around which whitespace never renders.
const BLOCK: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "caption", "col", "colgroup", "dd",
    "details", "dialog", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form",
    "h1", "h2", "h3", "h4", "h5", "h6", "head", "header", "hr", "html", "li", "link", "main",
    "meta", "nav", "ol", "option", "p", "pre", "script", "section", "select", "style", "summary",
    "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "ul",
];

/// Compact inter-tag whitespace.
pub fn minify_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    // Name of the last tag written; `None` at the start of the input.
    let mut previous: Option<&str> = None;

    while !rest.is_empty() {
        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        if rest.starts_with('<') {
            let end = tag_end(rest);
            let tag = &rest[..end];
            out.push_str(tag);
            rest = &rest[end..];
            previous = tag_name(tag);

            if let Some(name) = opening_name(tag) {
                if PRESERVE.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                    let close = find_close(rest, name).unwrap_or(rest.len());
                    out.push_str(&rest[..close]);
                    rest = &rest[close..];
                }
            }
            continue;
        }

        let end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..end];
        rest = &rest[end..];
        if text.trim().is_empty() {
            let next = next_tag_name(rest);
            if is_inline(previous) && is_inline(next) {
                out.push(' ');
            }
            continue;
        }
        push_text(&mut out, text);
    }
    out
}

/// Whether whitespace next to this tag can render. `None` is an input edge.
fn is_inline(name: Option<&str>) -> bool {
    name.is_some_and(|name| !BLOCK.iter().any(|b| b.eq_ignore_ascii_case(name)))
}

/// Name of the first tag in `s`, skipping comments.
fn next_tag_name(s: &str) -> Option<&str> {
    let mut rest = s;
    while rest.starts_with("<!--") {
        let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
        rest = rest[end..].trim_start();
    }
    if rest.starts_with('<') {
        tag_name(&rest[..tag_end(rest)])
    } else {
        None
    }
}

/// Byte length of the tag at the start of `s`, honouring quoted attributes.
fn tag_end(s: &str) -> usize {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices().skip(1) {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return i + 1,
            (None, _) => {}
        }
    }
    s.len()
}

/// Name of an opening or closing tag (`</b>` → `b`).
fn tag_name(tag: &str) -> Option<&str> {
    let body = tag.strip_prefix('<')?;
    let body = body.strip_prefix('/').unwrap_or(body);
    if body.starts_with('!') {
        return None;
    }
    let end = body
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(body.len());
    Some(&body[..end])
}

/// Name of an opening tag (`<pre class="x">` → `pre`); `None` for closing tags.
fn opening_name(tag: &str) -> Option<&str> {
    if tag.starts_with("</") {
        return None;
    }
    tag_name(tag)
}

fn find_close(s: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    s.as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

fn push_text(out: &mut String, text: &str) {
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
}
