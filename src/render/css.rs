//! Stylesheet handling: combining sources, minifying, injecting into markup.
//!
//! The minifier works on a logos token stream. It only drops comments and
//! whitespace that carries no meaning; it never rewrites values.

use logos::{Lexer, Logos};

use super::html::escape_attr;

/// Token produced by the CSS minifier's lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssToken {
    /// `/* ... */`, consumed by a callback up to the closing delimiter.
    #[token("/*", block_comment)]
    Comment,

    #[regex(r"[ \t\r\n\x0C]+")]
    Whitespace,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    Str,

    /// Punctuation that never needs surrounding whitespace.
    #[regex(r"[{};,>]")]
    Punct,

    #[token(":")]
    Colon,

    #[token("/")]
    Slash,

    /// Anything else: selectors, property names, values.
    #[regex(r#"[^ \t\r\n\x0C{};:,>"'/]+"#)]
    Word,
}

fn block_comment(lex: &mut Lexer<CssToken>) -> bool {
    let end = lex
        .remainder()
        .find("*/")
        .map_or(lex.remainder().len(), |i| i + 2);
    lex.bump(end);
    true
}

/// Strip comments and insignificant whitespace.
pub fn minify_css(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut space = false;
    let mut depth = 0usize;
    for (token, span) in CssToken::lexer(input).spanned() {
        let text = &input[span];
        match token {
            Ok(CssToken::Comment) | Ok(CssToken::Whitespace) => space = true,
            Ok(CssToken::Punct) => {
                match text {
                    "{" => depth += 1,
                    "}" => {
                        depth = depth.saturating_sub(1);
                        if out.ends_with(';') {
                            out.pop();
                        }
                    }
                    _ => {}
                }
                out.push_str(text);
                space = false;
            }
            Ok(CssToken::Colon) => {
                // Inside a block the colon separates property and value; in a
                // selector a leading space is a descendant combinator.
                if space && depth == 0 && !out.is_empty() && !ends_with_punct(&out) {
                    out.push(' ');
                }
                out.push(':');
                space = false;
            }
            // Unlexable input (an unterminated string) is kept as written.
            Ok(CssToken::Str) | Ok(CssToken::Slash) | Ok(CssToken::Word) | Err(()) => {
                if space && !out.is_empty() && !ends_with_punct(&out) && !out.ends_with(':') {
                    out.push(' ');
                }
                out.push_str(text);
                space = false;
            }
        }
    }
    out
}

fn ends_with_punct(s: &str) -> bool {
    s.ends_with(['{', '}', ';', ',', '>'])
}

/// Concatenate file contents and inline CSS in order, optionally minified.
pub fn combine_css(files: &[String], inline: Option<&str>, minify: bool) -> String {
    let mut parts: Vec<&str> = files.iter().map(String::as_str).collect();
    if let Some(inline) = inline {
        parts.push(inline);
    }
    let combined = parts
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if minify {
        minify_css(&combined)
    } else {
        combined
    }
}

/// Insert stylesheet links and a `<style>` block before `</head>`, or at the
/// start of the markup when there is no head.
pub fn inject_styles(markup: &str, links: &[String], css: &str) -> String {
    let mut block = String::new();
    for href in links {
        block.push_str("<link rel=\"stylesheet\" href=\"");
        block.push_str(&escape_attr(href));
        block.push_str("\">");
    }
    if !css.is_empty() {
        block.push_str("<style>");
        block.push_str(css);
        block.push_str("</style>");
    }
    if block.is_empty() {
        return markup.to_owned();
    }

    match find_ignore_case(markup, "</head>") {
        Some(at) => {
            let mut out = String::with_capacity(markup.len() + block.len());
            out.push_str(&markup[..at]);
            out.push_str(&block);
            out.push_str(&markup[at..]);
            out
        }
        None => block + markup,
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_comments_and_whitespace() {
        let css = "/* header */\n.btn , .link > a {\n  color : red;\n  margin: 0 auto;\n}\n";
        assert_eq!(minify_css(css), ".btn,.link>a{color:red;margin:0 auto}");
    }

    #[test]
    fn keeps_strings_intact() {
        let css = "a::after { content: \"  /* not a comment */  \"; }";
        assert_eq!(minify_css(css), "a::after{content:\"  /* not a comment */  \"}");
    }

    #[test]
    fn keeps_meaningful_spaces() {
        assert_eq!(
            minify_css("div p  span { width: calc(100% - 2px); }"),
            "div p span{width:calc(100% - 2px)}"
        );
    }

    #[test]
    fn selector_colon_spacing_is_kept() {
        assert_eq!(minify_css("nav :hover { x: y }"), "nav :hover{x:y}");
    }

    #[test]
    fn unterminated_comment_is_dropped() {
        assert_eq!(minify_css("p{color:red}/* dangling"), "p{color:red}");
    }

    #[test]
    fn combine_orders_files_then_inline() {
        let files = vec!["a{}".to_owned(), "b{}".to_owned()];
        assert_eq!(combine_css(&files, Some("c{}"), false), "a{}\nb{}\nc{}");
        assert_eq!(combine_css(&[], None, true), "");
    }

    #[test]
    fn inject_before_head_close() {
        let out = inject_styles(
            "<html><head><title>t</title></HEAD><body></body></html>",
            &["/site.css".to_owned()],
            "p{}",
        );
        assert_eq!(
            out,
            "<html><head><title>t</title><link rel=\"stylesheet\" href=\"/site.css\"><style>p{}</style></HEAD><body></body></html>"
        );
    }

    #[test]
    fn inject_prepends_without_head() {
        assert_eq!(inject_styles("<p>x</p>", &[], "p{}"), "<style>p{}</style><p>x</p>");
        assert_eq!(inject_styles("<p>x</p>", &[], ""), "<p>x</p>");
    }
}
