//! logos-based markup tokenizer.
//!
//! The lexer splits markup into tags, comments, declarations and text. The
//! [`Tokenizer`] iterator on top of it reads attributes, decodes character
//! references, and switches to raw text after `script`, `style`, `textarea`
//! and `title` open tags.

use std::borrow::Cow;

use logos::{Lexer, Logos};

/// Elements whose content is raw text up to the matching close tag.
const RAW_TEXT: &[&str] = &["script", "style", "textarea", "title"];

/// Raw text elements whose content still has character references decoded.
const ESCAPABLE_RAW_TEXT: &[&str] = &["textarea", "title"];

/// Coarse markup token.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    /// `<!-- ... -->`, consumed by a callback up to the closing delimiter.
    #[token("<!--", comment)]
    Comment,

    /// `<!DOCTYPE html>` and other declarations.
    #[regex(r"<![a-zA-Z][^>]*>")]
    Declaration,

    #[regex(r"</[a-zA-Z][a-zA-Z0-9:-]*[ \t\r\n\x0C]*>")]
    CloseTag,

    /// `<name`, extended by a callback to the unquoted `>`.
    #[regex(r"<[a-zA-Z][a-zA-Z0-9:-]*", open_tag)]
    OpenTag,

    #[regex(r"[^<]+")]
    Text,
}

fn comment(lex: &mut Lexer<RawToken>) -> bool {
    let end = lex
        .remainder()
        .find("-->")
        .map_or(lex.remainder().len(), |i| i + 3);
    lex.bump(end);
    true
}

fn open_tag(lex: &mut Lexer<RawToken>) -> bool {
    let mut quote: Option<char> = None;
    for (i, c) in lex.remainder().char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => {
                lex.bump(i + 1);
                return true;
            }
            (None, _) => {}
        }
    }
    false
}

/// Attribute-level token inside an open tag.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\x0C]+")]
enum AttrToken {
    #[regex(r#"[^ \t\r\n\x0C"'>/=]+"#)]
    Name,

    #[token("=")]
    Equals,

    #[token("/")]
    Slash,

    #[token(">")]
    End,
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// One markup token, attributes parsed and text decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HtmlToken<'a> {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(Cow<'a, str>),
    Comment(&'a str),
    Doctype(&'a str),
}

/// Iterator over the tokens of a markup string.
pub struct Tokenizer<'a> {
    lex: Lexer<'a, RawToken>,
    raw_until: Option<String>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lex: RawToken::lexer(input),
            raw_until: None,
        }
    }

    fn raw_text(&mut self, name: &str) -> Option<HtmlToken<'a>> {
        let rest = self.lex.remainder();
        let needle = format!("</{name}");
        let end = rest
            .as_bytes()
            .windows(needle.len())
            .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
            .unwrap_or(rest.len());
        self.lex.bump(end);
        if end == 0 {
            return None;
        }
        let text = &rest[..end];
        Some(HtmlToken::Text(if ESCAPABLE_RAW_TEXT.contains(&name) {
            decode_entities(text)
        } else {
            Cow::Borrowed(text)
        }))
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = HtmlToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(name) = self.raw_until.take() {
            if let Some(text) = self.raw_text(&name) {
                return Some(text);
            }
        }

        let token = self.lex.next()?;
        let slice = self.lex.slice();
        Some(match token {
            Ok(RawToken::Text) => HtmlToken::Text(decode_entities(slice)),
            Ok(RawToken::Comment) => {
                let body = &slice[4..];
                HtmlToken::Comment(body.strip_suffix("-->").unwrap_or(body))
            }
            Ok(RawToken::Declaration) => HtmlToken::Doctype(&slice[2..slice.len() - 1]),
            Ok(RawToken::CloseTag) => {
                HtmlToken::Close(slice[2..slice.len() - 1].trim_end().to_ascii_lowercase())
            }
            Ok(RawToken::OpenTag) => {
                let token = parse_open_tag(slice);
                if let HtmlToken::Open {
                    name,
                    self_closing: false,
                    ..
                } = &token
                {
                    if RAW_TEXT.contains(&name.as_str()) {
                        self.raw_until = Some(name.clone());
                    }
                }
                token
            }
            // A stray `<` that starts no construct is plain text.
            Err(()) => HtmlToken::Text(Cow::Borrowed(slice)),
        })
    }
}

/// Split `<name attr=value ...>` into its parts.
fn parse_open_tag(tag: &str) -> HtmlToken<'_> {
    let body = &tag[1..];
    let name_end = body
        .find(|c: char| c.is_ascii_whitespace() || c == '/' || c == '>')
        .unwrap_or(body.len());
    let name = body[..name_end].to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    let mut self_closing = false;
    let mut lex = AttrToken::lexer(&body[name_end..]);
    while let Some(token) = lex.next() {
        match token {
            Ok(AttrToken::Name) => {
                let attr = lex.slice().to_ascii_lowercase();
                self_closing = false;
                if attrs.iter().any(|(k, _)| *k == attr) {
                    continue;
                }
                attrs.push((attr, String::new()));
            }
            Ok(AttrToken::Equals) => {
                let value = attr_value(&mut lex);
                if let Some(last) = attrs.last_mut() {
                    last.1 = decode_entities(value).into_owned();
                }
            }
            Ok(AttrToken::Slash) => self_closing = true,
            Ok(AttrToken::End) | Err(()) => {}
        }
    }

    HtmlToken::Open {
        name,
        attrs,
        self_closing,
    }
}

/// Read the value after `=`: quoted, or up to whitespace or `>`.
fn attr_value<'s>(lex: &mut Lexer<'s, AttrToken>) -> &'s str {
    let rest = lex.remainder();
    let trimmed = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let skipped = rest.len() - trimmed.len();

    let (value, consumed) = match trimmed.chars().next() {
        Some(q @ ('"' | '\'')) => match trimmed[1..].find(q) {
            Some(end) => (&trimmed[1..end + 1], end + 2),
            None => (&trimmed[1..], trimmed.len()),
        },
        _ => {
            let end = trimmed
                .find(|c: char| c.is_ascii_whitespace() || c == '>')
                .unwrap_or(trimmed.len());
            (&trimmed[..end], end)
        }
    };
    lex.bump(skipped + consumed);
    value
}

// ---------------------------------------------------------------------------
// Character references
// ---------------------------------------------------------------------------

/// Decode named and numeric character references.
///
/// Unknown references are left as written.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match rest[1..].find(';').filter(|&i| i <= 10).and_then(|i| {
            let entity = &rest[1..i + 1];
            decode_one(entity).map(|c| (c, i + 2))
        }) {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_one(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> Vec<HtmlToken<'_>> {
        Tokenizer::new(input).collect()
    }

    fn open(name: &str, attrs: &[(&str, &str)], self_closing: bool) -> HtmlToken<'static> {
        HtmlToken::Open {
            name: name.to_owned(),
            attrs: attrs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect(),
            self_closing,
        }
    }

    #[test]
    fn tags_text_and_comments() {
        assert_eq!(
            tokens("<!DOCTYPE html><P class=\"a b\">x &amp; y</p><!-- note -->"),
            vec![
                HtmlToken::Doctype("DOCTYPE html"),
                open("p", &[("class", "a b")], false),
                HtmlToken::Text(Cow::Borrowed("x & y")),
                HtmlToken::Close("p".into()),
                HtmlToken::Comment(" note "),
            ]
        );
    }

    #[test]
    fn attribute_forms() {
        assert_eq!(
            tokens("<input type=text disabled value='a > b' data-x = \"1\"/>"),
            vec![open(
                "input",
                &[("type", "text"), ("disabled", ""), ("value", "a > b"), ("data-x", "1")],
                true
            )]
        );
    }

    #[test]
    fn script_bodies_are_raw() {
        assert_eq!(
            tokens("<script>if (a<b) {}</script><textarea>&lt;x</textarea>"),
            vec![
                open("script", &[], false),
                HtmlToken::Text(Cow::Borrowed("if (a<b) {}")),
                HtmlToken::Close("script".into()),
                open("textarea", &[], false),
                HtmlToken::Text(Cow::Borrowed("<x")),
                HtmlToken::Close("textarea".into()),
            ]
        );
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let joined: String = tokens("a < b")
            .into_iter()
            .map(|t| match t {
                HtmlToken::Text(text) => text.into_owned(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(joined, "a < b");
    }

    #[test]
    fn decodes_references() {
        assert_eq!(decode_entities("&lt;&#39;&#x41;&quot;&nbsp;"), "<'A\"\u{a0}");
        assert_eq!(decode_entities("AT&T &bogus; &"), "AT&T &bogus; &");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed("plain")));
    }
}
