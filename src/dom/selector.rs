//! Selector parsing and matching for document queries.
//!
//! Supported syntax: type (`div`), universal (`*`), class (`.item`), id
//! (`#app`), attribute presence (`[data-ref]`) and equality
//! (`[data-key="3"]`), the descendant and child (`>`) combinators, and
//! comma-separated selector lists.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use super::node::{NodeData, NodeId};
use super::tree::Dom;
use crate::error::{CoherentError, Result};

/// Selector token produced by the lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\n\r\f]+")]
enum Token {
    #[regex(r"[a-zA-Z0-9_-]+")]
    Ident,

    #[regex(r#""[^"]*""#)]
    #[regex(r"'[^']*'")]
    Str,

    #[token("#")]
    Hash,

    #[token(".")]
    Dot,

    #[token("*")]
    Star,

    #[token(">")]
    GreaterThan,

    #[token(",")]
    Comma,

    #[token("[")]
    BracketOpen,

    #[token("]")]
    BracketClose,

    #[token("=")]
    Equals,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A single simple selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorComponent {
    /// Type selector, matched case-insensitively against the tag.
    Type(String),
    /// `*`.
    Universal,
    /// `.class`.
    Class(String),
    /// `#id`.
    Id(String),
    /// `[name]` or `[name=value]`.
    Attribute { name: String, value: Option<String> },
}

/// How two compound selectors relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// `A B`.
    Descendant,
    /// `A > B`.
    Child,
}

/// Simple selectors with no combinator between them, e.g. `li.item[data-key]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub components: Vec<SelectorComponent>,
}

impl CompoundSelector {
    /// Whether every component matches `node`.
    pub fn matches(&self, node: &NodeData) -> bool {
        if !node.is_element() {
            return false;
        }
        self.components.iter().all(|component| match component {
            SelectorComponent::Type(name) => node.tag().is_some_and(|tag| tag.eq_ignore_ascii_case(name)),
            SelectorComponent::Universal => true,
            SelectorComponent::Class(name) => node.has_class(name),
            SelectorComponent::Id(name) => node.id() == Some(name.as_str()),
            SelectorComponent::Attribute { name, value: None } => node.has_attr(name),
            SelectorComponent::Attribute {
                name,
                value: Some(expected),
            } => node.attr(name) == Some(expected.as_str()),
        })
    }
}

/// Compound selectors joined by combinators, stored left to right.
///
/// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub compounds: Vec<CompoundSelector>,
    pub combinators: Vec<Combinator>,
}

impl Selector {
    /// Whether `node` matches, walking the chain right to left.
    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some((last, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !dom.get(node).is_some_and(|data| last.matches(data)) {
            return false;
        }
        self.matches_from(dom, node, rest, &self.combinators)
    }

    fn matches_from(
        &self,
        dom: &Dom,
        node: NodeId,
        compounds: &[CompoundSelector],
        combinators: &[Combinator],
    ) -> bool {
        let (Some((compound, compounds)), Some((combinator, combinators))) =
            (compounds.split_last(), combinators.split_last())
        else {
            return true;
        };
        match combinator {
            Combinator::Child => dom.parent(node).is_some_and(|parent| {
                dom.get(parent).is_some_and(|data| compound.matches(data))
                    && self.matches_from(dom, parent, compounds, combinators)
            }),
            // Try every matching ancestor so `a b c` backtracks correctly.
            Combinator::Descendant => dom.ancestors(node).into_iter().any(|ancestor| {
                dom.get(ancestor).is_some_and(|data| compound.matches(data))
                    && self.matches_from(dom, ancestor, compounds, combinators)
            }),
        }
    }
}

/// A parsed, comma-separated selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    pub selectors: Vec<Selector>,
}

impl SelectorList {
    /// Parse `input`.
    pub fn parse(input: &str) -> Result<Self> {
        let tokens: Vec<PToken<'_>> = Token::lexer(input)
            .spanned()
            .map(|(token, span)| match token {
                Ok(token) => Ok(PToken {
                    token,
                    text: &input[span.clone()],
                    span,
                }),
                Err(()) => Err(selector_error(
                    input,
                    format!("unexpected character at byte {}", span.start),
                )),
            })
            .collect::<Result<_>>()?;

        let mut parser = Parser {
            source: input,
            tokens,
            cursor: 0,
        };
        let selectors = parser.parse_list()?;
        Ok(Self {
            source: input.to_owned(),
            selectors,
        })
    }

    /// Whether any selector in the list matches `node`.
    pub fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.selectors.iter().any(|selector| selector.matches(dom, node))
    }

    /// The text this list was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct PToken<'a> {
    token: Token,
    text: &'a str,
    span: Range<usize>,
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<PToken<'a>>,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.cursor).map(|t| t.token)
    }

    fn advance(&mut self) -> Option<&PToken<'a>> {
        let tok = self.tokens.get(self.cursor)?;
        self.cursor += 1;
        Some(tok)
    }

    fn error(&self, message: impl Into<String>) -> CoherentError {
        selector_error(self.source, message)
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<&'a str> {
        match self.tokens.get(self.cursor) {
            Some(tok) if tok.token == expected => {
                self.cursor += 1;
                Ok(tok.text)
            }
            Some(tok) => Err(self.error(format!("expected {what}, found `{}`", tok.text))),
            None => Err(self.error(format!("expected {what}, found end of input"))),
        }
    }

    /// Whether the current token directly follows the previous one.
    fn is_adjacent(&self) -> bool {
        match (self.cursor.checked_sub(1), self.tokens.get(self.cursor)) {
            (Some(prev), Some(curr)) => self.tokens[prev].span.end == curr.span.start,
            _ => false,
        }
    }

    fn parse_list(&mut self) -> Result<Vec<Selector>> {
        let mut selectors = vec![self.parse_selector()?];
        while self.peek() == Some(Token::Comma) {
            self.advance();
            selectors.push(self.parse_selector()?);
        }
        if let Some(tok) = self.tokens.get(self.cursor) {
            return Err(self.error(format!("unexpected `{}`", tok.text)));
        }
        Ok(selectors)
    }

    fn parse_selector(&mut self) -> Result<Selector> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();
        loop {
            match self.peek() {
                Some(Token::GreaterThan) => {
                    self.advance();
                    combinators.push(Combinator::Child);
                }
                Some(Token::Ident | Token::Hash | Token::Dot | Token::Star | Token::BracketOpen) => {
                    combinators.push(Combinator::Descendant);
                }
                _ => break,
            }
            compounds.push(self.parse_compound()?);
        }
        Ok(Selector {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector> {
        let mut components = Vec::new();
        match self.peek() {
            Some(Token::Ident) => {
                let name = self.expect(Token::Ident, "tag name")?;
                components.push(SelectorComponent::Type(name.to_owned()));
            }
            Some(Token::Star) => {
                self.advance();
                components.push(SelectorComponent::Universal);
            }
            Some(Token::Dot | Token::Hash | Token::BracketOpen) => {
                components.push(self.parse_simple()?);
            }
            _ => return Err(self.error("expected a selector")),
        }

        while self.is_adjacent() && matches!(self.peek(), Some(Token::Dot | Token::Hash | Token::BracketOpen)) {
            components.push(self.parse_simple()?);
        }
        Ok(CompoundSelector { components })
    }

    fn parse_simple(&mut self) -> Result<SelectorComponent> {
        match self.advance().map(|t| t.token) {
            Some(Token::Dot) => {
                let name = self.expect(Token::Ident, "class name")?;
                Ok(SelectorComponent::Class(name.to_owned()))
            }
            Some(Token::Hash) => {
                let name = self.expect(Token::Ident, "id")?;
                Ok(SelectorComponent::Id(name.to_owned()))
            }
            Some(Token::BracketOpen) => {
                let name = self.expect(Token::Ident, "attribute name")?.to_owned();
                let value = if self.peek() == Some(Token::Equals) {
                    self.advance();
                    Some(self.parse_attr_value()?)
                } else {
                    None
                };
                self.expect(Token::BracketClose, "`]`")?;
                Ok(SelectorComponent::Attribute { name, value })
            }
            _ => Err(self.error("expected `.`, `#` or `[`")),
        }
    }

    fn parse_attr_value(&mut self) -> Result<String> {
        match self.advance().map(|t| (t.token, t.text)) {
            Some((Token::Ident, text)) => Ok(text.to_owned()),
            Some((Token::Str, text)) => Ok(text[1..text.len() - 1].to_owned()),
            _ => Err(self.error("expected attribute value")),
        }
    }
}

fn selector_error(selector: &str, message: impl Into<String>) -> CoherentError {
    CoherentError::Selector {
        selector: selector.to_owned(),
        message: message.into(),
    }
}
