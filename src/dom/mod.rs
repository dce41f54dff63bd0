//! DOM arena: slotmap-backed document tree, markup parser, selectors, events.

pub mod document;
pub mod event;
pub mod node;
pub mod parser;
pub mod query;
pub mod selector;
pub mod tokenizer;
pub mod tree;

pub use document::{Document, Listener, ListenerId};
pub use event::{bubble_path, DomEvent};
pub use node::{NodeData, NodeId, NodeKind};
pub use parser::{parse_html, parse_into};
pub use selector::SelectorList;
pub use tree::Dom;
