//! view! macro: parse JSX-like syntax and generate coherent tree builder code.

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::ext::IdentExt;
use syn::parse::{Parse, ParseStream};
use syn::{braced, Error, Expr, Ident, Lit, LitBool, LitStr, Result, Token};

// ---------------------------------------------------------------------------
// AST types
// ---------------------------------------------------------------------------

/// Right-hand side of an attribute.
#[derive(Clone)]
pub(crate) enum AttrValue {
    Lit(Lit),
    Expr(Expr),
}

/// A parsed attribute: `name="value"`, `name={expr}`, or a bare `name`.
#[derive(Clone)]
pub(crate) struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute").field("name", &self.name).finish()
    }
}

/// A child or root node.
#[derive(Clone)]
pub(crate) enum Node {
    Element(Element),
    Text(LitStr),
    Expr(Expr),
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Element(e) => e.fmt(f),
            Node::Text(t) => write!(f, "Text({:?})", t.value()),
            Node::Expr(_) => f.write_str("Expr"),
        }
    }
}

/// A parsed element: `<tag attrs... />` or `<tag attrs...> children </tag>`.
#[derive(Clone)]
pub(crate) struct Element {
    pub tag: Ident,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
    pub self_closing: bool,
}

impl Element {
    /// Uppercase tags name a component binding.
    fn is_component(&self) -> bool {
        self.tag
            .unraw()
            .to_string()
            .starts_with(|c: char| c.is_ascii_uppercase())
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag.to_string())
            .field("attrs", &self.attrs)
            .field("children", &self.children)
            .field("self_closing", &self.self_closing)
            .finish()
    }
}

/// The top-level view! input: a sequence of nodes.
#[derive(Debug)]
struct ViewInput {
    nodes: Vec<Node>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl Parse for ViewInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut nodes = Vec::new();
        while !input.is_empty() {
            nodes.push(parse_node(input)?);
        }
        Ok(ViewInput { nodes })
    }
}

fn parse_node(input: ParseStream) -> Result<Node> {
    if input.peek(Token![<]) {
        return parse_element(input).map(Node::Element);
    }
    if input.peek(LitStr) {
        return input.parse().map(Node::Text);
    }
    if input.peek(syn::token::Brace) {
        let content;
        braced!(content in input);
        return content.parse().map(Node::Expr);
    }
    Err(input.error("expected an element, a string literal, or a `{expression}`"))
}

/// `data-ref`, `aria-label`, `type`: idents (keywords included) joined by `-`.
fn parse_attr_name(input: ParseStream) -> Result<(String, Span)> {
    let first = Ident::parse_any(input)?;
    let span = first.span();
    let mut name = first.unraw().to_string();
    while input.peek(Token![-]) {
        input.parse::<Token![-]>()?;
        let part = Ident::parse_any(input)?;
        name.push('-');
        name.push_str(&part.unraw().to_string());
    }
    Ok((name, span))
}

fn parse_attr_value(input: ParseStream, span: Span) -> Result<AttrValue> {
    if !input.peek(Token![=]) {
        return Ok(AttrValue::Lit(Lit::Bool(LitBool::new(true, span))));
    }
    input.parse::<Token![=]>()?;
    if input.peek(syn::token::Brace) {
        let content;
        braced!(content in input);
        return content.parse().map(AttrValue::Expr);
    }
    input.parse().map(AttrValue::Lit)
}

/// Parse a single element from the token stream.
pub(crate) fn parse_element(input: ParseStream) -> Result<Element> {
    input.parse::<Token![<]>()?;
    let tag = Ident::parse_any(input)?;

    // Attributes until `/>` or `>`.
    let mut attrs = Vec::new();
    loop {
        if input.peek(Token![/]) {
            input.parse::<Token![/]>()?;
            input.parse::<Token![>]>()?;
            return Ok(Element {
                tag,
                attrs,
                children: Vec::new(),
                self_closing: true,
            });
        }
        if input.peek(Token![>]) {
            input.parse::<Token![>]>()?;
            break;
        }
        let (name, span) = parse_attr_name(input)?;
        let value = parse_attr_value(input, span)?;
        attrs.push(Attribute { name, value });
    }

    // Children until `</tag>`.
    let mut children = Vec::new();
    loop {
        if input.peek(Token![<]) && input.peek2(Token![/]) {
            input.parse::<Token![<]>()?;
            input.parse::<Token![/]>()?;
            let closing_tag = Ident::parse_any(input)?;
            if closing_tag != tag {
                return Err(Error::new(
                    closing_tag.span(),
                    format!(
                        "mismatched closing tag: expected `</{}>`, found `</{}>`",
                        tag, closing_tag
                    ),
                ));
            }
            input.parse::<Token![>]>()?;
            break;
        }
        if input.is_empty() {
            return Err(Error::new(tag.span(), format!("unclosed element `<{}>`", tag)));
        }
        children.push(parse_node(input)?);
    }

    Ok(Element {
        tag,
        attrs,
        children,
        self_closing: false,
    })
}

// ---------------------------------------------------------------------------
// Code generation
// ---------------------------------------------------------------------------

/// `onClick`, `onInput`: `on` followed by an uppercase letter.
fn is_handler(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on") && name.as_bytes()[2].is_ascii_uppercase()
}

fn value_tokens(value: &AttrValue) -> TokenStream {
    match value {
        AttrValue::Lit(lit) => quote! { #lit },
        AttrValue::Expr(expr) => quote! { #expr },
    }
}

fn generate_node(node: &Node) -> TokenStream {
    match node {
        Node::Element(elem) => generate_element(elem),
        Node::Text(text) => quote! { ::coherent::Tree::text(#text) },
        Node::Expr(expr) => quote! { ::coherent::Tree::from(#expr) },
    }
}

/// Generate code for a single element.
fn generate_element(elem: &Element) -> TokenStream {
    let mut builder_calls = Vec::new();

    for attr in &elem.attrs {
        let name = &attr.name;
        let value = value_tokens(&attr.value);
        let call = match name.as_str() {
            "key" => quote! { .key(#value) },
            n if is_handler(n) => quote! { .on(#name, #value) },
            _ => quote! { .set(#name, #value) },
        };
        builder_calls.push(call);
    }

    for child in &elem.children {
        let child_code = generate_node(child);
        builder_calls.push(quote! { .child(#child_code) });
    }

    let props = quote! { ::coherent::Props::new() #(#builder_calls)* };
    if elem.is_component() {
        let component = &elem.tag;
        quote! { ::coherent::Component::node(&#component, #props) }
    } else {
        let tag = elem.tag.unraw().to_string();
        quote! { ::coherent::Tree::element(#tag, #props) }
    }
}

/// Entry point: generate code for the entire view! macro.
pub(crate) fn view_impl(input: TokenStream) -> Result<TokenStream> {
    let parsed: ViewInput = syn::parse2(input)?;

    match parsed.nodes.as_slice() {
        [] => Err(Error::new(
            Span::call_site(),
            "view! macro requires at least one node",
        )),
        [single] => Ok(generate_node(single)),
        nodes => {
            let items: Vec<TokenStream> = nodes.iter().map(generate_node).collect();
            Ok(quote! {
                ::coherent::Tree::list(::std::vec![#(#items),*])
            })
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quote::quote;

    fn parse_view(tokens: TokenStream) -> Result<ViewInput> {
        syn::parse2(tokens)
    }

    fn parse_single_element(tokens: TokenStream) -> Result<Element> {
        parse_view(tokens).map(|v| match v.nodes.into_iter().next() {
            Some(Node::Element(e)) => e,
            other => panic!("expected an element, got {other:?}"),
        })
    }

    // -----------------------------------------------------------------------
    // Parsing tests
    // -----------------------------------------------------------------------

    #[test]
    fn parse_self_closing_element() {
        let elem = parse_single_element(quote! { <img src="a.png" /> }).unwrap();
        assert_eq!(elem.tag.to_string(), "img");
        assert!(elem.self_closing);
        assert!(elem.children.is_empty());
        assert_eq!(elem.attrs.len(), 1);
        assert_eq!(elem.attrs[0].name, "src");
    }

    #[test]
    fn parse_hyphenated_and_keyword_attribute_names() {
        let elem = parse_single_element(quote! {
            <input type="text" data-bind="name" aria-label="Name" />
        })
        .unwrap();
        let names: Vec<&str> = elem.attrs.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["type", "data-bind", "aria-label"]);
    }

    #[test]
    fn parse_bare_and_expression_attributes() {
        let elem = parse_single_element(quote! {
            <button disabled title={label.clone()} />
        })
        .unwrap();
        assert!(matches!(&elem.attrs[0].value, AttrValue::Lit(Lit::Bool(b)) if b.value));
        assert!(matches!(elem.attrs[1].value, AttrValue::Expr(_)));
    }

    #[test]
    fn parse_mixed_children() {
        let elem = parse_single_element(quote! {
            <p class="intro">
                "Hello, "
                <b>{name}</b>
            </p>
        })
        .unwrap();
        assert_eq!(elem.children.len(), 2);
        assert!(matches!(elem.children[0], Node::Text(_)));
        match &elem.children[1] {
            Node::Element(b) => assert!(matches!(b.children[0], Node::Expr(_))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_multiple_root_nodes() {
        let view = parse_view(quote! {
            <h1>"Title"</h1>
            "between"
            <p />
        })
        .unwrap();
        assert_eq!(view.nodes.len(), 3);
    }

    #[test]
    fn parse_error_mismatched_closing_tag() {
        let result = parse_single_element(quote! {
            <ul>
                <li>"x"</li>
            </ol>
        });
        let err = result.unwrap_err().to_string();
        assert!(err.contains("mismatched closing tag"));
    }

    #[test]
    fn parse_error_unclosed_element() {
        let err = parse_view(quote! { <div> "x" }).unwrap_err().to_string();
        assert!(err.contains("unclosed element"));
    }

    // -----------------------------------------------------------------------
    // Code generation tests
    // -----------------------------------------------------------------------

    #[test]
    fn codegen_element_with_attributes() {
        let elem = parse_single_element(quote! { <div class="box" data-ref="count" /> }).unwrap();
        let code_str = generate_element(&elem).to_string();
        assert!(code_str.contains("Tree :: element (\"div\""), "got: {}", code_str);
        assert!(code_str.contains("set (\"class\" , \"box\")"), "got: {}", code_str);
        assert!(code_str.contains("set (\"data-ref\" , \"count\")"), "got: {}", code_str);
    }

    #[test]
    fn codegen_key_and_handler() {
        let elem = parse_single_element(quote! {
            <li key={item.id.clone()} onClick={|ctx| ctx.stop_propagation()} />
        })
        .unwrap();
        let code_str = generate_element(&elem).to_string();
        assert!(code_str.contains("key (item . id . clone ())"), "got: {}", code_str);
        assert!(code_str.contains("on (\"onClick\""), "got: {}", code_str);
    }

    #[test]
    fn codegen_component_tag() {
        let elem = parse_single_element(quote! { <Counter start=3 /> }).unwrap();
        let code_str = generate_element(&elem).to_string();
        assert!(code_str.contains("Component :: node (& Counter"), "got: {}", code_str);
        assert!(code_str.contains("set (\"start\" , 3)"), "got: {}", code_str);
    }

    #[test]
    fn codegen_children() {
        let elem = parse_single_element(quote! { <p>"hi" {count}</p> }).unwrap();
        let code_str = generate_element(&elem).to_string();
        assert!(code_str.contains("child (:: coherent :: Tree :: text (\"hi\"))"), "got: {}", code_str);
        assert!(code_str.contains("Tree :: from (count)"), "got: {}", code_str);
    }

    #[test]
    fn codegen_multiple_roots_is_a_list() {
        let code_str = view_impl(quote! { <h1 /> <p /> }).unwrap().to_string();
        assert!(code_str.contains("Tree :: list"));
    }

    #[test]
    fn codegen_empty_view_is_error() {
        let result = view_impl(quote! {});
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one node"));
    }
}
