//! Proc macros for coherent: `view!` element syntax for object trees.
//!
//! This crate is not meant to be used directly; enable the `macros` feature on `coherent`.

use proc_macro::TokenStream;

mod view_macro;

/// JSX-like element syntax producing a `coherent::Tree`.
///
/// # Syntax
///
/// - `<div attr="val" />`: self-closing element
/// - `<ul class="list"> ... </ul>`: element with children
/// - `<Counter label="x" />`: an uppercase tag names a `Component` binding in scope
/// - `"text"`: a text child
/// - `{expr}`: any expression convertible into a `Tree`
///
/// # Attributes
///
/// - `name="value"`, `name=42`, `name=true`, or `name={expr}` become `.set("name", value)`
/// - hyphenated names work: `data-ref="count"`
/// - a bare name is `true`: `<input disabled />`
/// - `key={..}` becomes `.key(..)`
/// - `onClick={|ctx| ..}` (any `on` + uppercase name) becomes `.on("onClick", ..)`
///
/// Several root nodes produce a `Tree::list`.
///
/// # Example
///
/// ```ignore
/// view! {
///     <div class="counter">
///         <span data-ref="count">{count.to_string()}</span>
///         <button onClick={|ctx| { let _ = ctx.set_state(json!({"count": 1})); }}>"+"</button>
///     </div>
/// }
/// ```
#[proc_macro]
pub fn view(input: TokenStream) -> TokenStream {
    view_macro::view_impl(input.into())
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}
