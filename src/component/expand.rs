//! Expansion: resolve component and provider nodes into plain elements.
//!
//! Both the HTML renderer and the hydration engine consume the expanded form,
//! which is what keeps server markup and client matching in agreement.

use crate::tree::{normalize_at, Tree, VNode};
use crate::context::Scope;
use crate::error::Result;

/// Normalize `tree` and resolve every component and provider below it.
///
/// Only `Element` and `Text` nodes remain in the result. Child components are
/// invoked with a scope that offers no state container.
pub fn expand(tree: &Tree, scope: &Scope<'_>) -> Result<Vec<VNode>> {
    expand_at(tree, "$", scope)
}

/// [`expand`], reporting structural errors relative to `path`.
pub fn expand_at(tree: &Tree, path: &str, scope: &Scope<'_>) -> Result<Vec<VNode>> {
    let nodes = normalize_at(tree, path)?;
    let scope = scope.without_state();
    let mut out = Vec::with_capacity(nodes.len());
    expand_nodes(nodes, path, &scope, &mut out)?;
    Ok(out)
}

fn expand_nodes(nodes: Vec<VNode>, path: &str, scope: &Scope<'_>, out: &mut Vec<VNode>) -> Result<()> {
    for node in nodes {
        match node {
            VNode::Text(_) => out.push(node),
            VNode::Element(mut element) => {
                let children = std::mem::take(&mut element.children);
                let child_path = format!("{path}.{}.children", element.tag);
                expand_nodes(children, &child_path, scope, &mut element.children)?;
                out.push(VNode::Element(element));
            }
            VNode::Component { component, props } => {
                let tree = component.invoke(&props, scope)?;
                let component_path = format!("{path}.<{}>", component.name());
                let nodes = normalize_at(&tree, &component_path)?;
                expand_nodes(nodes, &component_path, scope, out)?;
            }
            VNode::Provider {
                key,
                value,
                children,
            } => {
                let _binding = scope.store().provide(key, value);
                expand_nodes(children, path, scope, out)?;
            }
        }
    }
    Ok(())
}
