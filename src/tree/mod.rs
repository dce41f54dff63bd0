//! Tree model: raw author trees, props bags, canonical nodes, normalization.

pub mod node;
pub mod normalize;
pub mod props;
pub mod vnode;

pub use node::{NodeKey, Tree};
pub use normalize::{normalize, normalize_at};
pub use props::{Handler, Props};
pub use vnode::{Element, Inner, VNode};
