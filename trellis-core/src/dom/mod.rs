//! Document Bindings
//!
//! The pieces that connect reactive state to a live node tree:
//!
//! - [`Dom`]: the handful of node primitives the runtime needs from a host
//! - [`MemoryDom`]: an in-memory host, used by tests and headless rendering
//! - [`NodeRegistry`]: node identity to the computations that must stop when
//!   the node leaves the document
//! - [`Reconciler`]: keyed, order-preserving list reconciliation
//! - [`bind_text`] and [`each`]: expression-driven bindings built from the
//!   above
//!
//! Nodes never own their computations and computations hold nodes only by
//! handle. Teardown goes through the registry by node identity, so there are
//! no reference cycles between the two.

mod binding;
mod each;
mod memory;
mod reconcile;
mod registry;

use std::fmt::Debug;
use std::hash::Hash;

pub use binding::{bind_effect, bind_text};
pub use each::{each, Each, EachOptions, ItemScope};
pub use memory::{DomStats, MemoryDom, NodeId};
pub use reconcile::{Key, ListKey, ReconcileStats, Reconciler};
pub use registry::NodeRegistry;

/// Node primitives supplied by a host document.
///
/// Handles are cheap identities; cloning a handle never clones a node.
pub trait Dom: Clone + 'static {
    type Node: Clone + Eq + Hash + Debug + 'static;

    /// The sibling following `node`, if any.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Place `node` directly after `anchor` under the anchor's parent,
    /// detaching it from wherever it was first.
    fn insert_after(&self, anchor: &Self::Node, node: &Self::Node);

    /// Remove `node` from its parent. Detached nodes stay valid handles.
    fn detach(&self, node: &Self::Node);

    /// Direct children of `node`, in document order.
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;

    /// Replace the text content of a text node.
    fn set_text(&self, node: &Self::Node, text: &str);
}
