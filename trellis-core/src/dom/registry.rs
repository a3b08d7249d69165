//! Node Registry
//!
//! Maps node identity to the disposers of computations bound to that node
//! and to its on-remove hooks. Nodes and computations never point at each
//! other directly; teardown looks a node up here by identity.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use crate::reactive::Disposer;

use super::Dom;

struct Entry {
    disposers: SmallVec<[Disposer; 2]>,
    on_remove: Vec<Box<dyn FnOnce()>>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            disposers: SmallVec::new(),
            on_remove: Vec::new(),
        }
    }
}

/// Node identity to cleanup handles.
///
/// Cloning yields a handle to the same registry.
pub struct NodeRegistry<N> {
    entries: Rc<RefCell<HashMap<N, Entry>>>,
}

impl<N> Clone for NodeRegistry<N> {
    fn clone(&self) -> Self {
        Self {
            entries: Rc::clone(&self.entries),
        }
    }
}

impl<N> Default for NodeRegistry<N> {
    fn default() -> Self {
        Self {
            entries: Rc::new(RefCell::new(HashMap::new())),
        }
    }
}

impl<N> NodeRegistry<N>
where
    N: Clone + Eq + std::hash::Hash + fmt::Debug + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop `disposer` when `node` is torn down.
    pub fn register(&self, node: &N, disposer: Disposer) {
        self.entries
            .borrow_mut()
            .entry(node.clone())
            .or_default()
            .disposers
            .push(disposer);
    }

    /// Run `hook` after `node`'s computations have stopped during teardown.
    pub fn on_remove(&self, node: &N, hook: impl FnOnce() + 'static) {
        self.entries
            .borrow_mut()
            .entry(node.clone())
            .or_default()
            .on_remove
            .push(Box::new(hook));
    }

    pub fn disposer_count(&self, node: &N) -> usize {
        self.entries
            .borrow()
            .get(node)
            .map_or(0, |entry| entry.disposers.len())
    }

    pub fn contains(&self, node: &N) -> bool {
        self.entries.borrow().contains_key(node)
    }

    /// Number of nodes with registered cleanup.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Stop everything registered under `node` and its descendants,
    /// descendants first, then run the on-remove hooks.
    ///
    /// Does not detach `node`; the caller decides whether it leaves the
    /// document.
    pub fn teardown<D>(&self, dom: &D, node: &N)
    where
        D: Dom<Node = N>,
    {
        for child in dom.children(node) {
            self.teardown(dom, &child);
        }

        // Released before running anything, which may register or tear down
        // other nodes.
        let Some(entry) = self.entries.borrow_mut().remove(node) else {
            return;
        };
        trace!(
            node = ?node,
            disposers = entry.disposers.len(),
            hooks = entry.on_remove.len(),
            "tearing down node"
        );
        for disposer in &entry.disposers {
            disposer.dispose();
        }
        for hook in entry.on_remove {
            hook();
        }
    }
}

impl<N> fmt::Debug for NodeRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.entries.borrow().len())
            .finish()
    }
}
