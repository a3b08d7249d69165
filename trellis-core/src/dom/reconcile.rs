//! Keyed Reconciler
//!
//! Keeps a run of sibling nodes, placed directly after a fixed anchor, in
//! the same order as a list of items. Items are matched to existing nodes by
//! key, so a node whose item survives a change is updated in place instead of
//! being rebuilt.
//!
//! # Algorithm
//!
//! One forward pass with a cursor that starts at the anchor:
//!
//! 1. Kept key: update the record's state, move its node directly after the
//!    cursor if it is not already there, advance the cursor.
//! 2. New key: render a node, insert it after the cursor, advance.
//! 3. After the pass, every record whose key was not seen is handed to the
//!    remove callback and detached.
//!
//! The cursor only moves forward, so the final order equals the list order
//! with O(n) lookups and at most one move per item. This is not the minimum
//! number of moves; no longest-common-subsequence search is attempted.
//!
//! A callback that panics ends the pass early. Every record the pass still
//! holds goes back on the reconciler as the stack unwinds, so the key map
//! keeps matching the attached nodes and the next pass starts from them.

use std::fmt::Debug;
use std::hash::Hash;
use std::mem;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::expr::Value;

use super::Dom;

/// A key type for [`Reconciler`].
pub trait ListKey: Clone + Eq + Hash + Debug + 'static {
    /// Whether this key stands for "no key". Missing keys still work as
    /// literal keys but all such items collide.
    fn is_missing(&self) -> bool {
        false
    }
}

/// A hashable key derived from a [`Value`].
///
/// Numbers compare by value with `-0 == 0` and `NaN == NaN`; lists, objects
/// and functions compare by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    Str(Rc<str>),
    Identity(usize),
}

impl From<&Value> for Key {
    fn from(value: &Value) -> Self {
        match value {
            Value::Undefined => Self::Undefined,
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(number_bits(*n)),
            Value::Str(s) => Self::Str(Rc::clone(s)),
            Value::Accessor(accessor) => Self::from(&accessor.read()),
            other => other.identity().map_or(Self::Undefined, Self::Identity),
        }
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Self::Number(number_bits(index as f64))
    }
}

fn number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

impl ListKey for Key {
    fn is_missing(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }
}

macro_rules! impl_list_key {
    ($($ty:ty),*) => {
        $(impl ListKey for $ty {})*
    };
}

impl_list_key!(String, &'static str, u32, u64, usize, i32, i64);

/// What a reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub created: usize,
    pub kept: usize,
    pub moved: usize,
    pub removed: usize,

    /// Items dropped because their key already appeared earlier in the list.
    pub skipped: usize,
}

impl ReconcileStats {
    /// Whether the pass changed nothing in the document.
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.moved == 0 && self.removed == 0
    }
}

struct Record<N, S> {
    node: N,
    state: S,
}

type Records<K, N, S> = IndexMap<K, Record<N, S>>;

/// The records of one pass in flight. Dropping it stores the visited
/// records, then the unvisited ones, back on the reconciler.
struct Pass<'a, D: Dom, K: ListKey, S> {
    dom: &'a D,
    records: &'a mut Records<K, D::Node, S>,
    previous: Records<K, D::Node, S>,
    next: Records<K, D::Node, S>,

    /// A removed node whose remove callback is running.
    detaching: Option<D::Node>,
}

impl<D: Dom, K: ListKey, S> Drop for Pass<'_, D, K, S> {
    fn drop(&mut self) {
        if let Some(node) = self.detaching.take() {
            self.dom.detach(&node);
        }

        let mut records = mem::take(&mut self.next);
        if !self.previous.is_empty() {
            warn!(
                unvisited = self.previous.len(),
                "list pass interrupted; keeping unvisited items"
            );
            records.extend(self.previous.drain(..));
        }
        *self.records = records;
    }
}

/// Keyed list reconciliation after a fixed anchor node.
///
/// `S` is per-item state kept alongside each node (for example the item's
/// bound signals).
pub struct Reconciler<D: Dom, K, S> {
    dom: D,
    anchor: D::Node,
    records: IndexMap<K, Record<D::Node, S>>,
}

impl<D, K, S> Reconciler<D, K, S>
where
    D: Dom,
    K: ListKey,
{
    /// Manage the siblings following `anchor`. The anchor must stay attached.
    pub fn new(dom: D, anchor: D::Node) -> Self {
        Self {
            dom,
            anchor,
            records: IndexMap::new(),
        }
    }

    pub fn anchor(&self) -> &D::Node {
        &self.anchor
    }

    /// Bring the managed nodes in line with `items`.
    ///
    /// - `key(item, index)` derives an item's key
    /// - `render(item, index)` builds the node and state of a new item
    /// - `update(state, item, index)` refreshes a kept item in place
    /// - `remove(node, state)` tears down an item before its node is detached
    ///
    /// `render` runs before its node is inserted: whatever it binds is live
    /// while the node is still detached. The node is in place once `render`
    /// returns and before the next item is visited.
    pub fn reconcile<T>(
        &mut self,
        items: &[T],
        mut key: impl FnMut(&T, usize) -> K,
        mut render: impl FnMut(&T, usize) -> (D::Node, S),
        mut update: impl FnMut(&mut S, &T, usize),
        mut remove: impl FnMut(&D::Node, S),
    ) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        let mut cursor = self.anchor.clone();
        let previous = mem::take(&mut self.records);
        let mut pass = Pass {
            dom: &self.dom,
            records: &mut self.records,
            previous,
            next: IndexMap::with_capacity(items.len()),
            detaching: None,
        };

        for (index, item) in items.iter().enumerate() {
            let key = key(item, index);
            if key.is_missing() {
                warn!(index, key = ?key, "list item has no key; treating it as a literal key");
            }
            if pass.next.contains_key(&key) {
                warn!(index, key = ?key, "duplicate key in list; item skipped");
                stats.skipped += 1;
                continue;
            }

            match pass.previous.swap_remove(&key) {
                Some(record) => {
                    if pass.dom.next_sibling(&cursor).as_ref() != Some(&record.node) {
                        pass.dom.insert_after(&cursor, &record.node);
                        stats.moved += 1;
                    }
                    stats.kept += 1;
                    cursor = record.node.clone();

                    let (slot, _) = pass.next.insert_full(key, record);
                    if let Some((_, record)) = pass.next.get_index_mut(slot) {
                        update(&mut record.state, item, index);
                    }
                }
                None => {
                    let (node, state) = render(item, index);
                    pass.dom.insert_after(&cursor, &node);
                    stats.created += 1;
                    cursor = node.clone();
                    pass.next.insert(key, Record { node, state });
                }
            }
        }

        while let Some((_, record)) = pass.previous.pop() {
            pass.detaching = Some(record.node.clone());
            remove(&record.node, record.state);
            if let Some(node) = pass.detaching.take() {
                pass.dom.detach(&node);
            }
            stats.removed += 1;
        }
        drop(pass);

        debug!(
            len = self.records.len(),
            created = stats.created,
            kept = stats.kept,
            moved = stats.moved,
            removed = stats.removed,
            "reconciled list"
        );
        stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.records.keys()
    }

    /// Managed nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = &D::Node> {
        self.records.values().map(|record| &record.node)
    }

    pub fn node(&self, key: &K) -> Option<&D::Node> {
        self.records.get(key).map(|record| &record.node)
    }

    pub fn state(&self, key: &K) -> Option<&S> {
        self.records.get(key).map(|record| &record.state)
    }

    /// Remove every managed node.
    pub fn clear(&mut self, mut remove: impl FnMut(&D::Node, S)) -> usize {
        let records = mem::take(&mut self.records);
        let count = records.len();
        for (_, record) in records {
            remove(&record.node, record.state);
            self.dom.detach(&record.node);
        }
        count
    }
}
