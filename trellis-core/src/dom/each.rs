//! Keyed List Rendering
//!
//! [`each`] renders one node per item of a list expression after an anchor
//! node and keeps them in list order as the list changes.
//!
//! Every item gets a child scope in which the item and its position are
//! bound through signals. When an item survives a change its node is kept,
//! and only those two signals are written, so bindings inside the node update
//! in place instead of being rebuilt.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expr::{ExprCache, Scope, Value};
use crate::reactive::{untracked, Disposer, Effect, Signal};

use super::reconcile::{Key, ReconcileStats, Reconciler};
use super::{Dom, NodeRegistry};

/// Binding names used in item scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EachOptions {
    pub item_name: String,
    pub index_name: String,
}

impl Default for EachOptions {
    fn default() -> Self {
        Self {
            item_name: "item".to_string(),
            index_name: "index".to_string(),
        }
    }
}

/// The per-item state of an [`each`] list.
pub struct ItemScope {
    scope: Scope,
    item: Signal<Value>,
    index: Signal<Value>,
}

impl ItemScope {
    fn new(parent: &Scope, options: &EachOptions, item: Value, index: usize) -> Self {
        let item = Signal::new(item);
        let index = Signal::new(Value::from(index));
        let scope = parent.child();
        scope.set(options.item_name.as_str(), item.accessor());
        scope.set(options.index_name.as_str(), index.accessor());
        Self { scope, item, index }
    }

    fn update(&self, item: &Value, index: usize) {
        self.item.set(item.clone());
        self.index.set(Value::from(index));
    }

    /// The scope to bind the item's expressions against.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The current item, read without tracking.
    pub fn item(&self) -> Value {
        self.item.get_untracked()
    }

    /// The current position, read without tracking.
    pub fn index(&self) -> usize {
        self.index.get_untracked().as_number().map_or(0, |n| n as usize)
    }
}

impl fmt::Debug for ItemScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemScope")
            .field("item", &self.item())
            .field("index", &self.index())
            .finish()
    }
}

/// A mounted [`each`] list.
#[derive(Clone)]
pub struct Each {
    effect: Effect,
    last: Rc<Cell<ReconcileStats>>,
}

impl Each {
    /// Statistics of the most recent reconciliation pass.
    pub fn last_stats(&self) -> ReconcileStats {
        self.last.get()
    }

    /// Number of passes run so far.
    pub fn pass_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Stop following the list. Rendered items stay in place.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    pub fn disposer(&self) -> Disposer {
        self.effect.disposer()
    }
}

impl fmt::Debug for Each {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Each")
            .field("effect", &self.effect)
            .field("last", &self.last.get())
            .finish()
    }
}

/// Render the list produced by `list_source` after `anchor`.
///
/// `key_source`, when given, is evaluated per item in a scope holding the
/// plain item and index and must identify the item. Without it the position
/// is the key, so reordering an unkeyed list reuses nodes by position.
///
/// `render` builds the node for a new item; it is expected to bind the
/// node's expressions against [`ItemScope::scope`] through `registry`, so
/// removing the item stops them. The list effect itself is registered under
/// `anchor`.
#[allow(clippy::too_many_arguments)]
pub fn each<D, F>(
    dom: &D,
    registry: &NodeRegistry<D::Node>,
    cache: &ExprCache,
    anchor: &D::Node,
    scope: &Scope,
    list_source: &str,
    key_source: Option<&str>,
    options: EachOptions,
    mut render: F,
) -> Each
where
    D: Dom,
    F: FnMut(&ItemScope) -> D::Node + 'static,
{
    let list_expr = cache.compile(list_source);
    let key_expr = key_source.map(|source| cache.compile(source));
    let last = Rc::new(Cell::new(ReconcileStats::default()));

    let mut reconciler: Reconciler<D, Key, ItemScope> = Reconciler::new(dom.clone(), anchor.clone());
    let dom = dom.clone();
    let scope = scope.clone();
    let teardown = registry.clone();
    let stats_out = Rc::clone(&last);

    let effect = Effect::new(move || {
        let items = match list_expr.evaluate(&scope, true).unwrap_accessor() {
            Value::List(items) => items.to_vec(),
            value if value.is_nullish() => Vec::new(),
            other => {
                warn!(
                    expression = %list_expr.source(),
                    found = other.type_name(),
                    "list expression did not produce a list"
                );
                Vec::new()
            }
        };

        // Item bindings subscribe themselves; the list pass must not pick up
        // their reads.
        let stats = untracked(|| {
            reconciler.reconcile(
                &items,
                |item, index| match &key_expr {
                    Some(key_expr) => {
                        let key_scope = scope.child();
                        key_scope.set(options.item_name.as_str(), item.clone());
                        key_scope.set(options.index_name.as_str(), Value::from(index));
                        Key::from(&key_expr.evaluate(&key_scope, true))
                    }
                    None => Key::from(index),
                },
                |item, index| {
                    let item_scope = ItemScope::new(&scope, &options, item.clone(), index);
                    let node = render(&item_scope);
                    (node, item_scope)
                },
                |item_scope, item, index| item_scope.update(item, index),
                |node, _| teardown.teardown(&dom, node),
            )
        });
        stats_out.set(stats);
    });

    registry.register(anchor, effect.disposer());
    Each { effect, last }
}
