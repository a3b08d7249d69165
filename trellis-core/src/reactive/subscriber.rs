//! Subscriber types for the reactive system.
//!
//! A subscriber is a computation (effect, memo, watch or list pass) that
//! depends on reactive values. Every signal owns one [`SubscriberSet`]; a
//! computation keeps weak references to the sets it joined so that it can
//! leave all of them before its next run.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::effect::Computation;

/// Unique identifier for a subscriber.
///
/// Each computation gets a unique ID when created. This ID keys its entry in
/// every subscriber set it belongs to, which makes re-subscription idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// The computations currently subscribed to one reactive value.
///
/// Iteration order is subscription order. A computation that tears down and
/// re-subscribes moves to the end.
pub struct SubscriberSet {
    subscribers: RefCell<IndexMap<SubscriberId, Rc<Computation>>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            subscribers: RefCell::new(IndexMap::new()),
        })
    }

    /// Subscribe the running computation, if there is one.
    ///
    /// A computation that disposed itself earlier in the same run is not
    /// re-subscribed.
    pub(crate) fn track(self: &Rc<Self>) {
        let Some(current) = ReactiveContext::current() else {
            return;
        };
        if !current.is_active() {
            return;
        }

        let inserted = self
            .subscribers
            .borrow_mut()
            .insert(current.id(), Rc::clone(&current))
            .is_none();

        if inserted {
            current.add_dependency(Rc::downgrade(self));
        }
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().shift_remove(&id);
    }

    /// Run every subscriber present at the time of the call.
    ///
    /// The snapshot is taken before any computation runs, so subscriptions
    /// added or dropped by the notified computations do not affect this pass.
    /// Disposed computations are skipped; they leave the set at their own
    /// teardown.
    pub(crate) fn notify(&self) {
        let snapshot: SmallVec<[Rc<Computation>; 8]> =
            self.subscribers.borrow().values().cloned().collect();

        for computation in snapshot {
            if computation.is_active() {
                computation.run();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    /// Subscriber IDs in notification order.
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers.borrow().keys().copied().collect()
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

pub(crate) type Dependencies = SmallVec<[Weak<SubscriberSet>; 4]>;
