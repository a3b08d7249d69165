//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computation is running, the signal
//!    subscribes that computation. Reading never subscribes anything else.
//!
//! 2. A write that leaves the value unchanged (by `PartialEq`) does nothing.
//!
//! 3. Any other write replaces the value and synchronously re-runs every
//!    subscriber, in subscription order, from a snapshot taken before the
//!    first one runs.
//!
//! # Threading
//!
//! Signals are single-threaded (`Rc` + `RefCell`). The whole runtime runs on
//! one thread and propagation is fully synchronous, so no locking is needed.

use std::cell::RefCell;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::expr::Value;

use super::subscriber::{SubscriberId, SubscriberSet};

/// Counter for generating unique signal IDs.
static SIGNAL_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique signal ID.
fn next_signal_id() -> u64 {
    SIGNAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A reactive signal holding a value of type T.
///
/// Clones share the same value and subscribers.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T> {
    /// Unique identifier for this signal.
    id: u64,

    value: Rc<RefCell<T>>,

    subscribers: Rc<SubscriberSet>,
}

impl<T: 'static> Signal<T> {
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            id: next_signal_id(),
            value: Rc::new(RefCell::new(value)),
            subscribers: SubscriberSet::new(),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.subscribers.track();
        self.value.borrow().clone()
    }

    /// Borrow the current value, subscribing the running computation.
    ///
    /// Writing to this signal from inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.subscribers.track();
        f(&self.value.borrow())
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T
    where
        T: Clone,
    {
        self.value.borrow().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// Equal values are ignored entirely.
    pub fn set(&self, value: T)
    where
        T: PartialEq,
    {
        {
            let mut current = self.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        self.subscribers.notify();
    }

    /// Update the value using a function of the current value.
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: PartialEq,
    {
        let next = f(&self.value.borrow());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Subscriber IDs in notification order.
    pub fn subscriber_ids(&self) -> Vec<SubscriberId> {
        self.subscribers.ids()
    }
}

impl<T> Signal<T>
where
    T: Clone + Into<Value> + 'static,
{
    /// Wrap this signal as a reactive accessor value for use in a scope.
    ///
    /// Expressions that read the binding subscribe to this signal.
    pub fn accessor(&self) -> Value {
        let signal = self.clone();
        Value::accessor(move || signal.get().into())
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            value: Rc::clone(&self.value),
            subscribers: Rc::clone(&self.subscribers),
        }
    }
}

impl<T: Debug> Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("value", &*self.value.borrow())
            .field("subscriber_count", &self.subscribers.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Effect;
    use std::cell::Cell;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn read_outside_computation_subscribes_nothing() {
        let signal = Signal::new(1);
        signal.get();
        signal.with(|v| *v);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
        assert_eq!(signal1.id(), signal2.id());
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }

    #[test]
    fn untracked_read_does_not_subscribe() {
        let signal = Signal::new(1);
        let source = signal.clone();
        let _effect = Effect::new(move || {
            source.get_untracked();
        });
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn nested_write_completes_depth_first() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        // First subscriber of `a` forwards into `b`
        let (src, dst) = (a.clone(), b.clone());
        let _forward = Effect::new(move || dst.set(src.get() * 10));

        let (src, log) = (b.clone(), Rc::clone(&order));
        let _on_b = Effect::new(move || log.borrow_mut().push(format!("b={}", src.get())));

        let (src, log) = (a.clone(), Rc::clone(&order));
        let _on_a = Effect::new(move || log.borrow_mut().push(format!("a={}", src.get())));

        order.borrow_mut().clear();
        a.set(1);

        // `b`'s subscribers finish before `a`'s remaining subscribers run
        assert_eq!(*order.borrow(), vec!["b=10".to_string(), "a=1".to_string()]);
    }

    #[test]
    fn accessor_reads_subscribe() {
        let signal = Signal::new(3_i64);
        let accessor = signal.accessor();
        let seen = Rc::new(Cell::new(0.0));

        let sink = Rc::clone(&seen);
        let _effect = Effect::new(move || {
            if let Value::Number(n) = accessor.clone().unwrap_accessor() {
                sink.set(n);
            }
        });

        signal.set(4);
        assert_eq!(seen.get(), 4.0);
        assert_eq!(signal.subscriber_count(), 1);
    }
}
