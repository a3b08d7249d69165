//! Memo Implementation
//!
//! A Memo is a derived value that is recomputed eagerly whenever its
//! dependencies change, and that only notifies its own dependents when the
//! recomputed value actually differs.
//!
//! # How Memos Work
//!
//! A memo is an effect that writes into a private signal. The effect tracks
//! whatever the derivation reads; the signal's equality check stops
//! propagation when a change upstream produces the same result downstream.
//!
//! Because propagation is synchronous, a memo read right after a write
//! always observes the fresh value.

use std::fmt::{self, Debug};

use crate::expr::Value;

use super::disposer::Disposer;
use super::effect::Effect;
use super::signal::Signal;

/// A cached derived value.
///
/// The value is `None` only if the derivation has never completed (its first
/// run panicked).
pub struct Memo<T: 'static> {
    value: Signal<Option<T>>,
    effect: Effect,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Create a memo and compute its first value immediately.
    pub fn new(compute: impl Fn() -> T + 'static) -> Self {
        let value = Signal::new(None);
        let target = value.clone();
        let effect = Effect::new(move || target.set(Some(compute())));
        Self { value, effect }
    }

    /// Get the current value, subscribing the running computation.
    pub fn get(&self) -> Option<T> {
        self.value.get()
    }

    pub fn get_untracked(&self) -> Option<T> {
        self.value.get_untracked()
    }

    /// Number of times the derivation has run.
    pub fn compute_count(&self) -> usize {
        self.effect.run_count()
    }

    pub fn dependent_count(&self) -> usize {
        self.value.subscriber_count()
    }

    /// Stop recomputing. The last value stays readable.
    pub fn dispose(&self) {
        self.effect.dispose();
    }

    pub fn disposer(&self) -> Disposer {
        self.effect.disposer()
    }
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Into<Value> + 'static,
{
    /// Wrap this memo as a reactive accessor value for use in a scope.
    pub fn accessor(&self) -> Value {
        self.value.accessor()
    }
}

impl<T: 'static> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T: Debug + 'static> Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("value", &self.value)
            .field("compute_count", &self.effect.run_count())
            .finish()
    }
}

/// Create a memo; see [`Memo::new`].
pub fn create_memo<T>(compute: impl Fn() -> T + 'static) -> Memo<T>
where
    T: Clone + PartialEq + 'static,
{
    Memo::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
