//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, effects, memos
//! and watches. These primitives form the foundation of Trellis's
//! fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! while a computation is running, the signal subscribes that computation.
//! When the value changes, every subscriber re-runs before the write returns.
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever a signal it read on its
//! latest run changes. Dependencies are rebuilt from scratch on every run, so
//! a branch that stops reading a signal also stops reacting to it.
//!
//! ## Memos
//!
//! A Memo is a derived value that only propagates when the derived result
//! changes.
//!
//! ## Watches
//!
//! A Watch observes a single signal and delivers coalesced `(new, old)`
//! callbacks at the end of the current turn (see [`Runtime`]).
//!
//! # Implementation Notes
//!
//! The runtime is single-threaded. A thread-local slot holds the running
//! computation; see [`ReactiveContext`].

mod context;
mod disposer;
mod effect;
mod memo;
mod runtime;
mod signal;
mod subscriber;
mod watch;

pub use context::{untracked, ReactiveContext};
pub use disposer::Disposer;
pub use effect::Effect;
pub use memo::{create_memo, Memo};
pub use runtime::Runtime;
pub use signal::Signal;
pub use subscriber::{SubscriberId, SubscriberSet};
pub use watch::{Watch, WatchOptions};

use crate::error::EffectOutput;

/// Create a signal holding `initial`.
pub fn create_signal<T: 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

/// Create and run an effect, returning its disposer.
pub fn create_effect<F, O>(body: F) -> Disposer
where
    F: FnMut() -> O + 'static,
    O: EffectOutput,
{
    Effect::new(body).disposer()
}

/// Watch `signal`, returning the watch's disposer.
pub fn create_watch<T, F, O>(signal: &Signal<T>, callback: F, options: WatchOptions) -> Disposer
where
    T: Clone + PartialEq + 'static,
    F: FnMut(&T, Option<&T>) -> O + 'static,
    O: EffectOutput,
{
    Watch::new(signal, callback, options).disposer()
}
