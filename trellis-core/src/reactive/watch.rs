//! Watch Implementation
//!
//! A watch observes one signal and delivers `(new, old)` pairs to a
//! callback at the end of the current synchronous turn.
//!
//! The comparison against the baseline happens synchronously inside an
//! effect, on every write. Only the callback is deferred, and at most one
//! callback per watch is ever queued: further changes before it runs just
//! move the baseline, so the callback sees the latest value against the
//! value from before the first change of the turn.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{EffectError, EffectOutput};

use super::disposer::Disposer;
use super::effect::Effect;
use super::runtime::Runtime;
use super::signal::Signal;

/// Options for [`Watch::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Deliver `(initial, None)` at the end of the creating turn.
    #[serde(default)]
    pub immediate: bool,
}

type Callback<T> = Box<dyn FnMut(&T, Option<&T>) -> Result<(), EffectError>>;

struct WatchState<T> {
    /// Last observed value; `None` before the first run.
    baseline: RefCell<Option<T>>,

    /// `Some(previous)` while a callback is queued.
    pending: RefCell<Option<Option<T>>>,

    callback: RefCell<Callback<T>>,

    disposed: Cell<bool>,

    delivered: Cell<usize>,
}

impl<T: Clone + 'static> WatchState<T> {
    fn schedule(self: &Rc<Self>, previous: Option<T>) {
        {
            let mut pending = self.pending.borrow_mut();
            if pending.is_some() {
                return;
            }
            *pending = Some(previous);
        }

        let state = Rc::clone(self);
        Runtime::queue_microtask(move || state.deliver());
    }

    fn deliver(&self) {
        let Some(previous) = self.pending.borrow_mut().take() else {
            return;
        };
        if self.disposed.get() {
            return;
        }
        let Some(current) = self.baseline.borrow().clone() else {
            return;
        };

        let outcome = {
            let mut callback = self.callback.borrow_mut();
            panic::catch_unwind(AssertUnwindSafe(|| {
                (*callback)(&current, previous.as_ref())
            }))
        };
        self.delivered.set(self.delivered.get() + 1);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(%error, "watch callback failed"),
            Err(payload) => {
                let error = EffectError::from_panic(payload);
                error!(%error, "watch callback panicked");
            }
        }
    }
}

/// A debounced observer of a single signal.
pub struct Watch<T: 'static> {
    effect: Effect,
    state: Rc<WatchState<T>>,
}

impl<T> Watch<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Start watching `signal`.
    ///
    /// The callback receives the new value and the previous baseline (`None`
    /// only for the immediate delivery).
    pub fn new<F, O>(signal: &Signal<T>, mut callback: F, options: WatchOptions) -> Self
    where
        F: FnMut(&T, Option<&T>) -> O + 'static,
        O: EffectOutput,
    {
        let state = Rc::new(WatchState {
            baseline: RefCell::new(None),
            pending: RefCell::new(None),
            callback: RefCell::new(Box::new(move |new: &T, old: Option<&T>| {
                callback(new, old).into_result()
            })),
            disposed: Cell::new(false),
            delivered: Cell::new(0),
        });

        let source = signal.clone();
        let observed = Rc::clone(&state);
        let effect = Effect::new(move || {
            let value = source.get();
            let previous = observed.baseline.borrow_mut().replace(value.clone());
            match previous {
                None => {
                    if options.immediate {
                        observed.schedule(None);
                    }
                }
                Some(old) if old != value => observed.schedule(Some(old)),
                Some(_) => {}
            }
        });

        Self { effect, state }
    }

    /// Whether a callback is queued for the end of the turn.
    pub fn is_pending(&self) -> bool {
        self.state.pending.borrow().is_some()
    }

    /// Number of callbacks delivered so far.
    pub fn delivered(&self) -> usize {
        self.state.delivered.get()
    }

    /// Stop watching. A queued callback is dropped.
    pub fn dispose(&self) {
        self.state.disposed.set(true);
        self.effect.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.get()
    }

    pub fn disposer(&self) -> Disposer {
        let state = Rc::clone(&self.state);
        let effect = self.effect.clone();
        Disposer::new(move || {
            state.disposed.set(true);
            effect.dispose();
        })
    }
}

impl<T: 'static> fmt::Debug for Watch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watch")
            .field("effect", &self.effect)
            .field("pending", &self.state.pending.borrow().is_some())
            .field("delivered", &self.state.delivered.get())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    type Calls = Rc<RefCell<Vec<(i32, Option<i32>)>>>;

    fn recorder() -> (Calls, impl FnMut(&i32, Option<&i32>)) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        (calls, move |new: &i32, old: Option<&i32>| {
            sink.borrow_mut().push((*new, old.copied()))
        })
    }

    #[test]
    fn no_callback_on_creation_by_default() {
        let signal = Signal::new(1);
        let (calls, callback) = recorder();
        let watch = Watch::new(&signal, callback, WatchOptions::default());

        Runtime::flush_microtasks();
        assert!(calls.borrow().is_empty());
        assert!(!watch.is_pending());
    }

    #[test]
    fn immediate_delivers_initial_value() {
        let signal = Signal::new(1);
        let (calls, callback) = recorder();
        let _watch = Watch::new(&signal, callback, WatchOptions { immediate: true });

        // Deferred, not synchronous
        assert!(calls.borrow().is_empty());

        Runtime::flush_microtasks();
        assert_eq!(*calls.borrow(), vec![(1, None)]);
    }

    #[test]
    fn writes_in_one_turn_coalesce() {
        let signal = Signal::new(0);
        let (calls, callback) = recorder();
        let watch = Watch::new(&signal, callback, WatchOptions::default());

        signal.set(1);
        signal.set(2);
        signal.set(3);
        assert!(watch.is_pending());
        assert!(calls.borrow().is_empty());

        Runtime::flush_microtasks();
        assert_eq!(*calls.borrow(), vec![(3, Some(0))]);
        assert_eq!(watch.delivered(), 1);
    }

    #[test]
    fn separate_turns_deliver_separately() {
        let signal = Signal::new(0);
        let (calls, callback) = recorder();
        let _watch = Watch::new(&signal, callback, WatchOptions::default());

        signal.set(1);
        Runtime::flush_microtasks();
        signal.set(2);
        Runtime::flush_microtasks();

        assert_eq!(*calls.borrow(), vec![(1, Some(0)), (2, Some(1))]);
    }

    #[test]
    fn dispose_drops_pending_callback() {
        let signal = Signal::new(0);
        let (calls, callback) = recorder();
        let watch = Watch::new(&signal, callback, WatchOptions::default());

        signal.set(5);
        watch.dispose();
        Runtime::flush_microtasks();

        assert!(calls.borrow().is_empty());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn failing_callback_keeps_watching() {
        let signal = Signal::new(0);
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);
        let watch = Watch::new(
            &signal,
            move |new: &i32, _old: Option<&i32>| -> Result<(), String> {
                sink.set(*new);
                Err(format!("rejected {new}"))
            },
            WatchOptions::default(),
        );

        signal.set(1);
        Runtime::flush_microtasks();
        signal.set(2);
        Runtime::flush_microtasks();

        assert_eq!(seen.get(), 2);
        assert_eq!(watch.delivered(), 2);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: WatchOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.immediate);

        let options: WatchOptions = serde_json::from_str(r#"{"immediate": true}"#).unwrap();
        assert!(options.immediate);
    }
}
