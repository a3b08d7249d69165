//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever a signal
//! it read on its most recent run is written.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its body immediately to establish
//!    initial dependencies.
//!
//! 2. Every run first leaves all the subscriber sets it joined last time,
//!    then runs the body as the current computation. Each signal the body
//!    reads subscribes it again, so the dependency set always equals the
//!    reads of the latest run (conditional reads included).
//!
//! 3. A write to any dependency re-runs the effect synchronously, as part
//!    of the write's notification pass. A trigger that arrives while the
//!    body is already running (a self-write, or a cycle through another
//!    effect) is recorded and the body runs again as soon as it returns,
//!    until a run finishes without being triggered.
//!
//! # Failures
//!
//! A body may return `()` or `Result<(), E>`. Errors and panics are caught at
//! the run boundary and logged; the effect stays subscribed and keeps
//! re-running on later writes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use crate::error::{EffectError, EffectOutput};

use super::context::ReactiveContext;
use super::disposer::Disposer;
use super::subscriber::{Dependencies, SubscriberId, SubscriberSet};

type Body = Box<dyn FnMut() -> Result<(), EffectError>>;

/// Back-to-back runs allowed for one trigger before giving up on settling.
const MAX_RERUNS: usize = 100;

/// The shared state behind every effect-like handle.
pub(crate) struct Computation {
    id: SubscriberId,

    /// Taken out while running, so a reentrant trigger finds it empty.
    body: RefCell<Option<Body>>,

    active: Cell<bool>,

    /// Set by a trigger that arrived while the body was running.
    rerun_requested: Cell<bool>,

    /// Subscriber sets joined during the latest run.
    dependencies: RefCell<Dependencies>,

    run_count: Cell<usize>,
}

impl Computation {
    /// Create an active computation without running it.
    pub(crate) fn new<F, O>(mut body: F) -> Rc<Self>
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        Rc::new(Self {
            id: SubscriberId::new(),
            body: RefCell::new(Some(Box::new(move || body().into_result()))),
            active: Cell::new(true),
            rerun_requested: Cell::new(false),
            dependencies: RefCell::new(Dependencies::new()),
            run_count: Cell::new(0),
        })
    }

    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn add_dependency(&self, set: Weak<SubscriberSet>) {
        self.dependencies.borrow_mut().push(set);
    }

    pub(crate) fn dependency_count(&self) -> usize {
        self.dependencies
            .borrow()
            .iter()
            .filter(|set| set.strong_count() > 0)
            .count()
    }

    pub(crate) fn run_count(&self) -> usize {
        self.run_count.get()
    }

    /// Tear down, then run the body as the current computation.
    ///
    /// Repeats while the body triggered itself during its own run.
    pub(crate) fn run(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }

        let Some(mut body) = self.body.borrow_mut().take() else {
            trace!(effect = ?self.id, "deferring reentrant run");
            self.rerun_requested.set(true);
            return;
        };

        let mut reruns = 0;
        loop {
            self.rerun_requested.set(false);
            self.run_once(&mut body);

            // Disposed mid-run: drop the body (and its captures) instead of
            // putting it back.
            if !self.active.get() {
                return;
            }
            if !self.rerun_requested.get() {
                break;
            }
            if reruns == MAX_RERUNS {
                self.rerun_requested.set(false);
                error!(effect = ?self.id, reruns, "effect keeps triggering itself; giving up");
                break;
            }
            reruns += 1;
        }

        *self.body.borrow_mut() = Some(body);
    }

    fn run_once(self: &Rc<Self>, body: &mut Body) {
        self.teardown();

        let outcome = {
            let _ctx = ReactiveContext::enter(Some(Rc::clone(self)));
            panic::catch_unwind(AssertUnwindSafe(|| body()))
        };
        self.run_count.set(self.run_count.get() + 1);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(error)) => error!(effect = ?self.id, %error, "effect body failed"),
            Err(payload) => {
                let error = EffectError::from_panic(payload);
                error!(effect = ?self.id, %error, "effect body panicked");
            }
        }
    }

    fn teardown(&self) {
        let dependencies = std::mem::take(&mut *self.dependencies.borrow_mut());
        for set in dependencies {
            if let Some(set) = set.upgrade() {
                set.remove(self.id);
            }
        }
    }

    /// Stop all future runs. Safe to call repeatedly and from inside the
    /// computation's own body.
    pub(crate) fn dispose(&self) {
        if !self.active.replace(false) {
            return;
        }
        self.teardown();
        let body = self.body.borrow_mut().take();
        drop(body);
        debug!(effect = ?self.id, "effect disposed");
    }
}

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Cloning the handle shares the computation. Dropping every handle does not
/// stop the effect; it keeps running for as long as a signal it reads is
/// alive. Use [`Effect::dispose`] or a [`Disposer`] to stop it.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
///
/// let source = count.clone();
/// let effect = Effect::new(move || {
///     println!("Count is: {}", source.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// effect.dispose();
/// ```
#[derive(Clone)]
pub struct Effect {
    inner: Rc<Computation>,
}

impl Effect {
    /// Create a new effect and run it once, synchronously.
    pub fn new<F, O>(body: F) -> Self
    where
        F: FnMut() -> O + 'static,
        O: EffectOutput,
    {
        let inner = Computation::new(body);
        inner.run();
        Self { inner }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id()
    }

    /// Re-run the effect now, rebuilding its dependencies.
    pub fn schedule(&self) {
        self.inner.run();
    }

    /// Dispose of the effect.
    ///
    /// After disposal, the effect will not run again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !self.inner.is_active()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count()
    }

    /// Get the number of signals read during the latest run.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependency_count()
    }

    /// A type-erased handle that disposes this effect.
    pub fn disposer(&self) -> Disposer {
        let inner = Rc::clone(&self.inner);
        Disposer::new(move || inner.dispose())
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id())
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&run_count);

        let _effect = Effect::new(move || {
            counter.set(counter.get() + 1);
        });

        // Effect should have run once on creation
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_reruns_on_dependency_write() {
        let signal = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let source = signal.clone();
        let log = Rc::clone(&seen);
        let effect = Effect::new(move || {
            log.borrow_mut().push(source.get());
        });

        signal.set(1);
        signal.set(2);

        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn equal_write_does_not_rerun() {
        let signal = Signal::new(7);
        let source = signal.clone();
        let effect = Effect::new(move || {
            source.get();
        });

        signal.set(7);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            source.get();
        });

        effect.dispose();
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(1);
        effect.schedule();
        assert_eq!(effect.run_count(), 1);

        // Second disposal is a no-op
        effect.dispose();
    }

    #[test]
    fn effect_can_dispose_itself_mid_run() {
        let signal = Signal::new(0);
        let handle: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));

        let source = signal.clone();
        let slot = Rc::clone(&handle);
        let effect = Effect::new(move || {
            let value = source.get();
            if value == 1 {
                if let Some(effect) = slot.borrow().as_ref() {
                    effect.dispose();
                }
                // Reads after self-disposal must not re-subscribe
                source.get();
            }
        });
        *handle.borrow_mut() = Some(effect.clone());

        signal.set(1);
        assert!(effect.is_disposed());
        assert_eq!(signal.subscriber_count(), 0);

        signal.set(2);
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn failing_body_stays_subscribed() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || -> Result<(), String> {
            if source.get() % 2 == 1 {
                return Err("odd value".to_string());
            }
            Ok(())
        });

        signal.set(1);
        signal.set(2);
        assert_eq!(effect.run_count(), 3);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn panicking_body_is_contained() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            if source.get() == 1 {
                panic!("bad run");
            }
        });

        signal.set(1);
        assert!(!crate::reactive::ReactiveContext::is_active());

        signal.set(2);
        assert_eq!(effect.run_count(), 3);
    }

    #[test]
    fn self_write_settles_without_recursing() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let depth = Rc::new(Cell::new(0));
        let deepest = Rc::new(Cell::new(0));

        let (depth_in, deepest_in) = (Rc::clone(&depth), Rc::clone(&deepest));
        let effect = Effect::new(move || {
            depth_in.set(depth_in.get() + 1);
            deepest_in.set(deepest_in.get().max(depth_in.get()));
            let value = source.get();
            if value < 10 {
                source.set(value + 1);
            }
            depth_in.set(depth_in.get() - 1);
        });

        assert_eq!(signal.get_untracked(), 10);
        assert_eq!(effect.run_count(), 11);
        assert_eq!(deepest.get(), 1);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn cycle_through_another_effect_delivers_latest_value() {
        let trigger = Signal::new(false);
        let y = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let _responder = {
            let (trigger, y) = (trigger.clone(), y.clone());
            Effect::new(move || {
                if trigger.get() {
                    y.set(5);
                }
            })
        };
        let reader = {
            let (trigger, y, seen) = (trigger.clone(), y.clone(), Rc::clone(&seen));
            Effect::new(move || {
                seen.borrow_mut().push(y.get());
                trigger.set(true);
            })
        };

        assert_eq!(*seen.borrow(), vec![0, 5]);
        assert_eq!(reader.run_count(), 2);

        y.set(6);
        assert_eq!(*seen.borrow(), vec![0, 5, 6]);
    }

    #[test]
    fn runaway_self_trigger_is_cut_off() {
        let signal = Signal::new(0u64);
        let source = signal.clone();
        let effect = Effect::new(move || {
            let value = source.get();
            source.set(value + 1);
        });

        assert_eq!(effect.run_count(), MAX_RERUNS + 1);
        assert!(!effect.is_disposed());

        // Still subscribed after giving up
        signal.set(10_000);
        assert!(effect.run_count() > MAX_RERUNS + 1);
    }

    #[test]
    fn disposer_stops_effect() {
        let signal = Signal::new(0);
        let source = signal.clone();
        let effect = Effect::new(move || {
            source.get();
        });

        let disposer = effect.disposer();
        disposer.dispose();
        disposer.dispose();

        signal.set(3);
        assert!(effect.is_disposed());
        assert_eq!(effect.run_count(), 1);
    }
}
