//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! the current computation is subscribed to it.
//!
//! # Implementation
//!
//! Exactly one computation is current at any instant. The slot is a
//! thread-local `Option`, not a stack: entering a context swaps the new
//! computation in and keeps the previous occupant inside the returned guard,
//! which puts it back when dropped. Because the restore happens in `Drop`,
//! the slot is repaired even when the computation body panics.

use std::cell::RefCell;
use std::rc::Rc;

use super::effect::Computation;
use super::SubscriberId;

thread_local! {
    static CURRENT: RefCell<Option<Rc<Computation>>> = const { RefCell::new(None) };
}

/// Guard that restores the previously current computation when dropped.
pub struct ReactiveContext {
    previous: Option<Rc<Computation>>,
}

impl ReactiveContext {
    /// Install `computation` (or nothing, for untracked sections) as current.
    pub(crate) fn enter(computation: Option<Rc<Computation>>) -> Self {
        let previous = CURRENT.with(|slot| slot.replace(computation));
        Self { previous }
    }

    /// Check if a computation is currently running.
    pub fn is_active() -> bool {
        CURRENT.with(|slot| slot.borrow().is_some())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CURRENT.with(|slot| slot.borrow().as_ref().map(|c| c.id()))
    }

    pub(crate) fn current() -> Option<Rc<Computation>> {
        CURRENT.with(|slot| slot.borrow().clone())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Run `f` with no current computation, so its reads subscribe nothing.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter(None);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_subscriber() {
        let computation = Computation::new(|| {});
        let id = computation.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(Some(computation));

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn nested_contexts_restore_previous() {
        let outer = Computation::new(|| {});
        let inner = Computation::new(|| {});
        let (outer_id, inner_id) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(Some(outer));
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));

            {
                let _ctx2 = ReactiveContext::enter(Some(inner));
                assert_eq!(ReactiveContext::current_subscriber(), Some(inner_id));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(outer_id));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_clears_then_restores() {
        let computation = Computation::new(|| {});
        let id = computation.id();
        let _ctx = ReactiveContext::enter(Some(computation));

        let inside = untracked(ReactiveContext::current_subscriber);
        assert!(inside.is_none());
        assert_eq!(ReactiveContext::current_subscriber(), Some(id));
    }

    #[test]
    fn slot_is_restored_after_panic() {
        let computation = Computation::new(|| {});

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = ReactiveContext::enter(Some(computation));
            panic!("body failed");
        }));

        assert!(result.is_err());
        assert!(!ReactiveContext::is_active());
    }
}
