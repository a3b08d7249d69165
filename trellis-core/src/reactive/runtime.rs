//! Reactive Runtime
//!
//! Signal writes and effect runs are synchronous and need no coordinator.
//! The one asynchronous boundary is the microtask queue: work deferred to
//! "the end of the current synchronous turn", which is how watch callbacks
//! are delivered.
//!
//! # Turns
//!
//! A turn ends when the host drains the queue, either directly with
//! [`Runtime::flush_microtasks`] (event loops, tests) or by awaiting
//! [`Runtime::next_tick`] inside a tokio current-thread runtime.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace};

use crate::error::EffectError;

use super::context::ReactiveContext;
use super::subscriber::SubscriberId;

type Microtask = Box<dyn FnOnce()>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
    static FLUSHING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the flushing flag even if a microtask unwinds past the loop.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        FLUSHING.with(|flag| flag.set(false));
    }
}

/// Entry points into the per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Defer `task` to the end of the current turn.
    pub fn queue_microtask(task: impl FnOnce() + 'static) {
        MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
    }

    /// Number of microtasks waiting for the end of the turn.
    pub fn pending_microtasks() -> usize {
        MICROTASKS.with(|queue| queue.borrow().len())
    }

    /// Run queued microtasks in FIFO order until the queue is empty.
    ///
    /// Tasks queued while flushing run in the same flush. A call made from
    /// inside a microtask returns immediately. Returns the number of tasks
    /// run.
    pub fn flush_microtasks() -> usize {
        if FLUSHING.with(|flag| flag.replace(true)) {
            return 0;
        }
        let _guard = FlushGuard;

        let mut ran = 0;
        loop {
            let next = MICROTASKS.with(|queue| queue.borrow_mut().pop_front());
            let Some(task) = next else {
                break;
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                let error = EffectError::from_panic(payload);
                error!(%error, "microtask panicked");
            }
            ran += 1;
        }

        if ran > 0 {
            trace!(ran, "flushed microtasks");
        }
        ran
    }

    /// Yield to the async runtime once, then end the turn.
    pub async fn next_tick() -> usize {
        tokio::task::yield_now().await;
        Self::flush_microtasks()
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a reactive context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn microtasks_wait_for_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        Runtime::queue_microtask(move || sink.borrow_mut().push(1));
        let sink = Rc::clone(&log);
        Runtime::queue_microtask(move || sink.borrow_mut().push(2));

        assert!(log.borrow().is_empty());
        assert_eq!(Runtime::pending_microtasks(), 2);

        assert_eq!(Runtime::flush_microtasks(), 2);
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(Runtime::pending_microtasks(), 0);
    }

    #[test]
    fn tasks_queued_during_flush_run_in_same_flush() {
        let log = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&log);
        Runtime::queue_microtask(move || {
            sink.borrow_mut().push("outer");
            let inner = Rc::clone(&sink);
            Runtime::queue_microtask(move || inner.borrow_mut().push("inner"));
            // Nested flush is refused
            assert_eq!(Runtime::flush_microtasks(), 0);
        });

        assert_eq!(Runtime::flush_microtasks(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn panicking_microtask_does_not_stop_the_queue() {
        let ran = Rc::new(Cell::new(false));

        Runtime::queue_microtask(|| panic!("bad task"));
        let flag = Rc::clone(&ran);
        Runtime::queue_microtask(move || flag.set(true));

        assert_eq!(Runtime::flush_microtasks(), 2);
        assert!(ran.get());
    }

    #[tokio::test]
    async fn next_tick_drains_queue() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        Runtime::queue_microtask(move || flag.set(true));

        assert_eq!(Runtime::next_tick().await, 1);
        assert!(ran.get());
    }

    #[test]
    fn tracking_state_outside_computation() {
        assert!(!Runtime::is_tracking());
        assert!(Runtime::current_subscriber().is_none());
    }
}
