//! Disposer handles.
//!
//! A [`Disposer`] is the one cancellation primitive of the runtime. Effects,
//! watches and list bindings all hand one out, and the node registry stores
//! them by node identity so a removed subtree can stop everything it owns.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

type Action = Box<dyn FnOnce()>;

/// A clonable, idempotent cancellation handle.
///
/// The wrapped action runs at most once, on the first call to
/// [`dispose`](Self::dispose) through any clone.
#[derive(Clone)]
pub struct Disposer {
    action: Rc<RefCell<Option<Action>>>,
}

impl Disposer {
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: Rc::new(RefCell::new(Some(Box::new(action)))),
        }
    }

    /// A disposer with nothing to do.
    pub fn noop() -> Self {
        Self {
            action: Rc::new(RefCell::new(None)),
        }
    }

    pub fn dispose(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn action_runs_once_across_clones() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let disposer = Disposer::new(move || counter.set(counter.get() + 1));
        let other = disposer.clone();

        disposer.dispose();
        other.dispose();
        disposer.dispose();

        assert_eq!(calls.get(), 1);
        assert!(other.is_disposed());
    }

    #[test]
    fn noop_is_already_disposed() {
        let disposer = Disposer::noop();
        assert!(disposer.is_disposed());
        disposer.dispose();
    }
}
