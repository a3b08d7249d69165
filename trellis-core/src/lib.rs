//! Trellis Core
//!
//! This crate provides the core runtime for the Trellis reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, effects, memos, watches)
//! - A sandboxed template expression language with a compile cache
//! - Keyed list reconciliation against a host document
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `expr`: Expression parsing, evaluation, scopes and the compile cache
//! - `dom`: Host node primitives, node cleanup registry, keyed reconciler and
//!   expression-driven bindings
//! - `error`: Error types shared by the above
//!
//! Everything is single-threaded and synchronous except watch callbacks,
//! which run at the end of the current turn (see [`reactive::Runtime`]).
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{create_effect, create_signal, evaluate_expression, Scope};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let count = create_signal(1);
//!
//! let scope = Scope::new();
//! scope.set("count", count.accessor());
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _stop = create_effect(move || {
//!     sink.borrow_mut().push(evaluate_expression("count * 2", &scope).to_string());
//! });
//!
//! count.set(5);
//! assert_eq!(*seen.borrow(), vec!["2", "10"]);
//! ```

pub mod dom;
pub mod error;
pub mod expr;
pub mod reactive;

pub use dom::{each, Dom, EachOptions, MemoryDom, NodeRegistry, ReconcileStats, Reconciler};
pub use error::{EffectError, EvalError, ParseError};
pub use expr::{evaluate_expression, evaluate_expression_with, resolve, ExprCache, Scope, Value};
pub use reactive::{
    create_effect, create_memo, create_signal, create_watch, untracked, Disposer, Effect, Memo,
    Runtime, Signal, Watch, WatchOptions,
};
