//! Expression Cache
//!
//! Compiles each distinct expression text once and hands out the shared
//! compiled form on every later request. A text that fails to compile is
//! cached too: the failure is logged when it is first seen and every later
//! evaluation quietly yields `undefined`.
//!
//! Entries are never evicted. The set of distinct expression texts in an
//! application is small compared to how often each one is evaluated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{error, trace, warn};

use crate::error::ParseError;

use super::ast::Expr;
use super::eval::evaluate;
use super::parser::parse;
use super::scope::Scope;
use super::value::Value;

/// The cached outcome of compiling one expression text.
#[derive(Debug)]
pub struct CompiledExpr {
    source: Arc<str>,
    program: Result<Expr, ParseError>,
}

impl CompiledExpr {
    fn compile(source: Arc<str>) -> Self {
        let program = parse(&source);
        Self { source, program }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_valid(&self) -> bool {
        self.program.is_ok()
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.program.as_ref().err()
    }

    /// Run against `scope`. Evaluation failures are logged and yield
    /// `undefined` for this call only.
    pub fn evaluate(&self, scope: &Scope, auto_unwrap: bool) -> Value {
        let program = match &self.program {
            Ok(program) => program,
            Err(_) => {
                trace!(expression = %self.source, "skipping expression that failed to compile");
                return Value::Undefined;
            }
        };

        match evaluate(program, scope, auto_unwrap) {
            Ok(value) => value,
            Err(error) => {
                warn!(expression = %self.source, %error, "expression evaluation failed");
                Value::Undefined
            }
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: DashMap<Arc<str>, Arc<CompiledExpr>>,
    compiles: AtomicUsize,
}

/// A memoizing compiler from expression text to [`CompiledExpr`].
///
/// Cloning yields a handle to the same cache.
#[derive(Debug, Clone, Default)]
pub struct ExprCache {
    inner: Arc<CacheInner>,
}

impl ExprCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache used by [`evaluate_expression`].
    pub fn global() -> &'static ExprCache {
        static GLOBAL: OnceLock<ExprCache> = OnceLock::new();
        GLOBAL.get_or_init(ExprCache::new)
    }

    /// Get the compiled form of `source`, compiling it on first sight.
    pub fn compile(&self, source: &str) -> Arc<CompiledExpr> {
        if let Some(entry) = self.inner.entries.get(source) {
            return Arc::clone(entry.value());
        }

        let entry = self
            .inner
            .entries
            .entry(Arc::from(source))
            .or_insert_with(|| {
                self.inner.compiles.fetch_add(1, Ordering::Relaxed);
                let compiled = CompiledExpr::compile(Arc::from(source));
                if let Some(error) = compiled.error() {
                    error!(expression = %source, %error, "failed to compile expression");
                } else {
                    trace!(expression = %source, "compiled expression");
                }
                Arc::new(compiled)
            });
        Arc::clone(entry.value())
    }

    pub fn evaluate(&self, source: &str, scope: &Scope, auto_unwrap: bool) -> Value {
        self.compile(source).evaluate(scope, auto_unwrap)
    }

    /// Number of compilation attempts so far. Never exceeds [`Self::len`].
    pub fn compile_count(&self) -> usize {
        self.inner.compiles.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

/// Evaluate `source` against `scope` through the global cache, reading
/// reactive accessors through.
pub fn evaluate_expression(source: &str, scope: &Scope) -> Value {
    evaluate_expression_with(source, scope, true)
}

pub fn evaluate_expression_with(source: &str, scope: &Scope, auto_unwrap: bool) -> Value {
    ExprCache::global().evaluate(source, scope, auto_unwrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_each_text_once() {
        let cache = ExprCache::new();
        let scope = Scope::from_json(json!({ "n": 2 }));

        for _ in 0..1000 {
            assert_eq!(cache.evaluate("n * 21", &scope, true), Value::from(42));
        }
        assert_eq!(cache.compile_count(), 1);
        assert_eq!(cache.len(), 1);

        cache.evaluate("n + 1", &scope, true);
        assert_eq!(cache.compile_count(), 2);
    }

    #[test]
    fn compile_failures_are_cached() {
        let cache = ExprCache::new();
        let scope = Scope::new();

        let first = cache.compile("a +* b");
        assert!(!first.is_valid());
        assert_eq!(cache.evaluate("a +* b", &scope, true), Value::Undefined);
        assert_eq!(cache.evaluate("a +* b", &scope, true), Value::Undefined);

        assert_eq!(cache.compile_count(), 1);
        assert!(Arc::ptr_eq(&first, &cache.compile("a +* b")));
    }

    #[test]
    fn evaluation_failure_does_not_poison_the_entry() {
        let cache = ExprCache::new();
        let scope = Scope::from_json(json!({ "user": null }));

        assert_eq!(cache.evaluate("user.name", &scope, true), Value::Undefined);

        scope.set("user", Value::from(json!({ "name": "ada" })));
        assert_eq!(cache.evaluate("user.name", &scope, true), Value::str("ada"));
        assert_eq!(cache.compile_count(), 1);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ExprCache::new();
        let other = cache.clone();
        cache.compile("1 + 1");
        other.compile("1 + 1");
        assert_eq!(other.compile_count(), 1);
    }

    #[test]
    fn global_cache_is_shared() {
        let scope = Scope::from_json(json!({ "x": 3 }));
        assert_eq!(evaluate_expression("x * x + 0.5", &scope), Value::from(9.5));
        assert!(ExprCache::global().compile("x * x + 0.5").is_valid());
    }
}
