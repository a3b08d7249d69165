//! Evaluation Scopes
//!
//! A scope is a chain of binding frames. Lookups walk from the innermost
//! frame outwards, so a child scope (one per list item, for example) can
//! shadow names of its parent without copying it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::value::Value;

#[derive(Default)]
struct ScopeFrame {
    bindings: RefCell<IndexMap<String, Value>>,
    parent: Option<Scope>,
}

/// Named bindings that expressions are evaluated against.
///
/// Cloning a scope is cheap and yields a handle to the same frame.
#[derive(Clone, Default)]
pub struct Scope {
    inner: Rc<ScopeFrame>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bindings<K: Into<String>>(bindings: impl IntoIterator<Item = (K, Value)>) -> Self {
        let scope = Self::new();
        for (name, value) in bindings {
            scope.set(name, value);
        }
        scope
    }

    /// Build a root scope from a JSON object. Anything else yields an empty
    /// scope.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Object(fields) => {
                Self::with_bindings(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
            _ => Self::new(),
        }
    }

    /// A new empty frame whose lookups fall back to `self`.
    pub fn child(&self) -> Self {
        Self {
            inner: Rc::new(ScopeFrame {
                bindings: RefCell::new(IndexMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Bind `name` in this frame, shadowing any binding of a parent.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner.bindings.borrow_mut().insert(name.into(), value);
    }

    /// Look `name` up through the chain, without unwrapping accessors.
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = Some(self);
        while let Some(scope) = frame {
            if let Some(value) = scope.inner.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            frame = scope.inner.parent.as_ref();
        }
        None
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.inner.bindings.borrow().keys().cloned().collect();
        f.debug_struct("Scope")
            .field("names", &names)
            .field("parent", &self.inner.parent)
            .finish()
    }
}

/// Resolve a free name against `scope`.
///
/// Missing names are `undefined`. With `auto_unwrap`, a binding holding an
/// accessor is read through it, which subscribes the running computation to
/// whatever the accessor reads.
pub fn resolve(scope: &Scope, name: &str, auto_unwrap: bool) -> Value {
    match scope.get(name) {
        Some(value) if auto_unwrap => value.unwrap_accessor(),
        Some(value) => value,
        None => Value::Undefined,
    }
}
