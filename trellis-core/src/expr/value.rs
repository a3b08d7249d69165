//! Runtime Values
//!
//! The dynamic value model shared by scopes, expressions and list sources.
//!
//! Equality is strict: primitives compare by value, while lists, objects,
//! functions and accessors compare by identity. Writing a freshly built list
//! into a signal therefore always notifies, even if its contents match.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::error::EvalError;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, EvalError>;

/// A native function callable from expressions.
#[derive(Clone)]
pub struct Function(Rc<NativeFn>);

impl Function {
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.0)(args)
    }
}

/// A reactive read capability.
///
/// Reading calls through to the underlying signal or memo, so a read made
/// inside a computation subscribes it.
#[derive(Clone)]
pub struct Accessor(Rc<dyn Fn() -> Value>);

impl Accessor {
    pub fn read(&self) -> Value {
        (self.0)()
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Object(Rc<IndexMap<String, Value>>),
    Function(Function),
    Accessor(Accessor),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Rc::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(Rc::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn function(f: impl Fn(&[Value]) -> Result<Value, EvalError> + 'static) -> Self {
        Self::Function(Function(Rc::new(f)))
    }

    pub fn accessor(read: impl Fn() -> Value + 'static) -> Self {
        Self::Accessor(Accessor(Rc::new(read)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    pub fn is_accessor(&self) -> bool {
        matches!(self, Self::Accessor(_))
    }

    /// Dereference an accessor; any other value is returned as is.
    pub fn unwrap_accessor(self) -> Value {
        match self {
            Self::Accessor(accessor) => accessor.read(),
            other => other,
        }
    }

    /// Address of the shared allocation behind a reference value.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Self::List(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Self::Object(fields) => Some(Rc::as_ptr(fields) as *const () as usize),
            Self::Function(function) => Some(Rc::as_ptr(&function.0) as *const () as usize),
            Self::Accessor(accessor) => Some(Rc::as_ptr(&accessor.0) as *const () as usize),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::Accessor(_) => "accessor",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Str(s) => !s.is_empty(),
            Self::List(_) | Self::Object(_) | Self::Function(_) | Self::Accessor(_) => true,
        }
    }

    /// Numeric coercion used by arithmetic and relational operators.
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            _ => f64::NAN,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Read a field of an object.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Object(fields) => fields.get(name),
            _ => None,
        }
    }

    /// Text written into a node: nullish values render as nothing.
    pub fn to_text(&self) -> String {
        if self.is_nullish() {
            String::new()
        } else {
            self.to_string()
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Undefined | Self::Null | Self::Function(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Str(s) => serde_json::Value::String(s.to_string()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Self::Object(fields) => serde_json::Value::Object(
                fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::Accessor(accessor) => accessor.read().to_json(),
        }
    }
}

fn format_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n == n.trunc() && n.abs() < 1e21 {
        // Integral values print without a fractional part; -0 prints as 0
        write!(f, "{}", n as i128)
    } else {
        write!(f, "{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => format_number(*n, f),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Self::Object(_) => f.write_str("[object Object]"),
            Self::Function(_) => f.write_str("[function]"),
            Self::Accessor(accessor) => write!(f, "{}", accessor.read()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(fields) => f.debug_map().entries(fields.iter()).finish(),
            Self::Function(_) => f.write_str("Function"),
            Self::Accessor(_) => f.write_str("Accessor"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Rc::ptr_eq(&a.0, &b.0),
            (Self::Accessor(a), Self::Accessor(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Undefined | Self::Null | Self::Function(_) => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Self::Accessor(accessor) => accessor.read().serialize(serializer),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::str(s),
            serde_json::Value::Array(items) => Self::list(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Self::object(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::new(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Undefined, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equality_is_strict() {
        assert_eq!(Value::from(1), Value::from(1.0));
        assert_eq!(Value::str("a"), Value::str("a"));
        assert_ne!(Value::Null, Value::Undefined);
        assert_ne!(Value::Number(f64::NAN), Value::Number(f64::NAN));

        let list = Value::list([Value::from(1)]);
        assert_eq!(list, list.clone());
        assert_ne!(list, Value::list([Value::from(1)]));
    }

    #[test]
    fn display_follows_string_conversion() {
        assert_eq!(Value::from(3.0).to_string(), "3");
        assert_eq!(Value::from(-0.0).to_string(), "0");
        assert_eq!(Value::from(2.5).to_string(), "2.5");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "Infinity");
        assert_eq!(Value::list([Value::from(1), Value::Null, Value::str("x")]).to_string(), "1,,x");
        assert_eq!(Value::Undefined.to_string(), "undefined");
        assert_eq!(Value::Undefined.to_text(), "");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.truthy());
        assert!(!Value::from(0).truthy());
        assert!(!Value::str("").truthy());
        assert!(Value::str("0").truthy());
        assert!(Value::list([]).truthy());
    }

    #[test]
    fn json_conversion() {
        let value = Value::from(json!({"a": [true, null, "s"], "b": 1}));
        assert_eq!(value.to_json(), json!({"a": [true, null, "s"], "b": 1.0}));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"a":[true,null,"s"],"b":1.0}"#);
        assert_eq!(value.field("b"), Some(&Value::from(1)));
    }

    #[test]
    fn accessor_serializes_current_value() {
        let value = Value::accessor(|| Value::from(5));
        assert_eq!(value.to_json(), json!(5.0));
        assert_eq!(value.unwrap_accessor(), Value::from(5));
    }
}
