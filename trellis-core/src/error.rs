//! Error Types
//!
//! Errors never cross the public boundary of the runtime: effect bodies,
//! watch callbacks and expression evaluation are all caught, logged and
//! degraded. These types exist so that the failures carry enough structure
//! to be logged usefully and asserted on in tests.

use std::fmt::Display;

use thiserror::Error;

/// A failure while turning expression text into an AST.
///
/// Offsets are byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar { found: char, offset: usize },

    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number literal {text:?} at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("unexpected token {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        offset: usize,
    },

    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("empty expression")]
    Empty,

    #[error("expression nests too deeply at offset {offset}")]
    TooDeep { offset: usize },
}

/// A failure while evaluating a compiled expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("cannot read property {property:?} of {target}")]
    NullMember { property: String, target: &'static str },

    #[error("{callee} is not a function")]
    NotCallable { callee: String },

    #[error("cannot index {target} with {index}")]
    InvalidIndex { target: &'static str, index: String },

    #[error("{0}")]
    Native(String),
}

impl EvalError {
    /// Build an error from inside a native function exposed to expressions.
    pub fn native(message: impl Display) -> Self {
        Self::Native(message.to_string())
    }
}

/// A failure reported by an effect body or a watch callback.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

impl EffectError {
    /// Render a caught panic payload into a loggable error.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked(message)
    }
}

/// Output of an effect body or watch callback.
///
/// Lets bodies return either `()` or `Result<(), E>` for any displayable
/// error type.
pub trait EffectOutput {
    fn into_result(self) -> Result<(), EffectError>;
}

impl EffectOutput for () {
    fn into_result(self) -> Result<(), EffectError> {
        Ok(())
    }
}

impl<E: Display> EffectOutput for Result<(), E> {
    fn into_result(self) -> Result<(), EffectError> {
        self.map_err(|e| EffectError::Failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_output_is_ok() {
        assert!(().into_result().is_ok());
    }

    #[test]
    fn result_output_keeps_message() {
        let out: Result<(), String> = Err("boom".to_string());
        let err = out.into_result().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn panic_payloads_render() {
        let err = EffectError::from_panic(Box::new("static message"));
        assert_eq!(err.to_string(), "panicked: static message");

        let err = EffectError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.to_string(), "panicked: owned");

        let err = EffectError::from_panic(Box::new(7_u32));
        assert_eq!(err.to_string(), "panicked: non-string panic payload");
    }
}
