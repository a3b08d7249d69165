//! Template Expressions
//!
//! Templates embed small expressions (`count + 1`, `user.name`,
//! `done ? 'yes' : 'no'`). This module parses them into an AST, caches the
//! result by source text, and evaluates them against a [`Scope`].
//!
//! Names in an expression resolve against the scope only. When auto-unwrap
//! is on, a name bound to a reactive accessor is read through the accessor,
//! so an expression evaluated inside an effect subscribes that effect to the
//! signals it mentions.

mod ast;
mod cache;
mod eval;
mod parser;
mod scope;
mod value;

pub use ast::{BinaryOp, Expr, Literal, UnaryOp};
pub use cache::{evaluate_expression, evaluate_expression_with, CompiledExpr, ExprCache};
pub use eval::evaluate;
pub use parser::parse;
pub use scope::{resolve, Scope};
pub use value::{Accessor, Function, Value};
