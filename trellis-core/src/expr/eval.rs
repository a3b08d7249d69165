//! Expression Evaluator
//!
//! Walks a parsed [`Expr`] against a [`Scope`]. Free names go through
//! [`resolve`], which is the only way an expression can reach state; there is
//! no ambient global object and no assignment.

use std::cmp::Ordering;

use crate::error::EvalError;

use super::ast::{BinaryOp, Expr, Literal, UnaryOp};
use super::scope::{resolve, Scope};
use super::value::Value;

/// Evaluate `expr` in `scope`.
pub fn evaluate(expr: &Expr, scope: &Scope, auto_unwrap: bool) -> Result<Value, EvalError> {
    Evaluator { scope, auto_unwrap }.eval(expr)
}

struct Evaluator<'a> {
    scope: &'a Scope,
    auto_unwrap: bool,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Undefined => Value::Undefined,
                Literal::Null => Value::Null,
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::Str(s) => Value::str(s),
            }),

            Expr::Ident(name) => Ok(resolve(self.scope, name, self.auto_unwrap)),

            Expr::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(items))
            }

            Expr::Object(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    out.push((key.to_string(), self.eval(value)?));
                }
                Ok(Value::object(out))
            }

            Expr::Member {
                object,
                property,
                optional,
            } => {
                let target = self.eval(object)?;
                if target.is_nullish() {
                    return if *optional {
                        Ok(Value::Undefined)
                    } else {
                        Err(EvalError::NullMember {
                            property: property.to_string(),
                            target: target.type_name(),
                        })
                    };
                }
                Ok(member(&target, property))
            }

            Expr::Index { object, index } => {
                let target = self.eval(object)?;
                let index = self.eval(index)?;
                self.index(&target, &index)
            }

            Expr::Call { callee, args } => {
                let function = match self.eval(callee)? {
                    Value::Function(function) => function,
                    _ => {
                        return Err(EvalError::NotCallable {
                            callee: callee.describe(),
                        })
                    }
                };
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(&args)
            }

            Expr::Unary { op, operand } => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                })
            }

            Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),

            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
        }
    }

    fn index(&self, target: &Value, index: &Value) -> Result<Value, EvalError> {
        match target {
            Value::Undefined | Value::Null => Err(EvalError::InvalidIndex {
                target: target.type_name(),
                index: index.to_string(),
            }),
            Value::List(items) => Ok(match index {
                Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => {
                    items.get(*n as usize).cloned().unwrap_or_default()
                }
                Value::Str(key) => member(target, key),
                _ => Value::Undefined,
            }),
            // Positions count UTF-16 units, like `length`
            Value::Str(text) => Ok(match index {
                Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 => text
                    .encode_utf16()
                    .nth(*n as usize)
                    .map(|unit| {
                        let c = char::decode_utf16([unit])
                            .next()
                            .and_then(Result::ok)
                            .unwrap_or(char::REPLACEMENT_CHARACTER);
                        Value::str(c.to_string())
                    })
                    .unwrap_or_default(),
                _ => member(target, &index.to_string()),
            }),
            _ => Ok(member(target, &index.to_string())),
        }
    }

    fn binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value, EvalError> {
        // Short-circuiting operators yield an operand, not a boolean
        let value = match op {
            BinaryOp::And => {
                let left = self.eval(lhs)?;
                if left.truthy() { self.eval(rhs)? } else { left }
            }
            BinaryOp::Or => {
                let left = self.eval(lhs)?;
                if left.truthy() { left } else { self.eval(rhs)? }
            }
            BinaryOp::Coalesce => {
                let left = self.eval(lhs)?;
                if left.is_nullish() { self.eval(rhs)? } else { left }
            }
            _ => strict_binary(op, &self.eval(lhs)?, &self.eval(rhs)?),
        };
        Ok(value)
    }
}

/// Operators that always evaluate both operands.
fn strict_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::Le => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left == right),
        BinaryOp::StrictNe => Value::Bool(left != right),
        // Reached only with both operands already evaluated
        BinaryOp::And => (if left.truthy() { right } else { left }).clone(),
        BinaryOp::Or => (if left.truthy() { left } else { right }).clone(),
        BinaryOp::Coalesce => (if left.is_nullish() { right } else { left }).clone(),
    }
}

/// Property read on a non-nullish value. Unknown properties are `undefined`.
fn member(target: &Value, property: &str) -> Value {
    match (target, property) {
        (Value::Object(fields), _) => fields.get(property).cloned().unwrap_or_default(),
        (Value::List(items), "length") => Value::from(items.len()),
        (Value::Str(s), "length") => Value::from(s.encode_utf16().count()),
        (Value::Accessor(accessor), _) => member(&accessor.read(), property),
        _ => Value::Undefined,
    }
}

fn add(left: &Value, right: &Value) -> Value {
    let concatenates = |v: &Value| matches!(v, Value::Str(_) | Value::List(_) | Value::Object(_));
    if concatenates(left) || concatenates(right) {
        Value::str(format!("{left}{right}"))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (a, b) if a.is_nullish() && b.is_nullish() => true,
        (a, b) if a.is_nullish() || b.is_nullish() => false,
        (Value::Number(_) | Value::Str(_) | Value::Bool(_), Value::Number(_) | Value::Bool(_))
        | (Value::Number(_) | Value::Bool(_), Value::Str(_)) => {
            left.to_number() == right.to_number()
        }
        _ => left == right,
    }
}
