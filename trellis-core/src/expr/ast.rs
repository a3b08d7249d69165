//! Expression AST
//!
//! The compiled form of template expressions. Trees are immutable and
//! thread-safe so they can be shared from the process-wide cache.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Rem,

    // Comparison
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,

    // Short-circuiting
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    /// Binding power; higher binds tighter.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Self::Coalesce => 1,
            Self::Or => 2,
            Self::And => 3,
            Self::Eq | Self::Ne | Self::StrictEq | Self::StrictNe => 4,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 5,
            Self::Add | Self::Sub => 6,
            Self::Mul | Self::Div | Self::Rem => 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),

    /// A free name, resolved against the scope.
    Ident(Arc<str>),

    Array(Vec<Expr>),

    Object(Vec<(Arc<str>, Expr)>),

    /// `object.property`, or `object?.property` when `optional`.
    Member {
        object: Box<Expr>,
        property: Arc<str>,
        optional: bool,
    },

    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },

    Call { callee: Box<Expr>, args: Vec<Expr> },

    Unary { op: UnaryOp, operand: Box<Expr> },

    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
}

impl Expr {
    /// Short rendering of a callee for error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => name.to_string(),
            Self::Member {
                object, property, ..
            } => format!("{}.{}", object.describe(), property),
            Self::Index { object, .. } => format!("{}[..]", object.describe()),
            Self::Call { callee, .. } => format!("{}(..)", callee.describe()),
            Self::Literal(_) => "literal".to_string(),
            _ => "expression".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn ast_is_shareable_across_threads() {
        assert_send_sync::<Expr>();
    }

    #[test]
    fn precedence_orders_operators() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Lt.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
    }

    #[test]
    fn describe_member_chain() {
        let expr = Expr::Call {
            callee: Box::new(Expr::Member {
                object: Box::new(Expr::Ident(Arc::from("user"))),
                property: Arc::from("greet"),
                optional: false,
            }),
            args: Vec::new(),
        };
        assert_eq!(expr.describe(), "user.greet(..)");
    }
}
