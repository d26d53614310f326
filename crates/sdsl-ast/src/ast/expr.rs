//! Untyped expression nodes produced by the parser.

use crate::foundation::{BinaryOp, Span, UnaryOp};
use serde::{Deserialize, Serialize};

/// Untyped expression with its source location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Literal constant
    Literal(Literal),

    /// Bare identifier (`x`, `streams`, `base`)
    Identifier(String),

    /// Prefix operator
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Postfix `x++` / `x--`
    PostIncrement { operand: Box<Expr>, decrement: bool },

    /// Infix operator
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `cond ? then : otherwise`
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// Function, constructor or intrinsic call.
    ///
    /// `qualifier` is set for `base.f()` and `Mixin.f()` / `composition.f()`.
    Call {
        qualifier: Option<String>,
        name: String,
        args: Vec<Expr>,
    },

    /// `object.member` (struct field, swizzle, `streams.X`, `Mixin.X`)
    Member { object: Box<Expr>, member: String },

    /// `object[index]`
    Index { object: Box<Expr>, index: Box<Expr> },

    /// Placeholder for a region that failed to parse
    Error,
}

/// Literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int { value: u64, suffix: IntSuffix },
    Float { value: f64, suffix: FloatSuffix },
    Bool(bool),
    String(String),
}

/// Integer literal suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntSuffix {
    None,
    /// `u`
    Unsigned,
    /// `l`
    Long,
    /// `ul` / `lu`
    UnsignedLong,
}

/// Float literal suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatSuffix {
    None,
    /// `f` (also `h`)
    Float,
    /// `d`
    Double,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Error placeholder covering `span`.
    pub fn error(span: Span) -> Self {
        Self::new(ExprKind::Error, span)
    }

    /// Identifier name when this is a bare identifier.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Identifier(name) => Some(name),
            _ => None,
        }
    }

    /// Whether this node or any child is an error placeholder.
    pub fn contains_error(&self) -> bool {
        let mut found = false;
        walk_expr(self, &mut |expr| {
            if matches!(expr.kind, ExprKind::Error) {
                found = true;
            }
        });
        found
    }
}

/// Recursively walk an expression tree in pre-order, calling `visitor` for
/// each node.
pub fn walk_expr<F>(expr: &Expr, visitor: &mut F)
where
    F: FnMut(&Expr),
{
    visitor(expr);

    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Identifier(_) | ExprKind::Error => {}
        ExprKind::Unary { operand, .. } | ExprKind::PostIncrement { operand, .. } => {
            walk_expr(operand, visitor)
        }
        ExprKind::Binary { left, right, .. } => {
            walk_expr(left, visitor);
            walk_expr(right, visitor);
        }
        ExprKind::Ternary {
            condition,
            then,
            otherwise,
        } => {
            walk_expr(condition, visitor);
            walk_expr(then, visitor);
            walk_expr(otherwise, visitor);
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                walk_expr(arg, visitor);
            }
        }
        ExprKind::Member { object, .. } => walk_expr(object, visitor),
        ExprKind::Index { object, index } => {
            walk_expr(object, visitor);
            walk_expr(index, visitor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Expr {
        Expr::new(ExprKind::Identifier(name.to_string()), Span::zero(0))
    }

    #[test]
    fn test_walk_visits_in_pre_order() {
        let expr = Expr::new(
            ExprKind::Binary {
                op: BinaryOp::Add,
                left: Box::new(ident("a")),
                right: Box::new(ident("b")),
            },
            Span::zero(0),
        );

        let mut names = Vec::new();
        walk_expr(&expr, &mut |node| {
            if let Some(name) = node.as_identifier() {
                names.push(name.to_string());
            }
        });
        assert_eq!(names, vec!["a", "b"]);
        assert!(!expr.contains_error());
    }

    #[test]
    fn test_contains_error() {
        let expr = Expr::new(
            ExprKind::Call {
                qualifier: None,
                name: "f".into(),
                args: vec![Expr::error(Span::zero(0))],
            },
            Span::zero(0),
        );
        assert!(expr.contains_error());
    }
}
