//! Statement nodes.

use super::decl::VariableDecl;
use super::expr::Expr;
use crate::foundation::{AssignOp, Span};
use serde::{Deserialize, Serialize};

/// `{ ... }` statement list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Statement variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),

    /// Local variable declaration
    Declare(VariableDecl),

    /// Expression evaluated for its side effects
    Expr(Expr),

    /// `target op= value;`
    Assign {
        target: Expr,
        op: AssignOp,
        value: Expr,
        span: Span,
    },

    Return {
        value: Option<Expr>,
        span: Span,
    },

    If {
        condition: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        span: Span,
    },

    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
        span: Span,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
        span: Span,
    },

    DoWhile {
        body: Box<Stmt>,
        condition: Expr,
        span: Span,
    },

    Break(Span),
    Continue(Span),
    Discard(Span),

    /// Placeholder for a statement that failed to parse
    Error(Span),
}

impl Stmt {
    /// Source location of the statement.
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(block) => block.span,
            Stmt::Declare(decl) => decl.span,
            Stmt::Expr(expr) => expr.span,
            Stmt::Assign { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::If { span, .. }
            | Stmt::For { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. } => *span,
            Stmt::Break(span) | Stmt::Continue(span) | Stmt::Discard(span) | Stmt::Error(span) => {
                *span
            }
        }
    }
}
