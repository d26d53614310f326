//! Untyped syntax tree produced by `sdsl-parser`.
//!
//! Nodes keep their [`Span`](crate::foundation::Span) so later phases can
//! point diagnostics at source. Regions that failed to parse are kept as
//! `Error` variants instead of aborting the parse, which lets a single
//! compile surface several diagnostics.

pub mod decl;
pub mod expr;
pub mod stmt;

pub use decl::{
    ComposeDecl, Declaration, EffectDecl, EffectStatement, FunctionDecl, Modifiers, Module,
    Param, ShaderDecl, ShaderMember, StructDecl, TypeName, VariableDecl,
};
pub use expr::{walk_expr, Expr, ExprKind, FloatSuffix, IntSuffix, Literal};
pub use stmt::{Block, Stmt};
