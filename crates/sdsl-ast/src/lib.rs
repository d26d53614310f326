// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! AST types for the SDSL shading language
//!
//! This crate contains all AST node definitions and the foundation types
//! (source spans, operators) shared by the parser, the resolver and the
//! lowering pass.

pub mod ast;
pub mod foundation;

// Re-export commonly used types
pub use foundation::{
    AssignOp, BinaryOp, OperatorBucket, SourceFile, SourceMap, Span, UnaryOp,
};

pub use ast::*;
