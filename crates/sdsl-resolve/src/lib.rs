// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Semantic analysis for SDSL.
//!
//! This crate owns the diagnostics model shared by every later phase, the
//! resolved type model, the symbol table and the checker that turns a parsed
//! `sdsl_ast::Module` into a typed [`Program`](resolve::typed::Program).

pub mod error;
pub mod resolve;

pub use error::{CompileError, DiagnosticFormatter, ErrorKind, Severity};
pub use resolve::*;
