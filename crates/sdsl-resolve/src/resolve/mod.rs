//! Resolution passes.
//!
//! # Pipeline Position
//!
//! ```text
//! Preprocess → Parse → Check → Lower → Compose
//!                       ^^^^^
//! ```
//!
//! - [`types`]: resolved type model
//! - [`operators`]: table-driven binary operator typing
//! - [`symbols`]: scoped symbol table and external symbol providers
//! - [`typed`]: typed program handed to lowering
//! - [`checker`]: the checking pass itself

pub mod checker;
pub mod operators;
pub mod symbols;
pub mod typed;
pub mod types;

pub use checker::{check_module, Checked};
pub use operators::{binary_operation_resulting_type, check_binary_operation};
pub use symbols::{Symbol, SymbolKind, SymbolProvider, SymbolTable};
pub use typed::Program;
pub use types::{ScalarKind, SymbolType};
