// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! SDSL shader compiler.
//!
//! Ties the phases together:
//!
//! - [`lower`] turns each checked mixin into its own SPIR-V word buffer,
//!   plus the default uniform block and the entry point wrapper
//! - [`compose`] picks the mixins an effect uses and the entry point owner
//! - [`link`] resolves cross-mixin references and merges declarations
//! - [`compile()`] runs the whole pipeline and stitches the lowered mixins
//!   into one module through a [`MixinGraph`](sdsl_spirv::MixinGraph)
//!
//! ```
//! use sdsl::{compile, CompileRequest};
//!
//! let result = compile(&CompileRequest::new("Empty", ""));
//! assert!(!result.has_errors());
//! assert!(result.module.is_some());
//! ```

pub mod compile;
pub mod compose;
pub mod hash;
pub mod link;
pub mod lower;

pub use compile::{
    compile, format_diagnostics, CompileRequest, CompileResult, CompiledModule, EntryPoint, Stage,
};
pub use link::{link, LinkPlan};
pub use lower::{lower_entry, lower_mixin, lower_uniform_block, Lowered};

pub use sdsl_ast as ast;
pub use sdsl_parser as parser;
pub use sdsl_resolve as resolve;
pub use sdsl_spirv as spirv;
