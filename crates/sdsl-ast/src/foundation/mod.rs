//! Foundation types shared by every compiler stage.
//!
//! - [`span`]: source locations and the source map used for diagnostics
//! - [`ops`]: operator enums and their ordinal buckets

pub mod ops;
pub mod span;

pub use ops::{AssignOp, BinaryOp, OperatorBucket, UnaryOp};
pub use span::{SourceFile, SourceMap, Span};
