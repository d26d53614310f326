//! Hand-written recursive descent parser for SDSL.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead and error sink
//! - `error`: ParseError and its kinds
//! - `expr`: Expression parser using Pratt parsing
//! - `decl`: Declaration parsers (keyword-dispatched)
//! - `stmt`: Statement and block parsers
//!
//! Errors are recovered at declaration, shader-member, effect-statement,
//! statement and initializer granularity, leaving an `Error` node in place
//! of the malformed region.

mod decl;
mod error;
mod expr;
mod stmt;
mod stream;

pub(crate) use expr::binary_op_info;
pub use error::{ParseError, ParseErrorKind};
use stream::TokenStream;

use sdsl_ast::foundation::Span;
use sdsl_ast::{Expr, Module};
use sdsl_lexer::Token;
use std::ops::Range;

/// Parse a token sequence lexed from `source` into a module.
///
/// Always returns a module; malformed regions are represented by error
/// nodes and the matching diagnostics.
pub fn parse_module_with_spans(
    tokens: &[(Token, Range<usize>)],
    source: &str,
    file_id: u16,
) -> (Module, Vec<ParseError>) {
    let mut stream = TokenStream::new(tokens, source, file_id);
    let declarations = decl::parse_declarations(&mut stream, false);
    let span = Span::new(file_id, 0, source.len() as u32, 1);
    (Module { declarations, span }, stream.take_errors())
}

/// Parse a token sequence lexed from `source` into a single expression.
pub fn parse_expr_with_spans(
    tokens: &[(Token, Range<usize>)],
    source: &str,
    file_id: u16,
) -> Result<Expr, Vec<ParseError>> {
    let mut stream = TokenStream::new(tokens, source, file_id);
    let expr = expr::parse_expr(&mut stream).map_err(|e| vec![e])?;
    if !stream.at_end() {
        return Err(vec![ParseError::unexpected_token(
            stream.peek(),
            "after expression",
            stream.current_span(),
        )]);
    }
    Ok(expr)
}
