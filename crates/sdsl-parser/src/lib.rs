// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Front end for the SDSL shading language.
//!
//! Parsing runs in three passes over a single source text:
//!
//! 1. [`preprocess`]: conditional compilation and object-like macros,
//!    keeping line numbers stable
//! 2. tokenizing with `sdsl-lexer`
//! 3. hand-written recursive descent parsing into an `sdsl_ast::Module`
//!
//! No pass stops at the first problem. Every pass contributes to the same
//! error list and malformed regions become `Error` nodes in the tree.

pub mod parser;
pub mod preprocess;

pub use parser::{ParseError, ParseErrorKind};
pub use preprocess::{preprocess, Preprocessed};

pub use sdsl_lexer::Token;

use indexmap::IndexMap;
use sdsl_ast::foundation::span::{compute_line_starts, line_index};
use sdsl_ast::foundation::Span;
use sdsl_ast::{Expr, Module};
use tracing::debug;

/// Result of [`parse`]: a module that always exists, plus every error found.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub module: Module,
    /// Source text after preprocessing (what the parser actually saw)
    pub text: String,
    pub errors: Vec<ParseError>,
}

impl Parsed {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Preprocess and parse a source text.
///
/// `macros` seeds the preprocessor environment (`-D NAME=VALUE`).
pub fn parse(source: &str, file_id: u16, macros: &IndexMap<String, String>) -> Parsed {
    let preprocessed = preprocess(source, file_id, macros);
    let mut errors = preprocessed.errors;

    let (module, parse_errors) = parse_text(&preprocessed.text, file_id, &mut errors);
    errors.extend(parse_errors);

    debug!(
        file_id,
        declarations = module.declarations.len(),
        errors = errors.len(),
        "parsed module"
    );

    Parsed {
        module,
        text: preprocessed.text,
        errors,
    }
}

/// Parse already-preprocessed text.
pub fn parse_preprocessed(text: &str, file_id: u16) -> (Module, Vec<ParseError>) {
    let mut errors = Vec::new();
    let (module, parse_errors) = parse_text(text, file_id, &mut errors);
    errors.extend(parse_errors);
    (module, errors)
}

/// Parse a standalone expression (no preprocessing).
pub fn parse_expr(source: &str, file_id: u16) -> Result<Expr, Vec<ParseError>> {
    let mut errors = Vec::new();
    let tokens = lex(source, file_id, &mut errors);
    if !errors.is_empty() {
        return Err(errors);
    }
    parser::parse_expr_with_spans(&tokens, source, file_id)
}

fn parse_text(
    text: &str,
    file_id: u16,
    errors: &mut Vec<ParseError>,
) -> (Module, Vec<ParseError>) {
    let tokens = lex(text, file_id, errors);
    parser::parse_module_with_spans(&tokens, text, file_id)
}

/// Tokenize, turning unrecognized input into errors.
fn lex(
    text: &str,
    file_id: u16,
    errors: &mut Vec<ParseError>,
) -> Vec<(Token, std::ops::Range<usize>)> {
    let (tokens, bad) = sdsl_lexer::tokenize(text);
    if !bad.is_empty() {
        let line_starts = compute_line_starts(text);
        for range in bad {
            let line = line_index(&line_starts, range.start as u32) + 1;
            errors.push(ParseError {
                kind: ParseErrorKind::InvalidCharacter,
                span: Span::new(
                    file_id,
                    range.start as u32,
                    range.end as u32,
                    Span::line_number(line),
                ),
                message: format!("unrecognized input '{}'", &text[range]),
            });
        }
    }
    tokens
}
