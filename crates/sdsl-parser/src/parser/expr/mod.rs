//! Expression parser using Pratt parsing (precedence climbing).
//!
//! ## Precedence Levels (lowest to highest)
//!
//! 1. `?:` (Ternary) - right associative
//! 2. `||`
//! 3. `&&`
//! 4. `|`
//! 5. `^`
//! 6. `&`
//! 7. `==`, `!=`
//! 8. `<`, `<=`, `>`, `>=`
//! 9. `<<`, `>>`
//! 10. `+`, `-`
//! 11. `*`, `/`, `%`
//! 12. Unary `-`, `+`, `!`, `~`, `++`, `--` - prefix
//! 13. Postfix: `.member`, `[index]`, `(args)`, `++`, `--`
//!
//! Binary levels 2-11 are left associative.

mod atoms;
mod pratt;

pub(crate) use pratt::binary_op_info;

use super::{ParseError, TokenStream};
use sdsl_ast::{Expr, ExprKind};
use sdsl_lexer::Token;

/// Parse an expression.
pub fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let condition = pratt::parse_pratt(stream, 0)?;

    if !stream.eat(&Token::Question) {
        return Ok(condition);
    }

    let then = parse_expr(stream)?;
    stream.expect(Token::Colon)?;
    let otherwise = parse_expr(stream)?;

    Ok(Expr::new(
        ExprKind::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        },
        stream.span_from(start),
    ))
}

/// Parse a parenthesized, comma separated argument list.
pub(super) fn parse_call_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ParseError> {
    stream.expect(Token::LParen)?;

    let mut args = Vec::new();
    if stream.eat(&Token::RParen) {
        return Ok(args);
    }

    loop {
        args.push(parse_expr(stream)?);
        if stream.eat(&Token::Comma) {
            continue;
        }
        stream.expect(Token::RParen)?;
        break;
    }

    Ok(args)
}
