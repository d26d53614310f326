//! Atomic expressions: literals, identifiers, `base` and parenthesized
//! expressions.

use super::super::{ParseError, TokenStream};
use super::parse_expr;
use sdsl_ast::{Expr, ExprKind, Literal};
use sdsl_lexer::Token;

pub(super) fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();

    let kind = match stream.peek() {
        Some(Token::Int((value, suffix))) => ExprKind::Literal(Literal::Int {
            value: *value,
            suffix: *suffix,
        }),
        Some(Token::Float((value, suffix))) => ExprKind::Literal(Literal::Float {
            value: *value,
            suffix: *suffix,
        }),
        Some(Token::True) => ExprKind::Literal(Literal::Bool(true)),
        Some(Token::False) => ExprKind::Literal(Literal::Bool(false)),
        Some(Token::String(text)) => ExprKind::Literal(Literal::String(text.to_string())),
        Some(Token::Ident(name)) => ExprKind::Identifier(name.to_string()),
        Some(Token::Base) => ExprKind::Identifier("base".to_string()),
        Some(Token::LParen) => {
            stream.advance();
            let inner = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            return Ok(Expr::new(inner.kind, stream.span_from(start)));
        }
        other => return Err(ParseError::unexpected_token(other, "in expression", span)),
    };

    stream.advance();
    Ok(Expr::new(kind, stream.span_from(start)))
}
