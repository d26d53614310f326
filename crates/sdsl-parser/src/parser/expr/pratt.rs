//! Pratt parser core - precedence climbing for binary and unary operators.

use super::super::{ParseError, TokenStream};
use super::{atoms, parse_call_args, parse_expr};
use sdsl_ast::foundation::{BinaryOp, UnaryOp};
use sdsl_ast::{Expr, ExprKind};
use sdsl_lexer::Token;

/// Get binary operator metadata (precedence and operator enum).
///
/// Higher precedence binds tighter. All binary operators are left
/// associative. This is the single source of truth for binary operator
/// parsing, shared with the preprocessor's directive evaluator.
pub(crate) fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::OrOr => Some((10, BinaryOp::LogicalOr)),
        Token::AndAnd => Some((20, BinaryOp::LogicalAnd)),
        Token::Pipe => Some((30, BinaryOp::BitOr)),
        Token::Caret => Some((40, BinaryOp::BitXor)),
        Token::Amp => Some((50, BinaryOp::BitAnd)),
        Token::EqEq => Some((60, BinaryOp::Eq)),
        Token::BangEq => Some((60, BinaryOp::Ne)),
        Token::Lt => Some((70, BinaryOp::Lt)),
        Token::LtEq => Some((70, BinaryOp::Le)),
        Token::Gt => Some((70, BinaryOp::Gt)),
        Token::GtEq => Some((70, BinaryOp::Ge)),
        Token::Shl => Some((80, BinaryOp::Shl)),
        Token::Shr => Some((80, BinaryOp::Shr)),
        Token::Plus => Some((90, BinaryOp::Add)),
        Token::Minus => Some((90, BinaryOp::Sub)),
        Token::Star => Some((100, BinaryOp::Mul)),
        Token::Slash => Some((100, BinaryOp::Div)),
        Token::Percent => Some((100, BinaryOp::Mod)),
        _ => None,
    }
}

/// Pratt parser - handles binary operators with precedence climbing.
pub(super) fn parse_pratt(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut left = parse_prefix(stream)?;

    while let Some((prec, op)) = stream.peek().and_then(binary_op_info) {
        if prec < min_prec {
            break;
        }
        stream.advance();

        let right = parse_pratt(stream, prec + 1)?;
        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            stream.span_from(start),
        );
    }

    Ok(left)
}

/// Parse prefix unary operators, then a postfix expression.
fn parse_prefix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Plus) => UnaryOp::Plus,
        Some(Token::Bang) => UnaryOp::Not,
        Some(Token::Tilde) => UnaryOp::BitNot,
        Some(Token::PlusPlus) => UnaryOp::PreIncrement,
        Some(Token::MinusMinus) => UnaryOp::PreDecrement,
        _ => return parse_postfix(stream),
    };

    let start = stream.current_pos();
    stream.advance();
    let operand = parse_prefix(stream)?;

    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        stream.span_from(start),
    ))
}

/// Parse postfix expressions (member access, indexing, calls, `++`/`--`).
fn parse_postfix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut expr = atoms::parse_atom(stream)?;

    loop {
        match stream.peek() {
            Some(Token::Dot) => {
                stream.advance();
                let member = stream.expect_ident("after '.'")?;

                if stream.check(&Token::LParen) {
                    // `base.f()`, `Mixin.f()` and `composition.f()` are the
                    // only qualified calls.
                    let qualifier = match expr.as_identifier() {
                        Some(name) => name.to_string(),
                        None => {
                            return Err(ParseError::invalid_syntax(
                                "method calls are only allowed on a mixin, composition or 'base'",
                                stream.span_from(start),
                            ));
                        }
                    };
                    let args = parse_call_args(stream)?;
                    expr = Expr::new(
                        ExprKind::Call {
                            qualifier: Some(qualifier),
                            name: member,
                            args,
                        },
                        stream.span_from(start),
                    );
                } else {
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            member,
                        },
                        stream.span_from(start),
                    );
                }
            }
            Some(Token::LBracket) => {
                stream.advance();
                let index = parse_expr(stream)?;
                stream.expect(Token::RBracket)?;
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    stream.span_from(start),
                );
            }
            Some(Token::LParen) => {
                let name = match expr.as_identifier() {
                    Some(name) if name != "base" => name.to_string(),
                    _ => {
                        return Err(ParseError::invalid_syntax(
                            "only named functions and constructors can be called",
                            stream.span_from(start),
                        ));
                    }
                };
                let args = parse_call_args(stream)?;
                expr = Expr::new(
                    ExprKind::Call {
                        qualifier: None,
                        name,
                        args,
                    },
                    stream.span_from(start),
                );
            }
            Some(Token::PlusPlus) | Some(Token::MinusMinus) => {
                let decrement = stream.check(&Token::MinusMinus);
                stream.advance();
                return Ok(Expr::new(
                    ExprKind::PostIncrement {
                        operand: Box::new(expr),
                        decrement,
                    },
                    stream.span_from(start),
                ));
            }
            _ => break,
        }
    }

    Ok(expr)
}
