//! Statement and block parsers.

use super::decl::{is_declaration_start, parse_variable};
use super::expr::parse_expr;
use super::{ParseError, TokenStream};
use sdsl_ast::foundation::{AssignOp, BinaryOp};
use sdsl_ast::{Block, Stmt};
use sdsl_lexer::Token;

/// Parse a `{ ... }` block, recovering from malformed statements.
pub(super) fn parse_block(stream: &mut TokenStream) -> Result<Block, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;

    let mut statements = Vec::new();
    while !stream.at_end() && !stream.check(&Token::RBrace) {
        let stmt_start = stream.current_pos();
        match parse_statement(stream) {
            Ok(stmt) => statements.push(stmt),
            Err(error) => {
                stream.report(error);
                stream.synchronize(false);
                if stream.current_pos() == stmt_start && !stream.check(&Token::RBrace) {
                    stream.advance();
                }
                statements.push(Stmt::Error(stream.span_from(stmt_start)));
            }
        }
    }

    stream.expect(Token::RBrace)?;
    Ok(Block {
        statements,
        span: stream.span_from(start),
    })
}

/// Parse a single statement.
pub(super) fn parse_statement(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();

    match stream.peek() {
        Some(Token::LBrace) => return parse_block(stream).map(Stmt::Block),
        Some(Token::Semicolon) => {
            stream.advance();
            return Ok(Stmt::Block(Block {
                statements: Vec::new(),
                span: stream.span_from(start),
            }));
        }
        Some(Token::Return) => {
            stream.advance();
            let value = if stream.check(&Token::Semicolon) {
                None
            } else {
                Some(parse_expr(stream)?)
            };
            stream.expect(Token::Semicolon)?;
            return Ok(Stmt::Return {
                value,
                span: stream.span_from(start),
            });
        }
        Some(Token::If) => return parse_if(stream),
        Some(Token::For) => return parse_for(stream),
        Some(Token::While) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let condition = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            let body = parse_statement(stream)?;
            return Ok(Stmt::While {
                condition,
                body: Box::new(body),
                span: stream.span_from(start),
            });
        }
        Some(Token::Do) => {
            stream.advance();
            let body = parse_statement(stream)?;
            stream.expect(Token::While)?;
            stream.expect(Token::LParen)?;
            let condition = parse_expr(stream)?;
            stream.expect(Token::RParen)?;
            stream.expect(Token::Semicolon)?;
            return Ok(Stmt::DoWhile {
                body: Box::new(body),
                condition,
                span: stream.span_from(start),
            });
        }
        Some(Token::Break) | Some(Token::Continue) | Some(Token::Discard) => {
            let token = stream.advance().cloned();
            stream.expect(Token::Semicolon)?;
            let span = stream.span_from(start);
            return Ok(match token {
                Some(Token::Break) => Stmt::Break(span),
                Some(Token::Continue) => Stmt::Continue(span),
                _ => Stmt::Discard(span),
            });
        }
        _ => {}
    }

    if is_declaration_start(stream) {
        return parse_variable(stream).map(Stmt::Declare);
    }

    let stmt = parse_simple_statement(stream)?;
    stream.expect(Token::Semicolon)?;
    Ok(stmt)
}

/// Map an assignment token to its operator.
fn assign_op(token: &Token) -> Option<AssignOp> {
    let op = match token {
        Token::Eq => return Some(AssignOp::Assign),
        Token::PlusEq => BinaryOp::Add,
        Token::MinusEq => BinaryOp::Sub,
        Token::StarEq => BinaryOp::Mul,
        Token::SlashEq => BinaryOp::Div,
        Token::PercentEq => BinaryOp::Mod,
        Token::ShlEq => BinaryOp::Shl,
        Token::ShrEq => BinaryOp::Shr,
        Token::AmpEq => BinaryOp::BitAnd,
        Token::PipeEq => BinaryOp::BitOr,
        Token::CaretEq => BinaryOp::BitXor,
        _ => return None,
    };
    Some(AssignOp::Compound(op))
}

/// Parse an expression statement or assignment without the trailing `;`.
fn parse_simple_statement(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    let target = parse_expr(stream)?;

    let Some(op) = stream.peek().and_then(assign_op) else {
        return Ok(Stmt::Expr(target));
    };
    stream.advance();
    let value = parse_expr(stream)?;

    Ok(Stmt::Assign {
        target,
        op,
        value,
        span: stream.span_from(start),
    })
}

fn parse_if(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::If)?;
    stream.expect(Token::LParen)?;
    let condition = parse_expr(stream)?;
    stream.expect(Token::RParen)?;
    let then = parse_statement(stream)?;

    let otherwise = if stream.eat(&Token::Else) {
        Some(Box::new(parse_statement(stream)?))
    } else {
        None
    };

    Ok(Stmt::If {
        condition,
        then: Box::new(then),
        otherwise,
        span: stream.span_from(start),
    })
}

fn parse_for(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::For)?;
    stream.expect(Token::LParen)?;

    let init = if stream.eat(&Token::Semicolon) {
        None
    } else if is_declaration_start(stream) {
        Some(Box::new(Stmt::Declare(parse_variable(stream)?)))
    } else {
        let stmt = parse_simple_statement(stream)?;
        stream.expect(Token::Semicolon)?;
        Some(Box::new(stmt))
    };

    let condition = if stream.check(&Token::Semicolon) {
        None
    } else {
        Some(parse_expr(stream)?)
    };
    stream.expect(Token::Semicolon)?;

    let step = if stream.check(&Token::RParen) {
        None
    } else {
        Some(Box::new(parse_simple_statement(stream)?))
    };
    stream.expect(Token::RParen)?;

    let body = parse_statement(stream)?;

    Ok(Stmt::For {
        init,
        condition,
        step,
        body: Box::new(body),
        span: stream.span_from(start),
    })
}
