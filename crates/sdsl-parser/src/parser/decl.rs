//! Declaration parsers (keyword-dispatched).
//!
//! `shader`, `effect`, `namespace` and `struct` are introduced by a keyword;
//! everything else is a variable or function introduced by optional
//! modifiers, a type name and a declared name.

use super::expr::parse_expr;
use super::stmt::parse_block;
use super::{ParseError, TokenStream};
use sdsl_ast::{
    ComposeDecl, Declaration, EffectDecl, EffectStatement, Expr, FunctionDecl, Modifiers, Param,
    ShaderDecl, ShaderMember, StructDecl, TypeName, VariableDecl,
};
use sdsl_lexer::Token;

/// Parse declarations until EOF, or until the closing `}` of a namespace.
pub(super) fn parse_declarations(stream: &mut TokenStream, nested: bool) -> Vec<Declaration> {
    let mut declarations = Vec::new();

    while !stream.at_end() {
        if nested && stream.check(&Token::RBrace) {
            break;
        }
        if stream.eat(&Token::Semicolon) {
            continue;
        }

        let start = stream.current_pos();
        match parse_declaration(stream) {
            Ok(decl) => declarations.push(decl),
            Err(error) => {
                stream.report(error);
                stream.synchronize(true);
                if stream.current_pos() == start {
                    stream.advance();
                }
                declarations.push(Declaration::Error(stream.span_from(start)));
            }
        }
    }

    declarations
}

fn parse_declaration(stream: &mut TokenStream) -> Result<Declaration, ParseError> {
    match stream.peek() {
        Some(Token::Namespace) => parse_namespace(stream),
        Some(Token::Shader) => parse_shader(stream).map(Declaration::Shader),
        Some(Token::Effect) => parse_effect(stream).map(Declaration::Effect),
        Some(Token::Struct) => parse_struct(stream).map(Declaration::Struct),
        _ => Ok(match parse_function_or_variable(stream)? {
            Item::Function(function) => Declaration::Function(function),
            Item::Variable(variable) => Declaration::Variable(variable),
        }),
    }
}

fn parse_namespace(stream: &mut TokenStream) -> Result<Declaration, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Namespace)?;

    let mut name = stream.expect_ident("in namespace name")?;
    while stream.eat(&Token::Dot) {
        name.push('.');
        name.push_str(&stream.expect_ident("in namespace name")?);
    }

    stream.expect(Token::LBrace)?;
    let declarations = parse_declarations(stream, true);
    stream.expect(Token::RBrace)?;
    stream.eat(&Token::Semicolon);

    Ok(Declaration::Namespace {
        name,
        declarations,
        span: stream.span_from(start),
    })
}

fn parse_shader(stream: &mut TokenStream) -> Result<ShaderDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Shader)?;
    let name = stream.expect_ident("as shader name")?;

    let mut bases = Vec::new();
    if stream.eat(&Token::Colon) {
        loop {
            let base_start = stream.current_pos();
            let base = stream.expect_ident("in base mixin list")?;
            bases.push((base, stream.span_from(base_start)));
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
    }

    stream.expect(Token::LBrace)?;
    let mut members = Vec::new();
    while !stream.at_end() && !stream.check(&Token::RBrace) {
        let member_start = stream.current_pos();
        match parse_member(stream) {
            Ok(member) => members.push(member),
            Err(error) => {
                stream.report(error);
                stream.synchronize(false);
                if stream.current_pos() == member_start && !stream.check(&Token::RBrace) {
                    stream.advance();
                }
                members.push(ShaderMember::Error(stream.span_from(member_start)));
            }
        }
    }
    stream.expect(Token::RBrace)?;
    stream.eat(&Token::Semicolon);

    Ok(ShaderDecl {
        name,
        bases,
        members,
        span: stream.span_from(start),
    })
}

fn parse_member(stream: &mut TokenStream) -> Result<ShaderMember, ParseError> {
    match stream.peek() {
        Some(Token::Struct) => parse_struct(stream).map(ShaderMember::Struct),
        Some(Token::Compose) => {
            let start = stream.current_pos();
            stream.advance();
            let mixin = stream.expect_ident("as composed mixin")?;
            let name = stream.expect_ident("as composition name")?;
            let is_array = if stream.eat(&Token::LBracket) {
                stream.expect(Token::RBracket)?;
                true
            } else {
                false
            };
            stream.expect(Token::Semicolon)?;
            Ok(ShaderMember::Compose(ComposeDecl {
                mixin,
                name,
                is_array,
                span: stream.span_from(start),
            }))
        }
        _ => Ok(match parse_function_or_variable(stream)? {
            Item::Function(function) => ShaderMember::Method(function),
            Item::Variable(variable) => ShaderMember::Variable(variable),
        }),
    }
}

fn parse_effect(stream: &mut TokenStream) -> Result<EffectDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Effect)?;
    let name = stream.expect_ident("as effect name")?;
    stream.expect(Token::LBrace)?;

    let mut statements = Vec::new();
    while !stream.at_end() && !stream.check(&Token::RBrace) {
        let stmt_start = stream.current_pos();
        match parse_effect_statement(stream) {
            Ok(stmt) => statements.push(stmt),
            Err(error) => {
                stream.report(error);
                stream.synchronize(false);
                if stream.current_pos() == stmt_start && !stream.check(&Token::RBrace) {
                    stream.advance();
                }
                statements.push(EffectStatement::Error(stream.span_from(stmt_start)));
            }
        }
    }
    stream.expect(Token::RBrace)?;
    stream.eat(&Token::Semicolon);

    Ok(EffectDecl {
        name,
        statements,
        span: stream.span_from(start),
    })
}

fn parse_effect_statement(stream: &mut TokenStream) -> Result<EffectStatement, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Mixin)?;

    let statement = match stream.peek() {
        Some(Token::Compose) => {
            stream.advance();
            let slot = stream.expect_ident("as composition slot")?;
            stream.expect(Token::Eq)?;
            let mixin = stream.expect_ident("as composed mixin")?;
            stream.expect(Token::Semicolon)?;
            EffectStatement::Compose {
                slot,
                mixin,
                span: stream.span_from(start),
            }
        }
        Some(Token::Clone) => {
            stream.advance();
            stream.expect(Token::Semicolon)?;
            EffectStatement::Clone(stream.span_from(start))
        }
        Some(Token::Child) => {
            stream.advance();
            let effect = stream.expect_ident("as child effect")?;
            stream.expect(Token::Semicolon)?;
            EffectStatement::Child {
                effect,
                span: stream.span_from(start),
            }
        }
        _ => {
            let name = stream.expect_ident("after 'mixin'")?;
            stream.expect(Token::Semicolon)?;
            EffectStatement::Mixin {
                name,
                span: stream.span_from(start),
            }
        }
    };

    Ok(statement)
}

fn parse_struct(stream: &mut TokenStream) -> Result<StructDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Struct)?;
    let name = stream.expect_ident("as struct name")?;
    stream.expect(Token::LBrace)?;

    let mut fields = Vec::new();
    while !stream.at_end() && !stream.check(&Token::RBrace) {
        let field_start = stream.current_pos();
        let ty = parse_type(stream)?;
        let field_name = stream.expect_ident("as field name")?;
        let array_size = parse_array_suffix(stream)?;
        stream.expect(Token::Semicolon)?;
        fields.push(VariableDecl {
            modifiers: Modifiers::default(),
            ty,
            name: field_name,
            array_size,
            semantic: None,
            initializer: None,
            span: stream.span_from(field_start),
        });
    }
    stream.expect(Token::RBrace)?;
    stream.eat(&Token::Semicolon);

    Ok(StructDecl {
        name,
        fields,
        span: stream.span_from(start),
    })
}

/// Whether the upcoming tokens start a variable declaration.
///
/// A declaration starts with a modifier, or with a type name immediately
/// followed by the declared name (`float4 color`).
pub(super) fn is_declaration_start(stream: &TokenStream) -> bool {
    match stream.peek() {
        Some(token) if is_modifier(token) => true,
        Some(Token::Ident(_)) => matches!(stream.peek_nth(1), Some(Token::Ident(_))),
        _ => false,
    }
}

fn is_modifier(token: &Token) -> bool {
    matches!(
        token,
        Token::Stage
            | Token::Stream
            | Token::Static
            | Token::Const
            | Token::Override
            | Token::Abstract
            | Token::Clone
    )
}

fn parse_modifiers(stream: &mut TokenStream) -> Modifiers {
    let mut modifiers = Modifiers::default();
    loop {
        match stream.peek() {
            Some(Token::Stage) => modifiers.stage = true,
            Some(Token::Stream) => modifiers.stream = true,
            Some(Token::Static) => modifiers.static_ = true,
            Some(Token::Const) => modifiers.const_ = true,
            Some(Token::Override) => modifiers.override_ = true,
            Some(Token::Abstract) => modifiers.abstract_ = true,
            Some(Token::Clone) => modifiers.clone_ = true,
            _ => return modifiers,
        }
        stream.advance();
    }
}

fn parse_type(stream: &mut TokenStream) -> Result<TypeName, ParseError> {
    let start = stream.current_pos();
    let name = stream.expect_ident("as type name")?;
    Ok(TypeName {
        name,
        span: stream.span_from(start),
    })
}

fn parse_array_suffix(stream: &mut TokenStream) -> Result<Option<Expr>, ParseError> {
    if !stream.eat(&Token::LBracket) {
        return Ok(None);
    }
    let size = parse_expr(stream)?;
    stream.expect(Token::RBracket)?;
    Ok(Some(size))
}

fn parse_semantic(stream: &mut TokenStream) -> Result<Option<String>, ParseError> {
    if stream.eat(&Token::Colon) {
        Ok(Some(stream.expect_ident("as semantic")?))
    } else {
        Ok(None)
    }
}

/// Function or variable, before it is placed at module or shader level.
enum Item {
    Function(FunctionDecl),
    Variable(VariableDecl),
}

/// Parse `modifiers type name` followed by a function or variable tail.
fn parse_function_or_variable(stream: &mut TokenStream) -> Result<Item, ParseError> {
    let start = stream.current_pos();
    let modifiers = parse_modifiers(stream);
    let ty = parse_type(stream)?;
    let name = stream.expect_ident("as declaration name")?;

    if stream.check(&Token::LParen) {
        parse_function_rest(stream, start, modifiers, ty, name).map(Item::Function)
    } else {
        parse_variable_rest(stream, start, modifiers, ty, name).map(Item::Variable)
    }
}

/// Parse a complete variable declaration including the trailing `;`.
pub(super) fn parse_variable(stream: &mut TokenStream) -> Result<VariableDecl, ParseError> {
    let start = stream.current_pos();
    let modifiers = parse_modifiers(stream);
    let ty = parse_type(stream)?;
    let name = stream.expect_ident("as variable name")?;
    parse_variable_rest(stream, start, modifiers, ty, name)
}

fn parse_variable_rest(
    stream: &mut TokenStream,
    start: usize,
    modifiers: Modifiers,
    ty: TypeName,
    name: String,
) -> Result<VariableDecl, ParseError> {
    let array_size = parse_array_suffix(stream)?;
    let semantic = parse_semantic(stream)?;

    let mut initializer = None;
    if stream.eat(&Token::Eq) {
        let init_start = stream.current_pos();
        match parse_expr(stream) {
            Ok(expr) => initializer = Some(expr),
            Err(error) => {
                // Keep the declaration and mark only the initializer as broken.
                stream.report(error);
                stream.synchronize(false);
                return Ok(VariableDecl {
                    modifiers,
                    ty,
                    name,
                    array_size,
                    semantic,
                    initializer: Some(Expr::error(stream.span_from(init_start))),
                    span: stream.span_from(start),
                });
            }
        }
    }
    stream.expect(Token::Semicolon)?;

    Ok(VariableDecl {
        modifiers,
        ty,
        name,
        array_size,
        semantic,
        initializer,
        span: stream.span_from(start),
    })
}

fn parse_function_rest(
    stream: &mut TokenStream,
    start: usize,
    modifiers: Modifiers,
    return_type: TypeName,
    name: String,
) -> Result<FunctionDecl, ParseError> {
    stream.expect(Token::LParen)?;
    let mut params = Vec::new();
    if !stream.check(&Token::RParen) {
        loop {
            let param_start = stream.current_pos();
            let ty = parse_type(stream)?;
            let param_name = stream.expect_ident("as parameter name")?;
            parse_semantic(stream)?;
            params.push(Param {
                ty,
                name: param_name,
                span: stream.span_from(param_start),
            });
            if !stream.eat(&Token::Comma) {
                break;
            }
        }
    }
    stream.expect(Token::RParen)?;

    let semantic = parse_semantic(stream)?;
    let body = if stream.eat(&Token::Semicolon) {
        None
    } else {
        Some(parse_block(stream)?)
    };

    Ok(FunctionDecl {
        modifiers,
        return_type,
        name,
        params,
        semantic,
        body,
        span: stream.span_from(start),
    })
}
