//! Token stream wrapper for the hand-written parser.

use super::ParseError;
use sdsl_ast::foundation::span::{compute_line_starts, line_index};
use sdsl_ast::foundation::Span;
use sdsl_lexer::Token;
use std::ops::Range;

/// Token stream with lookahead, position tracking and a diagnostic sink.
///
/// Each token is paired with its byte span from the source, enabling
/// accurate error locations. Recovered errors are collected on the stream
/// so parsing can continue past a malformed region.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    file_id: u16,
    line_starts: Vec<u32>,
    errors: Vec<ParseError>,
}

impl<'src> TokenStream<'src> {
    /// Create a token stream over `tokens` lexed from `source`.
    pub fn new(tokens: &'src [(Token, Range<usize>)], source: &str, file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
            line_starts: compute_line_starts(source),
            errors: Vec::new(),
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token kind.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance if it matches.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let start = self.pos;
            self.advance();
            Ok(self.span_from(start))
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Expect an identifier and return its text.
    pub fn expect_ident(&mut self, context: &str) -> Result<String, ParseError> {
        let span = self.current_span();
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.to_string();
                self.pos += 1;
                Ok(name)
            }
            other => Err(ParseError::unexpected_token(other, context, span)),
        }
    }

    /// Check if we've reached the end of the token stream.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Create a span from a starting token position to the last consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = match self.tokens.get(start) {
            Some((_, range)) => range.start,
            None => self.eof_offset(),
        };
        let end_byte = if self.pos > start {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, range)| range.end)
                .expect("BUG: pos-1 in valid range but token not found")
        } else {
            start_byte
        };
        self.make_span(start_byte, end_byte.max(start_byte))
    }

    /// Get a span for the current token (zero-length at EOF).
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, range)) => self.make_span(range.start, range.end),
            None => {
                let eof = self.eof_offset();
                self.make_span(eof, eof)
            }
        }
    }

    fn eof_offset(&self) -> usize {
        self.tokens.last().map(|(_, range)| range.end).unwrap_or(0)
    }

    fn make_span(&self, start: usize, end: usize) -> Span {
        let line = line_index(&self.line_starts, start as u32) + 1;
        Span::new(self.file_id, start as u32, end as u32, Span::line_number(line))
    }

    /// Record a recovered error.
    pub fn report(&mut self, error: ParseError) {
        self.errors.push(error);
    }

    /// Take all recovered errors.
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    /// Skip to a safe point after a malformed region.
    ///
    /// Stops after a `;` or a balanced `{ ... }` at the starting brace
    /// level, or before a `}` that closes the enclosing construct. When
    /// `stop_at_keywords` is set it also stops before `shader`, `effect`,
    /// `namespace` and `struct`. Always consumes at least one token unless it
    /// stops before a closing brace or keyword.
    pub fn synchronize(&mut self, stop_at_keywords: bool) {
        let tokens = self.tokens;
        let mut depth = 0usize;
        while let Some((token, _)) = tokens.get(self.pos) {
            match token {
                Token::Shader | Token::Effect | Token::Namespace | Token::Struct
                    if stop_at_keywords && depth == 0 =>
                {
                    return;
                }
                Token::Semicolon if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                Token::LBrace => depth += 1,
                Token::RBrace if depth == 0 => return,
                Token::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        self.eat(&Token::Semicolon);
                        return;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}
