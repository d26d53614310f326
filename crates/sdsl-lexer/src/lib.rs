// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for the SDSL shading language.
//!
//! # Design
//!
//! - `Token`: all SDSL token types (keywords, operators, literals, identifiers)
//! - Comments and whitespace are skipped during lexing (not tokens)
//! - Token strings defined once in `TOKEN_STRINGS` (single source of truth for Display)
//! - Numeric literals carry their suffix so the checker can pick the scalar kind
//!
//! Preprocessor directives never reach this lexer: `sdsl-parser` blanks them
//! out before tokenizing, and only hands directive *expressions* over.
//!
//! # Examples
//!
//! ```
//! # use sdsl_lexer::*;
//! # use logos::Logos;
//! let source = "stream float4 Position : SV_Position;";
//! let tokens: Vec<Result<Token, ()>> = Token::lexer(source).collect();
//! assert_eq!(tokens.len(), 6);
//! ```

use logos::Logos;
use sdsl_ast::{FloatSuffix, IntSuffix};
use std::ops::Range;
use std::rc::Rc;

/// SDSL token.
///
/// Token strings for keywords, operators, and delimiters are defined once
/// in the `TOKEN_STRINGS` table and indexed by discriminant for Display.
///
/// # Layout
///
/// Uses `#[repr(u16)]` to guarantee discriminant values are stable and
/// can be safely used to index into `TOKEN_STRINGS`. Tokens carrying data
/// are declared last.
#[derive(Logos, Debug, Clone, PartialEq)]
#[repr(u16)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    // === Keywords ===

    // Declarations
    #[token("shader")]
    Shader,
    #[token("effect")]
    Effect,
    #[token("namespace")]
    Namespace,
    #[token("struct")]
    Struct,
    #[token("mixin")]
    Mixin,
    #[token("compose")]
    Compose,
    #[token("clone")]
    Clone,
    #[token("child")]
    Child,

    // Modifiers
    #[token("stage")]
    Stage,
    #[token("stream")]
    Stream,
    #[token("static")]
    Static,
    #[token("const")]
    Const,
    #[token("override")]
    Override,
    #[token("abstract")]
    Abstract,

    // Statements
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("discard")]
    Discard,

    // Values
    #[token("true")]
    True,
    #[token("false")]
    False,
    /// Keyword `base` (call into the parent mixin)
    #[token("base")]
    Base,

    // === Operators ===

    // Increment / compound assignment
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,

    // Arithmetic
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Bitwise
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,

    // Comparison
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,

    // Logic
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // Other
    #[token("?")]
    Question,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Literals ===
    /// Integer literal with optional `u`/`l` suffix, decimal or `0x` hex.
    ///
    /// Longest match keeps `0x1` a single hex literal rather than `0`
    /// followed by an identifier.
    #[regex(r"[0-9]+([uU][lL]?|[lL][uU]?)?", |lex| lex_int(lex.slice(), 10))]
    #[regex(r"0[xX][0-9a-fA-F]+([uU][lL]?|[lL][uU]?)?", |lex| lex_int(&lex.slice()[2..], 16))]
    Int((u64, IntSuffix)),

    /// Float literal: a decimal point, an exponent, or an `f`/`d`/`h` suffix.
    #[regex(r"[0-9]+\.[0-9]*([eE][+-]?[0-9]+)?[fFdDhH]?", |lex| lex_float(lex.slice()))]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?[fFdDhH]?", |lex| lex_float(lex.slice()))]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+[fFdDhH]?", |lex| lex_float(lex.slice()))]
    #[regex(r"[0-9]+[fFdDhH]", |lex| lex_float(lex.slice()))]
    Float((f64, FloatSuffix)),

    /// String literal (`"..."`), used by attributes and `#define` bodies.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).map(|s| Rc::from(s.as_str()))
    })]
    String(Rc<str>),

    /// Identifier, including built-in type names (`float4`, `float3x3`).
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),
}

/// Split an integer slice (without any `0x` prefix) into value and suffix.
fn lex_int(slice: &str, radix: u32) -> Option<(u64, IntSuffix)> {
    let digits = slice.trim_end_matches(['u', 'U', 'l', 'L']);
    let suffix_text = &slice[digits.len()..];
    let unsigned = suffix_text.contains(['u', 'U']);
    let long = suffix_text.contains(['l', 'L']);
    let suffix = match (unsigned, long) {
        (false, false) => IntSuffix::None,
        (true, false) => IntSuffix::Unsigned,
        (false, true) => IntSuffix::Long,
        (true, true) => IntSuffix::UnsignedLong,
    };
    u64::from_str_radix(digits, radix)
        .ok()
        .map(|value| (value, suffix))
}

fn lex_float(slice: &str) -> Option<(f64, FloatSuffix)> {
    let (body, suffix) = match slice.chars().last() {
        Some('f' | 'F' | 'h' | 'H') => (&slice[..slice.len() - 1], FloatSuffix::Float),
        Some('d' | 'D') => (&slice[..slice.len() - 1], FloatSuffix::Double),
        _ => (slice, FloatSuffix::None),
    };
    body.parse::<f64>().ok().map(|value| (value, suffix))
}

/// Unescape a string literal content.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('r') => result.push('\r'),
                Some('t') => result.push('\t'),
                Some('0') => result.push('\0'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some('\'') => result.push('\''),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

/// Token string lookup table.
///
/// Maps discriminant indices to their string representation.
///
/// NOTE: The `#[token("...")]` attributes above must match these strings,
/// in declaration order.
const TOKEN_STRINGS: &[&str] = &[
    "shader", "effect", "namespace", "struct", "mixin", "compose", "clone", "child", // declarations
    "stage", "stream", "static", "const", "override", "abstract", // modifiers
    "return", "if", "else", "for", "while", "do", "break", "continue", "discard", // statements
    "true", "false", "base", // values
    "++", "--", "+=", "-=", "*=", "/=", "%=", "<<=", ">>=", "&=", "|=", "^=", // compound
    "+", "-", "*", "/", "%", // arithmetic
    "<<", ">>", "&", "|", "^", "~", // bitwise
    "==", "!=", "<", "<=", ">", ">=", // comparison
    "&&", "||", "!", // logic
    "?", ":", "=", ".", ",", ";", // other
    "(", ")", "{", "}", "[", "]", // delimiters
];

impl Token {
    /// Get the index into TOKEN_STRINGS for simple tokens.
    ///
    /// # Safety
    ///
    /// Safe due to `#[repr(u16)]` on Token enum ensuring the discriminant is
    /// stored first as a `u16`.
    fn token_string_index(&self) -> usize {
        let discriminant = unsafe { *(self as *const Token as *const u16) };
        discriminant as usize
    }

    /// Whether this token is a keyword that may not be used as a name.
    pub fn is_keyword(&self) -> bool {
        !matches!(
            self,
            Token::Int(_) | Token::Float(_) | Token::String(_) | Token::Ident(_)
        ) && self.token_string_index() < KEYWORD_COUNT
    }
}

/// Number of keyword entries at the start of `TOKEN_STRINGS`.
const KEYWORD_COUNT: usize = 26;

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Int((value, _)) => write!(f, "{}", value),
            Token::Float((value, _)) => write!(f, "{}", value),
            Token::String(s) => write!(f, "\"{}\"", s),
            Token::Ident(id) => write!(f, "{}", id),
            _ => {
                let idx = self.token_string_index();
                let s = TOKEN_STRINGS
                    .get(idx)
                    .expect("BUG: token discriminant out of bounds for TOKEN_STRINGS");
                write!(f, "{}", s)
            }
        }
    }
}

/// Tokenize a source text, pairing each token with its byte range.
///
/// Unrecognized input is reported as a list of byte ranges; lexing carries
/// on past them so the parser still sees the rest of the file.
pub fn tokenize(source: &str) -> (Vec<(Token, Range<usize>)>, Vec<Range<usize>>) {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(span),
        }
    }
    (tokens, errors)
}
