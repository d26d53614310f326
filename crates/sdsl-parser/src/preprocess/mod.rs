//! Textual preprocessor run before tokenizing.
//!
//! Handles the conditional-compilation dialect (`#if`, `#ifdef`, `#ifndef`,
//! `#elif`, `#else`, `#endif`) and object-like macros (`#define`,
//! `#undef`). Every directive line and every line of a dead branch is
//! replaced by an empty line, so line numbers of surviving code match the
//! original source.

mod eval;

use crate::parser::ParseError;
use indexmap::IndexMap;
use sdsl_ast::foundation::Span;
use tracing::trace;

/// Output of [`preprocess`].
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    /// Source with directives and dead branches blanked and macros expanded
    pub text: String,
    /// Macro environment after the last line
    pub macros: IndexMap<String, String>,
    pub errors: Vec<ParseError>,
}

/// Run the preprocessor over `source` with an initial macro environment.
pub fn preprocess(source: &str, file_id: u16, macros: &IndexMap<String, String>) -> Preprocessed {
    let mut pp = Preprocessor {
        macros: macros.clone(),
        stack: Vec::new(),
        errors: Vec::new(),
    };

    let mut text = String::with_capacity(source.len());
    let mut offset = 0usize;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };
        let span = Span::new(
            file_id,
            offset as u32,
            (offset + body.len()) as u32,
            Span::line_number(index + 1),
        );
        offset += line.len();

        match body.trim_start().strip_prefix('#') {
            Some(directive) => pp.directive(directive, span),
            None if pp.active() => text.push_str(&pp.expand(body)),
            None => {}
        }
        text.push_str(newline);
    }

    for open in pp.stack.drain(..) {
        pp.errors.push(ParseError::preprocessor(
            "unterminated conditional directive (missing #endif)",
            open.span,
        ));
    }

    Preprocessed {
        text,
        macros: pp.macros,
        errors: pp.errors,
    }
}

/// One open `#if` / `#ifdef` / `#ifndef` group.
#[derive(Debug)]
struct Conditional {
    /// Whether the enclosing region is live
    parent_active: bool,
    /// Whether some branch of this group has already been selected
    taken: bool,
    /// Whether the current branch is live
    active: bool,
    seen_else: bool,
    span: Span,
}

struct Preprocessor {
    macros: IndexMap<String, String>,
    stack: Vec<Conditional>,
    errors: Vec<ParseError>,
}

impl Preprocessor {
    fn active(&self) -> bool {
        self.stack.last().map_or(true, |group| group.active)
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(ParseError::preprocessor(message, span));
    }

    fn directive(&mut self, directive: &str, span: Span) {
        let directive = directive.trim_start();
        let name_len = directive
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(directive.len());
        let (name, rest) = directive.split_at(name_len);
        let rest = strip_comment(rest).trim();
        trace!(directive = name, argument = rest, "preprocessor directive");

        match name {
            "if" => {
                let parent_active = self.active();
                let condition = parent_active && self.condition(rest, span);
                self.push(parent_active, condition, span);
            }
            "ifdef" | "ifndef" => {
                let parent_active = self.active();
                let defined = match macro_name(rest) {
                    Some((macro_name, _)) => self.macros.contains_key(macro_name),
                    None => {
                        if parent_active {
                            self.error(format!("#{} requires a macro name", name), span);
                        }
                        false
                    }
                };
                let condition = parent_active && (defined == (name == "ifdef"));
                self.push(parent_active, condition, span);
            }
            "elif" => {
                let Some(group) = self.stack.last() else {
                    self.error("#elif without #if", span);
                    return;
                };
                if group.seen_else {
                    self.error("#elif after #else", span);
                    return;
                }
                let evaluate = group.parent_active && !group.taken;
                let condition = evaluate && self.condition(rest, span);
                if let Some(group) = self.stack.last_mut() {
                    group.active = condition;
                    group.taken |= condition;
                }
            }
            "else" => {
                let Some(group) = self.stack.last_mut() else {
                    self.error("#else without #if", span);
                    return;
                };
                if group.seen_else {
                    self.error("duplicate #else", span);
                    return;
                }
                group.active = group.parent_active && !group.taken;
                group.taken = true;
                group.seen_else = true;
            }
            "endif" => {
                if self.stack.pop().is_none() {
                    self.error("#endif without #if", span);
                }
            }
            // Anything else only matters on live lines.
            _ if !self.active() => {}
            "define" => self.define(rest, span),
            "undef" => match macro_name(rest) {
                Some((macro_name, _)) => {
                    self.macros.shift_remove(macro_name);
                }
                None => self.error("#undef requires a macro name", span),
            },
            "pragma" | "" => {}
            other => self.error(format!("unknown preprocessor directive '#{}'", other), span),
        }
    }

    fn push(&mut self, parent_active: bool, condition: bool, span: Span) {
        self.stack.push(Conditional {
            parent_active,
            taken: condition,
            active: condition,
            seen_else: false,
            span,
        });
    }

    fn condition(&mut self, text: &str, span: Span) -> bool {
        match eval::evaluate(text, &self.macros) {
            Ok(value) => value != 0,
            Err(message) => {
                self.error(message, span);
                false
            }
        }
    }

    fn define(&mut self, rest: &str, span: Span) {
        let Some((name, body)) = macro_name(rest) else {
            self.error("#define requires a macro name", span);
            return;
        };
        if body.starts_with('(') {
            self.error(
                format!("function-like macro '{}' is not supported", name),
                span,
            );
            return;
        }
        self.macros.insert(name.to_string(), body.trim().to_string());
    }

    /// Expand object-like macros in a source line.
    fn expand(&self, line: &str) -> String {
        let mut expanding = Vec::new();
        expand_text(line, &self.macros, &mut expanding)
    }
}

/// Split a leading identifier off `text`, returning it and the remainder.
fn macro_name(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let first = text.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    Some(text.split_at(end))
}

/// Drop a trailing `//` comment from a directive argument.
fn strip_comment(text: &str) -> &str {
    let mut in_string = false;
    let bytes = text.as_bytes();
    for (index, &byte) in bytes.iter().enumerate() {
        match byte {
            b'"' if index == 0 || bytes[index - 1] != b'\\' => in_string = !in_string,
            b'/' if !in_string && bytes.get(index + 1) == Some(&b'/') => return &text[..index],
            _ => {}
        }
    }
    text
}

/// Replace whole identifiers that name macros, outside string literals and
/// line comments. A macro is never re-expanded inside its own expansion.
fn expand_text(
    text: &str,
    macros: &IndexMap<String, String>,
    expanding: &mut Vec<String>,
) -> String {
    if macros.is_empty() {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut index = 0;

    while index < bytes.len() {
        let byte = bytes[index];
        let start = index;

        if byte == b'"' {
            index += 1;
            while index < bytes.len() && bytes[index] != b'"' {
                index += if bytes[index] == b'\\' { 2 } else { 1 };
            }
            index = (index + 1).min(bytes.len());
            out.push_str(&text[start..index]);
        } else if byte == b'/' && bytes.get(index + 1) == Some(&b'/') {
            out.push_str(&text[start..]);
            break;
        } else if byte.is_ascii_digit() {
            // Numbers (with suffixes and exponents) are never macro names.
            while index < bytes.len() && is_number_byte(bytes[index]) {
                index += 1;
            }
            out.push_str(&text[start..index]);
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            while index < bytes.len() && is_ident_byte(bytes[index]) {
                index += 1;
            }
            let ident = &text[start..index];
            match macros.get(ident) {
                Some(body) if !expanding.iter().any(|open| open == ident) => {
                    expanding.push(ident.to_string());
                    out.push_str(&expand_text(body, macros, expanding));
                    expanding.pop();
                }
                _ => out.push_str(ident),
            }
        } else {
            let ch = text[start..].chars().next().map_or(1, char::len_utf8);
            index += ch;
            out.push_str(&text[start..index]);
        }
    }

    out
}

fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

fn is_number_byte(byte: u8) -> bool {
    is_ident_byte(byte) || byte == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Preprocessed {
        preprocess(source, 0, &IndexMap::new())
    }

    #[test]
    fn test_selects_live_branch_and_keeps_lines() {
        let out = run("#define A 1\n#if A\nfloat x;\n#else\nint x;\n#endif\nfloat y;");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.text, "\n\nfloat x;\n\n\n\nfloat y;");
        assert_eq!(out.text.lines().count(), 7);
    }

    #[test]
    fn test_nested_conditionals() {
        let source = "#if 1\n#if 0\na\n#elif 1\nb\n#else\nc\n#endif\n#else\nd\n#endif";
        let out = run(source);
        assert!(out.errors.is_empty());
        let kept: Vec<_> = out.text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, vec!["b"]);
    }

    #[test]
    fn test_dead_branch_directives_are_not_evaluated() {
        let out = run("#if 0\n#if 1 / 0\n#error nope\n#endif\n#endif\nok");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.text.trim(), "ok");
    }

    #[test]
    fn test_ifdef_ifndef_undef() {
        let out = run("#define X\n#ifdef X\na\n#endif\n#undef X\n#ifndef X\nb\n#endif");
        let kept: Vec<_> = out.text.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(kept, vec!["a", "b"]);
        assert!(!out.macros.contains_key("X"));
    }

    #[test]
    fn test_macro_expansion_whole_identifiers_only() {
        let out = run("#define N 4\nfloat N2 = N; string s = \"N\"; float f = 1.0f; // N");
        assert_eq!(
            out.text,
            "\nfloat N2 = 4; string s = \"N\"; float f = 1.0f; // N"
        );
    }

    #[test]
    fn test_self_referential_macro_is_not_re_expanded() {
        let out = run("#define X X + 1\nint y = X;");
        assert_eq!(out.text, "\nint y = X + 1;");
    }

    #[test]
    fn test_initial_macros() {
        let mut macros = IndexMap::new();
        macros.insert("QUALITY".to_string(), "2".to_string());
        let out = preprocess("#if QUALITY > 1\nhigh\n#endif", 0, &macros);
        assert_eq!(out.text.trim(), "high");
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(run("#endif").errors.len(), 1);
        assert_eq!(run("#else").errors.len(), 1);
        assert_eq!(run("#elif 1").errors.len(), 1);
        assert_eq!(run("#if 1\n#else\n#else\n#endif").errors.len(), 1);
        assert_eq!(run("#if 1\n#else\n#elif 1\n#endif").errors.len(), 1);

        let unterminated = run("#if 1\nfloat x;");
        assert_eq!(unterminated.errors.len(), 1);
        assert_eq!(unterminated.errors[0].span.start_line, 1);
        assert!(unterminated.errors[0].message.contains("#endif"));
    }

    #[test]
    fn test_directive_errors() {
        let bad_expr = run("#if 1 +\n#endif");
        assert_eq!(bad_expr.errors.len(), 1);
        assert_eq!(bad_expr.errors[0].kind, crate::ParseErrorKind::Preprocessor);

        assert_eq!(run("#define F(x) x").errors.len(), 1);
        assert_eq!(run("#include \"a.sdsl\"").errors.len(), 1);
        assert!(run("#pragma once").errors.is_empty());
    }

    #[test]
    fn test_line_numbers_past_u16_saturate() {
        let mut source = "\n".repeat(70_000);
        source.push_str("#endif");
        let out = run(&source);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].span.start_line, u16::MAX);
        assert_eq!(out.text.lines().count(), 70_000);
    }
}
