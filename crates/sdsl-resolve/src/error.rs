//! Compile-time error reporting and diagnostics.
//!
//! Every phase after lexing reports problems as [`CompileError`] values that
//! are appended to a list and returned with the phase's result. Nothing in
//! the pipeline stops at the first problem.
//!
//! # Design
//!
//! - `CompileError`: single diagnostic with primary and optional secondary spans
//! - `ErrorKind`: categorizes errors by compiler phase
//! - `Severity`: error, warning, or note
//! - `DiagnosticFormatter`: formats diagnostics with source snippets
//!
//! # Examples
//!
//! ```
//! # use sdsl_resolve::error::*;
//! # use sdsl_ast::Span;
//! # let span = Span::new(0, 0, 5, 1);
//! let error = CompileError::new(
//!     ErrorKind::DuplicateName,
//!     span,
//!     "duplicate definition of 'Color'".to_string(),
//! );
//! assert_eq!(error.severity, Severity::Error);
//! ```

use sdsl_ast::{SourceMap, Span};
use sdsl_parser::{ParseError, ParseErrorKind};
use std::fmt;

/// Compilation diagnostic with source location and message.
///
/// Each diagnostic has:
/// - Primary span (where the error occurred)
/// - Error kind (categorizes the error)
/// - Message (human-readable explanation)
/// - Optional secondary labels (related code locations)
/// - Optional notes (additional context or suggestions)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Category of this error
    pub kind: ErrorKind,
    /// Severity level
    pub severity: Severity,
    /// Primary source location
    pub span: Span,
    /// Primary error message
    pub message: String,
    /// Additional labeled spans
    pub labels: Vec<Label>,
    /// Additional notes or hints
    pub notes: Vec<String>,
}

/// Category of compilation error.
///
/// # Invariant
///
/// The discriminant values must match the ERROR_KIND_NAMES array indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    // Front end
    /// Syntax error (invalid token, unexpected EOF, etc.)
    Syntax = 0,
    /// Malformed directive, unbalanced `#if`, bad directive expression
    Preprocessor = 1,

    // Name resolution
    /// Identifier that resolves to nothing in scope
    UndefinedName = 2,
    /// Second definition of a name in the same scope
    DuplicateName = 3,

    // Typing
    /// Type mismatch (expected X, got Y)
    TypeMismatch = 4,
    /// Unknown type name
    UnknownType = 5,
    /// Operator not defined for the operand types
    InvalidOperator = 6,
    /// Wrong number of arguments to a function or constructor
    WrongArgCount = 7,
    /// Unknown struct field, invalid swizzle, or member on a non-aggregate
    InvalidMember = 8,

    // Composition
    /// Base, composed or effect mixin that is not declared
    UnresolvedMixin = 9,
    /// Requested entry point does not exist in any selected mixin
    UnresolvedEntryPoint = 10,

    // Generic
    /// Internal compiler error (bug in compiler)
    Internal = 11,
}

/// Human-readable names for error kinds.
///
/// Index matches ErrorKind discriminant.
const ERROR_KIND_NAMES: &[&str] = &[
    "syntax error",            // 0: Syntax
    "preprocessor error",      // 1: Preprocessor
    "undefined name",          // 2: UndefinedName
    "duplicate name",          // 3: DuplicateName
    "type mismatch",           // 4: TypeMismatch
    "unknown type",            // 5: UnknownType
    "invalid operator",        // 6: InvalidOperator
    "wrong argument count",    // 7: WrongArgCount
    "invalid member",          // 8: InvalidMember
    "unresolved mixin",        // 9: UnresolvedMixin
    "unresolved entry point",  // 10: UnresolvedEntryPoint
    "internal compiler error", // 11: Internal
];

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational note (not an error)
    Note,
    /// Warning (code is valid but suspicious)
    Warning,
    /// Error (compilation cannot proceed)
    Error,
}

/// Secondary labeled span in a diagnostic.
///
/// Used to point to related code locations (e.g., "first defined here").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// Source location
    pub span: Span,
    /// Label text
    pub message: String,
}

impl CompileError {
    /// Creates a new error diagnostic with no labels or notes.
    pub fn new(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Error, span, message)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Warning, span, message)
    }

    /// Creates a new note diagnostic.
    pub fn note(kind: ErrorKind, span: Span, message: String) -> Self {
        Self::with_severity(kind, Severity::Note, span, message)
    }

    fn with_severity(kind: ErrorKind, severity: Severity, span: Span, message: String) -> Self {
        Self {
            kind,
            severity,
            span,
            message,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Adds a secondary labeled span.
    pub fn with_label(mut self, span: Span, message: String) -> Self {
        self.labels.push(Label { span, message });
        self
    }

    /// Adds a note or hint.
    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl ErrorKind {
    /// Returns a human-readable name for this error kind.
    pub fn name(self) -> &'static str {
        ERROR_KIND_NAMES[self as usize]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}: {}",
            self.severity,
            self.kind.name(),
            self.message
        )
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(error: ParseError) -> Self {
        let kind = match error.kind {
            ParseErrorKind::Preprocessor => ErrorKind::Preprocessor,
            _ => ErrorKind::Syntax,
        };
        CompileError::new(kind, error.span, error.message)
    }
}

/// Whether any diagnostic in `errors` has error severity.
pub fn has_errors(errors: &[CompileError]) -> bool {
    errors.iter().any(CompileError::is_error)
}

/// Formats diagnostics with source code context.
///
/// Produces rich error messages with:
/// - Diagnostic name and line/column location
/// - Source code snippet
/// - Visual indicators (^^^) under error spans
/// - Secondary labels
/// - Notes and hints
///
/// # Examples
///
/// ```
/// # use sdsl_resolve::error::*;
/// # use sdsl_ast::{Span, SourceMap};
/// let mut sources = SourceMap::new();
/// let file_id = sources.add_file("Test.sdsl", "float x = foo;".to_string());
/// let span = Span::new(file_id, 10, 13, 1);
///
/// let error = CompileError::new(
///     ErrorKind::UndefinedName,
///     span,
///     "undefined symbol 'foo'".to_string(),
/// );
///
/// let formatter = DiagnosticFormatter::new(&sources);
/// assert_eq!(
///     formatter.format_short(&error),
///     "Test.sdsl:1:11: error: undefined symbol 'foo'"
/// );
/// ```
pub struct DiagnosticFormatter<'a> {
    sources: &'a SourceMap,
}

impl<'a> DiagnosticFormatter<'a> {
    pub fn new(sources: &'a SourceMap) -> Self {
        Self { sources }
    }

    fn known(&self, span: &Span) -> bool {
        (span.file_id as usize) < self.sources.file_count()
    }

    /// One-line `file:line:col: severity: message` rendering.
    pub fn format_short(&self, error: &CompileError) -> String {
        if !self.known(&error.span) {
            return format!("<unknown>:{}: {}: {}", error.span.start_line, error.severity, error.message);
        }
        let (line, col) = self.sources.line_col(&error.span);
        format!(
            "{}:{}:{}: {}: {}",
            self.sources.file_name(&error.span),
            line,
            col,
            error.severity,
            error.message
        )
    }

    /// Formats a diagnostic as a string with source context.
    pub fn format(&self, error: &CompileError) -> String {
        let mut output = String::new();

        // Header: severity and message
        output.push_str(&format!(
            "{}: {}: {}\n",
            error.severity,
            error.kind.name(),
            error.message
        ));

        if !self.known(&error.span) {
            return output;
        }

        let (line, col) = self.sources.line_col(&error.span);
        output.push_str(&format!(
            "  --> {}:{}:{}\n",
            self.sources.file_name(&error.span),
            line,
            col
        ));

        let file = self.sources.file(&error.span);
        if let Some(source_line) = file.line_text(line) {
            let source_line = source_line.trim_end_matches(['\n', '\r']);
            output.push_str("   |\n");
            output.push_str(&format!("{:3} | {}\n", line, source_line));

            let start_col = col as usize;
            let span_len = error.span.end.saturating_sub(error.span.start) as usize;
            let end_col = (start_col + span_len).min(source_line.len() + 1);
            let underline = " ".repeat(start_col.saturating_sub(1))
                + &"^".repeat(end_col.saturating_sub(start_col).max(1));
            output.push_str(&format!("   | {}\n", underline));
        }

        for label in &error.labels {
            output.push_str(&format!("   = note: {}\n", label.message));
            if self.known(&label.span) {
                let (label_line, label_col) = self.sources.line_col(&label.span);
                output.push_str(&format!(
                    "     at {}:{}:{}\n",
                    self.sources.file_name(&label.span),
                    label_line,
                    label_col
                ));
            }
        }

        for note in &error.notes {
            output.push_str(&format!("   = help: {}\n", note));
        }

        output
    }

    /// Formats multiple diagnostics separated by blank lines.
    pub fn format_all(&self, errors: &[CompileError]) -> String {
        errors
            .iter()
            .map(|e| self.format(e))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
