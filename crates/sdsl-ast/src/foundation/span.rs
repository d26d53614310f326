//! Source location tracking for error reporting and debugging.
//!
//! # Design
//!
//! - `Span`: compact source location (12 bytes)
//! - `SourceMap`: owns every compiled source text and resolves spans
//! - `SourceFile`: single source text with line indexing
//!
//! The compiler core never touches the file system: a source is registered
//! with a diagnostic identifier (usually a module or file name) and the text
//! the caller already loaded.
//!
//! # Examples
//!
//! ```
//! # use sdsl_ast::foundation::span::*;
//! let mut map = SourceMap::new();
//! let file_id = map.add_file("Lighting.sdsl", "float x = 1;\nfloat y = 2;".to_string());
//! let span = Span::new(file_id, 0, 12, 1);
//!
//! assert_eq!(map.file_name(&span), "Lighting.sdsl");
//! assert_eq!(map.snippet(&span), "float x = 1;");
//! ```

use serde::{Deserialize, Serialize};

/// Compact source location reference.
///
/// Points to a byte range in a source file with cached line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Index into SourceMap.files
    pub file_id: u16,
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
    /// Cached line number (1-based) for the start position
    pub start_line: u16,
}

/// Collection of all source texts in a compilation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

/// A single source text with line indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Diagnostic identifier (module or file name)
    pub name: String,
    /// Source text as seen by the parser
    pub source: String,
    /// Byte offsets of each line start
    ///
    /// line_starts[0] is always 0 (start of file).
    /// line_starts.len() == number of lines + 1 (includes EOF sentinel).
    pub line_starts: Vec<u32>,
}

impl Span {
    /// Create a new span.
    pub fn new(file_id: u16, start: u32, end: u32, start_line: u16) -> Self {
        Self {
            file_id,
            start,
            end,
            start_line,
        }
    }

    /// 1-based line number as stored in a span, clamped to `u16::MAX`.
    pub fn line_number(line: usize) -> u16 {
        u16::try_from(line).unwrap_or(u16::MAX)
    }

    /// Create a zero-length span at the start of a file.
    pub fn zero(file_id: u16) -> Self {
        Self::new(file_id, 0, 0, 1)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Get the length of this span in bytes.
    ///
    /// # Panics
    /// Panics if end < start (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Merge two spans (returns span covering both).
    ///
    /// Panics if spans are from different files.
    pub fn merge(&self, other: &Span) -> Span {
        assert_eq!(
            self.file_id, other.file_id,
            "cannot merge spans from different files"
        );
        Span {
            file_id: self.file_id,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            start_line: self.start_line.min(other.start_line),
        }
    }
}

impl SourceMap {
    /// Create an empty source map.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Register a source text under a diagnostic name and return its ID.
    pub fn add_file(&mut self, name: impl Into<String>, source: String) -> u16 {
        let file_id = self.files.len();
        assert!(file_id < u16::MAX as usize, "too many source files");
        self.files.push(SourceFile::new(name, source));
        file_id as u16
    }

    /// Get the source file for a span.
    pub fn file(&self, span: &Span) -> &SourceFile {
        &self.files[span.file_id as usize]
    }

    /// Get the diagnostic name for a span.
    pub fn file_name(&self, span: &Span) -> &str {
        &self.files[span.file_id as usize].name
    }

    /// Get the source snippet for a span.
    pub fn snippet(&self, span: &Span) -> &str {
        let file = &self.files[span.file_id as usize];
        let end = (span.end as usize).min(file.source.len());
        let start = (span.start as usize).min(end);
        &file.source[start..end]
    }

    /// Get the (line, column) position for a span's start, both 1-based.
    pub fn line_col(&self, span: &Span) -> (u32, u32) {
        let file = &self.files[span.file_id as usize];
        file.line_col(span.start.min(file.source.len() as u32))
    }

    /// Get the number of files in this map.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

impl SourceFile {
    /// Create a new source file with precomputed line starts.
    pub fn new(name: impl Into<String>, source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            name: name.into(),
            source,
            line_starts,
        }
    }

    /// Get (line, column) for a byte offset. Both are 1-based.
    ///
    /// # Panics
    /// Panics if offset is beyond EOF.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        assert!(
            offset <= self.source.len() as u32,
            "offset {} is beyond EOF (len = {})",
            offset,
            self.source.len()
        );

        let line_idx = line_index(&self.line_starts, offset);
        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;

        (line, col)
    }

    /// Get the text of a specific line (1-based), including its newline.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 || line as usize >= self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[(line - 1) as usize] as usize;
        let end = self.line_starts[line as usize] as usize;
        Some(&self.source[start..end])
    }
}

/// Compute byte offsets of line starts in source text.
///
/// The last entry is an EOF sentinel, so the number of lines is
/// `line_starts.len() - 1`.
pub fn compute_line_starts(source: &str) -> Vec<u32> {
    let mut line_starts = vec![0];

    for (idx, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push((idx + 1) as u32);
        }
    }

    if line_starts.last() != Some(&(source.len() as u32)) {
        line_starts.push(source.len() as u32);
    }

    line_starts
}

/// Zero-based index of the line containing `offset`.
pub fn line_index(line_starts: &[u32], offset: u32) -> usize {
    match line_starts.binary_search(&offset) {
        Ok(idx) => idx.min(line_starts.len().saturating_sub(2)),
        Err(idx) => idx.max(1) - 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation() {
        let span = Span::new(0, 10, 20, 1);
        assert_eq!(span.len(), 10);
        assert!(!span.is_empty());
        assert!(Span::zero(0).is_empty());
    }

    #[test]
    fn test_line_number_saturates() {
        assert_eq!(Span::line_number(1), 1);
        assert_eq!(Span::line_number(65_535), u16::MAX);
        assert_eq!(Span::line_number(70_001), u16::MAX);
    }

    #[test]
    fn test_span_merge() {
        let merged = Span::new(0, 10, 20, 1).merge(&Span::new(0, 15, 30, 2));
        assert_eq!(merged.start, 10);
        assert_eq!(merged.end, 30);
        assert_eq!(merged.start_line, 1);
    }

    #[test]
    fn test_compute_line_starts() {
        assert_eq!(compute_line_starts("line 1\nline 2\nline 3"), vec![0, 7, 14, 20]);
        assert_eq!(compute_line_starts("line 1\nline 2\n"), vec![0, 7, 14]);
    }

    #[test]
    fn test_source_file_line_col() {
        let file = SourceFile::new("test.sdsl", "hello\nworld\n".to_string());

        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(5), (1, 6));
        assert_eq!(file.line_col(6), (2, 1));
        assert_eq!(file.line_col(11), (2, 6));
        assert_eq!(file.line_text(2), Some("world\n"));
        assert_eq!(file.line_text(3), None);
    }

    #[test]
    fn test_source_map() {
        let mut map = SourceMap::new();
        let file_id = map.add_file("test.sdsl", "float x;\nint y;".to_string());
        let span = Span::new(file_id, 9, 15, 2);

        assert_eq!(map.file_count(), 1);
        assert_eq!(map.snippet(&span), "int y;");
        assert_eq!(map.file_name(&span), "test.sdsl");
        assert_eq!(map.line_col(&span), (2, 1));
    }

    #[test]
    #[should_panic(expected = "malformed span")]
    fn test_span_len_panics_on_inverted() {
        let _ = Span::new(0, 10, 5, 1).len();
    }

    #[test]
    #[should_panic(expected = "cannot merge spans from different files")]
    fn test_span_merge_panics_on_different_files() {
        let _ = Span::new(0, 0, 1, 1).merge(&Span::new(1, 0, 1, 1));
    }
}
