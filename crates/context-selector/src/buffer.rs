use crate::error::{Result, SelectorError};
use std::ops::Range;
use std::sync::Arc;

/// Immutable source text with a line-start index.
///
/// Lines are split on `\n`. A trailing `\r` is kept in the raw text but
/// excluded from [`SourceBuffer::line`]. A final newline does not start an
/// extra line, so `"a\nb\n"` has two lines. Line indices are 0-based here;
/// public spans convert to 1-based at the selector boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBuffer {
    text: Arc<str>,
    line_starts: Vec<usize>,
}

impl SourceBuffer {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = text.into();
        let mut line_starts = Vec::new();
        if !text.is_empty() {
            line_starts.push(0);
            for (idx, byte) in text.bytes().enumerate() {
                if byte == b'\n' && idx + 1 < text.len() {
                    line_starts.push(idx + 1);
                }
            }
        }
        Self { text, line_starts }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of a line, excluding its line terminator
    #[must_use]
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.line_starts.get(line)?;
        let mut end = self
            .line_starts
            .get(line + 1)
            .map_or(self.text.len(), |next| next - 1);
        if end > start && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        // The last line may still carry the buffer's trailing newline.
        if end > start && self.text.as_bytes()[end - 1] == b'\n' {
            end -= 1;
            if end > start && self.text.as_bytes()[end - 1] == b'\r' {
                end -= 1;
            }
        }
        Some(start..end)
    }

    /// Text of a line without its terminator; empty for out-of-range lines
    #[must_use]
    pub fn line(&self, line: usize) -> &str {
        self.line_range(line)
            .map_or("", |range| &self.text[range])
    }

    #[must_use]
    pub fn is_blank_line(&self, line: usize) -> bool {
        self.line(line).trim().is_empty()
    }

    /// Map a byte offset to `(line, column)`.
    ///
    /// `offset == len` is valid and maps to the end of the last line.
    pub fn position_of(&self, offset: usize) -> Result<(usize, usize)> {
        if offset > self.text.len() {
            return Err(SelectorError::CursorOutOfBounds {
                offset,
                len: self.text.len(),
            });
        }
        if self.line_starts.is_empty() {
            return Ok((0, 0));
        }
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(insert_at) => insert_at - 1,
        };
        let line_end = self
            .line_range(line)
            .map_or(offset, |range| range.end);
        let column = offset.min(line_end) - self.line_starts[line];
        Ok((line, column))
    }

    /// Map a 0-based `(line, column)` back to a byte offset, clamping the
    /// column to the line length
    pub fn offset_of(&self, line: usize, column: usize) -> Result<usize> {
        let range = self
            .line_range(line)
            .ok_or(SelectorError::LineOutOfBounds {
                line: line + 1,
                line_count: self.line_count(),
            })?;
        Ok((range.start + column).min(range.end))
    }

    /// Lines `start..=end` joined with `\n`
    #[must_use]
    pub fn slice_lines(&self, start: usize, end: usize) -> String {
        (start..=end)
            .take_while(|&line| line < self.line_count())
            .map(|line| self.line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<&str> for SourceBuffer {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceBuffer {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
