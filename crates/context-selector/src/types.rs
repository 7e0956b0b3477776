use crate::buffer::SourceBuffer;
use serde::{Deserialize, Serialize};

/// Inclusive 0-based line range used while assembling a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn single(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start) + 1
    }

    #[must_use]
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }

    #[must_use]
    pub const fn overlaps_or_touches(&self, other: &Self) -> bool {
        self.start <= other.end.saturating_add(1) && other.start <= self.end.saturating_add(1)
    }
}

/// A contiguous region of the buffer.
///
/// Lines are 1-indexed and inclusive, matching how editors number lines.
/// Columns are 0-based byte offsets within the line; `end_column` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    /// Span covering whole lines of `range` (0-based)
    #[must_use]
    pub fn from_lines(buffer: &SourceBuffer, range: LineRange) -> Self {
        Self {
            start_line: range.start + 1,
            start_column: 0,
            end_line: range.end + 1,
            end_column: buffer.line(range.end).len(),
        }
    }

    /// Get the number of lines in this span
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Check if span contains a specific 1-indexed line
    #[must_use]
    pub const fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// Why the selector gave up on structure and returned a fixed window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    /// Bracket inconsistency on the path from the cursor to top level
    /// (1-indexed line of the first offending delimiter)
    UnbalancedStructure { line: usize },
    /// The indivisible unit holding the cursor is larger than `max_lines`
    OversizedConstruct { start_line: usize, end_line: usize },
}

/// Quality of a computed window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Degradation {
    #[default]
    Clean,
    FallbackWindow { reason: FallbackReason },
}

impl Degradation {
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::FallbackWindow { .. } => "fallback_window",
        }
    }
}

/// Ordered, non-overlapping spans selected for one cursor position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindow {
    pub spans: Vec<Span>,
    pub line_count: usize,
    pub degradation: Degradation,
}

impl ContextWindow {
    /// Build a window from 0-based ranges, merging overlapping or adjacent
    /// ranges so the spans come out ascending and disjoint
    #[must_use]
    pub fn from_ranges(
        buffer: &SourceBuffer,
        ranges: impl IntoIterator<Item = LineRange>,
        degradation: Degradation,
    ) -> Self {
        let merged = merge_ranges(ranges);
        let spans: Vec<Span> = merged
            .iter()
            .map(|range| Span::from_lines(buffer, *range))
            .collect();
        let line_count = spans.iter().map(Span::line_count).sum();
        Self {
            spans,
            line_count,
            degradation,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.degradation.is_clean()
    }

    /// Every selected line, 1-indexed, ascending
    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.spans
            .iter()
            .flat_map(|span| span.start_line..=span.end_line)
    }

    #[must_use]
    pub fn contains_line(&self, line: usize) -> bool {
        self.spans.iter().any(|span| span.contains_line(line))
    }

    /// Concatenated text of all spans, one buffer line per output line
    #[must_use]
    pub fn render(&self, buffer: &SourceBuffer) -> String {
        self.spans
            .iter()
            .map(|span| buffer.slice_lines(span.start_line - 1, span.end_line - 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Sort and merge overlapping or adjacent ranges
#[must_use]
pub fn merge_ranges(ranges: impl IntoIterator<Item = LineRange>) -> Vec<LineRange> {
    let mut ranges: Vec<LineRange> = ranges.into_iter().collect();
    ranges.sort();
    let mut merged: Vec<LineRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if last.overlaps_or_touches(&range) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Number of distinct lines covered by `ranges`
#[must_use]
pub fn covered_lines(ranges: &[LineRange]) -> usize {
    merge_ranges(ranges.iter().copied())
        .iter()
        .map(LineRange::len)
        .sum()
}
