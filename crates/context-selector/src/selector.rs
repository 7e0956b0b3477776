//! Outward walk from the cursor and budget fitting.
//!
//! ```text
//! cursor line
//!     │
//!     ├──> innermost construct ── full span
//!     │
//!     ├──> chain predecessors ── header only  (else → if)
//!     │
//!     └──> parents ───────────── header only, until top level
//! ```
//!
//! Every step is an indivisible unit. When the units exceed `max_lines`,
//! whole units are dropped starting from the outermost one.

use crate::boundary::{Boundaries, Construct, ConstructId, ConstructKind};
use crate::buffer::SourceBuffer;
use crate::config::SelectorConfig;
use crate::fallback;
use crate::scanner::{ScanResult, UnbalancedKind};
use crate::types::{covered_lines, ContextWindow, Degradation, FallbackReason, LineRange};
use serde::{Deserialize, Serialize};

/// State of the outward walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkState {
    /// Cursor is not inside any construct
    Outside,
    InCaseClause,
    InControlBlock,
    InCompositeLiteral,
    InSignature,
    InDeclarationGroup,
    InTypeBody,
    InBlock,
    /// Top level reached
    Done,
}

impl WalkState {
    #[must_use]
    pub const fn entering(kind: ConstructKind) -> Self {
        match kind {
            ConstructKind::Signature => Self::InSignature,
            ConstructKind::CompositeLiteral => Self::InCompositeLiteral,
            ConstructKind::ControlBlock => Self::InControlBlock,
            ConstructKind::CaseClause => Self::InCaseClause,
            ConstructKind::DeclarationGroup => Self::InDeclarationGroup,
            ConstructKind::TypeBody => Self::InTypeBody,
            ConstructKind::Block => Self::InBlock,
        }
    }
}

/// One unit emitted by the walk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStep {
    pub state: WalkState,
    pub construct: Option<ConstructId>,
    /// 0-based lines contributed by this step
    pub lines: LineRange,
}

impl WalkStep {
    fn full(construct: &Construct) -> Self {
        Self {
            state: WalkState::entering(construct.kind),
            construct: Some(construct.id),
            lines: construct.extent(),
        }
    }

    fn header(construct: &Construct) -> Self {
        Self {
            state: WalkState::entering(construct.kind),
            construct: Some(construct.id),
            lines: construct.header(),
        }
    }
}

/// Iterator over the units for one cursor line, innermost first
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    boundaries: &'a Boundaries,
    state: WalkState,
    first: Option<WalkStep>,
    chain: Option<ConstructId>,
    parent: Option<ConstructId>,
}

impl<'a> Walk<'a> {
    #[must_use]
    pub fn new(boundaries: &'a Boundaries, cursor_line: usize) -> Self {
        let innermost = boundaries.innermost_at(cursor_line);
        let first = innermost.map_or(
            WalkStep {
                state: WalkState::Outside,
                construct: None,
                lines: LineRange::single(cursor_line),
            },
            WalkStep::full,
        );
        Self {
            boundaries,
            state: WalkState::Outside,
            first: Some(first),
            chain: innermost.and_then(|construct| construct.chained_from),
            parent: innermost.and_then(|construct| construct.parent),
        }
    }

    /// State after the most recent step
    #[must_use]
    pub const fn state(&self) -> WalkState {
        self.state
    }
}

impl Iterator for Walk<'_> {
    type Item = WalkStep;

    fn next(&mut self) -> Option<WalkStep> {
        let step = if let Some(first) = self.first.take() {
            first
        } else if let Some(id) = self.chain.take() {
            let construct = self.boundaries.get(id)?;
            self.chain = construct.chained_from;
            WalkStep::header(construct)
        } else if let Some(id) = self.parent.take() {
            let construct = self.boundaries.get(id)?;
            self.chain = construct.chained_from;
            self.parent = construct.parent;
            WalkStep::header(construct)
        } else {
            self.state = WalkState::Done;
            return None;
        };
        self.state = step.state;
        Some(step)
    }
}

/// Assembles a [`ContextWindow`] from an analysed buffer
pub struct ContextSelector<'a> {
    buffer: &'a SourceBuffer,
    scan: &'a ScanResult,
    boundaries: &'a Boundaries,
    config: &'a SelectorConfig,
}

impl<'a> ContextSelector<'a> {
    #[must_use]
    pub const fn new(
        buffer: &'a SourceBuffer,
        scan: &'a ScanResult,
        boundaries: &'a Boundaries,
        config: &'a SelectorConfig,
    ) -> Self {
        Self {
            buffer,
            scan,
            boundaries,
            config,
        }
    }

    #[must_use]
    pub fn walk(&self, cursor_line: usize) -> Walk<'a> {
        Walk::new(self.boundaries, cursor_line)
    }

    /// Select the window for a 0-based cursor line.
    ///
    /// Lines past the end are clamped to the last line; an empty buffer gives
    /// an empty clean window.
    #[must_use]
    pub fn select(&self, cursor_line: usize) -> ContextWindow {
        let line_count = self.buffer.line_count();
        if line_count == 0 {
            return ContextWindow::default();
        }
        let cursor_line = cursor_line.min(line_count - 1);
        let max_lines = self.config.max_lines;

        if let Some(line) = self.unbalanced_on_path(cursor_line) {
            log::warn!(
                "unbalanced structure at line {} encloses line {}, using fixed window",
                line + 1,
                cursor_line + 1
            );
            let reason = FallbackReason::UnbalancedStructure { line: line + 1 };
            return fallback::fixed_window(self.buffer, cursor_line, max_lines, reason);
        }

        let units = self.units(self.walk(cursor_line), cursor_line);
        if let Some(kept) = fit(&units, max_lines) {
            return self.clean_window(kept, cursor_line);
        }

        // The innermost construct alone is over budget: keep the cursor line
        // and its header, and none of the outer units.
        let Some(innermost) = self.boundaries.innermost_at(cursor_line) else {
            return self.clean_window(&[LineRange::single(cursor_line)], cursor_line);
        };
        if innermost.kind != ConstructKind::DeclarationGroup {
            let mut focused = vec![LineRange::single(cursor_line)];
            focused.extend(self.trim(innermost.header(), cursor_line));
            if let Some(kept) = fit(&focused, max_lines) {
                log::debug!(
                    "{} at lines {}-{} exceeds {max_lines} lines, focusing on line {}",
                    innermost.kind.as_str(),
                    innermost.start_line + 1,
                    innermost.end_line + 1,
                    cursor_line + 1
                );
                return self.clean_window(kept, cursor_line);
            }
        }

        log::warn!(
            "{} at lines {}-{} cannot fit in {max_lines} lines, using fixed window",
            innermost.kind.as_str(),
            innermost.start_line + 1,
            innermost.end_line + 1
        );
        let reason = FallbackReason::OversizedConstruct {
            start_line: innermost.start_line + 1,
            end_line: innermost.end_line + 1,
        };
        fallback::fixed_window(self.buffer, cursor_line, max_lines, reason)
    }

    fn clean_window(&self, ranges: &[LineRange], cursor_line: usize) -> ContextWindow {
        let window = ContextWindow::from_ranges(self.buffer, ranges.iter().copied(), Degradation::Clean);
        log::debug!(
            "selected {} lines in {} spans for line {}",
            window.line_count,
            window.spans.len(),
            cursor_line + 1
        );
        window
    }

    fn units(&self, walk: Walk<'_>, cursor_line: usize) -> Vec<LineRange> {
        walk.filter_map(|step| self.trim(step.lines, cursor_line))
            .collect()
    }

    /// Drop blank lines at both edges of a unit, never past the cursor line
    fn trim(&self, range: LineRange, cursor_line: usize) -> Option<LineRange> {
        if self.config.include_blank_runs {
            return Some(range);
        }
        let trimmable = |line: usize| line != cursor_line && self.buffer.is_blank_line(line);

        let mut start = range.start;
        while start <= range.end && trimmable(start) {
            start += 1;
        }
        if start > range.end {
            return None;
        }
        let mut end = range.end;
        while end > start && trimmable(end) {
            end -= 1;
        }
        Some(LineRange::new(start, end))
    }

    /// First unbalanced marker between the cursor and top level, if any.
    ///
    /// That is a marker inside the outermost construct enclosing the cursor
    /// (or on the cursor line itself), or an opener left unclosed at or
    /// before the cursor.
    fn unbalanced_on_path(&self, cursor_line: usize) -> Option<usize> {
        let path = match self.boundaries.innermost_at(cursor_line) {
            Some(innermost) => self
                .boundaries
                .ancestors(innermost.id)
                .last()
                .unwrap_or(innermost)
                .extent(),
            None => LineRange::single(cursor_line),
        };
        self.scan
            .issues
            .iter()
            .filter(|issue| {
                path.contains(issue.line)
                    || (issue.kind == UnbalancedKind::Unclosed && issue.line <= cursor_line)
            })
            .map(|issue| issue.line)
            .min()
    }
}

/// Longest prefix of `units` that fits in `max_lines`, keeping at least the
/// first unit
fn fit(units: &[LineRange], max_lines: usize) -> Option<&[LineRange]> {
    (1..=units.len())
        .rev()
        .map(|kept| &units[..kept])
        .find(|kept| covered_lines(kept) <= max_lines)
}
