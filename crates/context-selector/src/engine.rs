use crate::boundary::{Boundaries, BoundaryDetector};
use crate::buffer::SourceBuffer;
use crate::cancel::CancellationToken;
use crate::config::SelectorConfig;
use crate::error::{Result, SelectorError};
use crate::language::Language;
use crate::scanner::{ScanResult, Scanner};
use crate::selector::{ContextSelector, Walk};
use crate::types::ContextWindow;
use serde::{Deserialize, Serialize};

/// Cursor position inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// Byte offset; `len` itself is valid
    Offset(usize),
    /// 1-indexed line with an optional 0-based byte column
    Line { line: usize, column: Option<usize> },
}

impl Cursor {
    #[must_use]
    pub const fn line(line: usize) -> Self {
        Self::Line { line, column: None }
    }

    /// Resolve to a 0-based line of `buffer`
    pub fn resolve(self, buffer: &SourceBuffer) -> Result<usize> {
        match self {
            Self::Offset(offset) => buffer.position_of(offset).map(|(line, _)| line),
            Self::Line { line, column } => {
                // An empty buffer still has a line 1 to put the cursor on.
                let line_count = buffer.line_count().max(1);
                if line == 0 || line > line_count {
                    return Err(SelectorError::LineOutOfBounds { line, line_count });
                }
                if let Some(column) = column {
                    if !buffer.is_empty() {
                        buffer.offset_of(line - 1, column)?;
                    }
                }
                Ok(line - 1)
            }
        }
    }
}

impl From<usize> for Cursor {
    fn from(offset: usize) -> Self {
        Self::Offset(offset)
    }
}

/// A selected window together with its text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub window: ContextWindow,
    /// Selected lines joined with `\n`
    pub text: String,
    /// 1-indexed line the cursor resolved to
    pub cursor_line: usize,
}

/// Scan and constructs of one buffer, reusable across many cursors
#[derive(Debug, Clone)]
pub struct Analysis {
    buffer: SourceBuffer,
    language: Language,
    scan: ScanResult,
    boundaries: Boundaries,
}

impl Analysis {
    #[must_use]
    pub const fn buffer(&self) -> &SourceBuffer {
        &self.buffer
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    #[must_use]
    pub const fn scan(&self) -> &ScanResult {
        &self.scan
    }

    #[must_use]
    pub const fn boundaries(&self) -> &Boundaries {
        &self.boundaries
    }

    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.scan.is_balanced()
    }

    /// Units the selector would emit for a 0-based line, before budgeting
    #[must_use]
    pub fn walk(&self, line: usize) -> Walk<'_> {
        Walk::new(&self.boundaries, line)
    }

    /// Select a window with `config`, which may differ from the config the
    /// analysis was built with except for its language
    pub fn select(&self, cursor: Cursor, config: &SelectorConfig) -> Result<Selection> {
        config.validate().map_err(SelectorError::invalid_config)?;
        let line = cursor.resolve(&self.buffer)?;
        let window =
            ContextSelector::new(&self.buffer, &self.scan, &self.boundaries, config).select(line);
        let text = window.render(&self.buffer);
        Ok(Selection {
            window,
            text,
            cursor_line: line + 1,
        })
    }
}

/// Main entry point: analyse a buffer and select context around a cursor
#[derive(Debug, Clone)]
pub struct ContextEngine {
    config: SelectorConfig,
}

impl ContextEngine {
    /// Create a new engine with configuration
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid; use [`ContextEngine::try_new`]
    /// for untrusted input.
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        match Self::try_new(config) {
            Ok(engine) => engine,
            Err(err) => panic!("Invalid selector configuration provided: {err}"),
        }
    }

    pub fn try_new(config: SelectorConfig) -> Result<Self> {
        config.validate().map_err(SelectorError::invalid_config)?;
        config.language.ensure_supported()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Scan and classify a buffer once
    pub fn analyze(&self, buffer: &SourceBuffer) -> Result<Analysis> {
        self.analyze_inner(buffer, None)
    }

    pub fn analyze_with_cancel(
        &self,
        buffer: &SourceBuffer,
        cancel: &CancellationToken,
    ) -> Result<Analysis> {
        self.analyze_inner(buffer, Some(cancel))
    }

    /// Select context from a string
    pub fn select_str(&self, text: &str, cursor: Cursor) -> Result<Selection> {
        self.select_buffer(&SourceBuffer::new(text), cursor)
    }

    pub fn select_buffer(&self, buffer: &SourceBuffer, cursor: Cursor) -> Result<Selection> {
        // Reject bad cursors before paying for a scan.
        cursor.resolve(buffer)?;
        self.analyze(buffer)?.select(cursor, &self.config)
    }

    /// Select context, abandoning the work once `cancel` fires
    pub fn select_with_cancel(
        &self,
        buffer: &SourceBuffer,
        cursor: Cursor,
        cancel: &CancellationToken,
    ) -> Result<Selection> {
        cursor.resolve(buffer)?;
        let analysis = self.analyze_with_cancel(buffer, cancel)?;
        if cancel.is_cancelled() {
            return Err(SelectorError::Cancelled);
        }
        analysis.select(cursor, &self.config)
    }

    fn analyze_inner(
        &self,
        buffer: &SourceBuffer,
        cancel: Option<&CancellationToken>,
    ) -> Result<Analysis> {
        let language = self.config.language;
        let scan = Scanner::new(language).scan(buffer, cancel)?;
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(SelectorError::Cancelled);
        }
        let boundaries = BoundaryDetector::new(language).detect(buffer, &scan);
        log::debug!(
            "analysed {} lines of {}: {} tokens, {} constructs, balanced={}",
            buffer.line_count(),
            language.as_str(),
            scan.tokens.len(),
            boundaries.len(),
            scan.is_balanced()
        );
        Ok(Analysis {
            buffer: buffer.clone(),
            language,
            scan,
            boundaries,
        })
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self {
            config: SelectorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ConstructKind;
    use crate::types::{Degradation, FallbackReason};
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"package main

func (r *rect) area(a int,
	b int) int {
	return r.width * r.height
}

func main() {
	fmt.Println("hi")
}
"#;

    fn go_engine() -> ContextEngine {
        ContextEngine::new(SelectorConfig::for_language(Language::Go))
    }

    #[test]
    fn test_select_str_by_offset() {
        let offset = SAMPLE.find("return").unwrap();
        let selection = go_engine().select_str(SAMPLE, Cursor::Offset(offset)).unwrap();
        assert_eq!(selection.cursor_line, 5);
        assert_eq!(
            selection.text,
            "func (r *rect) area(a int,\n\tb int) int {\n\treturn r.width * r.height\n}"
        );
        assert!(selection.window.is_clean());
    }

    #[test]
    fn test_select_by_line() {
        let selection = go_engine().select_str(SAMPLE, Cursor::line(9)).unwrap();
        assert_eq!(selection.window.lines().collect::<Vec<_>>(), vec![8, 9, 10]);

        let selection = go_engine()
            .select_str(SAMPLE, Cursor::Line { line: 9, column: Some(3) })
            .unwrap();
        assert_eq!(selection.cursor_line, 9);
    }

    #[test]
    fn test_cursor_errors() {
        let engine = go_engine();
        let err = engine
            .select_str("abc", Cursor::Offset(4))
            .unwrap_err();
        assert!(matches!(err, SelectorError::CursorOutOfBounds { offset: 4, len: 3 }));

        let err = engine.select_str("abc", Cursor::line(2)).unwrap_err();
        assert!(matches!(err, SelectorError::LineOutOfBounds { line: 2, line_count: 1 }));
        assert_eq!(err.code(), "cursor_out_of_bounds");

        assert!(engine.select_str("abc", Cursor::Offset(3)).is_ok());
    }

    #[test]
    fn test_empty_buffer() {
        let selection = go_engine().select_str("", Cursor::Offset(0)).unwrap();
        assert!(selection.window.is_empty());
        assert!(selection.window.is_clean());
        assert_eq!(selection.text, "");

        assert!(go_engine().select_str("", Cursor::line(1)).is_ok());
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let err = ContextEngine::try_new(SelectorConfig::default().with_max_lines(0)).unwrap_err();
        assert!(matches!(err, SelectorError::InvalidConfig(_)));

        let err = ContextEngine::try_new(SelectorConfig::for_language(Language::Python)).unwrap_err();
        assert!(matches!(err, SelectorError::UnsupportedLanguage(_)));
    }

    #[test]
    #[should_panic(expected = "Invalid selector configuration")]
    fn test_new_panics_on_invalid_config() {
        let _ = ContextEngine::new(SelectorConfig::default().with_max_lines(0));
    }

    #[test]
    fn test_analysis_reused_across_cursors() {
        let engine = go_engine();
        let analysis = engine.analyze(&SourceBuffer::new(SAMPLE)).unwrap();
        assert!(analysis.is_balanced());
        assert_eq!(
            analysis
                .boundaries()
                .constructs()
                .iter()
                .map(|c| c.kind)
                .collect::<Vec<_>>(),
            vec![ConstructKind::Signature, ConstructKind::Signature]
        );

        let tight = SelectorConfig::for_language(Language::Go).with_max_lines(1);
        let first = analysis.select(Cursor::line(5), engine.config()).unwrap();
        let second = analysis.select(Cursor::line(5), &tight).unwrap();
        assert_eq!(first.window.line_count, 4);
        assert_eq!(second.window.lines().collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn test_cancelled_selection() {
        let token = CancellationToken::new();
        token.cancel();
        let err = go_engine()
            .select_with_cancel(&SourceBuffer::new(SAMPLE), Cursor::Offset(0), &token)
            .unwrap_err();
        assert!(matches!(err, SelectorError::Cancelled));

        let live = CancellationToken::new();
        assert!(go_engine()
            .select_with_cancel(&SourceBuffer::new(SAMPLE), Cursor::Offset(0), &live)
            .is_ok());
    }

    #[test]
    fn test_unbalanced_reports_fallback() {
        let source = "func f() {\n  if x {\n    y()\n";
        let selection = go_engine().select_str(source, Cursor::line(3)).unwrap();
        assert_eq!(
            selection.window.degradation,
            Degradation::FallbackWindow {
                reason: FallbackReason::UnbalancedStructure { line: 1 }
            }
        );
        assert_eq!(selection.window.lines().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
