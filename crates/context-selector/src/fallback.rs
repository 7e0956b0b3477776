use crate::buffer::SourceBuffer;
use crate::types::{ContextWindow, Degradation, FallbackReason, LineRange};

/// Fixed window of at most `max_lines` lines around `cursor_line`.
///
/// Half the budget goes before the cursor and the rest after it; whatever
/// runs off either end of the buffer is clipped, not shifted.
#[must_use]
pub fn fixed_window(
    buffer: &SourceBuffer,
    cursor_line: usize,
    max_lines: usize,
    reason: FallbackReason,
) -> ContextWindow {
    let degradation = Degradation::FallbackWindow { reason };
    if buffer.line_count() == 0 || max_lines == 0 {
        return ContextWindow {
            degradation,
            ..ContextWindow::default()
        };
    }

    let last_line = buffer.line_count() - 1;
    let cursor_line = cursor_line.min(last_line);
    let before = max_lines / 2;
    let after = max_lines - 1 - before;
    let range = LineRange::new(
        cursor_line.saturating_sub(before),
        (cursor_line + after).min(last_line),
    );
    ContextWindow::from_ranges(buffer, [range], degradation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn create_test_content(lines: usize) -> SourceBuffer {
        let lines: Vec<String> = (0..lines).map(|i| format!("line_{i}()")).collect();
        SourceBuffer::new(lines.join("\n"))
    }

    const REASON: FallbackReason = FallbackReason::UnbalancedStructure { line: 1 };

    #[test]
    fn test_window_centred_on_cursor() {
        let buffer = create_test_content(100);
        let window = fixed_window(&buffer, 50, 10, REASON);
        assert_eq!(window.lines().collect::<Vec<_>>(), (46..=55).collect::<Vec<_>>());
        assert_eq!(window.line_count, 10);
        assert!(!window.is_clean());
    }

    #[test]
    fn test_window_clipped_at_edges() {
        let buffer = create_test_content(20);

        let head = fixed_window(&buffer, 1, 10, REASON);
        assert_eq!(head.lines().collect::<Vec<_>>(), (1..=6).collect::<Vec<_>>());

        let tail = fixed_window(&buffer, 19, 10, REASON);
        assert_eq!(tail.lines().collect::<Vec<_>>(), (15..=20).collect::<Vec<_>>());
    }

    #[test]
    fn test_single_line_budget() {
        let buffer = create_test_content(5);
        let window = fixed_window(&buffer, 3, 1, REASON);
        assert_eq!(window.lines().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_empty_buffer() {
        let window = fixed_window(&SourceBuffer::new(""), 0, 10, REASON);
        assert!(window.is_empty());
        assert_eq!(window.degradation.as_str(), "fallback_window");
    }
}
