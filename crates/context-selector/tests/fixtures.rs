//! Annotated source fixtures.
//!
//! Each file is split into cases at `{{TEST}}` lines. Within a case, lines
//! tagged `{{CONTEXT}}` must be in the selected window, the `{{CURSOR}}`
//! line is where the cursor sits, and every other line must be left out.
//! Marker comments are removed before the case is handed to the engine.

use context_selector::{ContextEngine, Cursor, Language, SelectorConfig};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

const GO_FIXTURE: &str = include_str!("fixtures/selection.go");
const RUBY_FIXTURE: &str = include_str!("fixtures/selection.rb");

const TEST_MARKER: &str = "{{TEST}}";
const CONTEXT_MARKER: &str = "{{CONTEXT}}";
const CURSOR_MARKER: &str = "{{CURSOR}}";

#[derive(Debug)]
struct FixtureCase {
    /// 1-indexed line of the `{{TEST}}` marker in the fixture file
    marker_line: usize,
    text: String,
    cursor_line: usize,
    expected: BTreeSet<usize>,
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn strip_marker<'a>(line: &'a str, comment: &str) -> &'a str {
    let Some(marker) = line.find("{{") else {
        return line;
    };
    let cut = line[..marker].rfind(comment).unwrap_or(marker);
    line[..cut].trim_end()
}

fn parse_cases(source: &str, comment: &str) -> Vec<FixtureCase> {
    let mut cases = Vec::new();
    let mut current: Option<(usize, Vec<&str>, Option<usize>, BTreeSet<usize>)> = None;

    for (idx, raw) in source.lines().enumerate() {
        if raw.contains(TEST_MARKER) {
            cases.extend(current.take());
            current = Some((idx + 1, Vec::new(), None, BTreeSet::new()));
            continue;
        }
        let Some((_, lines, cursor, expected)) = current.as_mut() else {
            continue;
        };
        let line_no = lines.len() + 1;
        if raw.contains(CONTEXT_MARKER) {
            expected.insert(line_no);
        }
        if raw.contains(CURSOR_MARKER) {
            assert!(cursor.is_none(), "two cursors in case ending at line {}", idx + 1);
            *cursor = Some(line_no);
        }
        lines.push(strip_marker(raw, comment));
    }
    cases.extend(current);

    cases
        .into_iter()
        .map(|(marker_line, lines, cursor, mut expected)| {
            let cursor_line =
                cursor.unwrap_or_else(|| panic!("case at line {marker_line} has no cursor"));
            expected.insert(cursor_line);
            FixtureCase {
                marker_line,
                text: lines.join("\n"),
                cursor_line,
                expected,
            }
        })
        .collect()
}

fn verify_fixture(source: &str, language: Language) -> usize {
    init_logging();
    let engine = ContextEngine::new(SelectorConfig::for_language(language));
    let cases = parse_cases(source, language.line_comment());

    for case in &cases {
        let selection = engine
            .select_str(&case.text, Cursor::line(case.cursor_line))
            .unwrap_or_else(|err| panic!("case at line {}: {err}", case.marker_line));

        assert!(
            selection.window.is_clean(),
            "case at line {} degraded: {:?}",
            case.marker_line,
            selection.window.degradation
        );
        let actual: BTreeSet<usize> = selection.window.lines().collect();
        assert_eq!(
            actual, case.expected,
            "case at line {} selected the wrong lines",
            case.marker_line
        );
        assert!(!selection.text.contains("{{"));
    }

    cases.len()
}

#[test]
fn test_go_fixture() {
    assert_eq!(verify_fixture(GO_FIXTURE, Language::Go), 9);
}

#[test]
fn test_ruby_fixture() {
    assert_eq!(verify_fixture(RUBY_FIXTURE, Language::Ruby), 4);
}

#[test]
fn test_markers_are_stripped() {
    assert_eq!(strip_marker("  x := 1 // {{CONTEXT}}", "//"), "  x := 1");
    assert_eq!(strip_marker("    // {{CURSOR}}", "//"), "");
    assert_eq!(strip_marker("end # {{CONTEXT}}", "#"), "end");
    assert_eq!(strip_marker("plain line", "#"), "plain line");
}

#[test]
fn test_fixture_parsing() {
    let source = "header\n// {{TEST}}\nfunc f() { // {{CONTEXT}}\n  x // {{CURSOR}}\n}\n";
    let cases = parse_cases(source, "//");
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].marker_line, 2);
    assert_eq!(cases[0].text, "func f() {\n  x\n}");
    assert_eq!(cases[0].cursor_line, 2);
    assert_eq!(cases[0].expected, BTreeSet::from([1, 2]));
}
