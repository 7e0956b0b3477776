//! Wire-level entry points over [`ContextEngine`].

use crate::config::SelectorConfig;
use crate::engine::{ContextEngine, Cursor, Selection};
use crate::error::{Result, SelectorError};
use crate::language::Language;
use crate::types::{Degradation, FallbackReason};
use context_protocol::{
    CursorPosition, DegradationStatus, ErrorEnvelope, ResponseMeta, ResponseSpan,
    ResponseStatus, SelectionRequest, SelectionResponse, SCHEMA_VERSION,
};

/// Handle a decoded request. Failures come back as an error response.
#[must_use]
pub fn handle(request: &SelectionRequest) -> SelectionResponse {
    match run(request) {
        Ok((selection, language)) => into_response(selection, language),
        Err(err) => {
            log::debug!("selection request failed: {err}");
            SelectionResponse::error(error_envelope(&err))
        }
    }
}

/// Handle a raw JSON request and return the JSON response
#[must_use]
pub fn handle_json(raw: &str) -> String {
    let response = match context_protocol::parse_request(raw) {
        Ok(request) => handle(&request),
        Err(err) => SelectionResponse::error(
            ErrorEnvelope::new("malformed_request", format!("{err:#}"))
                .with_hint("expected {\"text\": string, \"cursor\": {\"offset\": n} | {\"line\": n}}"),
        ),
    };
    match context_protocol::serialize_json(&response) {
        Ok(json) => json,
        Err(err) => {
            log::warn!("failed to serialize selection response: {err}");
            internal_error_json(&err.to_string())
        }
    }
}

fn internal_error_json(message: &str) -> String {
    serde_json::json!({
        "status": "error",
        "error": { "code": "internal", "message": message },
    })
    .to_string()
}

/// Map a selector error to its wire envelope
#[must_use]
pub fn error_envelope(err: &SelectorError) -> ErrorEnvelope {
    let envelope = ErrorEnvelope::new(err.code(), err.to_string());
    match err {
        SelectorError::CursorOutOfBounds { offset, len } => envelope
            .with_details(serde_json::json!({ "offset": offset, "len": len }))
            .with_hint("cursor offset must be within 0..=len(text)"),
        SelectorError::LineOutOfBounds { line, line_count } => envelope
            .with_details(serde_json::json!({ "line": line, "line_count": line_count }))
            .with_hint("lines are 1-indexed"),
        SelectorError::InvalidConfig(_) => envelope.with_hint("max_lines must be at least 1"),
        SelectorError::UnsupportedLanguage(_) => {
            envelope.with_hint("omit language to scan with brace rules")
        }
        _ => envelope,
    }
}

fn run(request: &SelectionRequest) -> Result<(Selection, Language)> {
    let language = request_language(request)?;
    let defaults = SelectorConfig::default();
    let config = SelectorConfig {
        max_lines: request.max_lines.unwrap_or(defaults.max_lines),
        include_blank_runs: request
            .include_blank_runs
            .unwrap_or(defaults.include_blank_runs),
        language,
    };
    let engine = ContextEngine::try_new(config)?;
    let selection = engine.select_str(&request.text, cursor_from_wire(request.cursor))?;
    Ok((selection, language))
}

fn request_language(request: &SelectionRequest) -> Result<Language> {
    if let Some(name) = request.language.as_deref() {
        return parse_language(name);
    }
    Ok(request
        .path
        .as_deref()
        .map_or(Language::Unknown, Language::from_path))
}

fn parse_language(name: &str) -> Result<Language> {
    let quoted = serde_json::Value::String(name.to_ascii_lowercase());
    serde_json::from_value(quoted).map_err(|_| SelectorError::unsupported_language(name))
}

const fn cursor_from_wire(cursor: CursorPosition) -> Cursor {
    match cursor {
        CursorPosition::Offset { offset } => Cursor::Offset(offset),
        CursorPosition::Line { line, column } => Cursor::Line { line, column },
    }
}

fn into_response(selection: Selection, language: Language) -> SelectionResponse {
    let window = selection.window;
    let (degradation, fallback_reason) = match window.degradation {
        Degradation::Clean => (DegradationStatus::Clean, None),
        Degradation::FallbackWindow { reason } => {
            (DegradationStatus::FallbackWindow, Some(reason_to_wire(reason)))
        }
    };
    SelectionResponse {
        status: ResponseStatus::Ok,
        error: None,
        spans: window
            .spans
            .iter()
            .map(|span| ResponseSpan {
                start_line: span.start_line,
                start_column: span.start_column,
                end_line: span.end_line,
                end_column: span.end_column,
            })
            .collect(),
        text: selection.text,
        line_count: window.line_count,
        degradation: Some(degradation),
        fallback_reason,
        meta: ResponseMeta {
            schema_version: SCHEMA_VERSION,
            cursor_line: Some(selection.cursor_line),
            language: Some(language.as_str().to_string()),
        },
    }
}

const fn reason_to_wire(reason: FallbackReason) -> context_protocol::FallbackReason {
    match reason {
        FallbackReason::UnbalancedStructure { line } => {
            context_protocol::FallbackReason::UnbalancedStructure { line }
        }
        FallbackReason::OversizedConstruct {
            start_line,
            end_line,
        } => context_protocol::FallbackReason::OversizedConstruct {
            start_line,
            end_line,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn handle_value(request: Value) -> Value {
        serde_json::from_str(&handle_json(&request.to_string())).unwrap()
    }

    #[test]
    fn test_handle_json_selects_signature() {
        let response = handle_value(json!({
            "text": "func f(a int,\n  b int) {\n  use(a, b)\n}\n\nfunc g() {}\n",
            "cursor": { "line": 3 },
            "path": "main.go"
        }));
        assert_eq!(response["status"], "ok");
        assert_eq!(response["degradation"], "clean");
        assert_eq!(response["line_count"], 4);
        assert_eq!(
            response["spans"],
            json!([{ "start_line": 1, "start_column": 0, "end_line": 4, "end_column": 1 }])
        );
        assert_eq!(response["meta"]["language"], "go");
        assert_eq!(response["meta"]["cursor_line"], 3);
        assert!(response.get("fallback_reason").is_none());
    }

    #[test]
    fn test_fallback_reason_reported() {
        let response = handle_value(json!({
            "text": "func f() {\n  x := 1\n",
            "cursor": { "offset": 12 },
            "language": "Go",
            "max_lines": 4
        }));
        assert_eq!(response["degradation"], "fallback_window");
        assert_eq!(
            response["fallback_reason"],
            json!({ "kind": "unbalanced_structure", "line": 1 })
        );
    }

    #[test]
    fn test_errors_become_envelopes() {
        let response = handle_value(json!({ "text": "abc", "cursor": { "offset": 10 } }));
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], "cursor_out_of_bounds");
        assert_eq!(response["error"]["details"], json!({ "offset": 10, "len": 3 }));

        let response = handle_value(json!({ "text": "abc", "cursor": { "offset": 0 }, "max_lines": 0 }));
        assert_eq!(response["error"]["code"], "invalid_config");

        let response =
            handle_value(json!({ "text": "abc", "cursor": { "offset": 0 }, "language": "cobol" }));
        assert_eq!(response["error"]["code"], "unsupported_language");

        let response =
            handle_value(json!({ "text": "abc", "cursor": { "offset": 0 }, "language": "python" }));
        assert_eq!(response["error"]["code"], "unsupported_language");
    }

    #[test]
    fn test_malformed_request() {
        let response: Value =
            serde_json::from_str(&handle_json(r#"{"text":"x","cursor":{"offset":-3}}"#)).unwrap();
        assert_eq!(response["status"], "error");
        assert_eq!(response["error"]["code"], "malformed_request");
        assert!(response["error"]["hint"].is_string());
    }

    #[test]
    fn test_internal_error_json_escapes_message() {
        let raw = internal_error_json(r#"key "a\b" must be a string"#);
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "internal");
        assert_eq!(value["error"]["message"], r#"key "a\b" must be a string"#);
    }

    #[test]
    fn test_handle_typed_request() {
        let request = SelectionRequest {
            text: "x := 1\n".to_string(),
            cursor: CursorPosition::Offset { offset: 0 },
            max_lines: None,
            include_blank_runs: None,
            language: None,
            path: None,
        };
        let response = handle(&request);
        assert!(!response.is_error());
        assert_eq!(response.text, "x := 1");
        assert_eq!(response.meta.language.as_deref(), Some("unknown"));
    }
}
