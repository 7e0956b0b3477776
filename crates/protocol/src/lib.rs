use anyhow::{Context as _, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

/// Where the cursor sits: `{"offset": 120}` or `{"line": 7, "column": 4}`
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(untagged)]
pub enum CursorPosition {
    /// Byte offset into `text`
    Offset { offset: usize },
    /// 1-indexed line, optional 0-based byte column
    Line {
        line: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        column: Option<usize>,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SelectionRequest {
    pub text: String,
    pub cursor: CursorPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_blank_runs: Option<bool>,
    /// Language name (`go`, `ruby`, …); inferred from `path` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// File name used only for language detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DegradationStatus {
    Clean,
    FallbackWindow,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FallbackReason {
    UnbalancedStructure { line: usize },
    OversizedConstruct { start_line: usize, end_line: usize },
}

/// Lines 1-indexed inclusive, columns 0-based bytes with exclusive end
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub struct ResponseSpan {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct ResponseMeta {
    pub schema_version: u32,
    /// 1-indexed line the cursor resolved to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SelectionResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorEnvelope>,
    #[serde(default)]
    pub spans: Vec<ResponseSpan>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub line_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    #[serde(default)]
    pub meta: ResponseMeta,
}

impl SelectionResponse {
    pub fn error(error: ErrorEnvelope) -> Self {
        Self {
            status: ResponseStatus::Error,
            error: Some(error),
            spans: Vec::new(),
            text: String::new(),
            line_count: 0,
            degradation: None,
            fallback_reason: None,
            meta: ResponseMeta {
                schema_version: SCHEMA_VERSION,
                ..ResponseMeta::default()
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, ResponseStatus::Error)
    }
}

pub fn parse_request(raw: &str) -> Result<SelectionRequest> {
    serde_json::from_str(raw).context("malformed selection request")
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// JSON schema of [`SelectionRequest`], for clients that validate up front
pub fn request_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(SelectionRequest)).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cursor_accepts_offset_or_line() {
        let request = parse_request(r#"{"text":"x","cursor":{"offset":1}}"#).unwrap();
        assert_eq!(request.cursor, CursorPosition::Offset { offset: 1 });
        assert_eq!(request.max_lines, None);

        let request =
            parse_request(r#"{"text":"x","cursor":{"line":3,"column":2},"language":"go"}"#)
                .unwrap();
        assert_eq!(
            request.cursor,
            CursorPosition::Line {
                line: 3,
                column: Some(2)
            }
        );
        assert_eq!(request.language.as_deref(), Some("go"));
    }

    #[test]
    fn malformed_requests_fail_to_parse() {
        assert!(parse_request(r#"{"text":"x","cursor":{"offset":-1}}"#).is_err());
        assert!(parse_request(r#"{"cursor":{"offset":0}}"#).is_err());
        let err = parse_request("not json").unwrap_err();
        assert!(err.to_string().contains("malformed selection request"));
    }

    #[test]
    fn error_response_serialization() {
        let response = SelectionResponse::error(
            ErrorEnvelope::new("cancelled", "Selection cancelled").with_hint("retry"),
        );
        let value: serde_json::Value =
            serde_json::from_str(&serialize_json(&response).unwrap()).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"]["code"], "cancelled");
        assert_eq!(value["error"]["hint"], "retry");
        assert!(value.get("degradation").is_none());
        assert!(response.is_error());
    }

    #[test]
    fn fallback_reason_is_tagged() {
        let reason = FallbackReason::OversizedConstruct {
            start_line: 2,
            end_line: 90,
        };
        assert_eq!(
            serde_json::to_value(reason).unwrap(),
            serde_json::json!({"kind": "oversized_construct", "start_line": 2, "end_line": 90})
        );
    }

    #[test]
    fn request_schema_names_fields() {
        let schema = request_schema().unwrap();
        let rendered = schema.to_string();
        assert!(rendered.contains("max_lines"));
        assert!(rendered.contains("cursor"));
    }
}
