use std::path::PathBuf;
use thiserror::Error;

/// Result type for selector operations
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Errors that can occur while selecting context
#[derive(Error, Debug)]
pub enum SelectorError {
    /// Cursor byte offset lies past the end of the buffer
    #[error("Cursor out of bounds: offset {offset} exceeds buffer length {len}")]
    CursorOutOfBounds { offset: usize, len: usize },

    /// Cursor line lies past the last line of the buffer (1-indexed)
    #[error("Cursor line {line} out of bounds: buffer has {line_count} lines")]
    LineOutOfBounds { line: usize, line_count: usize },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unsupported language
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The caller abandoned the request before it finished
    #[error("Selection cancelled")]
    Cancelled,

    /// Configuration file could not be read
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::SelectorConfig`]
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl SelectorError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an unsupported language error
    pub fn unsupported_language(lang: impl Into<String>) -> Self {
        Self::UnsupportedLanguage(lang.into())
    }

    /// Stable machine-readable code, used in wire error envelopes
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CursorOutOfBounds { .. } | Self::LineOutOfBounds { .. } => "cursor_out_of_bounds",
            Self::InvalidConfig(_) | Self::ConfigIo { .. } | Self::ConfigParse(_) => {
                "invalid_config"
            }
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SelectorError::CursorOutOfBounds { offset: 10, len: 3 };
        assert_eq!(err.code(), "cursor_out_of_bounds");
        assert_eq!(
            err.to_string(),
            "Cursor out of bounds: offset 10 exceeds buffer length 3"
        );

        assert_eq!(SelectorError::invalid_config("x").code(), "invalid_config");
        assert_eq!(SelectorError::Cancelled.code(), "cancelled");
        assert_eq!(
            SelectorError::unsupported_language("python").to_string(),
            "Unsupported language: python"
        );
    }
}
