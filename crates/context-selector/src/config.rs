use crate::error::{Result, SelectorError};
use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for context selection.
///
/// Immutable per request; construct one and share it between selections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Upper bound on the number of lines in a window (hard limit)
    pub max_lines: usize,

    /// Keep blank lines at the edges of selected constructs
    pub include_blank_runs: bool,

    /// Language of the buffer. `Unknown` is scanned with brace rules.
    pub language: Language,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_lines: 60,
            include_blank_runs: false,
            language: Language::Unknown,
        }
    }
}

impl SelectorConfig {
    /// Create config for a specific language with default limits
    #[must_use]
    pub fn for_language(language: Language) -> Self {
        Self {
            language,
            ..Default::default()
        }
    }

    /// Create config for inline completion (tight window around the cursor)
    #[must_use]
    pub fn for_completion() -> Self {
        Self {
            max_lines: 40,
            ..Default::default()
        }
    }

    /// Create config for small prompts
    #[must_use]
    pub fn compact() -> Self {
        Self {
            max_lines: 16,
            ..Default::default()
        }
    }

    /// Create config for long-context models (keeps blank separators)
    #[must_use]
    pub fn generous() -> Self {
        Self {
            max_lines: 400,
            include_blank_runs: true,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    #[must_use]
    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_lines == 0 {
            return Err("max_lines must be > 0".to_string());
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate().map_err(SelectorError::invalid_config)?;
        config.language.ensure_supported()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SelectorError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        log::debug!(
            "loaded selector config from {}: max_lines={}, language={}",
            path.display(),
            config.max_lines,
            config.language.as_str()
        );
        Ok(config)
    }
}
