use crate::error::{Result, SelectorError};
use crate::token::Keyword;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Supported programming language
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Rust,
    C,
    Cpp,
    Java,
    JavaScript,
    TypeScript,
    CSharp,
    Swift,
    Kotlin,
    Ruby,
    Python,
    #[default]
    Unknown,
}

/// How a language delimits nested blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxFamily {
    /// `{ … }` bodies, `//` and `/* */` comments
    Braces,
    /// `def … end` bodies, `#` comments
    Keywords,
    /// Indentation-delimited; not supported by the scanner
    Indentation,
}

/// Treatment of `'` in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingleQuote {
    /// `'…'` is a string literal ending at the closing quote or end of line
    String,
    /// `'x'` is a character literal; a lone `'` (lifetime, label) is plain text
    CharLiteral,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "go" => Language::Go,
            "rs" => Language::Rust,
            "c" | "h" => Language::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Language::Cpp,
            "java" => Language::Java,
            "js" | "mjs" | "cjs" | "jsx" => Language::JavaScript,
            "ts" | "tsx" => Language::TypeScript,
            "cs" => Language::CSharp,
            "swift" => Language::Swift,
            "kt" | "kts" => Language::Kotlin,
            "rb" | "rake" | "gemspec" => Language::Ruby,
            "py" | "pyw" => Language::Python,
            _ => Language::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Language::Unknown)
    }

    /// Get language name as string
    pub fn as_str(self) -> &'static str {
        match self {
            Language::Go => "go",
            Language::Rust => "rust",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::CSharp => "csharp",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Ruby => "ruby",
            Language::Python => "python",
            Language::Unknown => "unknown",
        }
    }

    pub fn family(self) -> SyntaxFamily {
        match self {
            Language::Ruby => SyntaxFamily::Keywords,
            Language::Python => SyntaxFamily::Indentation,
            _ => SyntaxFamily::Braces,
        }
    }

    /// Check if the scanner can track structure for this language
    pub fn supports_structure(self) -> bool {
        self.family() != SyntaxFamily::Indentation
    }

    /// Fail with `UnsupportedLanguage` unless structure can be tracked
    pub fn ensure_supported(self) -> Result<()> {
        if self.supports_structure() {
            Ok(())
        } else {
            Err(SelectorError::unsupported_language(self.as_str()))
        }
    }

    /// Line comment introducer
    pub fn line_comment(self) -> &'static str {
        match self.family() {
            SyntaxFamily::Keywords | SyntaxFamily::Indentation => "#",
            SyntaxFamily::Braces => "//",
        }
    }

    /// Block comment delimiters. Keyword-family block comments only open at
    /// the start of a line.
    pub fn block_comment(self) -> Option<(&'static str, &'static str)> {
        match self.family() {
            SyntaxFamily::Braces => Some(("/*", "*/")),
            SyntaxFamily::Keywords => Some(("=begin", "=end")),
            SyntaxFamily::Indentation => None,
        }
    }

    pub fn single_quote(self) -> SingleQuote {
        match self {
            Language::Rust | Language::C | Language::Cpp | Language::Java | Language::CSharp => {
                SingleQuote::CharLiteral
            }
            Language::Go | Language::Kotlin => SingleQuote::CharLiteral,
            _ => SingleQuote::String,
        }
    }

    /// Whether backtick literals may span several lines
    pub fn multiline_backticks(self) -> bool {
        matches!(
            self,
            Language::Go | Language::JavaScript | Language::TypeScript | Language::Unknown
        )
    }

    /// Whether a line starting with `#` is a preprocessor directive
    pub fn preprocessor_directives(self) -> bool {
        matches!(self, Language::C | Language::Cpp | Language::CSharp)
    }

    /// Whether `?` and `!` may end an identifier (`empty?`, `save!`)
    pub fn predicate_identifiers(self) -> bool {
        self == Language::Ruby
    }

    /// Classify a word as a keyword of this language
    pub fn keyword(self, word: &str) -> Option<Keyword> {
        match self.family() {
            SyntaxFamily::Braces => brace_keyword(word),
            SyntaxFamily::Keywords => ruby_keyword(word),
            SyntaxFamily::Indentation => None,
        }
    }
}

fn brace_keyword(word: &str) -> Option<Keyword> {
    let kw = match word {
        "func" | "fn" | "function" | "fun" => Keyword::Func,
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "for" => Keyword::For,
        "while" | "loop" => Keyword::While,
        "do" => Keyword::Do,
        "switch" => Keyword::Switch,
        "select" => Keyword::Select,
        "match" => Keyword::Match,
        "case" => Keyword::Case,
        "default" => Keyword::Default,
        "var" => Keyword::Var,
        "const" => Keyword::Const,
        "let" => Keyword::Let,
        "type" => Keyword::Type,
        "import" => Keyword::Import,
        "try" => Keyword::Begin,
        "catch" => Keyword::Rescue,
        "finally" => Keyword::Ensure,
        "mod" | "namespace" => Keyword::Module,
        "struct" => Keyword::Struct,
        "interface" => Keyword::Interface,
        "class" => Keyword::Class,
        "enum" => Keyword::Enum,
        "trait" => Keyword::Trait,
        "impl" => Keyword::Impl,
        "return" => Keyword::Return,
        _ => return None,
    };
    Some(kw)
}

fn ruby_keyword(word: &str) -> Option<Keyword> {
    let kw = match word {
        "def" => Keyword::Func,
        "class" => Keyword::Class,
        "module" => Keyword::Module,
        "if" => Keyword::If,
        "unless" => Keyword::Unless,
        "elsif" => Keyword::Elsif,
        "else" => Keyword::Else,
        "while" => Keyword::While,
        "until" => Keyword::Until,
        "for" => Keyword::For,
        "case" => Keyword::Case,
        "when" => Keyword::When,
        "in" => Keyword::In,
        "begin" => Keyword::Begin,
        "rescue" => Keyword::Rescue,
        "ensure" => Keyword::Ensure,
        "do" => Keyword::Do,
        "end" => Keyword::End,
        "return" => Keyword::Return,
        _ => return None,
    };
    Some(kw)
}
