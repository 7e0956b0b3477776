use serde::{Deserialize, Serialize};

/// A nesting delimiter tracked by the scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Delimiter {
    Paren,
    Brace,
    Bracket,
    /// Keyword-delimited block (`def … end`, `do … end`)
    Keyword,
}

impl Delimiter {
    #[must_use]
    pub const fn from_open(ch: char) -> Option<Self> {
        match ch {
            '(' => Some(Self::Paren),
            '{' => Some(Self::Brace),
            '[' => Some(Self::Bracket),
            _ => None,
        }
    }

    #[must_use]
    pub const fn from_close(ch: char) -> Option<Self> {
        match ch {
            ')' => Some(Self::Paren),
            '}' => Some(Self::Brace),
            ']' => Some(Self::Bracket),
            _ => None,
        }
    }
}

/// Keywords the boundary detector cares about. Spellings differ per
/// language; see [`crate::Language::keyword`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Func,
    If,
    Else,
    Elsif,
    Unless,
    For,
    While,
    Until,
    Do,
    Switch,
    Select,
    Match,
    Case,
    Default,
    When,
    In,
    Begin,
    Rescue,
    Ensure,
    End,
    Var,
    Const,
    Let,
    Type,
    Import,
    Struct,
    Interface,
    Class,
    Module,
    Enum,
    Trait,
    Impl,
    Return,
}

impl Keyword {
    /// Keywords that start a control statement owning a block
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(
            self,
            Self::If
                | Self::Else
                | Self::Elsif
                | Self::Unless
                | Self::For
                | Self::While
                | Self::Until
                | Self::Do
                | Self::Switch
                | Self::Select
                | Self::Match
                | Self::Case
                | Self::Begin
                | Self::Rescue
                | Self::Ensure
        )
    }

    /// Keywords that continue a preceding block (`else`, `catch`, …)
    #[must_use]
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::Else | Self::Elsif | Self::Rescue | Self::Ensure)
    }

    /// Keywords that introduce a type or namespace body
    #[must_use]
    pub const fn is_type_body(self) -> bool {
        matches!(
            self,
            Self::Type
                | Self::Struct
                | Self::Interface
                | Self::Class
                | Self::Module
                | Self::Enum
                | Self::Trait
                | Self::Impl
        )
    }

    /// Keywords that start a declaration statement
    #[must_use]
    pub const fn is_declaration(self) -> bool {
        matches!(self, Self::Var | Self::Const | Self::Let)
    }
}

/// Operator classes relevant to statement continuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// A lone `:` (case labels, hash keys)
    Colon,
    /// `.`, `?.`, `&.`, `::`
    Access,
    /// `++` / `--`
    Postfix,
    /// `&&` / `||`
    Logical,
    /// `=`, `:=`, `+=`, `||=`, …
    Assign,
    Other,
}

impl Operator {
    #[must_use]
    pub fn classify(text: &str) -> Self {
        match text {
            ":" => Self::Colon,
            "." | "?." | "&." | "::" => Self::Access,
            "++" | "--" => Self::Postfix,
            "&&" | "||" => Self::Logical,
            "==" | "!=" | "<=" | ">=" | "===" | "!==" | "=>" | "=~" => Self::Other,
            t if t.ends_with('=') => Self::Assign,
            _ => Self::Other,
        }
    }

    /// Whether a line ending with this operator continues on the next line
    #[must_use]
    pub const fn continues_line(self) -> bool {
        !matches!(self, Self::Colon | Self::Postfix)
    }

    /// Whether a line starting with this operator continues the previous one
    #[must_use]
    pub const fn continues_previous(self) -> bool {
        matches!(self, Self::Access | Self::Logical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    Open(Delimiter),
    Close(Delimiter),
    Keyword(Keyword),
    Identifier,
    /// String, character or numeric literal
    Literal,
    Operator(Operator),
    Comma,
    Semicolon,
    Comment,
    /// Placeholder emitted once for each whitespace-only line
    Blank,
}

impl TokenKind {
    /// Tokens that carry code (not comments or blank placeholders)
    #[must_use]
    pub const fn is_code(self) -> bool {
        !matches!(self, Self::Comment | Self::Blank)
    }
}

/// A scanned token. `line` and `column` are 0-based; `offset` is the byte
/// offset of the token in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub len: usize,
    /// Bracket depth once this token has been applied
    pub depth_after: usize,
}

impl Token {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.offset..self.offset + self.len).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_classes() {
        assert_eq!(Operator::classify(":"), Operator::Colon);
        assert_eq!(Operator::classify(":="), Operator::Assign);
        assert_eq!(Operator::classify("+="), Operator::Assign);
        assert_eq!(Operator::classify("=="), Operator::Other);
        assert_eq!(Operator::classify("++"), Operator::Postfix);
        assert_eq!(Operator::classify("&."), Operator::Access);
        assert_eq!(Operator::classify("||"), Operator::Logical);
    }

    #[test]
    fn test_continuation_rules() {
        assert!(Operator::Assign.continues_line());
        assert!(Operator::Other.continues_line());
        assert!(!Operator::Colon.continues_line());
        assert!(!Operator::Postfix.continues_line());
        assert!(Operator::Access.continues_previous());
        assert!(!Operator::Other.continues_previous());
    }

    #[test]
    fn test_keyword_groups() {
        assert!(Keyword::Switch.is_control());
        assert!(!Keyword::Func.is_control());
        assert!(Keyword::Rescue.is_branch());
        assert!(!Keyword::If.is_branch());
        assert!(Keyword::Class.is_type_body());
        assert!(Keyword::Var.is_declaration());
        assert!(!Keyword::Type.is_declaration());
    }

    #[test]
    fn test_token_text() {
        let source = "func main() {}";
        let token = Token {
            kind: TokenKind::Identifier,
            line: 0,
            column: 5,
            offset: 5,
            len: 4,
            depth_after: 0,
        };
        assert_eq!(token.text(source), "main");
    }
}
