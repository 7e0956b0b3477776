use crate::buffer::SourceBuffer;
use crate::cancel::CancellationToken;
use crate::error::{Result, SelectorError};
use crate::language::{Language, SingleQuote, SyntaxFamily};
use crate::token::{Delimiter, Keyword, Operator, Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Classification of a physical line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineClass {
    Code,
    Blank,
    /// Only comments (or the inside of a block comment)
    Comment,
}

/// Per-line scan facts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInfo {
    pub depth_start: usize,
    pub depth_end: usize,
    pub class: LineClass,
    /// Indices into [`ScanResult::tokens`]
    pub tokens: Range<usize>,
    /// An [`UnbalancedStructure`] marker was recorded on this line
    pub unbalanced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnbalancedKind {
    /// Closer with no opener on the stack; ignored
    UnmatchedCloser,
    /// Closer whose opener is buried under other openers; those are closed implicitly
    MismatchedCloser,
    /// Opener still open at end of input
    Unclosed,
}

/// Bracket depth inconsistency found while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbalancedStructure {
    /// 0-based line of the offending delimiter
    pub line: usize,
    pub kind: UnbalancedKind,
    pub delimiter: Delimiter,
}

/// Output of [`Scanner::scan`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub tokens: Vec<Token>,
    pub lines: Vec<LineInfo>,
    pub issues: Vec<UnbalancedStructure>,
}

impl ScanResult {
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.issues.is_empty()
    }

    /// Depth once every line has been scanned
    #[must_use]
    pub fn final_depth(&self) -> usize {
        self.lines.last().map_or(0, |line| line.depth_end)
    }

    #[must_use]
    pub fn line_tokens(&self, line: usize) -> &[Token] {
        self.lines
            .get(line)
            .map_or(&[], |info| &self.tokens[info.tokens.clone()])
    }

    /// Code tokens of a line, skipping comments
    pub fn code_tokens(&self, line: usize) -> impl Iterator<Item = &Token> {
        self.line_tokens(line)
            .iter()
            .filter(|token| token.kind.is_code())
    }

    #[must_use]
    pub fn is_code_line(&self, line: usize) -> bool {
        self.lines
            .get(line)
            .is_some_and(|info| info.class == LineClass::Code)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenDelimiter {
    delimiter: Delimiter,
    line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Carry {
    Code,
    BlockComment,
    /// Multi-line literal closed by this byte
    RawString(u8),
    /// Preprocessor directive continued with a trailing backslash
    Directive,
    /// Heredoc body; the terminator is kept in `ScanState::heredoc`
    Heredoc,
}

/// Line-by-line tokenizer tracking nesting depth
#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    language: Language,
}

impl Scanner {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    #[must_use]
    pub const fn language(&self) -> Language {
        self.language
    }

    /// Scan the whole buffer. Unbalanced delimiters are recorded, never fatal;
    /// the only error is cancellation.
    pub fn scan(
        &self,
        buffer: &SourceBuffer,
        cancel: Option<&CancellationToken>,
    ) -> Result<ScanResult> {
        let mut state = ScanState::new(self.language, buffer.text());

        for line in 0..buffer.line_count() {
            if cancel.is_some_and(CancellationToken::is_cancelled) {
                log::debug!("scan cancelled at line {}", line + 1);
                return Err(SelectorError::Cancelled);
            }
            let Some(range) = buffer.line_range(line) else {
                break;
            };
            state.scan_line(line, range);
        }

        Ok(state.finish())
    }
}

struct ScanState<'a> {
    language: Language,
    source: &'a str,
    stack: Vec<OpenDelimiter>,
    tokens: Vec<Token>,
    lines: Vec<LineInfo>,
    issues: Vec<UnbalancedStructure>,
    carry: Carry,
    heredoc: Option<String>,
    pending_heredoc: Option<String>,
    last_code: Option<TokenKind>,
}

const OPERATOR_CHARS: &[u8] = b"+-*/%&|^!=<>:.?~\\";

impl<'a> ScanState<'a> {
    fn new(language: Language, source: &'a str) -> Self {
        Self {
            language,
            source,
            stack: Vec::new(),
            tokens: Vec::new(),
            lines: Vec::new(),
            issues: Vec::new(),
            carry: Carry::Code,
            heredoc: None,
            pending_heredoc: None,
            last_code: None,
        }
    }

    fn finish(mut self) -> ScanResult {
        for open in std::mem::take(&mut self.stack) {
            self.issues.push(UnbalancedStructure {
                line: open.line,
                kind: UnbalancedKind::Unclosed,
                delimiter: open.delimiter,
            });
            if let Some(info) = self.lines.get_mut(open.line) {
                info.unbalanced = true;
            }
        }
        if !self.issues.is_empty() {
            log::debug!("scan finished with {} unbalanced markers", self.issues.len());
        }
        ScanResult {
            tokens: self.tokens,
            lines: self.lines,
            issues: self.issues,
        }
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn push(&mut self, kind: TokenKind, line: usize, base: usize, start: usize, end: usize) {
        if kind.is_code() {
            self.last_code = Some(kind);
        }
        self.tokens.push(Token {
            kind,
            line,
            column: start,
            offset: base + start,
            len: end - start,
            depth_after: self.stack.len(),
        });
    }

    fn scan_line(&mut self, line: usize, range: Range<usize>) {
        let base = range.start;
        let source = self.source;
        let text = &source[range];
        let bytes = text.as_bytes();
        let depth_start = self.depth();
        let first_token = self.tokens.len();
        let mut unbalanced = false;
        let mut loop_opened = false;
        let mut pos = self.resume_carry(line, base, text);

        while pos < bytes.len() {
            let byte = bytes[pos];
            let rest = &text[pos..];

            if byte == b' ' || byte == b'\t' || byte == b'\r' {
                pos += 1;
            } else if rest.starts_with(self.language.line_comment()) {
                self.push(TokenKind::Comment, line, base, pos, bytes.len());
                pos = bytes.len();
            } else if let Some((open, close)) = self.inline_block_comment() {
                if rest.starts_with(open) {
                    pos = self.block_comment(line, base, text, pos, open.len(), close);
                } else {
                    pos = self.scan_token(line, base, text, pos, &mut unbalanced, &mut loop_opened);
                }
            } else {
                pos = self.scan_token(line, base, text, pos, &mut unbalanced, &mut loop_opened);
            }
        }
        if let Some(terminator) = self.pending_heredoc.take() {
            if self.carry == Carry::Code {
                self.heredoc = Some(terminator);
                self.carry = Carry::Heredoc;
            }
        }

        let tokens = first_token..self.tokens.len();
        let slice = &self.tokens[tokens.clone()];
        let class = if slice.iter().any(|token| token.kind.is_code()) {
            LineClass::Code
        } else if slice.is_empty() {
            LineClass::Blank
        } else {
            LineClass::Comment
        };
        let tokens = if class == LineClass::Blank {
            self.push(TokenKind::Blank, line, base, 0, 0);
            first_token..self.tokens.len()
        } else {
            tokens
        };

        self.lines.push(LineInfo {
            depth_start,
            depth_end: self.depth(),
            class,
            tokens,
            unbalanced,
        });
    }

    /// Block comment delimiters that may open mid-line
    fn inline_block_comment(&self) -> Option<(&'static str, &'static str)> {
        match self.language.family() {
            SyntaxFamily::Braces => self.language.block_comment(),
            _ => None,
        }
    }

    /// Continue a literal or comment left open by the previous line.
    /// Returns the byte position where ordinary scanning resumes.
    fn resume_carry(&mut self, line: usize, base: usize, text: &str) -> usize {
        let len = text.len();
        let nonblank = !text.trim().is_empty();
        match self.carry {
            Carry::Code => {
                if self.language.family() == SyntaxFamily::Keywords && text.starts_with("=begin") {
                    self.carry = Carry::BlockComment;
                    self.push(TokenKind::Comment, line, base, 0, len);
                    return len;
                }
                if self.language.preprocessor_directives() && text.trim_start().starts_with('#') {
                    return self.directive(line, base, text);
                }
                0
            }
            Carry::Heredoc => {
                if self.heredoc.as_deref() == Some(text.trim()) {
                    self.heredoc = None;
                    self.carry = Carry::Code;
                }
                if nonblank {
                    self.push(TokenKind::Literal, line, base, 0, len);
                }
                len
            }
            Carry::Directive => {
                if nonblank {
                    self.directive(line, base, text)
                } else {
                    self.carry = Carry::Code;
                    len
                }
            }
            Carry::BlockComment => match self.language.family() {
                SyntaxFamily::Keywords => {
                    if text.starts_with("=end") {
                        self.carry = Carry::Code;
                    }
                    if nonblank {
                        self.push(TokenKind::Comment, line, base, 0, len);
                    }
                    len
                }
                _ => {
                    let close = self.language.block_comment().map_or("*/", |(_, close)| close);
                    match text.find(close) {
                        Some(idx) => {
                            let end = idx + close.len();
                            self.push(TokenKind::Comment, line, base, 0, end);
                            self.carry = Carry::Code;
                            end
                        }
                        None => {
                            if nonblank {
                                self.push(TokenKind::Comment, line, base, 0, len);
                            }
                            len
                        }
                    }
                }
            },
            Carry::RawString(delim) => match text.bytes().position(|b| b == delim) {
                Some(idx) => {
                    self.push(TokenKind::Literal, line, base, 0, idx + 1);
                    self.carry = Carry::Code;
                    idx + 1
                }
                None => {
                    if nonblank {
                        self.push(TokenKind::Literal, line, base, 0, len);
                    }
                    len
                }
            },
        }
    }

    /// Directive lines carry no structure and read as comments
    fn directive(&mut self, line: usize, base: usize, text: &str) -> usize {
        self.push(TokenKind::Comment, line, base, 0, text.len());
        self.carry = if text.trim_end().ends_with('\\') {
            Carry::Directive
        } else {
            Carry::Code
        };
        text.len()
    }

    fn block_comment(
        &mut self,
        line: usize,
        base: usize,
        text: &str,
        pos: usize,
        open_len: usize,
        close: &str,
    ) -> usize {
        let search_from = pos + open_len;
        match text[search_from..].find(close) {
            Some(idx) => {
                let end = search_from + idx + close.len();
                self.push(TokenKind::Comment, line, base, pos, end);
                end
            }
            None => {
                self.push(TokenKind::Comment, line, base, pos, text.len());
                self.carry = Carry::BlockComment;
                text.len()
            }
        }
    }

    fn scan_token(
        &mut self,
        line: usize,
        base: usize,
        text: &str,
        pos: usize,
        unbalanced: &mut bool,
        loop_opened: &mut bool,
    ) -> usize {
        let bytes = text.as_bytes();
        let byte = bytes[pos];
        let ch = text[pos..].chars().next().unwrap_or(' ');

        if let Some(delimiter) = Delimiter::from_open(ch) {
            self.stack.push(OpenDelimiter { delimiter, line });
            self.push(TokenKind::Open(delimiter), line, base, pos, pos + 1);
            return pos + 1;
        }
        if let Some(delimiter) = Delimiter::from_close(ch) {
            self.close(delimiter, line, unbalanced);
            self.push(TokenKind::Close(delimiter), line, base, pos, pos + 1);
            return pos + 1;
        }

        if self.language.family() == SyntaxFamily::Keywords {
            if let Some(end) = self.ruby_literal(line, text, pos) {
                self.push(TokenKind::Literal, line, base, pos, end);
                return end;
            }
        }

        match byte {
            b',' => {
                self.push(TokenKind::Comma, line, base, pos, pos + 1);
                pos + 1
            }
            b';' => {
                self.push(TokenKind::Semicolon, line, base, pos, pos + 1);
                pos + 1
            }
            b'"' => {
                let end = string_end(bytes, pos, b'"');
                self.push(TokenKind::Literal, line, base, pos, end);
                end
            }
            b'\'' => self.single_quote(line, base, text, pos),
            b'`' => {
                let end = match bytes[pos + 1..].iter().position(|&b| b == b'`') {
                    Some(idx) => pos + idx + 2,
                    None => {
                        if self.language.multiline_backticks() {
                            self.carry = Carry::RawString(b'`');
                        }
                        bytes.len()
                    }
                };
                self.push(TokenKind::Literal, line, base, pos, end);
                end
            }
            b'0'..=b'9' => {
                let end = number_end(bytes, pos);
                self.push(TokenKind::Literal, line, base, pos, end);
                end
            }
            b'@' | b'$' if self.language.family() == SyntaxFamily::Keywords => {
                let end = self.identifier_end(text, pos + 1);
                self.push(TokenKind::Identifier, line, base, pos, end);
                end
            }
            _ if OPERATOR_CHARS.contains(&byte) => {
                let end = self.operator_end(text, pos);
                let op = Operator::classify(&text[pos..end]);
                self.push(TokenKind::Operator(op), line, base, pos, end);
                end
            }
            _ if ch == '_' || ch.is_alphabetic() => {
                let end = self.identifier_end(text, pos);
                self.word(line, base, text, pos, end, unbalanced, loop_opened);
                end
            }
            _ => pos + ch.len_utf8(),
        }
    }

    /// End of a regex literal or heredoc opener starting at `pos`.
    /// A heredoc opener also queues its terminator for the following lines.
    fn ruby_literal(&mut self, line: usize, text: &str, pos: usize) -> Option<usize> {
        let bytes = text.as_bytes();
        match bytes[pos] {
            b'/' if self.operand_expected(line) => regex_end(bytes, pos),
            b'<' if text[pos..].starts_with("<<") => {
                let (terminator, end) = heredoc_opener(text, pos)?;
                self.pending_heredoc = Some(terminator);
                Some(end)
            }
            _ => None,
        }
    }

    /// Whether the previous code token on this line leaves an operand to
    /// come, so that `/` starts a regex rather than a division
    fn operand_expected(&self, line: usize) -> bool {
        match self.tokens.iter().rev().find(|token| token.kind.is_code()) {
            Some(token) if token.line == line => !matches!(
                token.kind,
                TokenKind::Identifier | TokenKind::Literal | TokenKind::Close(_)
            ),
            _ => true,
        }
    }

    fn single_quote(&mut self, line: usize, base: usize, text: &str, pos: usize) -> usize {
        let bytes = text.as_bytes();
        match self.language.single_quote() {
            SingleQuote::String => {
                let end = string_end(bytes, pos, b'\'');
                self.push(TokenKind::Literal, line, base, pos, end);
                end
            }
            SingleQuote::CharLiteral => {
                if let Some(end) = char_literal_end(text, pos) {
                    self.push(TokenKind::Literal, line, base, pos, end);
                    return end;
                }
                // Lifetime or loop label: `'a`
                let end = self.identifier_end(text, pos + 1);
                if end > pos + 1 {
                    self.push(TokenKind::Identifier, line, base, pos, end);
                    end
                } else {
                    self.push(TokenKind::Operator(Operator::Other), line, base, pos, pos + 1);
                    pos + 1
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn word(
        &mut self,
        line: usize,
        base: usize,
        text: &str,
        pos: usize,
        end: usize,
        unbalanced: &mut bool,
        loop_opened: &mut bool,
    ) {
        let after_access = matches!(self.last_code, Some(TokenKind::Operator(Operator::Access)));
        let keyword = if after_access || self.is_label(text, end) {
            None
        } else {
            self.language.keyword(&text[pos..end])
        };
        let Some(keyword) = keyword else {
            self.push(TokenKind::Identifier, line, base, pos, end);
            return;
        };

        if self.language.family() != SyntaxFamily::Keywords {
            self.push(TokenKind::Keyword(keyword), line, base, pos, end);
            return;
        }

        let at_statement_start = self.at_statement_start(line);
        self.push(TokenKind::Keyword(keyword), line, base, pos, end);
        let opens = match keyword {
            Keyword::End => {
                self.close(Delimiter::Keyword, line, unbalanced);
                self.push(TokenKind::Close(Delimiter::Keyword), line, base, end, end);
                return;
            }
            Keyword::Func | Keyword::Class | Keyword::Module | Keyword::Begin | Keyword::Case => true,
            Keyword::Do => !*loop_opened,
            Keyword::If | Keyword::Unless => at_statement_start,
            Keyword::While | Keyword::Until | Keyword::For => {
                if at_statement_start {
                    *loop_opened = true;
                }
                at_statement_start
            }
            _ => false,
        };
        if opens {
            self.stack.push(OpenDelimiter {
                delimiter: Delimiter::Keyword,
                line,
            });
            self.push(TokenKind::Open(Delimiter::Keyword), line, base, end, end);
        }
    }

    /// Whether the previous code token on this line leaves us at the start of
    /// an expression, so that `if`/`while` opens a block rather than acting
    /// as a trailing modifier.
    fn at_statement_start(&self, line: usize) -> bool {
        let previous = self
            .tokens
            .iter()
            .rev()
            .take_while(|token| token.line == line)
            .find(|token| token.kind.is_code());
        match previous {
            None => true,
            Some(token) => matches!(
                token.kind,
                TokenKind::Semicolon
                    | TokenKind::Operator(Operator::Assign)
                    | TokenKind::Open(Delimiter::Paren)
            ),
        }
    }

    /// `if:` style hash keys and keyword arguments are plain identifiers
    fn is_label(&self, text: &str, end: usize) -> bool {
        if self.language.family() != SyntaxFamily::Keywords {
            return false;
        }
        let rest = &text.as_bytes()[end..];
        rest.first() == Some(&b':') && rest.get(1) != Some(&b':')
    }

    fn identifier_end(&self, text: &str, start: usize) -> usize {
        let mut end = start;
        for ch in text[start..].chars() {
            if ch == '_' || ch.is_alphanumeric() {
                end += ch.len_utf8();
            } else {
                break;
            }
        }
        if self.language.predicate_identifiers() && end > start {
            let bytes = text.as_bytes();
            if matches!(bytes.get(end), Some(b'?' | b'!')) && bytes.get(end + 1) != Some(&b'=') {
                end += 1;
            }
        }
        end
    }

    fn operator_end(&self, text: &str, start: usize) -> usize {
        let bytes = text.as_bytes();
        let comment = self.language.line_comment();
        let block_open = self.inline_block_comment().map(|(open, _)| open);
        let mut end = start;
        while end < bytes.len() && OPERATOR_CHARS.contains(&bytes[end]) {
            if end > start {
                let rest = &text[end..];
                if rest.starts_with(comment) || block_open.is_some_and(|open| rest.starts_with(open))
                {
                    break;
                }
            }
            end += 1;
        }
        end
    }

    fn close(&mut self, delimiter: Delimiter, line: usize, unbalanced: &mut bool) {
        match self.stack.last() {
            Some(top) if top.delimiter == delimiter => {
                self.stack.pop();
            }
            _ => {
                let kind = if let Some(idx) = self
                    .stack
                    .iter()
                    .rposition(|open| open.delimiter == delimiter)
                {
                    self.stack.truncate(idx);
                    UnbalancedKind::MismatchedCloser
                } else {
                    UnbalancedKind::UnmatchedCloser
                };
                log::debug!("{kind:?} {delimiter:?} at line {}", line + 1);
                self.issues.push(UnbalancedStructure {
                    line,
                    kind,
                    delimiter,
                });
                *unbalanced = true;
            }
        }
    }
}

/// End of a quoted string opened at `start`; unterminated strings end at the line end
fn string_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b if b == quote => return idx + 1,
            _ => idx += 1,
        }
    }
    bytes.len()
}

/// `/…/` with optional flags; `None` when the line has no closing slash
fn regex_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'/' => {
                idx += 1;
                while idx < bytes.len() && bytes[idx].is_ascii_alphabetic() {
                    idx += 1;
                }
                return Some(idx);
            }
            _ => idx += 1,
        }
    }
    None
}

/// `<<~ID`, `<<-ID`, `<<ID` and their quoted forms. A bare `<<` needs an
/// upper-case or quoted name so `list << item` stays an operator.
fn heredoc_opener(text: &str, pos: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let mut idx = pos + 2;
    let squiggly = matches!(bytes.get(idx), Some(b'~' | b'-'));
    if squiggly {
        idx += 1;
    }
    let quote = match bytes.get(idx) {
        Some(&q @ (b'\'' | b'"' | b'`')) => {
            idx += 1;
            Some(q)
        }
        _ => None,
    };
    let name_start = idx;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    let name = &text[name_start..idx];
    let first = name.bytes().next()?;
    if first.is_ascii_digit() || (!squiggly && quote.is_none() && !first.is_ascii_uppercase()) {
        return None;
    }
    if let Some(q) = quote {
        if bytes.get(idx) != Some(&q) {
            return None;
        }
        idx += 1;
    }
    Some((name.to_string(), idx))
}

fn char_literal_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.get(start + 1) == Some(&b'\\') {
        let limit = (start + 12).min(bytes.len());
        return (start + 3..limit)
            .find(|&idx| bytes[idx] == b'\'')
            .map(|idx| idx + 1);
    }
    let ch = text.get(start + 1..)?.chars().next()?;
    let close = start + 1 + ch.len_utf8();
    (bytes.get(close) == Some(&b'\'')).then_some(close + 1)
}

fn number_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() {
        let b = bytes[end];
        let decimal_point =
            b == b'.' && bytes.get(end + 1).is_some_and(u8::is_ascii_digit);
        if b.is_ascii_alphanumeric() || b == b'_' || decimal_point {
            end += 1;
        } else {
            break;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(language: Language, text: &str) -> ScanResult {
        Scanner::new(language)
            .scan(&SourceBuffer::new(text), None)
            .unwrap()
    }

    fn depths(result: &ScanResult) -> Vec<(usize, usize)> {
        result
            .lines
            .iter()
            .map(|line| (line.depth_start, line.depth_end))
            .collect()
    }

    #[test]
    fn test_tracks_depth_per_line() {
        let result = scan(
            Language::Go,
            "func (r *rect) area(a int,\nb int) int {\n    return r.width * r.height\n}\n",
        );
        assert!(result.is_balanced());
        assert_eq!(depths(&result), vec![(0, 1), (1, 1), (1, 1), (1, 0)]);
        assert_eq!(result.final_depth(), 0);
    }

    #[test]
    fn test_strings_and_comments_suppress_brackets() {
        let result = scan(
            Language::Go,
            "x := \"({[\" // }}}\ny := '{'\n/* ( [\n { */ z := `)`\n",
        );
        assert!(result.is_balanced());
        assert_eq!(depths(&result), vec![(0, 0), (0, 0), (0, 0), (0, 0)]);
        assert_eq!(result.lines[2].class, LineClass::Comment);
        assert_eq!(result.lines[3].class, LineClass::Code);
    }

    #[test]
    fn test_raw_string_spans_lines() {
        let result = scan(Language::Go, "s := `first {\nsecond (\n` + f(x)\n");
        assert!(result.is_balanced());
        assert_eq!(depths(&result), vec![(0, 0), (0, 0), (0, 0)]);
    }

    #[test]
    fn test_blank_and_comment_lines_keep_depth() {
        let result = scan(Language::Go, "if x {\n\n    // note\n    y()\n}\n");
        assert_eq!(result.lines[1].class, LineClass::Blank);
        assert_eq!(result.lines[1].depth_start, 1);
        assert_eq!(result.lines[1].depth_end, 1);
        assert_eq!(result.lines[2].class, LineClass::Comment);
        assert_eq!(result.line_tokens(1)[0].kind, TokenKind::Blank);
        assert_eq!(result.code_tokens(2).count(), 0);
    }

    #[test]
    fn test_unmatched_closer_is_recorded_and_scan_continues() {
        let result = scan(Language::Go, "}\nfoo(a,\n  b)\n");
        assert_eq!(
            result.issues,
            vec![UnbalancedStructure {
                line: 0,
                kind: UnbalancedKind::UnmatchedCloser,
                delimiter: Delimiter::Brace,
            }]
        );
        assert!(result.lines[0].unbalanced);
        assert_eq!(depths(&result), vec![(0, 0), (0, 1), (1, 0)]);
    }

    #[test]
    fn test_mismatched_closer_unwinds_stack() {
        let result = scan(Language::Go, "{\n  foo(\n}\n");
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].kind, UnbalancedKind::MismatchedCloser);
        assert_eq!(result.issues[0].line, 2);
        assert_eq!(result.final_depth(), 0);
    }

    #[test]
    fn test_unclosed_opener_flags_buffer() {
        let result = scan(Language::Go, "func f() {\n  x := []int{\n");
        assert!(!result.is_balanced());
        let unclosed: Vec<_> = result
            .issues
            .iter()
            .filter(|issue| issue.kind == UnbalancedKind::Unclosed)
            .map(|issue| issue.line)
            .collect();
        assert_eq!(unclosed, vec![0, 1]);
        assert!(result.lines[0].unbalanced);
    }

    #[test]
    fn test_rust_lifetimes_are_not_strings() {
        let result = scan(
            Language::Rust,
            "fn f<'a>(x: &'a str) -> char {\n    'x'\n}\n",
        );
        assert!(result.is_balanced());
        assert_eq!(depths(&result), vec![(0, 1), (1, 1), (1, 0)]);
    }

    #[test]
    fn test_ruby_keyword_blocks() {
        let source = "\
module Bar
  def run(a,
          b)
    return 1 if a
    while a do
      x
    end
    list.each do |e|
      e.class
    end
  end
end
";
        let result = scan(Language::Ruby, source);
        assert!(result.is_balanced(), "{:?}", result.issues);
        assert_eq!(
            depths(&result),
            vec![
                (0, 1),
                (1, 3),
                (3, 2),
                (2, 2),
                (2, 3),
                (3, 3),
                (3, 2),
                (2, 3),
                (3, 3),
                (3, 2),
                (2, 1),
                (1, 0),
            ]
        );
    }

    #[test]
    fn test_ruby_labels_and_comments() {
        let result = scan(
            Language::Ruby,
            "foo(if: 1) # if x\n=begin\nif y\n=end\nx = if z then 1 else 2 end\n",
        );
        assert!(result.is_balanced(), "{:?}", result.issues);
        assert_eq!(result.lines[1].class, LineClass::Comment);
        assert_eq!(result.lines[2].class, LineClass::Comment);
        assert_eq!(depths(&result)[4], (0, 0));
    }

    #[test]
    fn test_keyword_open_token_follows_keyword() {
        let result = scan(Language::Ruby, "def run\nend\n");
        let kinds: Vec<_> = result.tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Func),
                TokenKind::Open(Delimiter::Keyword),
                TokenKind::Identifier,
                TokenKind::Keyword(Keyword::End),
                TokenKind::Close(Delimiter::Keyword),
            ]
        );
        assert_eq!(result.tokens[1].depth_after, 1);
        assert_eq!(result.tokens[4].depth_after, 0);
    }

    #[test]
    fn test_operators_are_classified() {
        let source = "a := b.c && d++ // tail";
        let result = scan(Language::Go, source);
        let ops: Vec<_> = result
            .tokens
            .iter()
            .filter_map(|token| match token.kind {
                TokenKind::Operator(op) => Some((token.text(source), op)),
                _ => None,
            })
            .collect();
        assert_eq!(
            ops,
            vec![
                (":=", Operator::Assign),
                (".", Operator::Access),
                ("&&", Operator::Logical),
                ("++", Operator::Postfix),
            ]
        );
        assert_eq!(result.tokens.last().unwrap().kind, TokenKind::Comment);
    }

    #[test]
    fn test_c_preprocessor_lines_are_comments() {
        let result = scan(
            Language::C,
            "#include <stdio.h>\n#define MAX(a, b) \\\n  ((a) > (b) ? (a) : (b))\nint main(void) {\n}\n",
        );
        assert!(result.is_balanced());
        let classes: Vec<_> = result.lines.iter().map(|line| line.class).collect();
        assert_eq!(
            classes,
            vec![
                LineClass::Comment,
                LineClass::Comment,
                LineClass::Comment,
                LineClass::Code,
                LineClass::Code
            ]
        );
        assert_eq!(depths(&result), vec![(0, 0), (0, 0), (0, 0), (0, 1), (1, 0)]);

        // `#` has no directive meaning outside the C family.
        let go = scan(Language::Go, "#x (\n");
        assert!(!go.is_balanced());
    }

    #[test]
    fn test_ruby_regex_and_heredoc_suppress_brackets() {
        let result = scan(
            Language::Ruby,
            "if x =~ /\\(/\n  y = <<~EOS\n    open ( [\n  EOS\n  z = a / b / (c)\n  items << Item.new(1)\nend\n",
        );
        assert!(result.is_balanced());
        assert_eq!(
            depths(&result),
            vec![(0, 1), (1, 1), (1, 1), (1, 1), (1, 1), (1, 1), (1, 0)]
        );
        assert_eq!(result.lines[2].class, LineClass::Code);
        assert!(result
            .line_tokens(2)
            .iter()
            .all(|token| token.kind == TokenKind::Literal));
    }

    #[test]
    fn test_cancellation_stops_scan() {
        let token = CancellationToken::new();
        token.cancel();
        let err = Scanner::new(Language::Go)
            .scan(&SourceBuffer::new("a\nb\n"), Some(&token))
            .unwrap_err();
        assert!(matches!(err, SelectorError::Cancelled));
    }

    #[test]
    fn test_empty_buffer_scans_to_nothing() {
        let result = scan(Language::Go, "");
        assert!(result.tokens.is_empty());
        assert!(result.lines.is_empty());
        assert_eq!(result.final_depth(), 0);
    }
}
