//! Boundary detection: turns the scanner's token stream into [`Construct`]s.
//!
//! The detector keeps two stacks in lockstep with the scanner's bracket
//! stack. A [`Frame`] per open delimiter remembers how the opener was
//! classified, and a [`Statement`] per depth accumulates what has been seen
//! since the last statement boundary at that depth. Constructs are appended
//! to a flat arena the first time a frame survives a line end, so
//! single-line groups never produce one and parents always precede their
//! children.

use crate::buffer::SourceBuffer;
use crate::language::{Language, SyntaxFamily};
use crate::scanner::ScanResult;
use crate::token::{Delimiter, Keyword, Operator, Token, TokenKind};
use crate::types::LineRange;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Index of a construct in [`Boundaries`]
pub type ConstructId = usize;

/// Syntactic unit that is always selected whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructKind {
    /// Callable header plus body
    Signature,
    /// Struct, slice, map or array literal
    CompositeLiteral,
    /// `if`/`else`/`for`/`switch`/`select`/… block, or a branch of one
    ControlBlock,
    /// `case`/`default` arm of a `switch` or `select`
    CaseClause,
    /// Multi-line declaration joined by continuation, or `import (`-style group
    DeclarationGroup,
    /// `type X struct {`, `class`, `module`, `interface`, `impl` bodies
    TypeBody,
    /// Any other multi-line bracket group
    Block,
}

impl ConstructKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Signature => "signature",
            Self::CompositeLiteral => "composite_literal",
            Self::ControlBlock => "control_block",
            Self::CaseClause => "case_clause",
            Self::DeclarationGroup => "declaration_group",
            Self::TypeBody => "type_body",
            Self::Block => "block",
        }
    }
}

/// A detected construct. Lines are 0-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Construct {
    pub id: ConstructId,
    pub kind: ConstructKind,
    pub start_line: usize,
    /// Last line of the header (opener line, case label, or the whole
    /// declaration group)
    pub header_end_line: usize,
    pub end_line: usize,
    /// Number of enclosing constructs
    pub depth: usize,
    pub parent: Option<ConstructId>,
    /// Branch this one continues (`else` → `if`)
    pub chained_from: Option<ConstructId>,
    /// Leading keyword, when the construct was introduced by one
    pub keyword: Option<Keyword>,
    /// False when the buffer ended before the construct closed
    pub closed: bool,
}

impl Construct {
    #[must_use]
    pub fn extent(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }

    #[must_use]
    pub fn header(&self) -> LineRange {
        LineRange::new(self.start_line, self.header_end_line.min(self.end_line))
    }

    #[must_use]
    pub fn contains_line(&self, line: usize) -> bool {
        self.extent().contains(line)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.extent().len()
    }
}

/// Flat, append-only construct arena
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Boundaries {
    constructs: Vec<Construct>,
}

impl Boundaries {
    #[must_use]
    pub fn constructs(&self) -> &[Construct] {
        &self.constructs
    }

    #[must_use]
    pub fn get(&self, id: ConstructId) -> Option<&Construct> {
        self.constructs.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.constructs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructs.is_empty()
    }

    /// Parents of `id`, innermost first
    pub fn ancestors(&self, id: ConstructId) -> impl Iterator<Item = &Construct> + '_ {
        let mut next = self.get(id).and_then(|construct| construct.parent);
        std::iter::from_fn(move || {
            let construct = self.get(next?)?;
            next = construct.parent;
            Some(construct)
        })
    }

    /// The construct that most tightly contains `line`.
    ///
    /// Deeper constructs win; at equal depth a construct whose header holds
    /// the line wins, then the narrower one, then the later one.
    #[must_use]
    pub fn innermost_at(&self, line: usize) -> Option<&Construct> {
        self.constructs
            .iter()
            .filter(|construct| construct.contains_line(line))
            .max_by_key(|construct| {
                (
                    construct.depth,
                    construct.header().contains(line),
                    Reverse(construct.line_count()),
                    construct.start_line,
                )
            })
    }

    pub fn of_kind(&self, kind: ConstructKind) -> impl Iterator<Item = &Construct> + '_ {
        self.constructs
            .iter()
            .filter(move |construct| construct.kind == kind)
    }
}

/// Classifies constructs from a scan
#[derive(Debug, Clone, Copy)]
pub struct BoundaryDetector {
    language: Language,
}

impl BoundaryDetector {
    #[must_use]
    pub const fn new(language: Language) -> Self {
        Self { language }
    }

    #[must_use]
    pub fn detect(&self, buffer: &SourceBuffer, scan: &ScanResult) -> Boundaries {
        let mut state = DetectState::new(self.language, buffer.text(), scan);
        for line in 0..scan.lines.len() {
            if scan.is_code_line(line) {
                state.process_line(line);
            }
        }
        let boundaries = state.finish();
        log::debug!(
            "detected {} constructs over {} lines",
            boundaries.len(),
            scan.lines.len()
        );
        boundaries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderTarget {
    /// Keyword-delimited frame at this stack index
    Frame(usize),
    Clause(ConstructId),
}

#[derive(Debug, Clone)]
struct Frame {
    kind: ConstructKind,
    keyword: Option<Keyword>,
    start_line: usize,
    header_end: usize,
    chained_from: Option<ConstructId>,
    /// Parameter lists and conditions that belong to a header
    suppressed: bool,
    /// Commas separate elements rather than continue a statement
    list_context: bool,
    construct: Option<ConstructId>,
    clause: Option<ConstructId>,
}

#[derive(Debug, Clone, Default)]
struct Statement {
    start_line: Option<usize>,
    last_line: usize,
    first: Option<TokenKind>,
    first_keyword: Option<Keyword>,
    callable: bool,
    saw_call_paren: bool,
    type_keyword: bool,
    saw_assign: bool,
    saw_comma_before_assign: bool,
    /// A control or callable header still waiting for its `{`
    awaiting_body: bool,
    /// A multi-line frame was materialized from this statement
    opened_block: bool,
    header_of: Option<HeaderTarget>,
    chain: Option<ConstructId>,
    /// Survives statement resets so `}` newline `else` can chain
    last_closed: Option<ConstructId>,
}

impl Statement {
    fn is_declaration_like(&self) -> bool {
        self.first_keyword.is_some_and(Keyword::is_declaration)
            || (self.first == Some(TokenKind::Identifier)
                && self.saw_comma_before_assign
                && self.saw_assign)
    }
}

struct DetectState<'a> {
    language: Language,
    family: SyntaxFamily,
    source: &'a str,
    scan: &'a ScanResult,
    next_code_line: Vec<Option<usize>>,
    arena: Vec<Construct>,
    frames: Vec<Frame>,
    statements: Vec<Statement>,
    prev: Option<TokenKind>,
    prev_text: &'a str,
}

impl<'a> DetectState<'a> {
    fn new(language: Language, source: &'a str, scan: &'a ScanResult) -> Self {
        let mut next_code_line = vec![None; scan.lines.len()];
        let mut next = None;
        for line in (0..scan.lines.len()).rev() {
            next_code_line[line] = next;
            if scan.is_code_line(line) {
                next = Some(line);
            }
        }
        Self {
            language,
            family: language.family(),
            source,
            scan,
            next_code_line,
            arena: Vec::new(),
            frames: Vec::new(),
            statements: vec![Statement::default()],
            prev: None,
            prev_text: "",
        }
    }

    fn finish(mut self) -> Boundaries {
        let last_line = self.scan.lines.len().saturating_sub(1);
        for frame in std::mem::take(&mut self.frames) {
            for id in [frame.clause, frame.construct].into_iter().flatten() {
                self.arena[id].end_line = last_line;
                self.arena[id].closed = false;
            }
        }
        Boundaries {
            constructs: self.arena,
        }
    }

    fn process_line(&mut self, line: usize) {
        let tokens: Vec<Token> = self.scan.code_tokens(line).copied().collect();
        for (idx, token) in tokens.iter().enumerate() {
            let leads_line = idx == 0
                || (idx == 1 && tokens[0].kind == TokenKind::Keyword(Keyword::End));
            if idx == 0 {
                if let TokenKind::Keyword(keyword) = token.kind {
                    self.try_start_clause(keyword, line);
                }
            }
            self.process_token(token, leads_line);
        }
        self.end_of_line(line, tokens.last());
    }

    fn process_token(&mut self, token: &Token, leads_line: bool) {
        match token.kind {
            TokenKind::Open(delimiter) => self.open(delimiter, token),
            TokenKind::Close(_) => self.close(token, leads_line),
            TokenKind::Keyword(keyword) => self.keyword(keyword, token),
            TokenKind::Comma => self.comma(token),
            TokenKind::Semicolon => {
                self.touch(token);
                if !self.statement().awaiting_body {
                    self.finish_statement(self.frames.len());
                }
            }
            TokenKind::Operator(op) => self.operator(op, token),
            TokenKind::Identifier | TokenKind::Literal => self.touch(token),
            TokenKind::Comment | TokenKind::Blank => return,
        }
        self.prev = Some(token.kind);
        self.prev_text = token.text(self.source);
    }

    fn statement(&self) -> &Statement {
        &self.statements[self.frames.len()]
    }

    fn statement_mut(&mut self) -> &mut Statement {
        let depth = self.frames.len();
        &mut self.statements[depth]
    }

    /// Record `token` as part of the statement at the current depth
    fn touch(&mut self, token: &Token) {
        let stmt = self.statement_mut();
        if stmt.start_line.is_none() {
            stmt.start_line = Some(token.line);
            stmt.first = Some(token.kind);
            if let TokenKind::Keyword(keyword) = token.kind {
                stmt.first_keyword = Some(keyword);
            }
        }
        stmt.last_line = token.line;
    }

    fn keyword(&mut self, keyword: Keyword, token: &Token) {
        if self.family == SyntaxFamily::Braces && keyword.is_branch() {
            let stmt = self.statement_mut();
            let last_closed = stmt.last_closed;
            *stmt = Statement {
                start_line: Some(token.line),
                last_line: token.line,
                first: Some(token.kind),
                first_keyword: Some(keyword),
                awaiting_body: true,
                last_closed,
                ..Statement::default()
            };
            let chain = last_closed.filter(|&id| self.arena[id].kind == ConstructKind::ControlBlock);
            self.statement_mut().chain = chain;
            return;
        }

        self.touch(token);
        let family = self.family;
        let stmt = self.statement_mut();
        if keyword == Keyword::Func {
            stmt.callable = true;
        }
        if keyword.is_type_body() {
            stmt.type_keyword = true;
        }
        if family == SyntaxFamily::Braces && stmt.header_of.is_none() {
            let leading_control = keyword.is_control()
                && keyword != Keyword::Case
                && stmt.first_keyword == Some(keyword);
            if leading_control || keyword == Keyword::Func {
                stmt.awaiting_body = true;
            }
        }
    }

    fn comma(&mut self, token: &Token) {
        self.touch(token);
        let list_context = self.frames.last().is_some_and(|frame| frame.list_context);
        if list_context {
            let depth = self.frames.len();
            self.finish_statement(depth);
            return;
        }
        let stmt = self.statement_mut();
        if !stmt.saw_assign {
            stmt.saw_comma_before_assign = true;
        }
    }

    fn operator(&mut self, op: Operator, token: &Token) {
        self.touch(token);
        match op {
            Operator::Assign => self.statement_mut().saw_assign = true,
            Operator::Colon => {
                if matches!(self.statement().header_of, Some(HeaderTarget::Clause(_))) {
                    let depth = self.frames.len();
                    self.finish_statement(depth);
                }
            }
            _ => {}
        }
    }

    fn open(&mut self, delimiter: Delimiter, token: &Token) {
        self.touch(token);
        let prev = self.prev;
        if delimiter == Delimiter::Paren && prev == Some(TokenKind::Identifier) {
            self.statement_mut().saw_call_paren = true;
        }

        let stmt = self.statement().clone();
        let in_header = stmt.awaiting_body || stmt.header_of.is_some();
        let (kind, keyword, suppressed) = match delimiter {
            Delimiter::Brace => {
                let (kind, keyword) = self.classify_brace(&stmt, prev, token);
                (kind, keyword, false)
            }
            Delimiter::Bracket => (ConstructKind::CompositeLiteral, None, in_header),
            Delimiter::Paren => match prev {
                Some(TokenKind::Keyword(
                    kw @ (Keyword::Import | Keyword::Var | Keyword::Const | Keyword::Type | Keyword::Let),
                )) => (ConstructKind::DeclarationGroup, Some(kw), false),
                _ => (ConstructKind::Block, None, in_header),
            },
            Delimiter::Keyword => {
                let keyword = match prev {
                    Some(TokenKind::Keyword(kw)) => Some(kw),
                    _ => None,
                };
                (keyword_block_kind(keyword), keyword, false)
            }
        };

        let chained_from = if delimiter == Delimiter::Brace && kind == ConstructKind::ControlBlock {
            stmt.chain
        } else {
            None
        };
        if delimiter == Delimiter::Brace {
            self.statement_mut().awaiting_body = false;
        }

        let index = self.frames.len();
        self.frames.push(Frame {
            kind,
            keyword,
            start_line: stmt.start_line.unwrap_or(token.line),
            header_end: token.line,
            chained_from,
            suppressed,
            list_context: matches!(delimiter, Delimiter::Paren | Delimiter::Bracket)
                || kind == ConstructKind::CompositeLiteral,
            construct: None,
            clause: None,
        });
        self.statements.push(Statement {
            header_of: (delimiter == Delimiter::Keyword).then_some(HeaderTarget::Frame(index)),
            ..Statement::default()
        });
    }

    fn classify_brace(
        &self,
        stmt: &Statement,
        prev: Option<TokenKind>,
        token: &Token,
    ) -> (ConstructKind, Option<Keyword>) {
        if let Some(keyword) = stmt.first_keyword.filter(|kw| kw.is_control()) {
            return (ConstructKind::ControlBlock, Some(keyword));
        }
        if stmt.callable {
            return (ConstructKind::Signature, Some(Keyword::Func));
        }
        if stmt.type_keyword && !stmt.saw_assign && !stmt.first_keyword.is_some_and(Keyword::is_declaration) {
            return (ConstructKind::TypeBody, stmt.first_keyword);
        }
        match prev {
            Some(
                TokenKind::Identifier
                | TokenKind::Close(Delimiter::Bracket | Delimiter::Brace)
                | TokenKind::Keyword(Keyword::Struct | Keyword::Interface | Keyword::Enum),
            ) => return (ConstructKind::CompositeLiteral, None),
            _ => {}
        }
        if stmt.saw_call_paren {
            return (ConstructKind::Signature, None);
        }
        match prev {
            Some(
                TokenKind::Comma
                | TokenKind::Operator(Operator::Assign | Operator::Colon)
                | TokenKind::Keyword(Keyword::Return),
            ) => (ConstructKind::CompositeLiteral, None),
            Some(TokenKind::Operator(_)) if self.is_arrow_function() => {
                (ConstructKind::Signature, None)
            }
            _ if stmt.start_line.is_some_and(|line| line == token.line)
                && stmt.first == Some(TokenKind::Open(Delimiter::Brace))
                && self.frames.last().is_some_and(|frame| frame.list_context) =>
            {
                (ConstructKind::CompositeLiteral, None)
            }
            _ => (ConstructKind::Block, None),
        }
    }

    fn is_arrow_function(&self) -> bool {
        self.prev_text == "=>" && matches!(self.language, Language::JavaScript | Language::TypeScript)
    }

    fn close(&mut self, token: &Token, leads_line: bool) {
        while self.frames.len() > token.depth_after {
            let Some(frame) = self.frames.pop() else {
                break;
            };
            self.statements.pop();
            if let Some(clause) = frame.clause {
                let construct = &mut self.arena[clause];
                construct.end_line = clause_end(construct.start_line, token.line, leads_line);
                construct.closed = true;
            }
            if let Some(id) = frame.construct {
                self.arena[id].end_line = token.line;
                self.arena[id].closed = true;
                self.statement_mut().last_closed = Some(id);
            }
        }
        self.touch(token);
    }

    fn try_start_clause(&mut self, keyword: Keyword, line: usize) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let Some(kind) = clause_kind(self.family, frame.keyword, keyword) else {
            return;
        };
        let Some(parent) = frame.construct else {
            return;
        };
        let previous = frame.clause;
        if let Some(previous) = previous {
            let construct = &mut self.arena[previous];
            construct.end_line = clause_end(construct.start_line, line, true);
            construct.closed = true;
        }

        let id = self.push_construct(Construct {
            id: 0,
            kind,
            start_line: line,
            header_end_line: line,
            end_line: line,
            depth: 0,
            parent: Some(parent),
            chained_from: None,
            keyword: Some(keyword),
            closed: false,
        });
        if let Some(frame) = self.frames.last_mut() {
            frame.clause = Some(id);
        }
        let depth = self.frames.len();
        let last_closed = self.statements[depth].last_closed;
        self.statements[depth] = Statement {
            header_of: Some(HeaderTarget::Clause(id)),
            last_closed,
            ..Statement::default()
        };
    }

    fn end_of_line(&mut self, line: usize, last: Option<&Token>) {
        self.materialize_frames(line);

        let depth = self.frames.len();
        if self.statements[depth].start_line.is_none() {
            // A keyword block whose header ended with the keyword itself.
            self.statements[depth].header_of = None;
            return;
        }
        if !self.line_continues(line, last) {
            self.finish_statement(depth);
        }
    }

    fn line_continues(&self, line: usize, last: Option<&Token>) -> bool {
        let next = self.next_code_line[line]
            .and_then(|next| self.scan.code_tokens(next).next().copied());

        if self.statement().awaiting_body {
            return !next.is_some_and(|token| starts_statement(token.kind));
        }
        let trailing = last.is_some_and(|token| match token.kind {
            TokenKind::Comma => true,
            TokenKind::Operator(op) => {
                op.continues_line()
                    && !(self.family == SyntaxFamily::Keywords && token.text(self.source) == "|")
            }
            _ => false,
        });
        let leading = next.is_some_and(|token| match token.kind {
            TokenKind::Comma => true,
            TokenKind::Operator(op) => op.continues_previous(),
            _ => false,
        });
        trailing || leading
    }

    fn finish_statement(&mut self, depth: usize) {
        let stmt = std::mem::take(&mut self.statements[depth]);
        self.statements[depth].last_closed = stmt.last_closed;
        let Some(start) = stmt.start_line else {
            return;
        };

        match stmt.header_of {
            Some(HeaderTarget::Frame(index)) => {
                if let Some(frame) = self.frames.get_mut(index) {
                    frame.header_end = frame.header_end.max(stmt.last_line);
                    if let Some(id) = frame.construct {
                        self.arena[id].header_end_line = frame.header_end;
                    }
                }
                return;
            }
            Some(HeaderTarget::Clause(id)) => {
                self.arena[id].header_end_line = stmt.last_line;
                return;
            }
            None => {}
        }

        if stmt.last_line > start && !stmt.opened_block && stmt.is_declaration_like() {
            let parent = self.enclosing_construct(depth);
            self.push_construct(Construct {
                id: 0,
                kind: ConstructKind::DeclarationGroup,
                start_line: start,
                header_end_line: stmt.last_line,
                end_line: stmt.last_line,
                depth: 0,
                parent,
                chained_from: None,
                keyword: stmt.first_keyword,
                closed: true,
            });
        }
    }

    /// Give every open frame a construct once it is known to span lines
    fn materialize_frames(&mut self, line: usize) {
        for index in 0..self.frames.len() {
            let frame = &self.frames[index];
            if frame.construct.is_some() || frame.suppressed {
                continue;
            }
            let construct = Construct {
                id: 0,
                kind: frame.kind,
                start_line: frame.start_line,
                header_end_line: frame.header_end,
                end_line: line,
                depth: 0,
                parent: self.enclosing_construct(index),
                chained_from: frame.chained_from,
                keyword: frame.keyword,
                closed: false,
            };
            let id = self.push_construct(construct);
            self.frames[index].construct = Some(id);
            self.statements[index].opened_block = true;
        }
    }

    /// Innermost construct (or open clause) among the frames below `depth`
    fn enclosing_construct(&self, depth: usize) -> Option<ConstructId> {
        self.frames[..depth]
            .iter()
            .rev()
            .find_map(|frame| frame.clause.or(frame.construct))
    }

    fn push_construct(&mut self, mut construct: Construct) -> ConstructId {
        let id = self.arena.len();
        construct.id = id;
        construct.depth = construct
            .parent
            .map_or(0, |parent| self.arena[parent].depth + 1);
        self.arena.push(construct);
        id
    }
}

fn keyword_block_kind(keyword: Option<Keyword>) -> ConstructKind {
    match keyword {
        Some(Keyword::Func) => ConstructKind::Signature,
        Some(Keyword::Class | Keyword::Module) => ConstructKind::TypeBody,
        Some(Keyword::Do) | None => ConstructKind::Block,
        Some(_) => ConstructKind::ControlBlock,
    }
}

/// Kind of the clause `keyword` starts inside a frame opened by `frame_keyword`
fn clause_kind(
    family: SyntaxFamily,
    frame_keyword: Option<Keyword>,
    keyword: Keyword,
) -> Option<ConstructKind> {
    let frame_keyword = frame_keyword?;
    match family {
        SyntaxFamily::Braces => match (frame_keyword, keyword) {
            (Keyword::Switch | Keyword::Select, Keyword::Case | Keyword::Default) => {
                Some(ConstructKind::CaseClause)
            }
            _ => None,
        },
        SyntaxFamily::Keywords => match (frame_keyword, keyword) {
            (Keyword::Case, Keyword::When | Keyword::In | Keyword::Else) => {
                Some(ConstructKind::CaseClause)
            }
            (Keyword::If | Keyword::Unless, Keyword::Elsif | Keyword::Else)
            | (
                Keyword::Begin | Keyword::Func | Keyword::Do | Keyword::Class | Keyword::Module,
                Keyword::Rescue | Keyword::Ensure | Keyword::Else,
            ) => Some(ConstructKind::ControlBlock),
            _ => None,
        },
        SyntaxFamily::Indentation => None,
    }
}

/// Last line of a clause cut short at `line`; a closer that leads its line
/// belongs to the enclosing block
fn clause_end(start: usize, line: usize, leads_line: bool) -> usize {
    if leads_line {
        line.saturating_sub(1).max(start)
    } else {
        line
    }
}

/// Tokens that cannot continue a pending header
fn starts_statement(kind: TokenKind) -> bool {
    match kind {
        TokenKind::Close(_) => true,
        TokenKind::Keyword(keyword) => {
            (keyword.is_control() && !keyword.is_branch())
                || keyword.is_declaration()
                || matches!(
                    keyword,
                    Keyword::Func
                        | Keyword::Return
                        | Keyword::Default
                        | Keyword::Type
                        | Keyword::Import
                )
        }
        _ => false,
    }
}
