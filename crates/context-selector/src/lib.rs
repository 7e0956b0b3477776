//! # Context Selector
//!
//! Structural context selection for code completion.
//!
//! ## Philosophy
//!
//! Given a buffer and a cursor, the selector returns the smallest set of
//! lines that is still structurally whole:
//! - The construct holding the cursor is kept intact (signature and body,
//!   a full case clause, a whole declaration group)
//! - Enclosing constructs contribute only their header lines
//! - When the line budget is tight, outer headers go first
//! - Broken bracket structure degrades to a fixed window, never an error
//!
//! No syntax tree is built. A per-line scanner tracks bracket depth and a
//! small state machine classifies openers as it goes.
//!
//! ## Architecture
//!
//! ```text
//! Source Text
//!     │
//!     ├──> Scanner (per line)
//!     │    ├─> Tokens + depth before/after each line
//!     │    └─> Unbalanced markers (unmatched, mismatched, unclosed)
//!     │
//!     ├──> Boundary Detector
//!     │    ├─> Signatures, composite literals, control blocks
//!     │    ├─> Case clauses, declaration groups, type bodies
//!     │    └─> Flat construct arena with parent links
//!     │
//!     └──> Context Selector
//!          ├─> Walk outward: innermost in full, then headers
//!          ├─> Fit to max_lines, dropping outermost units first
//!          └─> Emit ContextWindow (spans + degradation)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use context_selector::{ContextEngine, Cursor, Language, SelectorConfig};
//!
//! let engine = ContextEngine::new(SelectorConfig::for_language(Language::Go));
//!
//! let code = "func area(w int,\n\th int) int {\n\treturn w * h\n}\n";
//!
//! let selection = engine.select_str(code, Cursor::line(3)).unwrap();
//! assert!(selection.window.is_clean());
//! assert_eq!(selection.window.lines().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
//! ```

pub mod api;
mod boundary;
mod buffer;
mod cancel;
mod config;
mod engine;
mod error;
mod fallback;
mod language;
mod scanner;
mod selector;
mod token;
mod types;

pub use boundary::{Boundaries, BoundaryDetector, Construct, ConstructId, ConstructKind};
pub use buffer::SourceBuffer;
pub use cancel::CancellationToken;
pub use config::SelectorConfig;
pub use engine::{Analysis, ContextEngine, Cursor, Selection};
pub use error::{Result, SelectorError};
pub use fallback::fixed_window;
pub use language::{Language, SingleQuote, SyntaxFamily};
pub use scanner::{LineClass, LineInfo, ScanResult, Scanner, UnbalancedKind, UnbalancedStructure};
pub use selector::{ContextSelector, Walk, WalkState, WalkStep};
pub use token::{Delimiter, Keyword, Operator, Token, TokenKind};
pub use types::{
    covered_lines, merge_ranges, ContextWindow, Degradation, FallbackReason, LineRange, Span,
};
