/*! Grammar-driven parsing of arbitrary text into decoratable parse trees.

Grammars are written in a small BNF dialect, one definition per block:

```text
Greeting: 'hello' Name [ '!' ]
Name: IDENTIFIER
```

Each definition is compiled into a rule tree, and the resulting [`Grammar`]
is used by the [`Parser`] for matching input text. Matching is strictly
ordered: the alternatives of a choice are tried from left to right and the
first one that matches wins, no longest-match or ambiguity resolution is
performed.

The result of a successful parse is a [`ParseTree`], a lossless tree where
every node records the exact range of the input it covers. Nodes can be
decorated with a prefix, a suffix, or hidden altogether, and the tree can be
rendered back into text. Rendering an undecorated tree reproduces the input
exactly, which makes the tree a convenient substrate for source-to-source
rewriting tools.

```
use bnf_rewrite_parser::Grammar;

let grammar: Grammar = "Call: IDENTIFIER '(' ')' ';'".parse().unwrap();
let mut tree = grammar.parse("Call", "foo();").unwrap();

let root = tree.root();
tree.set_prefix(root, "trace(); ");

assert_eq!(tree.render(root), "trace(); foo();");
```
 */

use std::fmt::{Display, Formatter};
use std::ops::Range;

pub use bnf::{compile_rule, Rule, RuleId, RuleTree};
pub use errors::*;
pub use grammar::{Grammar, GrammarBuilder};
pub use parser::hooks;
pub use parser::{
    Parser, SourceCode, DEFAULT_MAX_DEPTH, DEFAULT_TAB_WIDTH, MAX_INPUT_SIZE,
};
pub use tree::{Node, NodeId, ParseTree};

mod bnf;
mod errors;
mod grammar;
mod parser;
mod report;

pub mod tree;

/// Starting and ending positions of some piece of text.
///
/// Spans are half-open ranges of byte offsets, they are used both for
/// locating rule nodes inside the grammar text and parse nodes inside the
/// parsed input.
#[derive(Default, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Span(pub Range<u32>);

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}]", self.start(), self.end())
    }
}

impl Span {
    const MAX: usize = u32::MAX as usize;

    /// Creates a new [`Span`] from a pair of byte offsets.
    ///
    /// # Panics
    ///
    /// If any of the offsets doesn't fit in 32 bits.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= Self::MAX && end <= Self::MAX);
        Self(start as u32..end as u32)
    }

    /// Offset (in bytes) were the span starts.
    #[inline]
    pub fn start(&self) -> usize {
        self.0.start as usize
    }

    /// Offset (in bytes) where the span ends.
    #[inline]
    pub fn end(&self) -> usize {
        self.0.end as usize
    }

    /// Returns the span as a range of byte offsets.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.0.start as usize..self.0.end as usize
    }

    /// Returns true if the span doesn't cover any byte.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.start >= self.0.end
    }

    /// Returns a new [`Span`] that combines this span with `other`.
    ///
    /// The resulting span goes from `self.start()` to `other.end()`.
    pub fn combine(&self, other: &Self) -> Self {
        Self(self.0.start..other.0.end)
    }

    /// Displace the span to the right, incrementing both the starting and
    /// ending positions by the given offset
    ///
    /// ```
    /// # use bnf_rewrite_parser::Span;
    /// assert_eq!(Span(0..1).offset(1), Span(1..2))
    /// ```
    pub fn offset(mut self, offset: usize) -> Self {
        self.0.start = self.0.start.saturating_add(offset as u32);
        self.0.end = self.0.end.saturating_add(offset as u32);
        self
    }
}

/// A human-readable position (line and column) inside some text.
///
/// Both line and column start at 1.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Kinds of nodes, shared by rule trees and parse trees.
///
/// The last three kinds ([`NodeKind::TokenKeyword`],
/// [`NodeKind::IdentifierKeyword`] and [`NodeKind::NewlineKeyword`]) appear
/// only in rule trees, they correspond to the reserved words `TOKEN`,
/// `IDENTIFIER` and `NEW_LINE` of the BNF dialect.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum NodeKind {
    /// A literal surrounded by single quotes in the grammar, or any text
    /// that was matched as a unit in a parse tree.
    Token,
    /// A reference to another rule in the grammar, or a name matched with
    /// `IDENTIFIER` in a parse tree.
    Identifier,
    /// Items that must match one after the other.
    Sequence,
    /// Alternatives separated by `|`, exactly one of them matches.
    Choice,
    /// An item surrounded by square brackets, it matches 0 or 1 times.
    Optional,
    /// An item surrounded by curly brackets, it matches 0 or more times.
    Repetition,
    /// The reserved word `TOKEN`.
    TokenKeyword,
    /// The reserved word `IDENTIFIER`.
    IdentifierKeyword,
    /// The reserved word `NEW_LINE`.
    NewlineKeyword,
}

impl NodeKind {
    /// Returns the name of the kind, as shown in parse tree dumps.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Token => "token",
            NodeKind::Identifier => "identifier",
            NodeKind::Sequence => "sequence",
            NodeKind::Choice => "choice",
            NodeKind::Optional => "optional",
            NodeKind::Repetition => "repetition",
            NodeKind::TokenKeyword => "token_keyword",
            NodeKind::IdentifierKeyword => "identifier_keyword",
            NodeKind::NewlineKeyword => "newline_keyword",
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true if `c` can appear in an identifier.
#[inline]
pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Returns true if `c` can be the first character of an identifier.
#[inline]
pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}
