/*! Compiler for the BNF dialect used in grammar definitions.

The dialect has very few constructs:

```text
'literal'        a token that must appear verbatim in the input
Name             a reference to another rule
a b              a sequence, items separated by whitespace
a | b            a choice, the first alternative that matches wins
( ... )          grouping
[ ... ]          an optional item
{ ... }          an item that can be repeated zero or more times
TOKEN            any single-quoted literal in the input
IDENTIFIER       any identifier that is not a keyword
NEW_LINE         a newline character
```

Choices have the lowest precedence, `a b | c` is the same as `(a b) | c`.
 */
use std::fmt::{Debug, Formatter};
use std::ops::Range;

use crate::errors::{Error, ErrorInfo};
use crate::parser::SourceCode;
use crate::report::ReportBuilder;
use crate::{is_ident_char, NodeKind, Span};

#[cfg(test)]
mod tests;

/// Identifies a node in a rule tree.
///
/// Rule trees live in arenas owned by a [`crate::Grammar`] or a [`RuleTree`],
/// a `RuleId` is only meaningful for the arena that produced it.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in a rule tree.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct RuleNode {
    pub kind: NodeKind,
    /// Range of the grammar text covered by this node.
    pub span: Span,
    pub branches: Vec<RuleId>,
    /// For tokens, the literal without quotes and with escape sequences
    /// resolved. For identifiers, the name of the referenced rule.
    pub value: Option<Box<str>>,
    /// Index of the definition this node belongs to.
    pub definition: u32,
}

/// A read-only view of a node in a rule tree.
#[derive(Clone, Copy)]
pub struct Rule<'a> {
    id: RuleId,
    nodes: &'a [RuleNode],
    text: &'a str,
}

impl<'a> Rule<'a> {
    pub(crate) fn new(id: RuleId, nodes: &'a [RuleNode], text: &'a str) -> Self {
        Self { id, nodes, text }
    }

    #[inline]
    fn node(&self) -> &'a RuleNode {
        &self.nodes[self.id.index()]
    }

    /// Identifier of this node.
    #[inline]
    pub fn id(&self) -> RuleId {
        self.id
    }

    /// Kind of this node.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.node().kind
    }

    /// Range of the grammar text covered by this node.
    pub fn span(&self) -> Span {
        self.node().span.clone()
    }

    /// Grammar text covered by this node.
    pub fn as_str(&self) -> &'a str {
        &self.text[self.node().span.range()]
    }

    /// For [`NodeKind::Token`] nodes, returns the literal that must appear
    /// in the input. Quotes are not included and escape sequences are
    /// already resolved, the literal for `'\''` is `'`.
    pub fn literal(&self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Token => self.node().value.as_deref(),
            _ => None,
        }
    }

    /// For [`NodeKind::Identifier`] nodes, returns the name of the rule
    /// being referenced.
    pub fn name(&self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Identifier => self.node().value.as_deref(),
            _ => None,
        }
    }

    /// Returns the branches of this node.
    pub fn branches(&self) -> impl ExactSizeIterator<Item = Rule<'a>> + 'a {
        let nodes = self.nodes;
        let text = self.text;
        self.node().branches.iter().map(move |id| Rule::new(*id, nodes, text))
    }

    /// Returns the branch at the given position, if any.
    pub fn branch(&self, index: usize) -> Option<Rule<'a>> {
        self.node()
            .branches
            .get(index)
            .map(|id| Rule::new(*id, self.nodes, self.text))
    }
}

impl Debug for Rule<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("kind", &self.kind())
            .field("span", &self.node().span)
            .field("text", &self.as_str())
            .finish()
    }
}

/// A rule tree compiled from a single BNF expression.
///
/// Returned by [`compile_rule`]. Rules belonging to a grammar are stored
/// inside the [`crate::Grammar`] instead.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleTree {
    text: String,
    nodes: Vec<RuleNode>,
    root: RuleId,
}

impl RuleTree {
    /// The root node of the tree.
    pub fn root(&self) -> Rule<'_> {
        Rule::new(self.root, &self.nodes, &self.text)
    }

    /// Returns the node with the given identifier.
    ///
    /// # Panics
    ///
    /// If the identifier doesn't belong to this tree.
    pub fn rule(&self, id: RuleId) -> Rule<'_> {
        assert!(id.index() < self.nodes.len());
        Rule::new(id, &self.nodes, &self.text)
    }

    /// The BNF expression this tree was compiled from.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no nodes. This never happens for trees
    /// returned by [`compile_rule`].
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Compiles a single BNF expression into a rule tree.
///
/// ```
/// use bnf_rewrite_parser::{compile_rule, NodeKind};
///
/// let tree = compile_rule("'if' '(' Expr ')' Statement").unwrap();
/// assert_eq!(tree.root().kind(), NodeKind::Sequence);
/// assert_eq!(tree.root().branches().len(), 5);
/// ```
pub fn compile_rule(text: &str) -> Result<RuleTree, Error> {
    let mut nodes = Vec::new();
    match Compiler::new(text).compile(0..text.len(), 0, &mut nodes) {
        Ok(root) => Ok(RuleTree { text: text.to_owned(), nodes, root }),
        Err(err) => Err(Error::from(ErrorInfo::invalid_bnf(
            &ReportBuilder::new(),
            &SourceCode::from(text),
            err.msg,
            err.span,
        ))),
    }
}

/// An error found while compiling a BNF expression.
///
/// The compiler doesn't build reports by itself, the caller knows which
/// source code the span refers to and converts this into an [`Error`].
#[derive(Debug)]
pub(crate) struct BnfError {
    pub msg: String,
    pub span: Span,
}

impl BnfError {
    fn new<M: Into<String>>(msg: M, span: Range<usize>) -> Self {
        Self { msg: msg.into(), span: span.into() }
    }
}

/// An expression that has been compiled but not yet stored in an arena.
struct Expr {
    kind: NodeKind,
    span: Range<usize>,
    branches: Vec<Expr>,
    value: Option<Box<str>>,
}

impl Expr {
    fn leaf(kind: NodeKind, span: Range<usize>) -> Self {
        Self { kind, span, branches: vec![], value: None }
    }
}

/// Compiles BNF expressions found in some text.
///
/// The text can contain many expressions, each call to
/// [`Compiler::compile`] receives the range of the expression that must be
/// compiled. Spans in the resulting nodes are relative to the whole text.
pub(crate) struct Compiler<'a> {
    text: &'a str,
}

impl<'a> Compiler<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Compiles the expression in the given range and appends the
    /// resulting nodes to `nodes`. Returns the identifier of the root node.
    pub fn compile(
        &self,
        range: Range<usize>,
        definition: u32,
        nodes: &mut Vec<RuleNode>,
    ) -> Result<RuleId, BnfError> {
        let expr = self.expr(range.start, range.end)?;
        Ok(Self::store(expr, definition, nodes))
    }

    /// Stores an expression and all its descendants in the arena, children
    /// are stored before their parents.
    fn store(expr: Expr, definition: u32, nodes: &mut Vec<RuleNode>) -> RuleId {
        let branches = expr
            .branches
            .into_iter()
            .map(|branch| Self::store(branch, definition, nodes))
            .collect();

        let id = RuleId(nodes.len() as u32);

        nodes.push(RuleNode {
            kind: expr.kind,
            span: expr.span.into(),
            branches,
            value: expr.value,
            definition,
        });

        id
    }

    fn trim(&self, mut begin: usize, mut end: usize) -> (usize, usize) {
        let bytes = self.text.as_bytes();
        while begin < end && bytes[begin].is_ascii_whitespace() {
            begin += 1;
        }
        while end > begin && bytes[end - 1].is_ascii_whitespace() {
            end -= 1;
        }
        (begin, end)
    }

    fn expr(&self, begin: usize, end: usize) -> Result<Expr, BnfError> {
        let (begin, end) = self.trim(begin, end);

        if begin >= end {
            return Err(BnfError::new("expecting an expression", begin..begin));
        }

        let bytes = self.text.as_bytes();

        // Positions of the opening brackets that haven't been closed yet.
        let mut open = Vec::new();
        // Position of the opening quote, if inside a literal.
        let mut quote = None;
        let mut first_space = None;
        let mut i = begin;

        while i < end {
            let b = bytes[i];
            if quote.is_some() {
                match b {
                    b'\\' => i += 1,
                    b'\'' => quote = None,
                    _ => {}
                }
            } else {
                match b {
                    b'\'' => quote = Some(i),
                    b'(' | b'[' | b'{' => open.push(i),
                    b')' | b']' | b'}' => match open.pop() {
                        Some(pos) if closing(bytes[pos]) == b => {}
                        Some(pos) => {
                            return Err(BnfError::new(
                                format!(
                                    "`{}` doesn't match `{}`",
                                    b as char, bytes[pos] as char
                                ),
                                i..i + 1,
                            ))
                        }
                        None => {
                            return Err(BnfError::new(
                                format!("unmatched `{}`", b as char),
                                i..i + 1,
                            ))
                        }
                    },
                    b'|' if open.is_empty() => {
                        return self.choice(begin, i, end);
                    }
                    b if b.is_ascii_whitespace()
                        && open.is_empty()
                        && first_space.is_none()
                        && !matches!(
                            bytes.get(i + 1),
                            Some(b'|' | b')' | b']' | b'}')
                        ) =>
                    {
                        first_space = Some(i)
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        if let Some(pos) = quote {
            return Err(BnfError::new("unterminated literal", pos..end));
        }

        if let Some(pos) = open.pop() {
            return Err(BnfError::new(
                format!("unclosed `{}`", bytes[pos] as char),
                pos..pos + 1,
            ));
        }

        match first_space {
            Some(pos) => self.sequence(begin, pos, end),
            None => self.atom(begin, end),
        }
    }

    fn choice(
        &self,
        begin: usize,
        pipe: usize,
        end: usize,
    ) -> Result<Expr, BnfError> {
        let (left_begin, left_end) = self.trim(begin, pipe);

        if left_begin >= left_end {
            return Err(BnfError::new(
                "expecting an expression before `|`",
                pipe..pipe + 1,
            ));
        }

        let left = self.expr(left_begin, left_end)?;
        let right = self.expr(pipe + 1, end)?;

        let mut branches = vec![left];
        let span = begin..right.span.end;

        if right.kind == NodeKind::Choice {
            branches.extend(right.branches);
        } else {
            branches.push(right);
        }

        Ok(Expr { kind: NodeKind::Choice, span, branches, value: None })
    }

    fn sequence(
        &self,
        begin: usize,
        space: usize,
        end: usize,
    ) -> Result<Expr, BnfError> {
        let left = self.expr(begin, space)?;
        let right = self.expr(space + 1, end)?;

        let mut branches = vec![left];
        let span = begin..right.span.end;

        if right.kind == NodeKind::Sequence {
            branches.extend(right.branches);
        } else {
            branches.push(right);
        }

        Ok(Expr { kind: NodeKind::Sequence, span, branches, value: None })
    }

    fn atom(&self, begin: usize, end: usize) -> Result<Expr, BnfError> {
        let bytes = self.text.as_bytes();
        match bytes[begin] {
            b'(' | b'[' | b'{' => {
                let close = self.matching_bracket(begin, end);
                if close + 1 != end {
                    return Err(BnfError::new(
                        "unexpected text after closing bracket",
                        close + 1..end,
                    ));
                }
                let mut inner = self.expr(begin + 1, close)?;
                Ok(match bytes[begin] {
                    b'(' => {
                        inner.span = begin..end;
                        inner
                    }
                    b'[' => Expr {
                        kind: NodeKind::Optional,
                        span: begin..end,
                        branches: vec![inner],
                        value: None,
                    },
                    _ => Expr {
                        kind: NodeKind::Repetition,
                        span: begin..end,
                        branches: vec![inner],
                        value: None,
                    },
                })
            }
            b'\'' => {
                let (literal, close) = self.literal(begin + 1, end);
                if close + 1 != end {
                    return Err(BnfError::new(
                        "unexpected text after literal",
                        close + 1..end,
                    ));
                }
                let mut token = Expr::leaf(NodeKind::Token, begin..end);
                token.value = Some(literal.into_boxed_str());
                Ok(token)
            }
            _ => {
                let text = &self.text[begin..end];
                match text {
                    "TOKEN" => {
                        return Ok(Expr::leaf(NodeKind::TokenKeyword, begin..end))
                    }
                    "IDENTIFIER" => {
                        return Ok(Expr::leaf(
                            NodeKind::IdentifierKeyword,
                            begin..end,
                        ))
                    }
                    "NEW_LINE" => {
                        return Ok(Expr::leaf(NodeKind::NewlineKeyword, begin..end))
                    }
                    _ => {}
                }
                if let Some((offset, c)) =
                    text.char_indices().find(|(_, c)| !is_ident_char(*c))
                {
                    let pos = begin + offset;
                    return Err(BnfError::new(
                        format!("unexpected `{}` in rule name `{}`", c, text),
                        pos..pos + c.len_utf8(),
                    ));
                }
                let mut ident = Expr::leaf(NodeKind::Identifier, begin..end);
                ident.value = Some(text.into());
                Ok(ident)
            }
        }
    }

    /// Returns the position of the bracket that closes the one at `begin`.
    ///
    /// Brackets are known to be balanced at this point, as [`Compiler::expr`]
    /// already checked them.
    fn matching_bracket(&self, begin: usize, end: usize) -> usize {
        let bytes = self.text.as_bytes();
        let mut depth = 0;
        let mut in_quotes = false;
        let mut i = begin;
        while i < end {
            match bytes[i] {
                b'\\' if in_quotes => i += 1,
                b'\'' => in_quotes = !in_quotes,
                b'(' | b'[' | b'{' if !in_quotes => depth += 1,
                b')' | b']' | b'}' if !in_quotes => {
                    depth -= 1;
                    if depth == 0 {
                        return i;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        end - 1
    }

    /// Reads a literal starting at `begin`, right after the opening quote.
    /// Returns the literal with escape sequences resolved, and the position
    /// of the closing quote.
    fn literal(&self, begin: usize, end: usize) -> (String, usize) {
        let mut literal = String::new();
        let mut chars = self.text[begin..end].char_indices();
        while let Some((offset, c)) = chars.next() {
            match c {
                '\\' => {
                    if let Some((_, escaped)) = chars.next() {
                        literal.push(escaped);
                    }
                }
                '\'' => return (literal, begin + offset),
                c => literal.push(c),
            }
        }
        // Quotes are known to be balanced, this is not reached.
        (literal, end - 1)
    }
}

fn closing(bracket: u8) -> u8 {
    match bracket {
        b'(' => b')',
        b'[' => b']',
        _ => b'}',
    }
}
