use rustc_hash::FxHashSet;

use crate::bnf::RuleId;
use crate::parser::hooks::{ExtensionHook, KeywordHook, WhitespaceHook};
use crate::tree::{NodeData, NodeId};
use crate::{Grammar, NodeKind, Position, Span};

/// A structure that holds information about the parsing process.
///
/// A new context is created for every call to [`crate::Parser::parse`], so
/// nothing is shared between parses except the grammar itself.
pub(crate) struct Context<'a, 'g, 'src> {
    pub(crate) grammar: &'g Grammar,
    pub(crate) text: &'src str,

    pub(crate) keywords: &'a dyn KeywordHook,
    pub(crate) extension: &'a dyn ExtensionHook,
    pub(crate) whitespace: &'a dyn WhitespaceHook,

    /// Rules being matched at the moment, with the range of text they are
    /// being matched against. Entering a rule that is already in this set
    /// means that the grammar is recursing without consuming input.
    pub(crate) in_progress: FxHashSet<(RuleId, usize, usize)>,

    /// Farthest offset ever consumed by a successful match.
    pub(crate) farthest: usize,

    /// Number of nested rules being matched.
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,

    /// Nodes of the parse tree being built.
    pub(crate) nodes: Vec<NodeData>,

    lines: LineIndex,
}

impl<'a, 'g, 'src> Context<'a, 'g, 'src> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        text: &'src str,
        keywords: &'a dyn KeywordHook,
        extension: &'a dyn ExtensionHook,
        whitespace: &'a dyn WhitespaceHook,
        max_depth: usize,
        tab_width: usize,
    ) -> Self {
        Self {
            grammar,
            text,
            keywords,
            extension,
            whitespace,
            in_progress: FxHashSet::default(),
            farthest: 0,
            depth: 0,
            max_depth,
            nodes: Vec::new(),
            lines: LineIndex::new(text, tab_width),
        }
    }

    /// Returns the offset of the first character at or after `begin` that
    /// is not whitespace, according to the whitespace hook.
    ///
    /// Offsets returned by the hook that are out of range or not at a
    /// character boundary are ignored.
    pub(crate) fn skip_whitespace(&self, begin: usize, end: usize) -> usize {
        let pos = self.whitespace.skip_whitespace(self.text, begin, end);
        if pos < begin || pos > end || !self.text.is_char_boundary(pos) {
            begin
        } else {
            pos
        }
    }

    /// Records that the text up to `pos` was consumed.
    #[inline]
    pub(crate) fn advance(&mut self, pos: usize) {
        self.farthest = self.farthest.max(pos);
    }

    /// Converts an offset into a line and column.
    pub(crate) fn position(&self, offset: usize) -> Position {
        self.lines.position(self.text, offset)
    }

    /// Returns the character starting at `offset`, if any.
    #[inline]
    pub(crate) fn char_at(&self, offset: usize) -> Option<char> {
        self.text.get(offset..).and_then(|s| s.chars().next())
    }

    #[inline]
    pub(crate) fn span(&self, node: NodeId) -> &Span {
        &self.nodes[node.index()].span
    }

    /// Returns the current number of nodes, nodes created after this call
    /// can be discarded with [`Context::restore`].
    #[inline]
    pub(crate) fn bookmark(&self) -> usize {
        self.nodes.len()
    }

    /// Discards every node created after the bookmark.
    #[inline]
    pub(crate) fn restore(&mut self, bookmark: usize) {
        self.nodes.truncate(bookmark)
    }

    /// Creates a node without children covering `begin..end`.
    pub(crate) fn push_leaf(
        &mut self,
        kind: NodeKind,
        rule: RuleId,
        begin: usize,
        end: usize,
    ) -> NodeId {
        self.push(NodeData::new(kind, rule, Span::new(begin, end), vec![]))
    }

    /// Creates a node with the given children. The node covers the text
    /// from the first present child to the end of the last one, or is empty
    /// at `begin` if there are no children.
    pub(crate) fn push_branch(
        &mut self,
        kind: NodeKind,
        rule: RuleId,
        begin: usize,
        branches: Vec<Option<NodeId>>,
    ) -> NodeId {
        let mut present = branches.iter().flatten();

        let span = match present.next() {
            Some(first) => {
                let start = self.span(*first).start();
                let end = present
                    .map(|child| self.span(*child).end())
                    .fold(self.span(*first).end(), usize::max);
                Span::new(start, end)
            }
            None => Span::new(begin, begin),
        };

        let id = NodeId::new(self.nodes.len());

        for child in branches.iter().flatten() {
            self.nodes[child.index()].parent = Some(id);
        }

        self.push(NodeData::new(kind, rule, span, branches))
    }

    fn push(&mut self, node: NodeData) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        id
    }
}

/// Maps offsets to lines and columns.
///
/// The starting offset of every line is computed in advance, columns are
/// computed on demand by walking the line up to the requested offset. Tabs
/// advance the column by `tab_width`.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    tab_width: usize,
}

impl LineIndex {
    pub(crate) fn new(text: &str, tab_width: usize) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts, tab_width }
    }

    pub(crate) fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let line = match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line - 1,
        };
        let start = self.starts[line];
        let column = match text.get(start..offset) {
            Some(s) => s
                .chars()
                .map(|c| if c == '\t' { self.tab_width } else { 1 })
                .sum(),
            None => offset - start,
        };
        Position { line: line + 1, column: column + 1 }
    }
}
