/*! Parse trees produced by the [`crate::Parser`].

A [`ParseTree`] is lossless: every node knows the exact range of the source
code it covers, and whitespace between tokens is part of the range covered by
their common ancestors. This makes possible to reconstruct the source code
from the tree, with [`ParseTree::render`].

Nodes can be decorated after the tree has been built. A decoration is a
prefix or a suffix that is inserted before or after the text covered by the
node, or the node can be hidden, which removes its text from the output.
Decorations never modify the source code or the structure of the tree, they
are applied only when the tree is rendered.

```
use bnf_rewrite_parser::Grammar;
use bnf_rewrite_parser::tree::DFSEvent;

let grammar: Grammar = "Call: IDENTIFIER '(' [ IDENTIFIER ] ')'".parse().unwrap();
let mut tree = grammar.parse("Call", "foo ( bar )").unwrap();

let identifiers: Vec<_> = tree
    .dfs(tree.root())
    .filter_map(|event| match event {
        DFSEvent::Enter(id) if tree.node(id).as_str() == "bar" => Some(id),
        _ => None,
    })
    .collect();

tree.set_prefix(identifiers[0], "&");

assert_eq!(tree.to_string(), "foo ( &bar )");
```
 */
use std::fmt::{Debug, Display, Formatter};

use crate::bnf::{Rule, RuleId};
use crate::{Grammar, NodeKind, Span};

pub use crate::tree::dfs::{DFSEvent, DFSIter};

#[cfg(feature = "ascii-tree")]
mod ascii_tree;
mod dfs;
mod render;


/// Identifies a node in a [`ParseTree`].
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Data stored for each node in a [`ParseTree`].
#[derive(Clone, Debug)]
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub span: Span,
    /// Rule node that this node was matched against.
    pub rule: RuleId,
    pub parent: Option<NodeId>,
    /// Children of this node. Choices have one entry per alternative, with
    /// `None` for the alternatives that didn't match.
    pub branches: Vec<Option<NodeId>>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub hidden: bool,
}

impl NodeData {
    pub(crate) fn new(
        kind: NodeKind,
        rule: RuleId,
        span: Span,
        branches: Vec<Option<NodeId>>,
    ) -> Self {
        Self {
            kind,
            span,
            rule,
            parent: None,
            branches,
            prefix: None,
            suffix: None,
            hidden: false,
        }
    }
}

/// The result of parsing some source code.
///
/// The tree holds references to the grammar used for parsing and to the
/// source code itself.
pub struct ParseTree<'g, 'src> {
    grammar: &'g Grammar,
    source: &'src str,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl<'g, 'src> ParseTree<'g, 'src> {
    pub(crate) fn new(
        grammar: &'g Grammar,
        source: &'src str,
        nodes: Vec<NodeData>,
        root: NodeId,
    ) -> Self {
        Self { grammar, source, nodes, root }
    }

    /// Root node of the tree.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns a view of the node with the given identifier.
    ///
    /// # Panics
    ///
    /// If the identifier doesn't belong to this tree.
    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node {
            id,
            data: &self.nodes[id.index()],
            source: self.source,
            grammar: self.grammar,
        }
    }

    /// Grammar used for building this tree.
    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Source code covered by this tree.
    pub fn source(&self) -> &'src str {
        self.source
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree doesn't have any node. This never happens
    /// for trees returned by the parser.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sets the text that is inserted before the node when rendering.
    ///
    /// Decorations of nodes that don't cover any text are ignored, unless
    /// the node is the one being rendered.
    pub fn set_prefix<S: Into<String>>(&mut self, id: NodeId, prefix: S) -> &mut Self {
        self.nodes[id.index()].prefix = Some(prefix.into());
        self
    }

    /// Sets the text that is inserted after the node when rendering.
    ///
    /// Decorations of nodes that don't cover any text are ignored, unless
    /// the node is the one being rendered.
    pub fn set_suffix<S: Into<String>>(&mut self, id: NodeId, suffix: S) -> &mut Self {
        self.nodes[id.index()].suffix = Some(suffix.into());
        self
    }

    /// Hides the node or makes it visible again. The text covered by a
    /// hidden node is not rendered, but the decorations of its descendants
    /// are.
    pub fn set_hidden(&mut self, id: NodeId, yes: bool) -> &mut Self {
        self.nodes[id.index()].hidden = yes;
        self
    }

    /// Removes the prefix, the suffix and the hidden flag from a node.
    pub fn clear_decorations(&mut self, id: NodeId) -> &mut Self {
        let node = &mut self.nodes[id.index()];
        node.prefix = None;
        node.suffix = None;
        node.hidden = false;
        self
    }

    /// Returns the children of a node, skipping absent alternatives.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.index()].branches.iter().flatten().copied()
    }

    /// Returns the ancestors of a node, starting with its parent and ending
    /// with the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes[id.index()].parent, move |id| {
            self.nodes[id.index()].parent
        })
    }

    /// Returns an iterator that traverses the subtree rooted at `id` in
    /// depth-first order.
    pub fn dfs(&self, id: NodeId) -> DFSIter<'_, 'g, 'src> {
        DFSIter::new(self, id)
    }

    #[inline]
    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    /// Number of ancestors of a node.
    pub(crate) fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }
}

impl Display for ParseTree<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render(self.root))
    }
}

impl Debug for ParseTree<'_, '_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseTree")
            .field("root", &self.node(self.root))
            .field("len", &self.nodes.len())
            .finish()
    }
}

/// A read-only view of a node in a [`ParseTree`].
#[derive(Clone, Copy)]
pub struct Node<'a> {
    id: NodeId,
    data: &'a NodeData,
    source: &'a str,
    grammar: &'a Grammar,
}

impl<'a> Node<'a> {
    /// Identifier of this node.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Kind of this node.
    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind
    }

    /// Range of the source code covered by this node.
    pub fn span(&self) -> Span {
        self.data.span.clone()
    }

    /// Source code covered by this node, without decorations.
    pub fn as_str(&self) -> &'a str {
        &self.source[self.data.span.range()]
    }

    /// Returns true if the node doesn't cover any text.
    pub fn is_empty(&self) -> bool {
        self.data.span.is_empty()
    }

    /// Identifier of the rule node that this node was matched against.
    #[inline]
    pub fn definition(&self) -> RuleId {
        self.data.rule
    }

    /// Rule node that this node was matched against.
    pub fn rule(&self) -> Rule<'a> {
        self.grammar.rule(self.data.rule)
    }

    /// Name of the grammar definition that contains the rule this node was
    /// matched against.
    pub fn definition_name(&self) -> &'a str {
        self.grammar.definition_name(self.data.rule)
    }

    /// Parent of this node, `None` for the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.data.parent
    }

    /// Branches of this node, `None` stands for a choice alternative that
    /// didn't match.
    pub fn branches(&self) -> &'a [Option<NodeId>] {
        &self.data.branches
    }

    pub fn prefix(&self) -> Option<&'a str> {
        self.data.prefix.as_deref()
    }

    pub fn suffix(&self) -> Option<&'a str> {
        self.data.suffix.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.data.hidden
    }
}

impl Debug for Node<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("span", &self.data.span)
            .field("text", &self.as_str())
            .finish()
    }
}
