use std::ops::Range;

use rustc_hash::FxHashMap;

use crate::tree::{NodeId, ParseTree};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Side {
    Prefix,
    Suffix,
}

/// Decorations that must be emitted at each offset of the source code.
type Decorations = FxHashMap<usize, Vec<(NodeId, Side)>>;

impl ParseTree<'_, '_> {
    /// Renders the text covered by a node, with the decorations of the node
    /// and its descendants applied.
    ///
    /// When multiple decorations fall at the same offset, the ones that
    /// close a node are emitted before the ones that open a node, and
    /// decorations of nested nodes are kept nested: the prefix of the outer
    /// node goes before the prefix of the inner one, and the suffix of the
    /// inner node goes before the suffix of the outer one.
    pub fn render(&self, id: NodeId) -> String {
        let span = self.data(id).span.range();

        let mut decorations = Decorations::default();
        let mut hidden = Vec::new();

        self.collect_decorations(id, &mut decorations, &mut hidden);

        if decorations.is_empty() && hidden.is_empty() {
            return self.source[span].to_owned();
        }

        let mut output = String::with_capacity(span.len());
        let mut hidden = hidden.into_iter().peekable();

        for (offset, c) in self.source[span.clone()].char_indices() {
            let offset = span.start + offset;

            if let Some(entries) = decorations.remove(&offset) {
                self.emit_decorations(entries, &mut output);
            }

            while hidden.next_if(|range| range.end <= offset).is_some() {}

            if !hidden.peek().is_some_and(|range| range.start <= offset) {
                output.push(c);
            }
        }

        if let Some(entries) = decorations.remove(&span.end) {
            self.emit_decorations(entries, &mut output);
        }

        output
    }

    /// Walks the subtree rooted at `root`, collecting the decorations and
    /// the ranges of hidden nodes.
    ///
    /// Nodes that don't cover any text are skipped together with their
    /// descendants, except for `root` itself. Only the outermost hidden
    /// nodes are collected, which means that the resulting ranges don't
    /// overlap and are sorted.
    fn collect_decorations(
        &self,
        root: NodeId,
        decorations: &mut Decorations,
        hidden: &mut Vec<Range<usize>>,
    ) {
        let mut stack = vec![(root, false)];

        while let Some((id, inside_hidden)) = stack.pop() {
            let node = self.data(id);

            if id != root && node.span.is_empty() {
                continue;
            }

            if node.prefix.is_some() {
                decorations
                    .entry(node.span.start())
                    .or_default()
                    .push((id, Side::Prefix));
            }

            if node.suffix.is_some() {
                decorations
                    .entry(node.span.end())
                    .or_default()
                    .push((id, Side::Suffix));
            }

            if node.hidden && !inside_hidden {
                hidden.push(node.span.range());
            }

            for child in node.branches.iter().rev().flatten() {
                stack.push((*child, inside_hidden || node.hidden));
            }
        }
    }

    fn emit_decorations(
        &self,
        mut entries: Vec<(NodeId, Side)>,
        output: &mut String,
    ) {
        entries.sort_by_cached_key(|(id, side)| self.emit_order(*id, *side));

        for (id, side) in entries {
            let node = self.data(id);
            let decoration = match side {
                Side::Prefix => node.prefix.as_deref(),
                Side::Suffix => node.suffix.as_deref(),
            };
            output.push_str(decoration.unwrap_or_default());
        }
    }

    /// Sorting key for decorations that fall at the same offset.
    ///
    /// Closing decorations go first: suffixes of nodes without prefix, and
    /// then suffixes of nodes with both prefix and suffix. Among them, nodes
    /// that start later (narrower) close first, and for nodes with the same
    /// range the deepest closes first.
    ///
    /// Opening decorations go next: prefixes of nodes with both prefix and
    /// suffix, and then prefixes of nodes without suffix. Among them, nodes
    /// that end later (wider) open first, and for nodes with the same range
    /// the shallowest opens first.
    ///
    /// A node that doesn't cover any text emits its prefix and then its
    /// suffix, after anything else.
    fn emit_order(&self, id: NodeId, side: Side) -> (u8, usize, usize) {
        let node = self.data(id);

        if node.span.is_empty() {
            return match side {
                Side::Prefix => (4, 0, 0),
                Side::Suffix => (5, 0, 0),
            };
        }

        let depth = self.depth(id);

        match side {
            Side::Suffix => (
                if node.prefix.is_none() { 0 } else { 1 },
                usize::MAX - node.span.start(),
                usize::MAX - depth,
            ),
            Side::Prefix => (
                if node.suffix.is_some() { 2 } else { 3 },
                usize::MAX - node.span.end(),
                depth,
            ),
        }
    }
}
