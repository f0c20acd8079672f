//! Depth-first traversal of parse trees.
//!
//! [`DFSIter`] walks a [`ParseTree`] and emits a [`DFSEvent`] for each node.
//! An `Enter` event is emitted when a node is visited for the first time,
//! before visiting its children, and a `Leave` event is emitted after all
//! its children have been visited. Choice alternatives that didn't match
//! produce an `Absent` event, so consumers that care about the position of
//! each branch can still follow the shape of the grammar.
//!
//! # Example
//!
//! Collecting the names of the definitions matched at the top of each
//! statement, without visiting the statements' contents:
//!
//! ```rust
//! use bnf_rewrite_parser::Grammar;
//! use bnf_rewrite_parser::tree::DFSEvent;
//!
//! let grammar = Grammar::load([
//!     "Block: { Stmt }",
//!     "Stmt: Assign | Call",
//!     "Assign: IDENTIFIER '=' IDENTIFIER ';'",
//!     "Call: IDENTIFIER '(' ')' ';'",
//! ]).unwrap();
//!
//! let tree = grammar.parse("Block", "a = b; f(); c = d;").unwrap();
//! let mut iter = tree.dfs(tree.root());
//! let mut statements = Vec::new();
//!
//! while let Some(event) = iter.next() {
//!     if let DFSEvent::Enter(id) = event {
//!         let node = tree.node(id);
//!         if matches!(node.definition_name(), "Assign" | "Call") {
//!             statements.push(node.definition_name());
//!             iter.prune();
//!         }
//!     }
//! }
//!
//! assert_eq!(statements, vec!["Assign", "Call", "Assign"]);
//! ```
use crate::tree::{NodeId, ParseTree};

/// Events yielded by [`DFSIter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DFSEvent {
    Enter(NodeId),
    Leave(NodeId),
    /// A branch of `parent` that is absent, `index` is its position among
    /// the parent's branches.
    Absent { parent: NodeId, index: usize },
}

/// An iterator that traverses a [`ParseTree`] in depth-first order.
pub struct DFSIter<'a, 'g, 'src> {
    tree: &'a ParseTree<'g, 'src>,
    stack: Vec<DFSEvent>,
}

impl<'a, 'g, 'src> DFSIter<'a, 'g, 'src> {
    /// Creates a new iterator that traverses the subtree rooted at `root`.
    pub fn new(tree: &'a ParseTree<'g, 'src>, root: NodeId) -> Self {
        Self { tree, stack: vec![DFSEvent::Enter(root)] }
    }

    /// Prevents the traversal from visiting the children of the current
    /// node.
    ///
    /// If `prune` is called immediately after a [`DFSEvent::Enter`], the
    /// children of the node that was entered are not visited, and the next
    /// event is the [`DFSEvent::Leave`] for that node.
    ///
    /// If `prune` is called after a [`DFSEvent::Leave`], the remaining
    /// siblings of the node that was left are not visited, and the next
    /// event is the [`DFSEvent::Leave`] for its parent.
    pub fn prune(&mut self) {
        while let Some(DFSEvent::Enter(_) | DFSEvent::Absent { .. }) =
            self.stack.last()
        {
            self.stack.pop();
        }
    }
}

impl Iterator for DFSIter<'_, '_, '_> {
    type Item = DFSEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.stack.pop()?;

        if let DFSEvent::Enter(id) = event {
            self.stack.push(DFSEvent::Leave(id));
            for (index, branch) in
                self.tree.data(id).branches.iter().enumerate().rev()
            {
                self.stack.push(match branch {
                    Some(child) => DFSEvent::Enter(*child),
                    None => DFSEvent::Absent { parent: id, index },
                });
            }
        }

        Some(event)
    }
}
