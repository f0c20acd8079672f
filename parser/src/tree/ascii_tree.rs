/*! Functions that return an ASCII representation of parse trees. */

use ::ascii_tree::Tree;
use ::ascii_tree::Tree::{Leaf, Node};

use crate::tree::dfs::DFSEvent;
use crate::tree::{NodeId, ParseTree};

impl ParseTree<'_, '_> {
    /// Returns a printable ASCII tree representing the subtree rooted at
    /// `id`.
    ///
    /// Each node is labelled with its kind, nodes that are the root of a
    /// grammar definition also show the definition's name. Nodes without
    /// children show the text they cover. Absent choice alternatives are
    /// not included.
    pub fn ascii_tree(&self, id: NodeId) -> Tree {
        let mut tree_stack: Vec<Tree> = Vec::new();
        let mut len_stack: Vec<usize> = Vec::new();

        for event in self.dfs(id) {
            match event {
                DFSEvent::Enter(_) => {
                    // Anything pushed into `tree_stack` from now until the
                    // Leave event is a child of this node.
                    len_stack.push(tree_stack.len());
                }
                DFSEvent::Leave(id) => {
                    let children_start = len_stack.pop().unwrap();
                    let children: Vec<Tree> =
                        tree_stack.drain(children_start..).collect();
                    tree_stack.push(self.build_tree_for_node(id, children));
                }
                DFSEvent::Absent { .. } => {}
            }
        }

        assert_eq!(tree_stack.len(), 1);
        tree_stack.pop().unwrap()
    }

    /// Returns a String with an ASCII tree representing the subtree rooted
    /// at `id`.
    pub fn ascii_tree_string(&self, id: NodeId) -> String {
        let mut buf = String::new();
        ::ascii_tree::write_tree(&mut buf, &self.ascii_tree(id)).unwrap();
        buf
    }

    fn build_tree_for_node(&self, id: NodeId, children: Vec<Tree>) -> Tree {
        let node = self.node(id);

        let label = if self.grammar.is_definition_root(node.definition()) {
            format!("{} {}", node.kind(), node.definition_name())
        } else {
            node.kind().to_string()
        };

        if children.is_empty() {
            Leaf(vec![format!("{} {:?}", label, node.as_str())])
        } else {
            Node(label, children)
        }
    }
}
