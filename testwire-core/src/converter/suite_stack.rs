// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stack of currently open suites.

use crate::tree::{NodeId, TestTree};

/// Currently open suites, innermost last.
///
/// Closing is by name and tolerates out-of-order requests: a suite can be
/// closed while a later-opened one is still on top, which some frameworks
/// produce when they interleave fixtures.
#[derive(Debug, Default)]
pub(super) struct SuiteStack {
    stack: Vec<NodeId>,
}

impl SuiteStack {
    /// The innermost open suite.
    pub(super) fn top(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    pub(super) fn push(&mut self, suite: NodeId) {
        self.stack.push(suite);
    }

    /// Removes and returns the topmost open suite with the given name,
    /// searching downward from the top.
    pub(super) fn pop_named(&mut self, tree: &TestTree, name: &str) -> Option<NodeId> {
        let position = self
            .stack
            .iter()
            .rposition(|&id| tree.node(id).name() == name)?;
        Some(self.stack.remove(position))
    }

    pub(super) fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_named_takes_the_innermost_match() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let a = tree.new_node(root, "a", true);
        let b = tree.new_node(root, "b", true);
        let a_again = tree.new_node(b, "a", true);

        let mut stack = SuiteStack::default();
        stack.push(a);
        stack.push(b);
        stack.push(a_again);

        assert_eq!(stack.pop_named(&tree, "a"), Some(a_again));
        assert_eq!(stack.pop_named(&tree, "a"), Some(a));
        assert_eq!(stack.top(), Some(b));
        assert_eq!(stack.pop_named(&tree, "a"), None);
    }

    #[test]
    fn out_of_order_close_leaves_the_top_open() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let outer = tree.new_node(root, "outer", true);
        let inner = tree.new_node(outer, "inner", true);

        let mut stack = SuiteStack::default();
        stack.push(outer);
        stack.push(inner);

        assert_eq!(stack.pop_named(&tree, "outer"), Some(outer));
        assert_eq!(stack.top(), Some(inner));
    }
}
