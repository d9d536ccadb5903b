// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Buffering for pre-announced tree declarations.

use crate::tree::NodeId;
use std::collections::HashMap;

/// The wire-side parent id that means "directly under the root".
pub(super) const ROOT_WIRE_ID: &str = "0";

/// One buffered tree declaration, applied to the tree when its batch is
/// flushed.
#[derive(Debug)]
pub(super) struct PendingTreeNode {
    pub(super) name: String,
    pub(super) location: Option<String>,
    pub(super) node_id: String,
    pub(super) parent_node_id: Option<String>,
    pub(super) is_suite: bool,
}

/// Accumulates tree declarations and the mapping from wire-side node ids
/// to arena ids as batches get applied.
#[derive(Debug, Default)]
pub(super) struct TreeBuilder {
    pending: Vec<PendingTreeNode>,
    ids: HashMap<String, NodeId>,
}

impl TreeBuilder {
    pub(super) fn push(&mut self, node: PendingTreeNode) {
        self.pending.push(node);
    }

    pub(super) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(super) fn take_pending(&mut self) -> Vec<PendingTreeNode> {
        std::mem::take(&mut self.pending)
    }

    /// Maps a wire-side node id to its arena node, once flushed.
    pub(super) fn lookup(&self, wire_id: &str) -> Option<NodeId> {
        self.ids.get(wire_id).copied()
    }

    pub(super) fn record(&mut self, wire_id: String, id: NodeId) {
        self.ids.insert(wire_id, id);
    }

    pub(super) fn reset(&mut self) {
        self.pending.clear();
        self.ids.clear();
    }
}
