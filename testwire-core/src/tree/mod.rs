// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The hierarchical record of a test run.
//!
//! Nodes live in an arena owned by [`TestTree`] and are addressed by
//! [`NodeId`]. A node owns the list of its children's ids; the parent id
//! it also carries is a lookup aid, not ownership. All mutation goes
//! through the tree, on the single consumer that owns it; everything
//! handed to subscribers is a read-only view that is only guaranteed
//! consistent at the moment of the notification.

mod state;

pub use state::*;

use smallvec::SmallVec;
use std::cell::Cell;
use testwire_protocol::OutputChannel;
use tracing::warn;

/// Identifies a node within its [`TestTree`].
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The name given to the root node.
pub const ROOT_NAME: &str = "[root]";

/// A chunk of output attached to a node, in arrival order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputEntry {
    /// The output text.
    pub text: String,
    /// The channel it arrived on.
    pub channel: OutputChannel,
}

/// An error annotation attached to a node (not a test failure: a problem
/// reported by the producing process outside any assertion).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorAnnotation {
    /// The error message.
    pub message: String,
    /// An optional stack trace or other detail text.
    pub details: Option<String>,
    /// True for critical errors, which mark the node and all its
    /// ancestors permanently.
    pub critical: bool,
}

/// Presentation metadata for the root node, fed by the wire rather than
/// configured.
#[derive(Clone, Debug, Default)]
pub struct RootMeta {
    /// True once the producing process has identified itself as a
    /// structured reporter. A run that ends without this set produces the
    /// dedicated "nothing was reported" terminal state.
    pub tests_reporter_attached: bool,
    /// True if consumers should render only the root's own output rather
    /// than interleaving children.
    pub print_own_content_only: bool,
    /// Display name for the root, if announced.
    pub presentation: Option<String>,
    /// Free-form comment for the root, if announced.
    pub comment: Option<String>,
    /// Location reference for the root, if announced.
    pub location: Option<String>,
}

/// A single suite or test node.
#[derive(Debug)]
pub struct TestNode {
    name: String,
    is_suite: bool,
    location: Option<String>,
    metadata: Option<String>,
    preserve_presentable_name: bool,
    is_config: bool,
    parent: Option<NodeId>,
    children: SmallVec<[NodeId; 4]>,
    state: LifecycleState,
    // Duration cache. For leaves the value is authoritative once set; for
    // suites it is the cached sum over children with known durations.
    duration: Cell<Option<u64>>,
    duration_cached: Cell<bool>,
    has_critical_errors: bool,
    has_passed_tests: Cell<bool>,
    has_passed_tests_cached: Cell<bool>,
    is_empty: Cell<bool>,
    is_empty_cached: Cell<bool>,
    stacktrace: Option<String>,
    output_file: Option<String>,
    tree_build_before_start: bool,
    output: Vec<OutputEntry>,
    errors: Vec<ErrorAnnotation>,
}

impl TestNode {
    fn new(name: String, is_suite: bool, parent: Option<NodeId>) -> Self {
        Self {
            name,
            is_suite,
            location: None,
            metadata: None,
            preserve_presentable_name: false,
            is_config: false,
            parent,
            children: SmallVec::new(),
            state: LifecycleState::NotStarted,
            duration: Cell::new(None),
            duration_cached: Cell::new(false),
            has_critical_errors: false,
            has_passed_tests: Cell::new(false),
            has_passed_tests_cached: Cell::new(false),
            is_empty: Cell::new(true),
            is_empty_cached: Cell::new(false),
            stacktrace: None,
            output_file: None,
            tree_build_before_start: false,
            output: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// The node's name. Unique only as a registry key (full test name),
    /// not across the tree.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for suites (including the root).
    pub fn is_suite(&self) -> bool {
        self.is_suite
    }

    /// The opaque location reference, if one was announced.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Opaque metadata attached at start, if any.
    pub fn metadata(&self) -> Option<&str> {
        self.metadata.as_deref()
    }

    /// True if this node is a configuration step rather than a real test.
    pub fn is_config(&self) -> bool {
        self.is_config
    }

    /// The parent id; `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child ids in discovery order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The node's current lifecycle state.
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// True once a critical error has been attached to this node or any
    /// descendant. Never reset.
    pub fn has_critical_errors(&self) -> bool {
        self.has_critical_errors
    }

    /// The first stack trace seen for this node, from a failure, ignore,
    /// or error annotation.
    pub fn stacktrace(&self) -> Option<&str> {
        self.stacktrace.as_deref()
    }

    /// The output file reference announced at finish, if any.
    pub fn output_file(&self) -> Option<&str> {
        self.output_file.as_deref()
    }

    /// True if the node came from a pre-announced tree declaration rather
    /// than being discovered live.
    pub fn tree_build_before_start(&self) -> bool {
        self.tree_build_before_start
    }

    /// Output attached to this node, in arrival order.
    pub fn output(&self) -> &[OutputEntry] {
        &self.output
    }

    /// Error annotations attached to this node, in arrival order.
    pub fn errors(&self) -> &[ErrorAnnotation] {
        &self.errors
    }

    fn set_stacktrace_if_not_set(&mut self, stacktrace: Option<&str>) {
        if self.stacktrace.is_none() {
            self.stacktrace = stacktrace.map(str::to_owned);
        }
    }
}

/// The arena of nodes for one test run.
#[derive(Debug)]
pub struct TestTree {
    nodes: Vec<TestNode>,
    root_meta: RootMeta,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Creates a tree containing only the root suite.
    pub fn new() -> Self {
        Self {
            nodes: vec![TestNode::new(ROOT_NAME.to_owned(), true, None)],
            root_meta: RootMeta::default(),
        }
    }

    /// The root node's id.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Looks up a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree (or to a discarded
    /// generation of it). Ids are only handed out by this tree, so this
    /// indicates a caller holding on to ids across a run restart.
    pub fn node(&self, id: NodeId) -> &TestNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut TestNode {
        &mut self.nodes[id.index()]
    }

    /// Presentation metadata for the root.
    pub fn root_meta(&self) -> &RootMeta {
        &self.root_meta
    }

    /// Mutable presentation metadata for the root.
    pub fn root_meta_mut(&mut self) -> &mut RootMeta {
        &mut self.root_meta
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds nothing but the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// All node ids, root first, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    /// Creates a node under `parent` and returns its id.
    pub fn new_node(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        is_suite: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(TestNode::new(name.into(), is_suite, Some(parent)));
        self.node_mut(parent).children.push(id);
        id
    }

    /// Sets the opaque location reference on a node.
    pub fn set_location(&mut self, id: NodeId, location: Option<String>) {
        if location.is_some() {
            self.node_mut(id).location = location;
        }
    }

    /// Sets the opaque metadata on a node.
    pub fn set_metadata(&mut self, id: NodeId, metadata: Option<String>) {
        if metadata.is_some() {
            self.node_mut(id).metadata = metadata;
        }
    }

    /// Marks a node as a configuration step.
    pub fn set_config(&mut self, id: NodeId, is_config: bool) {
        self.node_mut(id).is_config = is_config;
    }

    /// Marks a node as preserving its name verbatim for presentation.
    pub fn set_preserve_presentable_name(&mut self, id: NodeId, preserve: bool) {
        self.node_mut(id).preserve_presentable_name = preserve;
    }

    /// Marks a node as declared by a pre-announced tree.
    pub fn set_tree_build_before_start(&mut self, id: NodeId) {
        self.node_mut(id).tree_build_before_start = true;
    }

    /// Records the output-file reference announced at finish.
    pub fn set_output_file(&mut self, id: NodeId, output_file: Option<String>) {
        if output_file.is_some() {
            self.node_mut(id).output_file = output_file;
        }
    }

    /// Transitions a node into its running state. `as_suite` upgrades a
    /// node that was announced as a test into a suite, which happens when
    /// a pre-announced leaf turns out to contain children.
    pub fn start(&mut self, id: NodeId, as_suite: bool) {
        let node = self.node_mut(id);
        if as_suite {
            node.is_suite = true;
        }
        if node.state.was_launched() {
            return;
        }
        node.state = if node.is_suite {
            LifecycleState::SuiteRunning
        } else {
            LifecycleState::Running
        };
    }

    /// Finishes a node: a running leaf passes, a running suite computes
    /// its terminal state from its children. Calling this on a node that
    /// is already terminal is a no-op.
    pub fn finish(&mut self, id: NodeId) {
        if self.node(id).state.is_final() {
            return;
        }
        let state = if self.node(id).is_suite {
            self.determine_suite_state(id)
        } else {
            LifecycleState::Passed
        };
        self.node_mut(id).state = state;
    }

    /// Records a failure report on a node, accumulating with any failures
    /// already present.
    pub fn add_failure(
        &mut self,
        id: NodeId,
        message: String,
        details: Option<String>,
        is_error: bool,
        comparison: Option<ComparisonFailure>,
    ) {
        let node = self.node_mut(id);
        node.set_stacktrace_if_not_set(details.as_deref());
        node.state.add_failure(message, details, is_error, comparison);
    }

    /// Marks a node ignored.
    pub fn ignore(&mut self, id: NodeId, message: Option<String>, details: Option<String>) {
        let node = self.node_mut(id);
        node.set_stacktrace_if_not_set(details.as_deref());
        node.state = LifecycleState::Ignored { message, details };
    }

    /// Terminates a node and (children first) its whole subtree. A node
    /// that already reached a terminal state is left as is.
    pub fn terminate(&mut self, id: NodeId) {
        if self.node(id).state.is_final() {
            return;
        }
        let children: SmallVec<[NodeId; 4]> = self.node(id).children.clone();
        for child in children {
            self.terminate(child);
        }
        self.node_mut(id).state = LifecycleState::Terminated;
    }

    /// Attaches output to a node.
    pub fn add_output(&mut self, id: NodeId, text: String, channel: OutputChannel) {
        self.node_mut(id).output.push(OutputEntry { text, channel });
    }

    /// Attaches an error annotation to a node. A critical error marks the
    /// node and all its ancestors permanently.
    pub fn add_error(
        &mut self,
        id: NodeId,
        message: String,
        details: Option<String>,
        critical: bool,
    ) {
        let node = self.node_mut(id);
        node.set_stacktrace_if_not_set(details.as_deref());
        node.errors.push(ErrorAnnotation {
            message,
            details,
            critical,
        });
        if critical {
            let mut current = Some(id);
            while let Some(node_id) = current {
                let node = self.node_mut(node_id);
                if node.has_critical_errors {
                    break;
                }
                node.has_critical_errors = true;
                current = node.parent;
            }
        }
    }

    /// Sets a leaf's duration in milliseconds, updating ancestor caches by
    /// the delta (or invalidating them if the duration shrank). Suites
    /// never get their duration set directly; attempting it only
    /// invalidates the ancestor chain.
    pub fn set_duration(&mut self, id: NodeId, duration_ms: u64) {
        if self.node(id).is_suite {
            warn!("ignoring attempt to set duration directly on suite `{}`", self.node(id).name);
            self.invalidate_ancestor_durations(id);
            return;
        }
        let node = self.node(id);
        let old = node.duration.get().unwrap_or(0);
        node.duration.set(Some(duration_ms));
        node.duration_cached.set(true);
        if duration_ms >= old {
            self.bump_ancestor_durations(id, duration_ms - old);
        } else {
            self.invalidate_ancestor_durations(id);
        }
    }

    fn bump_ancestor_durations(&self, id: NodeId, delta: u64) {
        let mut current = self.node(id).parent;
        while let Some(node_id) = current {
            let node = self.node(node_id);
            if node.duration_cached.get() {
                node.duration
                    .set(Some(node.duration.get().unwrap_or(0) + delta));
            }
            current = node.parent;
        }
    }

    fn invalidate_ancestor_durations(&self, id: NodeId) {
        let mut current = self.node(id).parent;
        while let Some(node_id) = current {
            let node = self.node(node_id);
            node.duration.set(None);
            node.duration_cached.set(false);
            current = node.parent;
        }
    }

    /// The node's duration in milliseconds: the reported value for
    /// leaves, the cached sum of children with known durations for
    /// suites. `None` means unknown.
    pub fn duration(&self, id: NodeId) -> Option<u64> {
        let node = self.node(id);
        if node.duration_cached.get() || !node.is_suite {
            return node.duration.get();
        }
        let mut total = 0u64;
        let mut any_known = false;
        for &child in &node.children {
            if let Some(duration) = self.duration(child) {
                any_known = true;
                total += duration;
            }
        }
        let computed = any_known.then_some(total);
        node.duration.set(computed);
        node.duration_cached.set(true);
        computed
    }

    /// True if the node's state (together with its children, for running
    /// suites) signals a problem.
    pub fn is_defect(&self, id: NodeId) -> bool {
        let node = self.node(id);
        match &node.state {
            LifecycleState::Running => !node.errors.is_empty(),
            LifecycleState::SuiteRunning => {
                node.children.iter().any(|&child| self.is_defect(child))
            }
            state => state.is_defect(),
        }
    }

    /// True if this subtree contains at least one passed test. The answer
    /// is cached once the node has finished.
    pub fn has_passed_tests(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.has_passed_tests_cached.get() {
            return node.has_passed_tests.get();
        }
        let has_passed = node.state.is_passed()
            || node
                .children
                .iter()
                .any(|&child| self.has_passed_tests(child));
        if !node.state.is_in_progress() && node.state.was_launched() {
            node.has_passed_tests.set(has_passed);
            node.has_passed_tests_cached.set(true);
        }
        has_passed
    }

    /// True for a suite whose entire subtree contains no leaf tests.
    /// Leaves themselves report true; the answer for an unfinished suite
    /// is not cached, since children may still appear.
    pub fn is_empty_suite(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.is_empty_cached.get() {
            return node.is_empty.get();
        }
        if !node.is_suite {
            node.is_empty.set(true);
            node.is_empty_cached.set(true);
            return true;
        }
        let mut is_empty = true;
        let mut cacheable = node.state.is_final();
        for &child in &node.children {
            if self.node(child).is_suite {
                if !self.is_empty_suite(child) {
                    is_empty = false;
                    cacheable = true;
                    break;
                }
            } else {
                is_empty = false;
                cacheable = true;
                break;
            }
        }
        node.is_empty.set(is_empty);
        node.is_empty_cached.set(cacheable);
        is_empty
    }

    /// The name to display for a node: the node name with the parent's
    /// name prefix stripped, unless the node asked for its name verbatim.
    pub fn presentable_name(&self, id: NodeId) -> &str {
        let node = self.node(id);
        let name = node.name.trim();
        if node.preserve_presentable_name {
            return name;
        }
        if let Some(parent) = node.parent {
            let parent_name = self.node(parent).name.trim();
            if let Some(rest) = name.strip_prefix(parent_name) {
                let rest = rest.trim_start_matches(['.', ':', '/']).trim();
                if !rest.is_empty() {
                    return rest;
                }
            }
        }
        name
    }

    /// True if any node below the root has not reached a terminal state,
    /// which at end of stream means the producer died mid-run.
    pub fn has_unfinished_nodes(&self) -> bool {
        self.nodes[1..].iter().any(|node| !node.state.is_final())
    }

    /// Among the not-yet-started children of `parent`, finds one named
    /// `name`, preferring an exact suite/test kind match and falling back
    /// to the first name match of either kind.
    pub fn find_unlaunched_child(
        &self,
        parent: NodeId,
        name: &str,
        want_suite: bool,
    ) -> Option<NodeId> {
        let mut fallback = None;
        for &child in &self.node(parent).children {
            let node = self.node(child);
            if node.state.was_launched() || node.name != name {
                continue;
            }
            if node.is_suite == want_suite {
                return Some(child);
            }
            fallback.get_or_insert(child);
        }
        fallback
    }

    /// Discards every node and starts a fresh run record, keeping only
    /// the root's presentation metadata. Any previously handed out ids
    /// are invalid afterwards.
    pub fn testing_restarted(&mut self) {
        self.nodes.clear();
        self.nodes.push(TestNode::new(ROOT_NAME.to_owned(), true, None));
    }

    fn determine_suite_state(&self, id: NodeId) -> LifecycleState {
        let node = self.node(id);
        if node.children.is_empty() {
            if id == self.root() && !self.root_meta.tests_reporter_attached {
                return LifecycleState::TestsReporterNotAttached;
            }
            return LifecycleState::EmptyLeafSuite;
        }
        if self.is_empty_suite(id) {
            return LifecycleState::EmptySuite;
        }
        if self.is_defect(id) {
            let child_status = |status: NodeStatus| {
                node.children
                    .iter()
                    .any(|&child| self.node(child).state.status() == status)
            };
            if child_status(NodeStatus::Error) {
                LifecycleState::ErrorSuite
            } else if child_status(NodeStatus::Failed) {
                LifecycleState::FailedSuite
            } else {
                LifecycleState::WithIgnoredTestsSuite
            }
        } else {
            LifecycleState::PassedSuite
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn started_suite(tree: &mut TestTree, parent: NodeId, name: &str) -> NodeId {
        let id = tree.new_node(parent, name, true);
        tree.start(id, true);
        id
    }

    fn finished_test(tree: &mut TestTree, parent: NodeId, name: &str, duration: u64) -> NodeId {
        let id = tree.new_node(parent, name, false);
        tree.start(id, false);
        tree.set_duration(id, duration);
        tree.finish(id);
        id
    }

    #[test]
    fn suite_duration_is_sum_of_known_children() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let suite = started_suite(&mut tree, root, "s");
        finished_test(&mut tree, suite, "s.a", 5);
        let unknown = tree.new_node(suite, "s.b", false);
        tree.start(unknown, false);
        tree.finish(unknown);
        finished_test(&mut tree, suite, "s.c", 7);

        assert_eq!(tree.duration(suite), Some(12));
        assert_eq!(tree.duration(unknown), None);
    }

    #[test]
    fn suite_duration_unknown_when_all_children_unknown() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let suite = started_suite(&mut tree, root, "s");
        let test = tree.new_node(suite, "s.a", false);
        tree.start(test, false);
        tree.finish(test);
        assert_eq!(tree.duration(suite), None);
    }

    #[test]
    fn changing_a_leaf_duration_updates_every_ancestor() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let outer = started_suite(&mut tree, root, "outer");
        let inner = started_suite(&mut tree, outer, "outer.inner");
        let test = finished_test(&mut tree, inner, "outer.inner.t", 10);

        assert_eq!(tree.duration(outer), Some(10));
        assert_eq!(tree.duration(root), Some(10));

        // Larger value: cached sums move by the delta.
        tree.set_duration(test, 25);
        assert_eq!(tree.duration(inner), Some(25));
        assert_eq!(tree.duration(outer), Some(25));
        assert_eq!(tree.duration(root), Some(25));

        // Smaller value: caches are dropped and recomputed.
        tree.set_duration(test, 3);
        assert_eq!(tree.duration(outer), Some(3));
        assert_eq!(tree.duration(root), Some(3));
    }

    #[test]
    fn setting_duration_on_suite_is_rejected() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let suite = started_suite(&mut tree, root, "s");
        finished_test(&mut tree, suite, "s.a", 4);
        assert_eq!(tree.duration(suite), Some(4));
        tree.set_duration(suite, 99);
        assert_eq!(tree.duration(suite), Some(4), "still derived from children");
    }

    #[test]
    fn suite_with_no_children_finishes_as_empty_leaf() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let suite = started_suite(&mut tree, root, "s");
        tree.finish(suite);
        assert_eq!(*tree.node(suite).state(), LifecycleState::EmptyLeafSuite);
    }

    #[test]
    fn suite_of_empty_suites_finishes_as_empty() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let outer = started_suite(&mut tree, root, "outer");
        let inner = started_suite(&mut tree, outer, "inner");
        tree.finish(inner);
        tree.finish(outer);
        assert_eq!(*tree.node(outer).state(), LifecycleState::EmptySuite);
    }

    #[test]
    fn suite_terminal_state_reflects_worst_child() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);

        let failed_suite = started_suite(&mut tree, root, "failing");
        finished_test(&mut tree, failed_suite, "failing.ok", 1);
        let failed = tree.new_node(failed_suite, "failing.bad", false);
        tree.start(failed, false);
        tree.add_failure(failed, "assert".to_owned(), None, false, None);
        tree.finish(failed);
        tree.finish(failed_suite);
        assert_eq!(*tree.node(failed_suite).state(), LifecycleState::FailedSuite);

        let error_suite = started_suite(&mut tree, root, "erroring");
        let errored = tree.new_node(error_suite, "erroring.bad", false);
        tree.start(errored, false);
        tree.add_failure(errored, "boom".to_owned(), None, true, None);
        tree.finish(errored);
        tree.finish(error_suite);
        assert_eq!(*tree.node(error_suite).state(), LifecycleState::ErrorSuite);

        let ignored_suite = started_suite(&mut tree, root, "skipping");
        let ignored = tree.new_node(ignored_suite, "skipping.skip", false);
        tree.start(ignored, false);
        tree.ignore(ignored, Some("later".to_owned()), None);
        tree.finish(ignored);
        tree.finish(ignored_suite);
        assert_eq!(
            *tree.node(ignored_suite).state(),
            LifecycleState::WithIgnoredTestsSuite
        );

        // An error suite child propagates error-ness one level up.
        tree.finish(root);
        assert_eq!(*tree.node(root).state(), LifecycleState::ErrorSuite);
    }

    #[test]
    fn root_without_reporter_finishes_as_not_attached() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        tree.finish(root);
        assert_eq!(
            *tree.node(root).state(),
            LifecycleState::TestsReporterNotAttached
        );
    }

    #[test]
    fn root_with_reporter_but_no_tests_is_empty_leaf() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        tree.root_meta_mut().tests_reporter_attached = true;
        tree.finish(root);
        assert_eq!(*tree.node(root).state(), LifecycleState::EmptyLeafSuite);
    }

    #[test]
    fn finish_is_idempotent() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let suite = started_suite(&mut tree, root, "s");
        let test = tree.new_node(suite, "s.t", false);
        tree.start(test, false);
        tree.add_failure(test, "nope".to_owned(), None, false, None);
        tree.finish(test);
        let after_first = tree.node(test).state().clone();
        tree.finish(test);
        assert_eq!(*tree.node(test).state(), after_first);
    }

    #[test]
    fn terminate_is_recursive_and_idempotent() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let suite = started_suite(&mut tree, root, "s");
        let done = finished_test(&mut tree, suite, "s.done", 1);
        let running = tree.new_node(suite, "s.running", false);
        tree.start(running, false);

        tree.terminate(root);
        assert_eq!(*tree.node(root).state(), LifecycleState::Terminated);
        assert_eq!(*tree.node(suite).state(), LifecycleState::Terminated);
        assert_eq!(*tree.node(running).state(), LifecycleState::Terminated);
        // Nodes that already finished keep their result.
        assert_eq!(*tree.node(done).state(), LifecycleState::Passed);

        tree.terminate(root);
        assert_eq!(*tree.node(root).state(), LifecycleState::Terminated);
    }

    #[test]
    fn critical_errors_are_monotonic_and_propagate_to_ancestors() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let suite = started_suite(&mut tree, root, "s");
        let test = tree.new_node(suite, "s.t", false);
        tree.start(test, false);

        tree.add_error(test, "disk on fire".to_owned(), None, true);
        assert!(tree.node(test).has_critical_errors());
        assert!(tree.node(suite).has_critical_errors());
        assert!(tree.node(root).has_critical_errors());

        // Nothing un-sets the flag.
        tree.finish(test);
        tree.finish(suite);
        assert!(tree.node(suite).has_critical_errors());
    }

    #[test]
    fn has_passed_tests_sees_deep_passes() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let suite = started_suite(&mut tree, root, "s");
        assert!(!tree.has_passed_tests(suite));
        finished_test(&mut tree, suite, "s.t", 1);
        assert!(tree.has_passed_tests(suite));
        assert!(tree.has_passed_tests(root));
    }

    #[test]
    fn presentable_name_strips_parent_prefix() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let suite = started_suite(&mut tree, root, "pkg.Suite");
        let test = tree.new_node(suite, "pkg.Suite.testOne", false);
        assert_eq!(tree.presentable_name(test), "testOne");
        assert_eq!(tree.presentable_name(suite), "pkg.Suite");

        let preserved = tree.new_node(suite, "pkg.Suite.testTwo", false);
        tree.set_preserve_presentable_name(preserved, true);
        assert_eq!(tree.presentable_name(preserved), "pkg.Suite.testTwo");
    }

    #[test]
    fn find_unlaunched_child_prefers_kind_match() {
        let mut tree = TestTree::new();
        let root = tree.root();
        let as_test = tree.new_node(root, "x", false);
        let as_suite = tree.new_node(root, "x", true);
        assert_eq!(tree.find_unlaunched_child(root, "x", true), Some(as_suite));
        assert_eq!(tree.find_unlaunched_child(root, "x", false), Some(as_test));

        tree.start(as_suite, true);
        // Kind mismatch falls back to the remaining unstarted node.
        assert_eq!(tree.find_unlaunched_child(root, "x", true), Some(as_test));
        assert_eq!(tree.find_unlaunched_child(root, "missing", true), None);
    }

    #[test]
    fn restart_discards_all_nodes() {
        let mut tree = TestTree::new();
        let root = tree.root();
        tree.start(root, true);
        let suite = started_suite(&mut tree, root, "s");
        finished_test(&mut tree, suite, "s.t", 1);
        assert_eq!(tree.len(), 3);

        tree.testing_restarted();
        assert_eq!(tree.len(), 1);
        assert_eq!(*tree.node(tree.root()).state(), LifecycleState::NotStarted);
    }
}
