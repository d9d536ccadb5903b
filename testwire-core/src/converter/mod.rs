// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application of wire events to the tree.
//!
//! The main type here is [`EventConverter`]. It owns the tree, the stack
//! of open suites, and the registry of running tests, and it is meant to
//! be driven from a single consumer: every event mutates state and then
//! notifies the [`Reporter`](crate::reporter::Reporter) before the next
//! event is looked at. Nothing in here panics on wire input: bad input
//! is warned about and recovered from.

mod suite_stack;
mod tree_builder;

use crate::{
    config::ProcessorConfig,
    reporter::{Reporter, RunEventKind},
    tree::{ComparisonFailure, NodeId, TestTree},
    wire::WireEvent,
};
use indexmap::IndexMap;
use std::sync::Arc;
use suite_stack::SuiteStack;
use testwire_protocol::OutputChannel;
use tracing::{debug, warn};
use tree_builder::{PendingTreeNode, TreeBuilder, ROOT_WIRE_ID};

/// Resolves opaque location references to something the consumer can
/// navigate to. The core never interprets the references itself; it only
/// stores them and hands this resolver back out.
pub trait LocationResolver: Send + Sync {
    /// Resolves a wire-side location reference, with the node's metadata
    /// as additional context.
    fn resolve(&self, location: &str, metadata: Option<&str>) -> Option<String>;
}

/// Applies [`WireEvent`]s to a [`TestTree`] and republishes the results.
pub struct EventConverter {
    config: ProcessorConfig,
    tree: TestTree,
    stack: SuiteStack,
    running: IndexMap<String, NodeId>,
    builder: TreeBuilder,
    locator: Option<Arc<dyn LocationResolver>>,
    finished: bool,
    reporter: Reporter,
}

impl EventConverter {
    /// Creates a converter publishing to the given reporter.
    pub fn new(config: ProcessorConfig, reporter: Reporter) -> Self {
        Self {
            config,
            tree: TestTree::new(),
            stack: SuiteStack::default(),
            running: IndexMap::new(),
            builder: TreeBuilder::default(),
            locator: None,
            finished: false,
            reporter,
        }
    }

    /// The tree being built.
    pub fn tree(&self) -> &TestTree {
        &self.tree
    }

    /// Registers the resolver consumers use for location references.
    pub fn set_locator(&mut self, locator: Arc<dyn LocationResolver>) {
        self.locator = Some(locator);
    }

    /// The registered location resolver, if any.
    pub fn locator(&self) -> Option<&Arc<dyn LocationResolver>> {
        self.locator.as_ref()
    }

    /// Applies one wire event. Events must be applied in exactly the
    /// order they were recognized: suite and test resolution depends on
    /// the stack and registry state built by earlier events.
    pub fn apply(&mut self, event: WireEvent) {
        match event {
            WireEvent::TestingStarted => self.on_testing_started(),
            WireEvent::TestingFinished => self.finish_testing(),
            WireEvent::TestCount { count } => {
                self.reporter
                    .notify(&self.tree, RunEventKind::TestsCountInSuite { count });
            }
            WireEvent::TestStarted {
                name,
                location,
                metadata,
                is_config,
            } => self.on_test_started(name, location, metadata, is_config),
            WireEvent::TestFinished {
                name,
                duration_ms,
                output_file,
            } => self.on_test_finished(&name, duration_ms, output_file),
            WireEvent::TestFailed {
                name,
                message,
                details,
                is_error,
                comparison,
            } => self.on_test_failed(&name, message, details, is_error, comparison),
            WireEvent::TestIgnored {
                name,
                message,
                details,
            } => self.on_test_ignored(&name, message, details),
            WireEvent::TestOutput {
                name,
                text,
                channel,
            } => self.on_test_output(&name, text, channel),
            WireEvent::SuiteStarted {
                name,
                location,
                metadata,
            } => self.on_suite_started(name, location, metadata),
            WireEvent::SuiteFinished { name } => self.on_suite_finished(&name),
            WireEvent::ReporterAttached => {
                self.tree.root_meta_mut().tests_reporter_attached = true;
            }
            WireEvent::SuiteTreeStarted {
                name,
                location,
                node_id,
                parent_node_id,
            } => self.on_tree_declaration(name, location, node_id, parent_node_id, true),
            WireEvent::SuiteTreeNode {
                name,
                location,
                node_id,
                parent_node_id,
            } => self.on_tree_declaration(name, location, node_id, parent_node_id, false),
            WireEvent::SuiteTreeEnded { name } => {
                debug!("tree declaration for suite `{name}` ended");
            }
            WireEvent::BuildTreeEnded => self.flush_tree_batch(),
            WireEvent::RootPresentation {
                name,
                comment,
                location,
            } => self.on_root_presentation(name, comment, location),
            WireEvent::CustomProgressCategory { category, count } => {
                self.reporter.notify(
                    &self.tree,
                    RunEventKind::CustomProgressTestsCategory { category, count },
                );
            }
            WireEvent::CustomProgressTestStarted => {
                self.reporter
                    .notify(&self.tree, RunEventKind::CustomProgressTestStarted);
            }
            WireEvent::CustomProgressTestFinished => {
                self.reporter
                    .notify(&self.tree, RunEventKind::CustomProgressTestFinished);
            }
            WireEvent::CustomProgressTestFailed => {
                self.reporter
                    .notify(&self.tree, RunEventKind::CustomProgressTestFailed);
            }
            WireEvent::Error {
                message,
                details,
                critical,
            } => self.on_error(message, details, critical),
            WireEvent::UncapturedOutput { text, channel } => {
                self.on_uncaptured_output(text, channel);
            }
        }
    }

    /// Starts the run: the root goes onto the suite stack and into its
    /// running state. If a run is already live, the old tree is discarded
    /// first: the producer restarted testing.
    pub fn on_testing_started(&mut self) {
        if self.tree.node(self.tree.root()).state().was_launched() {
            debug!(framework = %self.config.framework, "testing restarted, discarding previous run");
            self.running.clear();
            self.builder.reset();
            self.finished = false;
            self.tree.testing_restarted();
        }
        let root = self.tree.root();
        self.stack.clear();
        self.stack.push(root);
        self.tree.start(root, true);
        self.reporter
            .notify(&self.tree, RunEventKind::TestingStarted { root });
    }

    /// Ends the run. Idempotent. If tests or suites are still unfinished
    /// at this point the producer died mid-run, and the whole tree is
    /// marked terminated instead of finished.
    pub fn finish_testing(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let root = self.tree.root();
        if !self.running.is_empty() || self.tree.has_unfinished_nodes() {
            warn!(
                framework = %self.config.framework,
                still_running = self.running.len(),
                "stream ended with unfinished nodes, marking the run terminated"
            );
            self.tree.terminate(root);
        } else {
            self.tree.finish(root);
        }
        // Break references promptly; the next run gets fresh state.
        self.running.clear();
        self.stack.clear();
        self.reporter
            .notify(&self.tree, RunEventKind::TestingFinished { root });
    }

    fn on_suite_started(
        &mut self,
        name: String,
        location: Option<String>,
        metadata: Option<String>,
    ) {
        let parent = self.current_suite();
        let suite = self.resolve_or_create(parent, &name, true);
        self.tree.set_location(suite, location);
        self.tree.set_metadata(suite, metadata);
        self.tree.start(suite, true);
        self.stack.push(suite);
        self.reporter
            .notify(&self.tree, RunEventKind::SuiteStarted { suite });
    }

    fn on_suite_finished(&mut self, name: &str) {
        match self.stack.pop_named(&self.tree, name) {
            Some(suite) => {
                self.tree.finish(suite);
                self.reporter
                    .notify(&self.tree, RunEventKind::SuiteFinished { suite });
            }
            None => {
                warn!(
                    framework = %self.config.framework,
                    "testSuiteFinished for `{name}`, but no such suite is open"
                );
            }
        }
    }

    fn on_test_started(
        &mut self,
        name: String,
        location: Option<String>,
        metadata: Option<String>,
        is_config: bool,
    ) {
        if self.running.contains_key(&name) {
            warn!(
                framework = %self.config.framework,
                "test `{name}` is already running, a second start arrived for the same name"
            );
        }
        let parent = self.current_suite();
        let test = self.resolve_or_create(parent, &name, false);
        self.tree.set_location(test, location);
        self.tree.set_metadata(test, metadata);
        self.tree.set_config(test, is_config);
        self.tree.start(test, false);
        self.running.insert(name, test);
        self.reporter
            .notify(&self.tree, RunEventKind::TestStarted { test });
    }

    fn on_test_finished(
        &mut self,
        name: &str,
        duration_ms: Option<u64>,
        output_file: Option<String>,
    ) {
        let Some(test) = self.lookup_or_recover(name, "testFinished") else {
            return;
        };
        if let Some(duration_ms) = duration_ms {
            self.tree.set_duration(test, duration_ms);
        }
        self.tree.set_output_file(test, output_file);
        self.tree.finish(test);
        self.running.shift_remove(name);
        self.reporter
            .notify(&self.tree, RunEventKind::TestFinished { test });
    }

    fn on_test_failed(
        &mut self,
        name: &str,
        message: String,
        details: Option<String>,
        is_error: bool,
        comparison: Option<ComparisonFailure>,
    ) {
        let Some(test) = self.lookup_or_recover(name, "testFailed") else {
            return;
        };
        self.tree
            .add_failure(test, message, details, is_error, comparison);
        self.reporter
            .notify(&self.tree, RunEventKind::TestFailed { test });
    }

    fn on_test_ignored(&mut self, name: &str, message: Option<String>, details: Option<String>) {
        let Some(test) = self.lookup_or_recover(name, "testIgnored") else {
            return;
        };
        self.tree.ignore(test, message, details);
        self.reporter
            .notify(&self.tree, RunEventKind::TestIgnored { test });
    }

    fn on_test_output(&mut self, name: &str, text: String, channel: OutputChannel) {
        let Some(test) = self.lookup_or_recover(name, "test output") else {
            return;
        };
        self.tree.add_output(test, text, channel);
        self.reporter
            .notify(&self.tree, RunEventKind::TestOutput { test, channel });
    }

    /// Output with no test attribution goes to the single running test if
    /// there is exactly one, otherwise to the innermost open suite. With
    /// several tests running in parallel the wire gives no way to tell
    /// whose output this is.
    fn on_uncaptured_output(&mut self, text: String, channel: OutputChannel) {
        let node = self.output_target();
        self.tree.add_output(node, text, channel);
        self.reporter
            .notify(&self.tree, RunEventKind::UncapturedOutput { node, channel });
    }

    fn on_error(&mut self, message: String, details: Option<String>, critical: bool) {
        let node = self.output_target();
        self.tree.add_error(node, message, details, critical);
        self.reporter
            .notify(&self.tree, RunEventKind::ErrorReported { node, critical });
    }

    fn on_root_presentation(
        &mut self,
        name: String,
        comment: Option<String>,
        location: Option<String>,
    ) {
        let meta = self.tree.root_meta_mut();
        meta.presentation = Some(name);
        meta.comment = comment;
        meta.location = location;
        self.reporter
            .notify(&self.tree, RunEventKind::RootPresentationAdded);
    }

    fn on_tree_declaration(
        &mut self,
        name: String,
        location: Option<String>,
        node_id: String,
        parent_node_id: Option<String>,
        is_suite: bool,
    ) {
        self.builder.push(PendingTreeNode {
            name,
            location,
            node_id,
            parent_node_id,
            is_suite,
        });
        if self.builder.pending_len() >= self.config.max_tree_build_batch {
            self.flush_tree_batch();
        }
    }

    /// Applies buffered tree declarations. Batching keeps huge
    /// pre-declared trees from costing one notification round-trip per
    /// node on pathological producers.
    fn flush_tree_batch(&mut self) {
        let pending = self.builder.take_pending();
        if pending.is_empty() {
            return;
        }
        let root = self.tree.root();
        self.tree.set_tree_build_before_start(root);
        for declared in pending {
            let parent = match declared.parent_node_id.as_deref() {
                None => root,
                Some(ROOT_WIRE_ID) => root,
                Some(wire_id) => match self.builder.lookup(wire_id) {
                    Some(parent) => parent,
                    None => {
                        warn!(
                            framework = %self.config.framework,
                            "tree declaration for `{}` names unknown parent `{wire_id}`, \
                             attaching to the root",
                            declared.name
                        );
                        root
                    }
                },
            };
            let id = self.tree.new_node(parent, declared.name, declared.is_suite);
            self.tree.set_location(id, declared.location);
            self.tree.set_tree_build_before_start(id);
            self.tree.set_preserve_presentable_name(id, true);
            self.builder.record(declared.node_id, id);
            let kind = if declared.is_suite {
                RunEventKind::SuiteTreeStarted { suite: id }
            } else {
                RunEventKind::SuiteTreeNodeAdded { test: id }
            };
            self.reporter.notify(&self.tree, kind);
        }
    }

    fn current_suite(&self) -> NodeId {
        match self.stack.top() {
            Some(suite) => suite,
            None => {
                warn!(
                    framework = %self.config.framework,
                    "no suite is open, attaching to the root"
                );
                self.tree.root()
            }
        }
    }

    fn output_target(&self) -> NodeId {
        if self.running.len() == 1 {
            self.running[0]
        } else {
            self.current_suite()
        }
    }

    fn resolve_or_create(&mut self, parent: NodeId, name: &str, want_suite: bool) -> NodeId {
        match self.tree.find_unlaunched_child(parent, name, want_suite) {
            Some(id) => id,
            None => self.tree.new_node(parent, name, want_suite),
        }
    }

    /// Looks up a running test by full name. An unregistered name gets a
    /// start synthesized for it, so that failure/ignore/output events
    /// arriving without one don't kill the pipeline; in strict mode the
    /// event is dropped instead.
    fn lookup_or_recover(&mut self, name: &str, operation: &str) -> Option<NodeId> {
        if let Some(&test) = self.running.get(name) {
            return Some(test);
        }
        if self.config.strict {
            warn!(
                framework = %self.config.framework,
                "{operation} for unregistered test `{name}`, dropping the event"
            );
            return None;
        }
        warn!(
            framework = %self.config.framework,
            "{operation} for unregistered test `{name}`, synthesizing a start"
        );
        self.on_test_started(name.to_owned(), None, None, false);
        self.running.get(name).copied()
    }
}
