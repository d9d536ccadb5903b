// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Machine-readable event output.
//!
//! [`StructuredEmitter`] is a listener that writes one JSON object per
//! run event, for tooling that wants to follow a run without linking
//! against this crate's tree model.

use super::{RunEvent, RunEventKind, RunListener};
use crate::{
    errors::WriteEventError,
    tree::{NodeId, TestTree},
};
use serde::Serialize;
use std::io::Write;

/// One emitted line. Fields that don't apply to an event kind are omitted
/// from the JSON.
#[derive(Serialize)]
struct EventRecord<'a> {
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    suite: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
    elapsed_ms: u128,
}

impl<'a> EventRecord<'a> {
    fn new(event: &'static str, run_event: &RunEvent) -> Self {
        Self {
            event,
            name: None,
            suite: None,
            status: None,
            duration_ms: None,
            count: None,
            category: None,
            elapsed_ms: run_event.elapsed.as_millis(),
        }
    }

    fn with_node(mut self, tree: &'a TestTree, id: NodeId) -> Self {
        let node = tree.node(id);
        self.name = Some(node.name());
        self.suite = Some(node.is_suite());
        self.status = Some(status_str(tree, id));
        self.duration_ms = tree.duration(id);
        self
    }
}

fn status_str(tree: &TestTree, id: NodeId) -> &'static str {
    use crate::tree::NodeStatus::*;
    match tree.node(id).state().status() {
        NotRun => "not-run",
        Running => "running",
        Terminated => "terminated",
        Ignored => "ignored",
        Complete => "complete",
        Passed => "passed",
        Failed => "failed",
        Error => "error",
    }
}

/// Writes run events as JSON lines to the wrapped writer.
pub struct StructuredEmitter<W> {
    writer: W,
}

impl<W: Write + Send> StructuredEmitter<W> {
    /// Creates an emitter writing to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> RunListener for StructuredEmitter<W> {
    fn on_event(&mut self, tree: &TestTree, event: &RunEvent) -> Result<(), WriteEventError> {
        let record = match &event.kind {
            RunEventKind::TestingStarted { root } => {
                EventRecord::new("testing-started", event).with_node(tree, *root)
            }
            RunEventKind::TestingFinished { root } => {
                EventRecord::new("testing-finished", event).with_node(tree, *root)
            }
            RunEventKind::TestsCountInSuite { count } => {
                let mut record = EventRecord::new("test-count", event);
                record.count = Some(*count);
                record
            }
            RunEventKind::SuiteStarted { suite } => {
                EventRecord::new("suite-started", event).with_node(tree, *suite)
            }
            RunEventKind::SuiteFinished { suite } => {
                EventRecord::new("suite-finished", event).with_node(tree, *suite)
            }
            RunEventKind::TestStarted { test } => {
                EventRecord::new("test-started", event).with_node(tree, *test)
            }
            RunEventKind::TestFinished { test } => {
                EventRecord::new("test-finished", event).with_node(tree, *test)
            }
            RunEventKind::TestFailed { test } => {
                EventRecord::new("test-failed", event).with_node(tree, *test)
            }
            RunEventKind::TestIgnored { test } => {
                EventRecord::new("test-ignored", event).with_node(tree, *test)
            }
            RunEventKind::TestOutput { test, .. } => {
                EventRecord::new("test-output", event).with_node(tree, *test)
            }
            RunEventKind::UncapturedOutput { node, .. } => {
                EventRecord::new("output", event).with_node(tree, *node)
            }
            RunEventKind::ErrorReported { node, .. } => {
                EventRecord::new("error", event).with_node(tree, *node)
            }
            RunEventKind::SuiteTreeStarted { suite } => {
                EventRecord::new("tree-suite", event).with_node(tree, *suite)
            }
            RunEventKind::SuiteTreeNodeAdded { test } => {
                EventRecord::new("tree-node", event).with_node(tree, *test)
            }
            RunEventKind::RootPresentationAdded => EventRecord::new("root-presentation", event),
            RunEventKind::CustomProgressTestsCategory { category, count } => {
                let mut record = EventRecord::new("progress-category", event);
                record.category = category.as_deref();
                record.count = Some(*count);
                record
            }
            RunEventKind::CustomProgressTestStarted => {
                EventRecord::new("progress-test-started", event)
            }
            RunEventKind::CustomProgressTestFinished => {
                EventRecord::new("progress-test-finished", event)
            }
            RunEventKind::CustomProgressTestFailed => {
                EventRecord::new("progress-test-failed", event)
            }
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}
