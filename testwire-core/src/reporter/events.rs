// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The events handed to subscribers.

use crate::tree::NodeId;
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use testwire_protocol::OutputChannel;

/// A run event.
///
/// Events are produced by the
/// [`EventConverter`](crate::converter::EventConverter) as it applies wire
/// events to the tree, and consumed by [`RunListener`](super::RunListener)
/// implementations.
#[derive(Clone, Debug)]
pub struct RunEvent {
    /// The time at which the event was generated, including the offset
    /// from UTC.
    pub timestamp: DateTime<FixedOffset>,

    /// The amount of time elapsed since processing started.
    pub elapsed: Duration,

    /// The kind of run event this is.
    pub kind: RunEventKind,
}

/// The kind of run event this is.
///
/// Node ids refer into the tree passed alongside the event and are only
/// guaranteed valid at the moment of the notification: a listener hopping
/// to another thread must copy what it needs first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RunEventKind {
    /// The run started (or restarted, discarding the previous tree).
    TestingStarted {
        /// The root node.
        root: NodeId,
    },
    /// The run finished, normally or by termination; the root's state
    /// tells which.
    TestingFinished {
        /// The root node.
        root: NodeId,
    },
    /// The producer announced how many tests the upcoming suite holds.
    TestsCountInSuite {
        /// The announced count.
        count: u64,
    },
    /// A suite began.
    SuiteStarted {
        /// The suite node.
        suite: NodeId,
    },
    /// A suite reached its terminal state.
    SuiteFinished {
        /// The suite node.
        suite: NodeId,
    },
    /// A test began.
    TestStarted {
        /// The test node.
        test: NodeId,
    },
    /// A test reached its terminal state.
    TestFinished {
        /// The test node.
        test: NodeId,
    },
    /// A test recorded a failure (it may still be running).
    TestFailed {
        /// The test node.
        test: NodeId,
    },
    /// A test was marked ignored.
    TestIgnored {
        /// The test node.
        test: NodeId,
    },
    /// Output was attributed to a named test.
    TestOutput {
        /// The test node.
        test: NodeId,
        /// The channel the output belongs to.
        channel: OutputChannel,
    },
    /// Output arrived without a test attribution and was attached
    /// heuristically.
    UncapturedOutput {
        /// The node the output was attached to.
        node: NodeId,
        /// The channel the output arrived on.
        channel: OutputChannel,
    },
    /// An error annotation was attached to a node.
    ErrorReported {
        /// The node the error was attached to.
        node: NodeId,
        /// True for critical errors.
        critical: bool,
    },
    /// A pre-announced suite node was added to the tree.
    SuiteTreeStarted {
        /// The suite node.
        suite: NodeId,
    },
    /// A pre-announced test node was added to the tree.
    SuiteTreeNodeAdded {
        /// The test node.
        test: NodeId,
    },
    /// The root's presentation metadata changed.
    RootPresentationAdded,
    /// Progress-bar accounting: category and count.
    CustomProgressTestsCategory {
        /// The category, or `None` to reset to default accounting.
        category: Option<String>,
        /// The number of tests in the category.
        count: u64,
    },
    /// Progress-bar accounting: one test started.
    CustomProgressTestStarted,
    /// Progress-bar accounting: one test finished.
    CustomProgressTestFinished,
    /// Progress-bar accounting: one test failed.
    CustomProgressTestFailed,
}
