// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed lifecycle events decoded from the wire.
//!
//! [`WireEvent`] is what crosses the producer/consumer boundary: one value
//! per recognized directive (or chunk of plain output), in exactly the
//! order things appeared on the wire. The main type here is
//! [`EventRecognizer`], which turns raw stream fragments into these
//! events.

mod recognizer;

pub use recognizer::*;

use crate::tree::ComparisonFailure;
use testwire_protocol::OutputChannel;

/// A single recognized lifecycle event.
///
/// Field names follow the wire attributes they are decoded from; `name`
/// is always the full test or suite name used as the registry key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WireEvent {
    /// A (re)start of the whole run.
    TestingStarted,
    /// Normal end of the whole run.
    TestingFinished,
    /// The announced number of tests in the upcoming suite.
    TestCount {
        /// The announced count.
        count: u64,
    },
    /// A test began.
    TestStarted {
        /// Full test name.
        name: String,
        /// Opaque location reference.
        location: Option<String>,
        /// Opaque metadata.
        metadata: Option<String>,
        /// True for configuration steps.
        is_config: bool,
    },
    /// A test finished.
    TestFinished {
        /// Full test name.
        name: String,
        /// Reported duration in milliseconds; `None` if not reported.
        duration_ms: Option<u64>,
        /// Reference to a file holding the test's output, if any.
        output_file: Option<String>,
    },
    /// A test reported a failure (possibly one of several).
    TestFailed {
        /// Full test name.
        name: String,
        /// The failure message.
        message: String,
        /// Stack trace or other details.
        details: Option<String>,
        /// True if this was flagged as an error rather than an assertion
        /// failure.
        is_error: bool,
        /// Expected-vs-actual payload, when both halves were present.
        comparison: Option<ComparisonFailure>,
    },
    /// A test was deliberately not run.
    TestIgnored {
        /// Full test name.
        name: String,
        /// The ignore reason.
        message: Option<String>,
        /// Stack trace or other details.
        details: Option<String>,
    },
    /// Captured output attributed to a named test.
    TestOutput {
        /// Full test name.
        name: String,
        /// The output text.
        text: String,
        /// The channel the output belongs to.
        channel: OutputChannel,
    },
    /// A suite began.
    SuiteStarted {
        /// Full suite name.
        name: String,
        /// Opaque location reference.
        location: Option<String>,
        /// Opaque metadata.
        metadata: Option<String>,
    },
    /// A suite finished.
    SuiteFinished {
        /// Full suite name.
        name: String,
    },
    /// The producing process identified itself as a structured reporter.
    ReporterAttached,
    /// A suite node of the pre-announced tree.
    SuiteTreeStarted {
        /// Suite name.
        name: String,
        /// Opaque location reference.
        location: Option<String>,
        /// Wire-side node id.
        node_id: String,
        /// Wire-side parent node id; absent or `"0"` means the root.
        parent_node_id: Option<String>,
    },
    /// A leaf node of the pre-announced tree.
    SuiteTreeNode {
        /// Test name.
        name: String,
        /// Opaque location reference.
        location: Option<String>,
        /// Wire-side node id.
        node_id: String,
        /// Wire-side parent node id; absent or `"0"` means the root.
        parent_node_id: Option<String>,
    },
    /// End of one pre-announced suite's declaration.
    SuiteTreeEnded {
        /// Suite name.
        name: String,
    },
    /// End of the whole pre-announced tree declaration.
    BuildTreeEnded,
    /// Presentation data for the root node.
    RootPresentation {
        /// Display name.
        name: String,
        /// Free-form comment.
        comment: Option<String>,
        /// Opaque location reference.
        location: Option<String>,
    },
    /// Progress-bar accounting: a category of tests with a count.
    /// An empty category means "back to default accounting".
    CustomProgressCategory {
        /// The category name, or `None` to reset.
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
    /// An error reported by the producer outside any one test.
    Error {
        /// The error message.
        message: String,
        /// Stack trace or other details.
        details: Option<String>,
        /// True for errors, false for warnings.
        critical: bool,
    },
    /// Plain output not attributed to any test by the wire.
    UncapturedOutput {
        /// The output text.
        text: String,
        /// The channel the output arrived on.
        channel: OutputChannel,
    },
}
