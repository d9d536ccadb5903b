// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-node lifecycle states and their legal transitions.
//!
//! A node only moves forward: `NotStarted` into a running state, a running
//! state into exactly one terminal state. The one exception is
//! [`LifecycleState::Terminated`], which every state accepts once: it
//! records that the producing process went away before the node could
//! finish normally.

/// The payload of a comparison-style failure: references to the expected
/// and actual content, opaque to this crate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComparisonFailure {
    /// Reference to the expected content.
    pub expected_file: String,
    /// Reference to the actual content.
    pub actual_file: String,
}

/// One recorded failure. A node can accumulate several of these: repeated
/// failure reports never overwrite earlier ones, and a comparison failure
/// and a plain failure both survive if both occur.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FailureRecord {
    /// The failure message.
    pub message: String,
    /// An optional stack trace or other detail text.
    pub details: Option<String>,
    /// Comparison payload, for expected-vs-actual failures.
    pub comparison: Option<ComparisonFailure>,
}

/// The lifecycle state of a tree node.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LifecycleState {
    /// Initial state: the node exists (e.g. from a pre-announced tree) but
    /// no start has been observed.
    NotStarted,
    /// A leaf test in progress.
    Running,
    /// A suite in progress.
    SuiteRunning,
    /// Leaf terminal: finished without failures.
    Passed,
    /// Leaf terminal: one or more assertion failures.
    Failed {
        /// The accumulated failures, in arrival order.
        failures: Vec<FailureRecord>,
    },
    /// Leaf terminal: like `Failed`, but the first report was flagged as
    /// an error (an unexpected problem rather than an assertion).
    Error {
        /// The accumulated failures, in arrival order.
        failures: Vec<FailureRecord>,
    },
    /// Leaf terminal: deliberately not run.
    Ignored {
        /// The ignore reason, if reported.
        message: Option<String>,
        /// An optional stack trace or other detail text.
        details: Option<String>,
    },
    /// The producing process went away before this node finished.
    Terminated,
    /// Suite terminal: finished with no children at all.
    EmptyLeafSuite,
    /// Suite terminal: every descendant is a suite without leaves.
    EmptySuite,
    /// Suite terminal: finished with no defective children.
    PassedSuite,
    /// Suite terminal: at least one descendant failed.
    FailedSuite,
    /// Suite terminal: at least one descendant errored.
    ErrorSuite,
    /// Suite terminal: defective children, but none failed or errored
    /// (i.e. ignored tests only).
    WithIgnoredTestsSuite,
    /// Root-only terminal: the run produced no structured events at all,
    /// so nothing was ever reported.
    TestsReporterNotAttached,
}

/// Coarse classification of a state, for aggregate queries over children.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum NodeStatus {
    /// Never started.
    NotRun,
    /// In progress.
    Running,
    /// Terminated by process death.
    Terminated,
    /// Deliberately not run.
    Ignored,
    /// Finished without being a pass/fail carrier itself (empty or fully
    /// passed suites).
    Complete,
    /// A passed leaf test.
    Passed,
    /// Failed.
    Failed,
    /// Errored.
    Error,
}

impl LifecycleState {
    /// The coarse status of this state.
    pub fn status(&self) -> NodeStatus {
        match self {
            LifecycleState::NotStarted => NodeStatus::NotRun,
            LifecycleState::Running | LifecycleState::SuiteRunning => NodeStatus::Running,
            LifecycleState::Passed => NodeStatus::Passed,
            LifecycleState::Failed { .. } | LifecycleState::FailedSuite => NodeStatus::Failed,
            LifecycleState::Error { .. } | LifecycleState::ErrorSuite => NodeStatus::Error,
            LifecycleState::Ignored { .. } | LifecycleState::WithIgnoredTestsSuite => {
                NodeStatus::Ignored
            }
            LifecycleState::Terminated => NodeStatus::Terminated,
            LifecycleState::EmptyLeafSuite
            | LifecycleState::EmptySuite
            | LifecycleState::PassedSuite
            | LifecycleState::TestsReporterNotAttached => NodeStatus::Complete,
        }
    }

    /// True for every terminal state.
    pub fn is_final(&self) -> bool {
        !matches!(
            self,
            LifecycleState::NotStarted | LifecycleState::Running | LifecycleState::SuiteRunning
        )
    }

    /// True while the node is running.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, LifecycleState::Running | LifecycleState::SuiteRunning)
    }

    /// True once a start has been observed (including every state after).
    pub fn was_launched(&self) -> bool {
        !matches!(self, LifecycleState::NotStarted)
    }

    /// True if the node ended because the process went away.
    pub fn was_terminated(&self) -> bool {
        matches!(self, LifecycleState::Terminated)
    }

    /// True for states that count as "something went wrong here" when a
    /// parent suite aggregates its children. Ignored counts: a suite
    /// containing only ignored tests is reported as such, not as passed.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            LifecycleState::Failed { .. }
                | LifecycleState::Error { .. }
                | LifecycleState::Ignored { .. }
                | LifecycleState::Terminated
                | LifecycleState::FailedSuite
                | LifecycleState::ErrorSuite
                | LifecycleState::WithIgnoredTestsSuite
                | LifecycleState::TestsReporterNotAttached
        )
    }

    /// True for states that count as passed when asking "does this subtree
    /// contain passes": a passed leaf, or a completed suite.
    pub fn is_passed(&self) -> bool {
        matches!(self.status(), NodeStatus::Passed | NodeStatus::Complete)
    }

    /// Records a failure report, accumulating into an existing failure
    /// state or replacing a non-failure state.
    pub fn add_failure(
        &mut self,
        message: String,
        details: Option<String>,
        is_error: bool,
        comparison: Option<ComparisonFailure>,
    ) {
        let record = FailureRecord {
            message,
            details,
            comparison,
        };
        match self {
            LifecycleState::Failed { failures } | LifecycleState::Error { failures } => {
                failures.push(record);
            }
            _ => {
                let failures = vec![record];
                *self = if is_error {
                    LifecycleState::Error { failures }
                } else {
                    LifecycleState::Failed { failures }
                };
            }
        }
    }

    /// The accumulated failure records, if this is a failure state.
    pub fn failures(&self) -> &[FailureRecord] {
        match self {
            LifecycleState::Failed { failures } | LifecycleState::Error { failures } => failures,
            _ => &[],
        }
    }
}
