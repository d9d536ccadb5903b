// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serial fanout of run events to subscribers.

use super::{RunEvent, RunEventKind};
use crate::{
    errors::WriteEventError,
    time::{stopwatch, StopwatchStart},
    tree::TestTree,
};
use chrono::Local;
use debug_ignore::DebugIgnore;
use tracing::warn;

/// A subscriber to run events.
///
/// Listeners are called on the consumer that owns the tree, one event at
/// a time, in arrival order. The tree reference is a read-only view that
/// is only consistent for the duration of the call.
pub trait RunListener: Send {
    /// Handles one event. An error is logged by the [`Reporter`] and the
    /// fanout continues with the next listener.
    fn on_event(&mut self, tree: &TestTree, event: &RunEvent) -> Result<(), WriteEventError>;
}

/// Fans run events out to zero or more listeners.
///
/// The listener list is only mutated between notifications (there is a
/// single writer), so dispatch iterates it directly. A listener that
/// returns an error skips that one event; it is not removed.
#[derive(Debug, Default)]
pub struct Reporter {
    listeners: DebugIgnore<Vec<Box<dyn RunListener>>>,
    stopwatch: Option<StopwatchStart>,
}

impl Reporter {
    /// Creates a reporter with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a listener. Later listeners see each event after earlier
    /// ones.
    pub fn add_listener(&mut self, listener: Box<dyn RunListener>) {
        self.listeners.push(listener);
    }

    /// Stamps `kind` with the current time and elapsed duration and hands
    /// it to every listener in order.
    pub(crate) fn notify(&mut self, tree: &TestTree, kind: RunEventKind) {
        let stopwatch = self.stopwatch.get_or_insert_with(stopwatch);
        let event = RunEvent {
            timestamp: Local::now().fixed_offset(),
            elapsed: stopwatch.elapsed(),
            kind,
        };
        for listener in self.listeners.iter_mut() {
            if let Err(error) = listener.on_event(tree, &event) {
                warn!(%error, "listener failed to handle {:?}", event.kind);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording(Arc<Mutex<Vec<String>>>, &'static str);

    impl RunListener for Recording {
        fn on_event(&mut self, _tree: &TestTree, event: &RunEvent) -> Result<(), WriteEventError> {
            self.0
                .lock()
                .unwrap()
                .push(format!("{}:{:?}", self.1, event.kind));
            Ok(())
        }
    }

    struct Failing;

    impl RunListener for Failing {
        fn on_event(&mut self, _tree: &TestTree, _event: &RunEvent) -> Result<(), WriteEventError> {
            Err(WriteEventError::Io(std::io::Error::other("sink closed")))
        }
    }

    fn count_event() -> RunEventKind {
        RunEventKind::TestsCountInSuite { count: 1 }
    }

    #[test]
    fn listeners_receive_events_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = Reporter::new();
        reporter.add_listener(Box::new(Recording(log.clone(), "a")));
        reporter.add_listener(Box::new(Recording(log.clone(), "b")));

        let tree = TestTree::new();
        reporter.notify(&tree, count_event());
        reporter.notify(&tree, RunEventKind::TestingStarted { root: tree.root() });

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log[0].starts_with("a:") && log[1].starts_with("b:"));
        assert!(log[0].contains("TestsCountInSuite") && log[2].contains("TestingStarted"));
    }

    #[test]
    fn a_failing_listener_does_not_stop_the_fanout() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = Reporter::new();
        reporter.add_listener(Box::new(Failing));
        reporter.add_listener(Box::new(Recording(log.clone(), "after")));

        let tree = TestTree::new();
        reporter.notify(&tree, count_event());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn elapsed_grows_between_events() {
        struct Elapsed(Arc<Mutex<Vec<std::time::Duration>>>);
        impl RunListener for Elapsed {
            fn on_event(
                &mut self,
                _tree: &TestTree,
                event: &RunEvent,
            ) -> Result<(), WriteEventError> {
                self.0.lock().unwrap().push(event.elapsed);
                Ok(())
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut reporter = Reporter::new();
        reporter.add_listener(Box::new(Elapsed(seen.clone())));

        let tree = TestTree::new();
        reporter.notify(&tree, count_event());
        reporter.notify(&tree, count_event());

        let seen = seen.lock().unwrap();
        assert!(seen[1] >= seen[0]);
    }
}
