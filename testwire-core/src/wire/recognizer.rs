// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recognition of typed events in the reconstructed line stream.
//!
//! [`EventRecognizer`] is the producer-side half of the pipeline: it owns
//! the line splitter, decides which lines are directives, and emits
//! [`WireEvent`]s through a callback in exactly the order lines were
//! recognized. It holds no tree state and never fails: malformed input
//! degrades to warnings and plain output.

use super::WireEvent;
use crate::{config::ProcessorConfig, tree::ComparisonFailure};
use std::borrow::Cow;
use testwire_protocol::{Directive, Line, LineSplitter, OutputChannel};
use tracing::{debug, warn};

/// The marker spliced into the middle of an overlong line.
const ELISION_MARKER: &str = "<...>";

/// Turns raw stream fragments into [`WireEvent`]s.
pub struct EventRecognizer {
    splitter: LineSplitter,
    inner: RecognizerInner,
}

struct RecognizerInner {
    framework: String,
    cycle_buffer_size: Option<usize>,
    // A line consisting solely of its terminator is held back: if a
    // directive follows it was just the mandated separator, otherwise it
    // is real output and gets materialized.
    pending_line_break: bool,
    // The run is started before any directives arrive, so the first
    // `testingStarted` on the wire is redundant; only repeats signal a
    // restart.
    seen_testing_started: bool,
}

impl EventRecognizer {
    /// Creates a recognizer for the given configuration.
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            splitter: LineSplitter::new(),
            inner: RecognizerInner {
                framework: config.framework.clone(),
                cycle_buffer_size: config.cycle_buffer_size,
                pending_line_break: false,
                seen_testing_started: false,
            },
        }
    }

    /// Feeds one stream fragment, emitting every event recognized so far.
    pub fn process(
        &mut self,
        fragment: &str,
        channel: OutputChannel,
        mut emit: impl FnMut(WireEvent),
    ) {
        let inner = &mut self.inner;
        self.splitter
            .process(fragment, channel, |line| inner.handle_line(line, &mut emit));
    }

    /// Flushes buffered partial lines and the pending line break. Called
    /// once the producing process has terminated.
    pub fn flush(&mut self, mut emit: impl FnMut(WireEvent)) {
        let inner = &mut self.inner;
        self.splitter
            .flush(|line| inner.handle_line(line, &mut emit));
        if inner.pending_line_break {
            inner.pending_line_break = false;
            emit(WireEvent::UncapturedOutput {
                text: "\n".to_owned(),
                channel: OutputChannel::Stdout,
            });
        }
    }
}

impl RecognizerInner {
    fn handle_line(&mut self, line: Line<'_>, emit: &mut impl FnMut(WireEvent)) {
        let text = self.bound_line(line.text);

        if let Some(directive) = Directive::parse(&text) {
            // The separator in front of this directive was just protocol
            // framing, not output.
            self.pending_line_break = false;
            self.convert(&directive, emit);
            return;
        }

        if self.pending_line_break {
            self.pending_line_break = false;
            emit(WireEvent::UncapturedOutput {
                text: "\n".to_owned(),
                channel: OutputChannel::Stdout,
            });
        }
        if line.terminated && text == "\n" {
            self.pending_line_break = true;
            return;
        }
        if !text.is_empty() {
            emit(WireEvent::UncapturedOutput {
                text: text.into_owned(),
                channel: line.channel,
            });
        }
    }

    /// Applies the large-line guard: lines longer than the cycle buffer
    /// get their middle elided, keeping a prefix and a short suffix.
    fn bound_line<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let Some(limit) = self.cycle_buffer_size else {
            return Cow::Borrowed(text);
        };
        if text.len() <= limit {
            return Cow::Borrowed(text);
        }
        let prefix_end = floor_char_boundary(text, limit.saturating_sub(105));
        let suffix_start = ceil_char_boundary(text, text.len().saturating_sub(100));
        Cow::Owned(format!(
            "{}{}{}",
            &text[..prefix_end],
            ELISION_MARKER,
            &text[suffix_start..]
        ))
    }

    fn convert(&mut self, directive: &Directive, emit: &mut impl FnMut(WireEvent)) {
        debug!(framework = %self.framework, directive = %directive, "directive recognized");
        match directive.name() {
            "testingStarted" => {
                // The run is live before the wire says anything, so the
                // first occurrence carries no information.
                if self.seen_testing_started {
                    emit(WireEvent::TestingStarted);
                } else {
                    self.seen_testing_started = true;
                }
            }
            "testingFinished" => emit(WireEvent::TestingFinished),
            "testCount" => emit(WireEvent::TestCount {
                count: self.parse_count(directive, "count"),
            }),
            "testStarted" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::TestStarted {
                    name,
                    location: self.location_hint(directive),
                    metadata: directive.attr("metainfo").map(str::to_owned),
                    is_config: directive.attr("config").is_some(),
                });
            }
            "testFinished" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::TestFinished {
                    name,
                    duration_ms: self.parse_duration(directive),
                    output_file: directive.attr("outputFile").map(str::to_owned),
                });
            }
            "testFailed" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                let message = match directive.attr("message") {
                    Some(message) => message.to_owned(),
                    None => {
                        warn!(
                            framework = %self.framework,
                            "testFailed for `{name}` carries no failure message"
                        );
                        String::new()
                    }
                };
                emit(WireEvent::TestFailed {
                    name,
                    message,
                    details: directive.attr("details").map(str::to_owned),
                    is_error: directive.attr("error").is_some(),
                    comparison: self.comparison_payload(directive),
                });
            }
            "testIgnored" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::TestIgnored {
                    name,
                    message: directive.attr("message").map(str::to_owned),
                    details: directive.attr("details").map(str::to_owned),
                });
            }
            "testStdOut" => self.test_output(directive, "out", OutputChannel::Stdout, emit),
            "testStdErr" => self.test_output(directive, "err", OutputChannel::Stderr, emit),
            "testSuiteStarted" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::SuiteStarted {
                    name,
                    location: self.location_hint(directive),
                    metadata: directive.attr("metainfo").map(str::to_owned),
                });
            }
            "testSuiteFinished" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::SuiteFinished { name });
            }
            "enteredTheMatrix" => emit(WireEvent::ReporterAttached),
            "suiteTreeStarted" | "suiteTreeNode" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                let Some(node_id) = directive.attr("nodeId").map(str::to_owned) else {
                    warn!(
                        framework = %self.framework,
                        "tree declaration for `{name}` carries no nodeId"
                    );
                    return;
                };
                let location = self.location_hint(directive);
                let parent_node_id = directive.attr("parentNodeId").map(str::to_owned);
                if directive.name() == "suiteTreeStarted" {
                    emit(WireEvent::SuiteTreeStarted {
                        name,
                        location,
                        node_id,
                        parent_node_id,
                    });
                } else {
                    emit(WireEvent::SuiteTreeNode {
                        name,
                        location,
                        node_id,
                        parent_node_id,
                    });
                }
            }
            "suiteTreeEnded" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::SuiteTreeEnded { name });
            }
            "treeEnded" => emit(WireEvent::BuildTreeEnded),
            "rootName" => {
                let Some(name) = self.required_name(directive) else {
                    return;
                };
                emit(WireEvent::RootPresentation {
                    name,
                    comment: directive.attr("comment").map(str::to_owned),
                    // Unlike everywhere else, `location` is the current
                    // attribute name here, not the legacy one.
                    location: directive.attr("location").map(str::to_owned),
                });
            }
            "customProgressStatus" => self.custom_progress(directive, emit),
            "message" => self.message_with_status(directive, emit),
            other => {
                warn!(framework = %self.framework, "unexpected directive: {other}");
            }
        }
    }

    fn test_output(
        &self,
        directive: &Directive,
        text_attr: &str,
        channel: OutputChannel,
        emit: &mut impl FnMut(WireEvent),
    ) {
        let Some(name) = self.required_name(directive) else {
            return;
        };
        let Some(text) = directive.attr(text_attr) else {
            warn!(
                framework = %self.framework,
                "{} for `{name}` carries no `{text_attr}` attribute",
                directive.name()
            );
            return;
        };
        emit(WireEvent::TestOutput {
            name,
            text: text.to_owned(),
            channel,
        });
    }

    fn custom_progress(&self, directive: &Directive, emit: &mut impl FnMut(WireEvent)) {
        if let Some(kind) = directive.attr("type") {
            match kind {
                "testStarted" => emit(WireEvent::CustomProgressTestStarted),
                "testFinished" => emit(WireEvent::CustomProgressTestFinished),
                "testFailed" => emit(WireEvent::CustomProgressTestFailed),
                _ => {}
            }
            return;
        }
        if let Some(category) = directive.attr("testsCategory") {
            let disable = category.is_empty();
            emit(WireEvent::CustomProgressCategory {
                category: (!disable).then(|| category.to_owned()),
                count: if disable {
                    0
                } else {
                    self.parse_count(directive, "count")
                },
            });
        }
    }

    fn message_with_status(&self, directive: &Directive, emit: &mut impl FnMut(WireEvent)) {
        let Some(text) = directive.attr("text") else {
            return;
        };
        if text.is_empty() {
            return;
        }
        let details = directive.attr("errorDetails").map(str::to_owned);
        match directive.attr("status") {
            Some("ERROR") => emit(WireEvent::Error {
                message: text.to_owned(),
                details,
                critical: true,
            }),
            Some("WARNING") => emit(WireEvent::Error {
                message: text.to_owned(),
                details,
                critical: false,
            }),
            // Any other status is just text; the wire gives no channel for
            // it, so treat it as stdout.
            _ => emit(WireEvent::UncapturedOutput {
                text: text.to_owned(),
                channel: OutputChannel::Stdout,
            }),
        }
    }

    fn required_name(&self, directive: &Directive) -> Option<String> {
        match directive.attr("name") {
            Some(name) => Some(name.to_owned()),
            None => {
                warn!(
                    framework = %self.framework,
                    "{} directive carries no name", directive.name()
                );
                None
            }
        }
    }

    fn location_hint(&self, directive: &Directive) -> Option<String> {
        if let Some(location) = directive.attr("locationHint") {
            return Some(location.to_owned());
        }
        let legacy = directive.attr("location")?;
        warn!(
            framework = %self.framework,
            "the `location` attribute is deprecated, use `locationHint` instead"
        );
        Some(legacy.to_owned())
    }

    fn parse_count(&self, directive: &Directive, attr: &str) -> u64 {
        let Some(raw) = directive.attr(attr) else {
            return 0;
        };
        raw.parse().unwrap_or_else(|_| {
            warn!(
                framework = %self.framework,
                diagnostic = directive.attr("diagnosticInfo"),
                "cannot parse `{attr}` value `{raw}` as an integer"
            );
            0
        })
    }

    /// A missing or blank duration is unknown; a present but unparseable
    /// one degrades to zero.
    fn parse_duration(&self, directive: &Directive) -> Option<u64> {
        let raw = directive.attr("duration")?;
        if raw.trim().is_empty() {
            return None;
        }
        Some(raw.parse().unwrap_or_else(|_| {
            warn!(
                framework = %self.framework,
                diagnostic = directive.attr("diagnosticInfo"),
                "cannot parse duration value `{raw}`"
            );
            0
        }))
    }

    fn comparison_payload(&self, directive: &Directive) -> Option<ComparisonFailure> {
        let expected = directive.attr("expectedFile");
        let actual = directive.attr("actualFile");
        match (expected, actual) {
            (Some(expected), Some(actual)) => Some(ComparisonFailure {
                expected_file: expected.to_owned(),
                actual_file: actual.to_owned(),
            }),
            (None, None) => None,
            _ => {
                warn!(
                    framework = %self.framework,
                    "comparison failure with only one of expectedFile/actualFile, \
                     downgrading to a plain failure"
                );
                None
            }
        }
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn recognize(config: &ProcessorConfig, chunks: &[&str]) -> Vec<WireEvent> {
        let mut recognizer = EventRecognizer::new(config);
        let mut events = Vec::new();
        for chunk in chunks {
            recognizer.process(chunk, OutputChannel::Stdout, |event| events.push(event));
        }
        recognizer.flush(|event| events.push(event));
        events
    }

    fn recognize_default(chunks: &[&str]) -> Vec<WireEvent> {
        recognize(&ProcessorConfig::new("example"), chunks)
    }

    #[test]
    fn directives_and_text_interleave_in_order() {
        let events = recognize_default(&[
            "compiling...\n##testwire[testSuiteStarted name='s']\n",
            "##testwire[testStarted name='s.t']\nhello from test\n",
        ]);
        assert_eq!(
            events,
            vec![
                WireEvent::UncapturedOutput {
                    text: "compiling...\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
                WireEvent::SuiteStarted {
                    name: "s".to_owned(),
                    location: None,
                    metadata: None,
                },
                WireEvent::TestStarted {
                    name: "s.t".to_owned(),
                    location: None,
                    metadata: None,
                    is_config: false,
                },
                WireEvent::UncapturedOutput {
                    text: "hello from test\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
            ],
        );
    }

    #[test]
    fn directive_split_across_chunks_is_recognized() {
        let events = recognize_default(&["##testwire[testSta", "rted name='t']\n"]);
        assert_eq!(
            events,
            vec![WireEvent::TestStarted {
                name: "t".to_owned(),
                location: None,
                metadata: None,
                is_config: false,
            }],
        );
    }

    #[test]
    fn separator_before_directive_is_swallowed() {
        let events = recognize_default(&["out\n", "\n", "##testwire[testStarted name='t']\n"]);
        assert_eq!(
            events,
            vec![
                WireEvent::UncapturedOutput {
                    text: "out\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
                WireEvent::TestStarted {
                    name: "t".to_owned(),
                    location: None,
                    metadata: None,
                    is_config: false,
                },
            ],
        );
    }

    #[test]
    fn separator_before_plain_text_is_materialized() {
        let events = recognize_default(&["\n", "real output\n"]);
        assert_eq!(
            events,
            vec![
                WireEvent::UncapturedOutput {
                    text: "\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
                WireEvent::UncapturedOutput {
                    text: "real output\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
            ],
        );
    }

    #[test]
    fn trailing_separator_is_materialized_at_flush() {
        let events = recognize_default(&["##testwire[testStarted name='t']\n", "\n"]);
        assert_eq!(
            events,
            vec![
                WireEvent::TestStarted {
                    name: "t".to_owned(),
                    location: None,
                    metadata: None,
                    is_config: false,
                },
                WireEvent::UncapturedOutput {
                    text: "\n".to_owned(),
                    channel: OutputChannel::Stdout,
                },
            ],
        );
    }

    #[test]
    fn first_testing_started_is_redundant() {
        let events = recognize_default(&[
            "##testwire[testingStarted]\n",
            "##testwire[testingStarted]\n",
        ]);
        assert_eq!(events, vec![WireEvent::TestingStarted]);
    }

    #[test]
    fn overlong_line_is_elided_in_the_middle() {
        let mut config = ProcessorConfig::new("example");
        config.set_cycle_buffer_size(Some(300));
        let long = format!("{}\n", "x".repeat(5000));
        let events = recognize(&config, &[long.as_str()]);

        let [WireEvent::UncapturedOutput { text, .. }] = events.as_slice() else {
            panic!("expected a single output event, got {events:?}");
        };
        assert!(text.len() < 5000, "line was not truncated: {}", text.len());
        assert!(text.contains(ELISION_MARKER));
        assert!(text.starts_with("xxx"));
        assert!(text.ends_with("xxx\n") || text.ends_with('x'));
    }

    #[test]
    fn malformed_directive_is_plain_text() {
        let events = recognize_default(&["##testwire[testStarted name='unterminated]\n"]);
        assert_eq!(
            events,
            vec![WireEvent::UncapturedOutput {
                text: "##testwire[testStarted name='unterminated]\n".to_owned(),
                channel: OutputChannel::Stdout,
            }],
        );
    }

    #[test]
    fn unknown_directive_is_consumed_not_echoed() {
        let events = recognize_default(&["##testwire[somethingNew flag='1']\n"]);
        assert_eq!(events, vec![]);
    }

    #[test]
    fn legacy_location_attribute_is_accepted() {
        let events =
            recognize_default(&["##testwire[testSuiteStarted name='s' location='old://ref']\n"]);
        assert_eq!(
            events,
            vec![WireEvent::SuiteStarted {
                name: "s".to_owned(),
                location: Some("old://ref".to_owned()),
                metadata: None,
            }],
        );
    }

    #[test]
    fn malformed_duration_degrades_to_zero() {
        let events =
            recognize_default(&["##testwire[testFinished name='t' duration='soon']\n"]);
        assert_eq!(
            events,
            vec![WireEvent::TestFinished {
                name: "t".to_owned(),
                duration_ms: Some(0),
                output_file: None,
            }],
        );
    }

    #[test]
    fn blank_duration_is_unknown() {
        let events = recognize_default(&["##testwire[testFinished name='t' duration='']\n"]);
        assert_eq!(
            events,
            vec![WireEvent::TestFinished {
                name: "t".to_owned(),
                duration_ms: None,
                output_file: None,
            }],
        );
    }

    #[test]
    fn half_a_comparison_downgrades_to_plain_failure() {
        let events = recognize_default(&[
            "##testwire[testFailed name='t' message='diff' expectedFile='/tmp/exp']\n",
        ]);
        assert_eq!(
            events,
            vec![WireEvent::TestFailed {
                name: "t".to_owned(),
                message: "diff".to_owned(),
                details: None,
                is_error: false,
                comparison: None,
            }],
        );
    }

    #[test]
    fn message_status_routes_errors_warnings_and_text() {
        let events = recognize_default(&[
            "##testwire[message text='broken' status='ERROR' errorDetails='trace']\n",
            "##testwire[message text='careful' status='WARNING']\n",
            "##testwire[message text='fyi' status='NORMAL']\n",
        ]);
        assert_eq!(
            events,
            vec![
                WireEvent::Error {
                    message: "broken".to_owned(),
                    details: Some("trace".to_owned()),
                    critical: true,
                },
                WireEvent::Error {
                    message: "careful".to_owned(),
                    details: None,
                    critical: false,
                },
                WireEvent::UncapturedOutput {
                    text: "fyi".to_owned(),
                    channel: OutputChannel::Stdout,
                },
            ],
        );
    }

    #[test]
    fn custom_progress_forms() {
        let events = recognize_default(&[
            "##testwire[customProgressStatus testsCategory='Examples' count='3']\n",
            "##testwire[customProgressStatus type='testStarted']\n",
            "##testwire[customProgressStatus type='testFailed']\n",
            "##testwire[customProgressStatus testsCategory='' count='9']\n",
        ]);
        assert_eq!(
            events,
            vec![
                WireEvent::CustomProgressCategory {
                    category: Some("Examples".to_owned()),
                    count: 3,
                },
                WireEvent::CustomProgressTestStarted,
                WireEvent::CustomProgressTestFailed,
                WireEvent::CustomProgressCategory {
                    category: None,
                    count: 0,
                },
            ],
        );
    }

    #[test]
    fn stderr_lines_keep_their_channel() {
        let mut recognizer = EventRecognizer::new(&ProcessorConfig::new("example"));
        let mut events = Vec::new();
        recognizer.process("oops\n", OutputChannel::Stderr, |event| events.push(event));
        assert_eq!(
            events,
            vec![WireEvent::UncapturedOutput {
                text: "oops\n".to_owned(),
                channel: OutputChannel::Stderr,
            }],
        );
    }
}
