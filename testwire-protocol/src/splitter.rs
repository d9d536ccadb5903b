// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reassembly of complete lines out of arbitrarily chunked stream
//! fragments.
//!
//! The producing process flushes its output by size or by timer, so a
//! single logical line routinely arrives split across several deliveries,
//! and a delivery may carry several lines. [`LineSplitter`] buffers
//! incomplete trailing fragments per channel and hands complete lines to a
//! callback. It never fails; it only buffers.

/// The output channel a stream fragment was read from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OutputChannel {
    /// The process's standard output. Directives are carried here.
    Stdout,
    /// The process's standard error.
    Stderr,
    /// Messages synthesized by the surrounding system rather than the
    /// process itself.
    System,
}

impl OutputChannel {
    const COUNT: usize = 3;

    fn index(self) -> usize {
        match self {
            OutputChannel::Stdout => 0,
            OutputChannel::Stderr => 1,
            OutputChannel::System => 2,
        }
    }
}

/// A complete line handed out by [`LineSplitter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Line<'a> {
    /// The line text. Terminated lines end with `\n` (`\r\n` and bare `\r`
    /// are normalized); a trailing fragment forced out by
    /// [`LineSplitter::flush`] carries no terminator.
    pub text: &'a str,
    /// The channel the line was read from.
    pub channel: OutputChannel,
    /// True if the line carried its own terminator, false if it was a
    /// buffered partial forced out by a flush.
    pub terminated: bool,
}

/// Splits chunked fragments into complete lines, buffering across calls.
///
/// Feeding the same text through in any chunking produces the same
/// sequence of lines: a trailing `\r` is held back until the next fragment
/// shows whether it is part of a `\r\n` pair.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffers: [String; OutputChannel::COUNT],
}

impl LineSplitter {
    /// Creates a splitter with empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment to the channel's buffer and emits every complete
    /// line recognized so far.
    pub fn process(
        &mut self,
        fragment: &str,
        channel: OutputChannel,
        mut on_line: impl FnMut(Line<'_>),
    ) {
        let buffer = &mut self.buffers[channel.index()];
        buffer.push_str(fragment);

        let mut line = String::new();
        let mut consumed = 0;
        while let Some((text, remainder)) = split_first_line(&buffer[consumed..]) {
            line.clear();
            line.push_str(text);
            line.push('\n');
            on_line(Line {
                text: &line,
                channel,
                terminated: true,
            });
            consumed = buffer.len() - remainder.len();
        }
        buffer.drain(..consumed);
    }

    /// Forces out any buffered partial line on every channel.
    ///
    /// Called when the producing process has terminated and no further
    /// fragments can complete the buffered text.
    pub fn flush(&mut self, mut on_line: impl FnMut(Line<'_>)) {
        for channel in [
            OutputChannel::Stdout,
            OutputChannel::Stderr,
            OutputChannel::System,
        ] {
            let buffer = std::mem::take(&mut self.buffers[channel.index()]);
            if buffer.is_empty() {
                continue;
            }
            // A lone trailing `\r` was held back waiting for a possible
            // `\n`; at flush time it is a terminator after all.
            if let Some(stripped) = buffer.strip_suffix('\r') {
                let mut line = stripped.to_owned();
                line.push('\n');
                on_line(Line {
                    text: &line,
                    channel,
                    terminated: true,
                });
            } else {
                on_line(Line {
                    text: &buffer,
                    channel,
                    terminated: false,
                });
            }
        }
    }
}

/// Splits off the first terminated line, returning its text without the
/// terminator plus the remainder after it. A trailing `\r` with nothing
/// after it does not count: the next fragment may turn it into `\r\n`.
fn split_first_line(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => return Some((&text[..i], &text[i + 1..])),
            b'\r' => {
                if i + 1 < bytes.len() {
                    let next = if bytes[i + 1] == b'\n' { i + 2 } else { i + 1 };
                    return Some((&text[..i], &text[next..]));
                }
                return None;
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn collect_lines(chunks: &[&str]) -> Vec<(String, bool)> {
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        for chunk in chunks {
            splitter.process(chunk, OutputChannel::Stdout, |line| {
                lines.push((line.text.to_owned(), line.terminated));
            });
        }
        splitter.flush(|line| {
            lines.push((line.text.to_owned(), line.terminated));
        });
        lines
    }

    #[test]
    fn single_chunk_multiple_lines() {
        assert_eq!(
            collect_lines(&["a\nb\r\nc\rtail"]),
            vec![
                ("a\n".to_owned(), true),
                ("b\n".to_owned(), true),
                ("c\n".to_owned(), true),
                ("tail".to_owned(), false),
            ],
        );
    }

    #[test]
    fn line_split_across_chunks() {
        assert_eq!(
            collect_lines(&["par", "tial li", "ne\n"]),
            vec![("partial line\n".to_owned(), true)],
        );
    }

    #[test]
    fn crlf_split_across_chunks_is_one_terminator() {
        assert_eq!(
            collect_lines(&["one\r", "\ntwo\n"]),
            vec![("one\n".to_owned(), true), ("two\n".to_owned(), true)],
        );
    }

    #[test]
    fn lone_trailing_cr_terminates_at_flush() {
        assert_eq!(collect_lines(&["one\r"]), vec![("one\n".to_owned(), true)]);
    }

    #[test]
    fn channels_buffer_independently() {
        let mut splitter = LineSplitter::new();
        let mut lines = Vec::new();
        splitter.process("out", OutputChannel::Stdout, |_| unreachable!());
        splitter.process("err\n", OutputChannel::Stderr, |line| {
            lines.push((line.text.to_owned(), line.channel));
        });
        splitter.process("put\n", OutputChannel::Stdout, |line| {
            lines.push((line.text.to_owned(), line.channel));
        });
        assert_eq!(
            lines,
            vec![
                ("err\n".to_owned(), OutputChannel::Stderr),
                ("output\n".to_owned(), OutputChannel::Stdout),
            ],
        );
    }

    #[test]
    fn flush_with_empty_buffers_emits_nothing() {
        let mut splitter = LineSplitter::new();
        splitter.flush(|_| unreachable!());
    }

    proptest! {
        /// Any chunking of the same text yields the same line sequence as
        /// feeding the text in one piece.
        #[test]
        fn chunk_boundary_independence(
            text in "[a-z\r\n]{0,64}",
            cuts in proptest::collection::vec(0usize..=64, 0..6),
        ) {
            let reference = collect_lines(&[&text]);

            let mut boundaries: Vec<usize> = cuts
                .into_iter()
                .map(|c| c.min(text.len()))
                .filter(|&c| text.is_char_boundary(c))
                .collect();
            boundaries.push(0);
            boundaries.push(text.len());
            boundaries.sort_unstable();
            boundaries.dedup();

            let chunks: Vec<&str> = boundaries
                .windows(2)
                .map(|w| &text[w[0]..w[1]])
                .collect();
            prop_assert_eq!(collect_lines(&chunks), reference);
        }
    }
}
