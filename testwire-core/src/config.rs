// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Processor configuration.

/// Configuration for a processing pipeline.
///
/// Everything the pipeline's behavior can be tuned with lives here and is
/// passed in at construction; there is no global state.
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// The name of the test framework feeding the stream, used to prefix
    /// protocol warnings so logs from several frameworks stay attributable.
    pub framework: String,

    /// In strict mode, finish/failure/ignore/output events that name a
    /// test with no recorded start are dropped (with a warning) instead of
    /// having a start synthesized for them. Useful when diagnosing a
    /// misbehaving reporter.
    pub strict: bool,

    /// Upper bound, in bytes, on a single plain-text line. Longer lines
    /// have their middle elided before any further processing, keeping a
    /// prefix and a short suffix. `None` disables the guard.
    pub cycle_buffer_size: Option<usize>,

    /// How many pre-announced tree nodes are buffered before a batch is
    /// applied to the tree. The full buffer is always applied when the
    /// tree declaration ends.
    pub max_tree_build_batch: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            framework: "unknown".to_owned(),
            strict: false,
            cycle_buffer_size: Some(1024 * 1024),
            max_tree_build_batch: 100,
        }
    }
}

impl ProcessorConfig {
    /// Creates a config for the named framework with default tuning.
    pub fn new(framework: impl Into<String>) -> Self {
        Self {
            framework: framework.into(),
            ..Self::default()
        }
    }

    /// Sets strict mode.
    pub fn set_strict(&mut self, strict: bool) -> &mut Self {
        self.strict = strict;
        self
    }

    /// Sets the large-line guard, or disables it with `None`.
    pub fn set_cycle_buffer_size(&mut self, size: Option<usize>) -> &mut Self {
        self.cycle_buffer_size = size;
        self
    }

    /// Sets the pre-announced tree batch threshold.
    pub fn set_max_tree_build_batch(&mut self, batch: usize) -> &mut Self {
        self.max_tree_build_batch = batch.max(1);
        self
    }
}
