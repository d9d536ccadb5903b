// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testwire-core.
//!
//! Nothing here is fatal to the pipeline: wire input can never raise an
//! error (malformed input degrades to warnings and best-effort recovery),
//! and a listener that fails to write an event is logged and skipped for
//! that event rather than tearing the fanout down.

use thiserror::Error;

/// An error that occurred while a subscriber was writing out an event.
#[derive(Debug, Error)]
pub enum WriteEventError {
    /// An error occurred while writing the event to its destination.
    #[error("error writing event to output")]
    Io(#[from] std::io::Error),

    /// An error occurred while serializing the event to JSON.
    #[error("error serializing event to JSON")]
    Json(#[from] serde_json::Error),
}
