// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! The testwire wire format.
//!
//! A test-running process reports its progress by embedding single-line
//! directives of the form `##testwire[name key='value' ...]` into its
//! regular output. This crate covers the syntax layer only: reassembling
//! complete lines out of arbitrarily chunked stream fragments
//! ([`LineSplitter`]), and parsing/rendering directive lines
//! ([`Directive`]). What the directives *mean* is up to the consumer;
//! see the `testwire-core` crate.

mod directive;
mod splitter;

pub use directive::*;
pub use splitter::*;
