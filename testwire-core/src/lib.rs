// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testwire: turning the interleaved text/directive
//! stream of a running test process into a consistent, hierarchical record
//! of suite and test execution.
//!
//! The flow of data is: raw stream fragments go through
//! [`wire::EventRecognizer`] (line reconstruction, directive detection,
//! typed [`wire::WireEvent`]s), are carried across the producer/consumer
//! boundary by [`dispatcher`], and are applied to the
//! [`tree::TestTree`] by the [`converter::EventConverter`], which
//! republishes higher-level [`reporter::RunEvent`]s to subscribers.
//!
//! This crate renders nothing and spawns nothing: it consumes text that
//! some other component reads from a process, and it hands results to
//! whatever UI sits on top.

pub mod config;
pub mod converter;
pub mod dispatcher;
pub mod errors;
pub mod reporter;
mod time;
pub mod tree;
pub mod wire;
