// Copyright (c) The testwire Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Republication of tree changes to subscribers.
//!
//! The main type here is [`Reporter`], which fans every [`RunEvent`] out
//! to its listeners serially, in arrival order.

mod events;
mod imp;
mod structured;

pub use events::*;
pub use imp::*;
pub use structured::*;
