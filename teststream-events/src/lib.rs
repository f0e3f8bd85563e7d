// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the test runner's machine-readable event stream.
//!
//! Test runners that speak the stream protocol print one JSON object per
//! line, each carrying a `type` discriminator, interleaved with arbitrary
//! diagnostic text. This crate provides a typed model of those events and a
//! chunk decoder that separates protocol events from pass-through text.
//!
//! The conversion logic that turns these events into service messages lives
//! in the `teststream-convert` crate; this crate is usable on its own by any
//! consumer of the runner protocol.

mod errors;
mod events;

pub use errors::*;
pub use events::*;
