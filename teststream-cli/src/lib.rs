// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `teststream` command-line interface.
//!
//! A thin host around [`teststream_convert`]: it plays the role of the
//! process-output reader and the message sink, reading runner output
//! line-by-line from stdin (or a file) and writing the converted service
//! message stream to stdout. Conversion failures surface as run-level
//! errors with a nonzero exit code.

#![warn(missing_docs)]

mod app;
mod output;

pub use app::TeststreamApp;
