// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core conversion logic for teststream.
//!
//! The converter consumes the runner's line-oriented JSON event stream (see
//! [`teststream-events`](teststream_events)) and re-emits an equivalent
//! stream of hierarchical test-progress service messages. Along the way it
//! reconstructs the test/group tree from flat, id-referenced records,
//! synthesizes the group-completion messages the source protocol never
//! sends, and decomposes free-text failure messages into structured
//! attributes.
//!
//! The entry point is [`TestEventsConverter`]: feed it chunks with
//! [`process_chunk`](TestEventsConverter::process_chunk) as they arrive, and
//! call [`finish`](TestEventsConverter::finish) if the stream ends without a
//! `done` event.

pub mod converter;
pub mod errors;
mod failure;
mod location;
mod registry;
pub mod service_message;
pub mod sink;

pub use converter::TestEventsConverter;
pub use errors::ConvertError;
pub use service_message::ServiceMessage;
pub use sink::{BufferSink, MessageSink, OutputChannel, SinkRecord, WriterSink};
