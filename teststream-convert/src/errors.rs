// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by teststream conversion.

use teststream_events::EventDecodeError;
use thiserror::Error;

/// An error that occurs while converting the runner's event stream.
///
/// Every variant is fatal for the conversion session: the stream is either
/// speaking a different protocol version or has been corrupted, and there is
/// no per-event recovery that keeps the downstream tree consistent.
/// Interleaved non-protocol text is not an error; it is forwarded verbatim.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// A chunk failed to decode into a typed event.
    #[error("error decoding runner event")]
    Decode(#[from] EventDecodeError),

    /// A recognized event was missing a field its handling requires.
    #[error("missing required field `{field}` in `{event_type}` event")]
    MissingField {
        /// The event kind being handled.
        event_type: &'static str,
        /// The wire name of the missing field.
        field: &'static str,
    },

    /// An event referenced a test id never defined by a `testStart`.
    #[error("unknown test id {id} referenced by `{event_type}` event")]
    UnknownTestId {
        /// The event kind holding the reference.
        event_type: &'static str,
        /// The unresolved id.
        id: u32,
    },

    /// A `testDone` carried a result outside the protocol vocabulary.
    #[error("unknown test result `{result}`")]
    UnknownResult {
        /// The result value found on the event.
        result: String,
    },

    /// Writing to the downstream sink failed.
    #[error("error writing to output sink")]
    Write(#[source] std::io::Error),
}
