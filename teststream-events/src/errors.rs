// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced while decoding the runner's event stream.

use thiserror::Error;

/// An error that occurs while decoding a chunk of runner output into a typed
/// event.
///
/// Chunks that are not protocol events at all (arbitrary diagnostic text, or
/// JSON without a `type` discriminator) do not produce an error; see
/// [`RunnerEvent::parse_chunk`](crate::RunnerEvent::parse_chunk).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EventDecodeError {
    /// The chunk carried a `type` discriminator outside the known event
    /// vocabulary.
    ///
    /// This indicates the runner's protocol has changed incompatibly, and is
    /// fatal for the conversion session rather than recoverable per-event.
    #[error("unrecognized event type `{found}` (check for a runner protocol update)")]
    UnknownEventType {
        /// The discriminator value found in the chunk.
        found: String,
    },

    /// A recognized event was missing a required field, or carried a field
    /// of the wrong shape.
    #[error("malformed `{event_type}` event")]
    InvalidEvent {
        /// The event kind being decoded.
        event_type: &'static str,
        /// The underlying deserialization error, with the field path.
        #[source]
        error: serde_path_to_error::Error<serde_json::Error>,
    },
}
