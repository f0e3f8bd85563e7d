// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decomposition of free-text failure messages.
//!
//! Assertion failures arrive as a single text blob. When the blob contains
//! the matcher's `Expected: …` / `  Actual: …` diff block, the expected and
//! actual values are lifted into structured attributes and the headline is
//! shortened so the consumer can render a proper comparison view.

use regex::Regex;
use std::sync::LazyLock;

const EXPECTED_MARKER: &str = "Expected: ";
const COMPARISON_FAILED: &str = "Comparison failed";

/// The matcher's diff block: an expected line, an actual line, a
/// caret-marked separator, and a `Differ…` trailer.
static EXPECTED_ACTUAL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Expected: (.*)\n  Actual: (.*)\n *\^\n Differ.*\n").unwrap()
});

/// A failure message split into its reportable parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FailureDetails {
    /// The headline for the failure message attribute.
    pub(crate) headline: String,
    /// The expected value, when a diff block was found.
    pub(crate) expected: Option<String>,
    /// The actual value, when a diff block was found.
    pub(crate) actual: Option<String>,
}

impl FailureDetails {
    fn opaque(message: &str) -> Self {
        Self {
            headline: message.to_owned(),
            expected: None,
            actual: None,
        }
    }
}

/// Splits a failure message on the first `Expected: ` marker.
///
/// Messages from the matcher repeat the expected/actual pair: a described
/// block first, then a raw diff block; the raw block is the one that
/// matches. A message consisting of a single diff block matches at the
/// marker itself. When the marker opens the message the headline collapses
/// to a fixed `Comparison failed`, otherwise it keeps the text preceding
/// the marker.
pub(crate) fn decompose(message: &str) -> FailureDetails {
    let Some(marker) = message.find(EXPECTED_MARKER) else {
        return FailureDetails::opaque(message);
    };
    let Some(captures) = EXPECTED_ACTUAL_BLOCK.captures(&message[marker..]) else {
        return FailureDetails::opaque(message);
    };
    let headline = if marker == 0 {
        COMPARISON_FAILED.to_owned()
    } else {
        message[..marker].to_owned()
    };
    FailureDetails {
        headline,
        expected: Some(captures[1].to_owned()),
        actual: Some(captures[2].to_owned()),
    }
}
