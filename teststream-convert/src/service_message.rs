// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data model and serializer for downstream service messages.
//!
//! The reporting surface consumes a flat, line-oriented wire format: one
//! bracketed message per line, carrying ordered `key='value'` attributes
//! with a protocol-specific character escape. Tree structure is encoded by
//! the `nodeId`/`parentNodeId` attributes the converter appends to every
//! message.

use std::fmt;

static MESSAGE_PREFIX: &str = "##teamcity[";
static MESSAGE_SUFFIX: &str = "]";

static TEST_STARTED: &str = "testStarted";
static TEST_FINISHED: &str = "testFinished";
static TEST_IGNORED: &str = "testIgnored";
static TEST_FAILED: &str = "testFailed";
static TEST_STD_OUT: &str = "testStdOut";
static TEST_STD_ERR: &str = "testStdErr";
static TEST_SUITE_STARTED: &str = "testSuiteStarted";
static TEST_SUITE_FINISHED: &str = "testSuiteFinished";

static NAME_ATTR: &str = "name";

/// A single service message under construction.
///
/// Attributes render in insertion order; every constructor seeds the
/// message with its `name` attribute first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceMessage {
    kind: &'static str,
    attributes: Vec<(&'static str, String)>,
}

impl ServiceMessage {
    fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            kind,
            attributes: vec![(NAME_ATTR, name.into())],
        }
    }

    /// A test began execution.
    pub fn test_started(name: impl Into<String>) -> Self {
        Self::new(TEST_STARTED, name)
    }

    /// A test finished successfully.
    pub fn test_finished(name: impl Into<String>) -> Self {
        Self::new(TEST_FINISHED, name)
    }

    /// A test was skipped.
    pub fn test_ignored(name: impl Into<String>) -> Self {
        Self::new(TEST_IGNORED, name)
    }

    /// A test failed.
    pub fn test_failed(name: impl Into<String>) -> Self {
        Self::new(TEST_FAILED, name)
    }

    /// A test produced standard output.
    pub fn test_std_out(name: impl Into<String>) -> Self {
        Self::new(TEST_STD_OUT, name)
    }

    /// A test produced standard error output.
    pub fn test_std_err(name: impl Into<String>) -> Self {
        Self::new(TEST_STD_ERR, name)
    }

    /// A suite (group) began.
    pub fn test_suite_started(name: impl Into<String>) -> Self {
        Self::new(TEST_SUITE_STARTED, name)
    }

    /// A suite (group) finished.
    pub fn test_suite_finished(name: impl Into<String>) -> Self {
        Self::new(TEST_SUITE_FINISHED, name)
    }

    /// Appends an attribute. Values are escaped at render time.
    pub fn add_attribute(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.attributes.push((key, value.into()));
        self
    }

    /// The wire name of this message's kind.
    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl fmt::Display for ServiceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MESSAGE_PREFIX, self.kind)?;
        for (key, value) in &self.attributes {
            write!(f, " {}='{}'", key, escape(value))?;
        }
        f.write_str(MESSAGE_SUFFIX)
    }
}

/// Escapes a value for embedding in a service-message attribute.
///
/// The wire format reserves `|`, `'`, `[`, `]` and line terminators;
/// each is replaced by a `|`-prefixed escape.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\u{0085}' => escaped.push_str("|x"),
            '\u{2028}' => escaped.push_str("|l"),
            '\u{2029}' => escaped.push_str("|p"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn render_with_attributes_in_insertion_order() {
        let mut message = ServiceMessage::test_failed("compares things");
        message
            .add_attribute("expected", "1")
            .add_attribute("actual", "2")
            .add_attribute("message", "Comparison failed\n")
            .add_attribute("duration", "42");
        assert_eq!(
            message.to_string(),
            "##teamcity[testFailed name='compares things' expected='1' actual='2' \
             message='Comparison failed|n' duration='42']"
        );
    }

    #[test]
    fn render_escapes_name() {
        let message = ServiceMessage::test_started("checks [edge|case] 'quotes'");
        assert_eq!(
            message.to_string(),
            "##teamcity[testStarted name='checks |[edge||case|] |'quotes|'']"
        );
    }

    #[test]
    fn escape_table() {
        let tests: &[(&str, &str)] = &[
            ("", ""),
            ("plain", "plain"),
            ("a|b", "a||b"),
            ("it's", "it|'s"),
            ("line\nbreak", "line|nbreak"),
            ("cr\rhere", "cr|rhere"),
            ("[bracketed]", "|[bracketed|]"),
            ("next\u{0085}line", "next|xline"),
            ("line\u{2028}sep", "line|lsep"),
            ("para\u{2029}sep", "para|psep"),
            ("unicode: é 日本", "unicode: é 日本"),
        ];
        for (input, expected) in tests {
            assert_eq!(escape(input), *expected, "for input {input:?}");
        }
    }

    fn unescape(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '|' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('|') => out.push('|'),
                Some('\'') => out.push('\''),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('[') => out.push('['),
                Some(']') => out.push(']'),
                Some('x') => out.push('\u{0085}'),
                Some('l') => out.push('\u{2028}'),
                Some('p') => out.push('\u{2029}'),
                other => panic!("unexpected escape {other:?}"),
            }
        }
        out
    }

    proptest! {
        #[test]
        fn escape_leaves_no_reserved_chars(input in "\\PC*") {
            let escaped = escape(&input);
            // Reserved characters only ever appear behind an escape bar.
            let mut chars = escaped.chars();
            while let Some(c) = chars.next() {
                prop_assert!(!matches!(c, '\'' | '\n' | '\r' | '[' | ']'));
                if c == '|' {
                    let next = chars.next();
                    prop_assert!(
                        matches!(next, Some('|' | '\'' | 'n' | 'r' | '[' | ']' | 'x' | 'l' | 'p')),
                        "dangling escape before {next:?}"
                    );
                }
            }
        }

        #[test]
        fn escape_round_trips(input in "\\PC*") {
            prop_assert_eq!(unescape(&escape(&input)), input);
        }
    }
}
