// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Location hints for started tests.
//!
//! The runner announces each loaded module with a synthetic `loading <path>`
//! marker before the module's real tests start. The converter remembers the
//! most recent marker and combines it with the test's escaped ancestor-name
//! path, giving the consumer enough to map a test back to its source.

/// Scheme prefix for remembered module locations.
pub(crate) const LOCATION_URL_PREFIX: &str = "test_location://";

/// Name prefix marking a synthetic module-load test.
pub(crate) const LOADING_PREFIX: &str = "loading ";

/// Hint used before any module-load marker has been seen.
const UNKNOWN_LOCATION: &str = "unknown";

/// Renders the `locationHint` attribute value:
/// `<prefix>://<path>,<json-array-of-escaped-ancestor-names>`, or the
/// `unknown` placeholder when no location context has been recorded yet.
pub(crate) fn location_hint(location: Option<&str>, name_list: &[String]) -> String {
    match location {
        Some(location) => {
            let names: Vec<String> = name_list.iter().map(|name| escape_name(name)).collect();
            let json = serde_json::to_string(&names).expect("a string list serializes");
            format!("{location},{json}")
        }
        None => UNKNOWN_LOCATION.to_owned(),
    }
}

/// Escapes string characters the consumer expects escaped inside each array
/// element, before the array itself is JSON-serialized. The double escaping
/// is part of the wire contract.
fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hint_without_location_is_unknown() {
        assert_eq!(location_hint(None, &["a".to_owned()]), "unknown");
    }

    #[test]
    fn hint_combines_location_and_names() {
        let names = vec!["server".to_owned(), "responds".to_owned()];
        assert_eq!(
            location_hint(Some("test_location:///src/server_test.dart"), &names),
            r#"test_location:///src/server_test.dart,["server","responds"]"#
        );
    }

    #[test]
    fn hint_double_escapes_names() {
        let names = vec!["says \"hi\"".to_owned()];
        assert_eq!(
            location_hint(Some("test_location:///t.dart"), &names),
            r#"test_location:///t.dart,["says \\\"hi\\\""]"#
        );
    }

    #[test]
    fn empty_name_list_renders_empty_array() {
        assert_eq!(
            location_hint(Some("test_location:///t.dart"), &[]),
            "test_location:///t.dart,[]"
        );
    }
}
