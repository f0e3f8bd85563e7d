// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The typed event model for the runner's JSON stream.

use crate::errors::EventDecodeError;
use serde::{Deserialize, Serialize};

/// The wire names of the seven event kinds, in protocol order.
const KNOWN_EVENT_TYPES: [&str; 7] = [
    "start",
    "testStart",
    "error",
    "group",
    "print",
    "testDone",
    "done",
];

const EVENT_TYPE_FIELD: &str = "type";

/// A single event in the runner's machine-readable output stream.
///
/// Events are line-oriented JSON objects discriminated by a `type` field.
/// Tests and groups are flat, id-referenced records: a full definition is
/// sent once (inside `testStart`/`group`), and later events refer back to it
/// by id. Unknown JSON fields are ignored; unknown `type` values are a
/// protocol mismatch and fail decoding.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum RunnerEvent {
    /// A test run began. Both entity registries must be reset.
    #[serde(rename = "start")]
    RunStarted(RunStartedEvent),

    /// A test is about to run, carrying its full definition.
    #[serde(rename = "testStart")]
    TestStarted(TestStartedEvent),

    /// A test failed, or an uncaught error was reported against a test.
    #[serde(rename = "error")]
    TestErrored(TestErroredEvent),

    /// A group (suite subtree) was defined.
    ///
    /// The protocol has no matching "group done" event; group completion is
    /// synthesized when the run finishes.
    #[serde(rename = "group")]
    GroupDefined(GroupEvent),

    /// A test printed a line of output.
    #[serde(rename = "print")]
    MessagePrinted(PrintEvent),

    /// A test finished with a terminal result.
    #[serde(rename = "testDone")]
    TestDone(TestDoneEvent),

    /// The run is complete; no further events follow.
    #[serde(rename = "done")]
    RunDone(RunDoneEvent),
}

impl RunnerEvent {
    /// Decodes one chunk of runner output.
    ///
    /// Returns `Ok(None)` when the chunk is not a protocol event: not valid
    /// JSON, a JSON non-object, or an object without a non-empty string
    /// `type` field. Such chunks are interleaved diagnostic text and must be
    /// forwarded downstream verbatim by the caller.
    ///
    /// A chunk whose `type` is outside the known vocabulary fails with
    /// [`EventDecodeError::UnknownEventType`]; a recognized event with
    /// malformed fields fails with [`EventDecodeError::InvalidEvent`].
    pub fn parse_chunk(chunk: &str) -> Result<Option<Self>, EventDecodeError> {
        let value: serde_json::Value = match serde_json::from_str(chunk) {
            Ok(value) => value,
            Err(_) => return Ok(None),
        };
        let Some(object) = value.as_object() else {
            return Ok(None);
        };
        let found = match object.get(EVENT_TYPE_FIELD).and_then(serde_json::Value::as_str) {
            Some(event_type) if !event_type.is_empty() => event_type,
            _ => return Ok(None),
        };
        let Some(event_type) = KNOWN_EVENT_TYPES.iter().copied().find(|k| *k == found) else {
            return Err(EventDecodeError::UnknownEventType {
                found: found.to_owned(),
            });
        };

        match serde_path_to_error::deserialize(value) {
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(EventDecodeError::InvalidEvent { event_type, error }),
        }
    }

    /// Returns the wire name of this event's kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            RunnerEvent::RunStarted(_) => "start",
            RunnerEvent::TestStarted(_) => "testStart",
            RunnerEvent::TestErrored(_) => "error",
            RunnerEvent::GroupDefined(_) => "group",
            RunnerEvent::MessagePrinted(_) => "print",
            RunnerEvent::TestDone(_) => "testDone",
            RunnerEvent::RunDone(_) => "done",
        }
    }
}

/// Payload of a `start` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunStartedEvent {
    /// The version of the event protocol the runner speaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_version: Option<String>,

    /// The version of the runner itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_version: Option<String>,

    /// The process id of the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of a `testStart` event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestStartedEvent {
    /// The full definition of the test that is starting.
    pub test: TestDef,

    /// Milliseconds since the start of the run.
    ///
    /// Required for real tests (it becomes the start time used for duration
    /// computation), but a module-load marker may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of an `error` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestErroredEvent {
    /// The id of the test the error is reported against.
    #[serde(rename = "testID", default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u32>,

    /// The error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The stack trace accompanying the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,

    /// True for an assertion failure, false for an uncaught error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_failure: Option<bool>,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of a `group` event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    /// The full definition of the group.
    pub group: GroupDef,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of a `print` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrintEvent {
    /// The id of the test that produced the output.
    #[serde(rename = "testID", default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u32>,

    /// The kind of output, e.g. `print` or `skip`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,

    /// The printed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of a `testDone` event.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestDoneEvent {
    /// The id of the test that finished.
    #[serde(rename = "testID", default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<u32>,

    /// The terminal result: `success`, `failure` or `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// True if the test was skipped by the runner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,

    /// True for bookkeeping entries (e.g. load timing) that must not be
    /// reported to the consumer.
    pub hidden: bool,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// Payload of a `done` event.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunDoneEvent {
    /// True if every test in the run passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Milliseconds since the start of the run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
}

/// The full definition of a test, sent once inside `testStart`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestDef {
    /// The producer-assigned id, unique among tests within one run.
    pub id: u32,

    /// The full hierarchical name. `None` marks an anonymous (artificial)
    /// entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The ids of the groups this test belongs to, outermost first. The last
    /// entry is the test's effective parent.
    #[serde(rename = "groupIDs", default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<u32>,

    /// The id of the suite the test was collected from.
    #[serde(rename = "suiteID", default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u32>,

    /// Skip flags attached to the test.
    #[serde(default)]
    pub metadata: Metadata,

    /// The source URL of the test, when the runner knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// 1-based source line of the test definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,

    /// 1-based source column of the test definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u64>,
}

/// The full definition of a group, sent once inside `group`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupDef {
    /// The producer-assigned id, unique among groups within one run.
    pub id: u32,

    /// The full hierarchical name. `None` marks an anonymous (artificial)
    /// group used only for parent-chain plumbing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The id of the parent group, or `None` for a top-level group.
    #[serde(rename = "parentID", default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u32>,

    /// The id of the suite the group was collected from.
    #[serde(rename = "suiteID", default, skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<u32>,

    /// The number of tests under this group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_count: Option<u64>,

    /// Skip flags attached to the group.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Skip flags attached to a test or group definition.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// True if the item is marked skipped.
    #[serde(default)]
    pub skip: bool,

    /// The reason given for the skip, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn parse_test_start() {
        let chunk = indoc! {r#"
            {"type":"testStart","test":{"id":3,"name":"server responds","groupIDs":[1,2],
             "suiteID":0,"metadata":{"skip":false,"skipReason":null},"line":12,"column":3,
             "url":"file:///src/server_test.dart"},"time":1234}
        "#};
        let event = RunnerEvent::parse_chunk(chunk)
            .expect("chunk decodes")
            .expect("chunk is an event");
        let RunnerEvent::TestStarted(event) = event else {
            panic!("expected testStart, got {event:?}");
        };
        assert_eq!(event.test.id, 3);
        assert_eq!(event.test.name.as_deref(), Some("server responds"));
        assert_eq!(event.test.group_ids, vec![1, 2]);
        assert!(!event.test.metadata.skip);
        assert_eq!(event.time, Some(1234));
    }

    #[test]
    fn parse_group() {
        let chunk = r#"{"type":"group","group":{"id":2,"name":"server","parentID":1,"metadata":{"skip":true,"skipReason":"flaky"},"testCount":4},"time":9}"#;
        let event = RunnerEvent::parse_chunk(chunk).unwrap().unwrap();
        let RunnerEvent::GroupDefined(event) = event else {
            panic!("expected group, got {event:?}");
        };
        assert_eq!(event.group.id, 2);
        assert_eq!(event.group.parent_id, Some(1));
        assert_eq!(event.group.test_count, Some(4));
        assert!(event.group.metadata.skip);
        assert_eq!(event.group.metadata.skip_reason.as_deref(), Some("flaky"));
    }

    #[test]
    fn parse_anonymous_group() {
        let chunk = r#"{"type":"group","group":{"id":1,"name":null,"parentID":null,"metadata":{"skip":false,"skipReason":null}},"time":2}"#;
        let event = RunnerEvent::parse_chunk(chunk).unwrap().unwrap();
        let RunnerEvent::GroupDefined(event) = event else {
            panic!("expected group, got {event:?}");
        };
        assert_eq!(event.group.name, None);
        assert_eq!(event.group.parent_id, None);
    }

    #[test]
    fn parse_test_done() {
        let chunk =
            r#"{"type":"testDone","testID":3,"result":"success","skipped":false,"hidden":false,"time":2000}"#;
        let event = RunnerEvent::parse_chunk(chunk).unwrap().unwrap();
        let RunnerEvent::TestDone(event) = event else {
            panic!("expected testDone, got {event:?}");
        };
        assert_eq!(event.test_id, Some(3));
        assert_eq!(event.result.as_deref(), Some("success"));
        assert!(!event.hidden);
    }

    #[test]
    fn parse_error_event() {
        let chunk = r#"{"type":"error","testID":3,"error":"oops","stackTrace":"main.dart 12:1","isFailure":true,"time":2100}"#;
        let event = RunnerEvent::parse_chunk(chunk).unwrap().unwrap();
        let RunnerEvent::TestErrored(event) = event else {
            panic!("expected error, got {event:?}");
        };
        assert_eq!(event.error.as_deref(), Some("oops"));
        assert_eq!(event.stack_trace.as_deref(), Some("main.dart 12:1"));
        assert_eq!(event.is_failure, Some(true));
    }

    #[test]
    fn parse_run_start_and_done() {
        let start = r#"{"type":"start","protocolVersion":"0.1.1","runnerVersion":"1.24.0","pid":4012,"time":0}"#;
        let event = RunnerEvent::parse_chunk(start).unwrap().unwrap();
        assert_eq!(event.event_type(), "start");

        let done = r#"{"type":"done","success":true,"time":5500}"#;
        let event = RunnerEvent::parse_chunk(done).unwrap().unwrap();
        let RunnerEvent::RunDone(event) = event else {
            panic!("expected done, got {event:?}");
        };
        assert_eq!(event.success, Some(true));
    }

    // Chunks that are not protocol events: forwarded verbatim, never errors.
    #[test_case("00:02 +1: All tests passed!"; "plain text")]
    #[test_case("{not json"; "truncated json")]
    #[test_case("[1, 2, 3]"; "json array")]
    #[test_case("42"; "json scalar")]
    #[test_case(r#"{"message":"no discriminator"}"#; "object without type")]
    #[test_case(r#"{"type":""}"#; "empty type")]
    #[test_case(r#"{"type":12}"#; "non-string type")]
    fn parse_passthrough(chunk: &str) {
        assert_eq!(RunnerEvent::parse_chunk(chunk).unwrap(), None);
    }

    #[test]
    fn parse_unknown_type_is_fatal() {
        let err = RunnerEvent::parse_chunk(r#"{"type":"allSuites","count":1}"#).unwrap_err();
        let EventDecodeError::UnknownEventType { found } = err else {
            panic!("expected UnknownEventType, got {err:?}");
        };
        assert_eq!(found, "allSuites");
    }

    #[test_case(r#"{"type":"testStart","time":1}"#, "testStart"; "testStart without definition")]
    #[test_case(r#"{"type":"testStart","test":{"name":"x"},"time":1}"#, "testStart"; "test definition without id")]
    #[test_case(r#"{"type":"group","time":1}"#, "group"; "group without definition")]
    #[test_case(r#"{"type":"testDone","testID":1,"result":"success","time":1}"#, "testDone"; "testDone without hidden")]
    fn parse_malformed_event_is_fatal(chunk: &str, expected_type: &str) {
        let err = RunnerEvent::parse_chunk(chunk).unwrap_err();
        let EventDecodeError::InvalidEvent { event_type, .. } = err else {
            panic!("expected InvalidEvent, got {err:?}");
        };
        assert_eq!(event_type, expected_type);
    }

    #[test]
    fn metadata_defaults_when_absent() {
        let chunk = r#"{"type":"testStart","test":{"id":7},"time":1}"#;
        let event = RunnerEvent::parse_chunk(chunk).unwrap().unwrap();
        let RunnerEvent::TestStarted(event) = event else {
            panic!("expected testStart, got {event:?}");
        };
        assert_eq!(event.test.name, None);
        assert!(event.test.group_ids.is_empty());
        assert!(!event.test.metadata.skip);
    }
}
