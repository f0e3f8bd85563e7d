// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The event dispatcher: runner events in, service messages out.

use crate::{
    errors::ConvertError,
    failure,
    location::{self, LOADING_PREFIX, LOCATION_URL_PREFIX},
    registry::EntityRegistry,
    service_message::ServiceMessage,
    sink::{MessageSink, OutputChannel},
};
use teststream_events::{
    GroupEvent, PrintEvent, RunnerEvent, TestDoneEvent, TestErroredEvent, TestStartedEvent,
};
use tracing::debug;

const RESULT_SUCCESS: &str = "success";
const RESULT_FAILURE: &str = "failure";
const RESULT_ERROR: &str = "error";

const NO_MESSAGE: &str = "<no message>";
const NO_ERROR_MESSAGE: &str = "<no error message>";
const NO_STACK_TRACE: &str = "<no stack trace>";
const NO_RESULT: &str = "<no result>";

/// Message prefix identifying a load/compile failure reported before any
/// real test exists.
const FAILED_TO_LOAD_PREFIX: &str = "Failed to load ";
/// Placeholder test name for synthesized load-failure reports.
const FAILED_TO_LOAD_NAME: &str = "Failed to load";

const NODE_ID_ATTR: &str = "nodeId";
const PARENT_NODE_ID_ATTR: &str = "parentNodeId";

/// Mutable dispatch context threaded through event handling.
///
/// One start time is shared across tests rather than recorded per test, so
/// under truly interleaved execution a duration can be attributed to the
/// wrong test. Kept as-is.
#[derive(Clone, Debug, Default)]
struct ConverterState {
    /// Id tagged as `nodeId` on emitted messages.
    current_id: u32,
    /// Id tagged as `parentNodeId` on emitted messages.
    current_parent_id: u32,
    /// Timestamp of the most recent test start, in run-relative millis.
    start_millis: i64,
    /// Location context remembered from the last module-load marker.
    location: Option<String>,
    /// Whether the current test has printed output since it started.
    output_appeared: bool,
}

/// Converts the runner's JSON event stream into service messages.
///
/// Feed chunks in producer order via [`process_chunk`]; each call emits zero
/// or more messages to the sink before returning. The converter holds all
/// per-run state itself and takes `&mut self`, so one instance serves one
/// stream at a time; wrap it in external synchronization to share it.
///
/// The runner reports asynchronously, so a `testDone` can in principle be
/// followed by a later contradicting `error` for the same test. Turning the
/// already-reported success into a failure is not handled.
///
/// [`process_chunk`]: TestEventsConverter::process_chunk
pub struct TestEventsConverter<S> {
    registry: EntityRegistry,
    state: ConverterState,
    sink: S,
}

impl<S: MessageSink> TestEventsConverter<S> {
    /// Creates a converter writing to the given sink.
    pub fn new(sink: S) -> Self {
        Self {
            registry: EntityRegistry::new(),
            state: ConverterState::default(),
            sink,
        }
    }

    /// Returns the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consumes the converter, returning the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Processes one chunk of runner output.
    ///
    /// A chunk that is not a protocol event is forwarded to the sink
    /// verbatim and reported as handled. Decode and dispatch failures are
    /// fatal for the conversion session (see [`ConvertError`]).
    pub fn process_chunk(
        &mut self,
        channel: OutputChannel,
        chunk: &str,
    ) -> Result<(), ConvertError> {
        match RunnerEvent::parse_chunk(chunk)? {
            Some(event) => self.process_event(channel, &event),
            None => self
                .sink
                .write_passthrough(channel, chunk)
                .map_err(ConvertError::Write),
        }
    }

    /// Processes one already-decoded event.
    pub fn process_event(
        &mut self,
        channel: OutputChannel,
        event: &RunnerEvent,
    ) -> Result<(), ConvertError> {
        debug!(event_type = event.event_type(), "dispatching runner event");
        match event {
            RunnerEvent::RunStarted(_) => self.handle_run_started(),
            RunnerEvent::TestStarted(event) => self.handle_test_started(channel, event),
            RunnerEvent::TestErrored(event) => self.handle_test_errored(channel, event),
            RunnerEvent::GroupDefined(event) => self.handle_group(channel, event),
            RunnerEvent::MessagePrinted(event) => self.handle_print(channel, event),
            RunnerEvent::TestDone(event) => self.handle_test_done(channel, event),
            RunnerEvent::RunDone(_) => self.handle_run_done(channel),
        }
    }

    /// Flushes the converter after an abnormal end of stream.
    ///
    /// A stream that terminates without a `done` event leaves every group
    /// unreported; this synthesizes the same suite-finished messages the
    /// `done` handler would and clears the registries. Calling it after a
    /// normal `done` is a no-op.
    pub fn finish(&mut self, channel: OutputChannel) -> Result<(), ConvertError> {
        self.finalize_groups(channel)?;
        self.registry.clear();
        Ok(())
    }

    fn handle_run_started(&mut self) -> Result<(), ConvertError> {
        debug!("run started, resetting registries");
        self.registry.clear();
        Ok(())
    }

    fn handle_run_done(&mut self, channel: OutputChannel) -> Result<(), ConvertError> {
        self.finalize_groups(channel)?;
        self.registry.clear();
        Ok(())
    }

    /// Emits suite-finished for every known non-artificial group.
    ///
    /// No group-completion event exists in the source protocol, so groups
    /// are closed in bulk at end of run; registration order is as good as
    /// any since nothing downstream orders against it.
    fn finalize_groups(&mut self, channel: OutputChannel) -> Result<(), ConvertError> {
        let groups: Vec<(u32, String, u32)> = self
            .registry
            .groups()
            .filter(|group| !group.is_artificial())
            .map(|group| {
                (
                    group.id(),
                    self.registry.base_name(group).to_owned(),
                    self.registry.valid_parent_id(group),
                )
            })
            .collect();
        for (id, base_name, parent_id) in groups {
            self.state.current_id = id;
            self.state.current_parent_id = parent_id;
            self.emit(channel, ServiceMessage::test_suite_finished(base_name))?;
        }
        Ok(())
    }

    fn handle_test_started(
        &mut self,
        channel: OutputChannel,
        event: &TestStartedEvent,
    ) -> Result<(), ConvertError> {
        let id = self.registry.insert_test(&event.test);
        self.state.current_id = id;

        let test = self.registry.test(id).expect("test was just inserted");
        if !self.registry.has_valid_parent(test) {
            if let Some(path) = test.display_name().strip_prefix(LOADING_PREFIX) {
                // A synthetic module-load marker, not a real test: remember
                // the location for the module's tests and stay silent.
                if !path.is_empty() {
                    self.state.location = Some(format!("{LOCATION_URL_PREFIX}{path}"));
                }
                return Ok(());
            }
        }

        let base_name = self.registry.base_name(test).to_owned();
        let hint = location::location_hint(
            self.state.location.as_deref(),
            &self.registry.name_list(test),
        );
        let parent_id = self.registry.valid_parent_id(test);
        let skip = test.metadata().skip;
        let skip_reason = test.metadata().skip_reason.clone();

        self.state.start_millis = event.time.ok_or(ConvertError::MissingField {
            event_type: "testStart",
            field: "time",
        })?;
        self.state.output_appeared = false;
        self.state.current_parent_id = parent_id;

        let mut started = ServiceMessage::test_started(&base_name);
        started.add_attribute("locationHint", hint);
        self.emit(channel, started)?;

        if skip {
            let mut ignored = ServiceMessage::test_ignored(&base_name);
            if let Some(reason) = skip_reason {
                ignored.add_attribute("message", reason);
            }
            self.emit(channel, ignored)?;
        }
        Ok(())
    }

    fn handle_test_done(
        &mut self,
        channel: OutputChannel,
        event: &TestDoneEvent,
    ) -> Result<(), ConvertError> {
        if event.hidden {
            return Ok(());
        }
        match event.result.as_deref().unwrap_or(NO_RESULT) {
            RESULT_SUCCESS => self.handle_test_finished(channel, event),
            // Failures and errors were already reported by the error event.
            RESULT_FAILURE | RESULT_ERROR => Ok(()),
            other => Err(ConvertError::UnknownResult {
                result: other.to_owned(),
            }),
        }
    }

    fn handle_test_finished(
        &mut self,
        channel: OutputChannel,
        event: &TestDoneEvent,
    ) -> Result<(), ConvertError> {
        let test_id = event.test_id.ok_or(ConvertError::MissingField {
            event_type: "testDone",
            field: "testID",
        })?;
        let test = self
            .registry
            .test(test_id)
            .ok_or(ConvertError::UnknownTestId {
                event_type: "testDone",
                id: test_id,
            })?;
        // A skipped test was already reported ignored at start.
        if test.metadata().skip {
            return Ok(());
        }
        let base_name = self.registry.base_name(test).to_owned();
        // There is no way to tell when a group finishes, so always re-anchor
        // the parent id.
        let parent_id = self
            .registry
            .has_valid_parent(test)
            .then(|| self.registry.valid_parent_id(test));

        if let Some(parent_id) = parent_id {
            self.state.current_parent_id = parent_id;
        }
        let time = event.time.ok_or(ConvertError::MissingField {
            event_type: "testDone",
            field: "time",
        })?;
        let duration = time - self.state.start_millis;

        let mut finished = ServiceMessage::test_finished(base_name);
        finished.add_attribute("duration", duration.to_string());
        self.emit(channel, finished)
    }

    fn handle_test_errored(
        &mut self,
        channel: OutputChannel,
        event: &TestErroredEvent,
    ) -> Result<(), ConvertError> {
        let message = event
            .error
            .clone()
            .unwrap_or_else(|| NO_ERROR_MESSAGE.to_owned());

        if message.starts_with(FAILED_TO_LOAD_PREFIX) {
            // A loading failure was preceded by a module-load marker, not a
            // recorded test; report it against a synthesized node.
            if let Some(test_id) = event.test_id {
                let unresolvable = match self.registry.test(test_id) {
                    Some(test) => !self.registry.has_valid_parent(test),
                    None => true,
                };
                if unresolvable {
                    return self.handle_failed_to_load(channel, &message);
                }
            }
        }

        let test_id = event.test_id.ok_or(ConvertError::MissingField {
            event_type: "error",
            field: "testID",
        })?;
        let test = self
            .registry
            .test(test_id)
            .ok_or(ConvertError::UnknownTestId {
                event_type: "error",
                id: test_id,
            })?;
        let base_name = self.registry.base_name(test).to_owned();

        let details = failure::decompose(&message);
        let mut failed = ServiceMessage::test_failed(&base_name);
        if let Some(expected) = details.expected {
            failed.add_attribute("expected", expected);
        }
        if let Some(actual) = details.actual {
            failed.add_attribute("actual", actual);
        }
        let is_failure = event.is_failure.ok_or(ConvertError::MissingField {
            event_type: "error",
            field: "isFailure",
        })?;
        if !is_failure {
            // An uncaught error rather than an assertion failure.
            failed.add_attribute("error", "true");
        }
        failed.add_attribute("message", format!("{}\n", details.headline));
        let time = event.time.ok_or(ConvertError::MissingField {
            event_type: "error",
            field: "time",
        })?;
        let duration = time - self.state.start_millis;
        failed.add_attribute("duration", duration.to_string());

        let mut stderr = ServiceMessage::test_std_err(&base_name);
        stderr.add_attribute(
            "out",
            event
                .stack_trace
                .clone()
                .unwrap_or_else(|| NO_STACK_TRACE.to_owned()),
        );

        self.emit(channel, failed)?;
        self.emit(channel, stderr)
    }

    /// Reports a load/compile failure under a fresh synthetic id, without
    /// touching the registries.
    fn handle_failed_to_load(
        &mut self,
        channel: OutputChannel,
        message: &str,
    ) -> Result<(), ConvertError> {
        self.state.current_id += 1;
        self.emit(channel, ServiceMessage::test_started(FAILED_TO_LOAD_NAME))?;
        let mut failed = ServiceMessage::test_failed(FAILED_TO_LOAD_NAME);
        failed.add_attribute("message", message);
        self.emit(channel, failed)
    }

    fn handle_print(
        &mut self,
        channel: OutputChannel,
        event: &PrintEvent,
    ) -> Result<(), ConvertError> {
        let test_id = event.test_id.ok_or(ConvertError::MissingField {
            event_type: "print",
            field: "testID",
        })?;
        let test = self
            .registry
            .test(test_id)
            .ok_or(ConvertError::UnknownTestId {
                event_type: "print",
                id: test_id,
            })?;
        let base_name = self.registry.base_name(test).to_owned();

        let text = event.message.as_deref().unwrap_or(NO_MESSAGE);
        // Separate the first print from the start banner.
        let out = if self.state.output_appeared {
            format!("{text}\n")
        } else {
            format!("\n{text}\n")
        };
        self.state.output_appeared = true;

        let mut message = ServiceMessage::test_std_out(base_name);
        message.add_attribute("out", out);
        self.emit(channel, message)
    }

    fn handle_group(
        &mut self,
        channel: OutputChannel,
        event: &GroupEvent,
    ) -> Result<(), ConvertError> {
        let id = self.registry.insert_group(&event.group);
        let group = self.registry.group(id).expect("group was just inserted");
        // Artificial groups are registered for parent-chain plumbing but
        // never reported.
        if group.is_artificial() {
            return Ok(());
        }
        let base_name = self.registry.base_name(group).to_owned();
        let parent_id = self.registry.valid_parent_id(group);

        self.state.current_id = id;
        self.state.current_parent_id = parent_id;
        self.emit(channel, ServiceMessage::test_suite_started(base_name))?;
        // Until another group changes context, siblings nest under this one.
        self.state.current_parent_id = id;
        Ok(())
    }

    /// Tags the message with the current tree position and writes it.
    fn emit(
        &mut self,
        channel: OutputChannel,
        mut message: ServiceMessage,
    ) -> Result<(), ConvertError> {
        message.add_attribute(NODE_ID_ATTR, self.state.current_id.to_string());
        message.add_attribute(PARENT_NODE_ID_ATTR, self.state.current_parent_id.to_string());
        self.sink
            .write_message(channel, &message.to_string())
            .map_err(ConvertError::Write)
    }
}
