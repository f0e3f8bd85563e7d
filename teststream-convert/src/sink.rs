// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output sinks for converted streams.

use std::io::{self, Write};

/// Identity of the output channel a chunk arrived on.
///
/// The converter does not interpret the channel; it travels alongside each
/// chunk so the downstream consumer can keep the runner's stdout and stderr
/// apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputChannel {
    /// The runner's standard output.
    Stdout,
    /// The runner's standard error.
    Stderr,
}

/// The downstream consumer of a conversion.
///
/// Rendered service messages and verbatim pass-through text arrive on
/// separate methods: messages are logical lines without a terminator, while
/// pass-through chunks must be forwarded byte-for-byte as received.
pub trait MessageSink {
    /// Writes one rendered service message (no line terminator).
    fn write_message(&mut self, channel: OutputChannel, message: &str) -> io::Result<()>;

    /// Forwards a non-protocol chunk verbatim.
    fn write_passthrough(&mut self, channel: OutputChannel, chunk: &str) -> io::Result<()>;
}

/// A sink that writes to any [`io::Write`], terminating each service
/// message with a newline.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    /// Creates a sink over the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> MessageSink for WriterSink<W> {
    fn write_message(&mut self, channel: OutputChannel, message: &str) -> io::Result<()> {
        let _ = channel;
        writeln!(self.writer, "{message}")
    }

    fn write_passthrough(&mut self, channel: OutputChannel, chunk: &str) -> io::Result<()> {
        let _ = channel;
        self.writer.write_all(chunk.as_bytes())
    }
}

/// One write received by a [`BufferSink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkRecord {
    /// A rendered service message.
    Message(OutputChannel, String),
    /// A chunk forwarded verbatim.
    Passthrough(OutputChannel, String),
}

impl SinkRecord {
    /// The recorded text, regardless of kind.
    pub fn text(&self) -> &str {
        match self {
            SinkRecord::Message(_, text) | SinkRecord::Passthrough(_, text) => text,
        }
    }
}

/// A sink that buffers everything it receives, preserving order. Useful in
/// tests and for callers that post-process the converted stream.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    records: Vec<SinkRecord>,
}

impl BufferSink {
    /// Creates an empty buffer sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything received so far, in order.
    pub fn records(&self) -> &[SinkRecord] {
        &self.records
    }

    /// The received texts, in order, without channel/kind information.
    pub fn texts(&self) -> Vec<&str> {
        self.records.iter().map(SinkRecord::text).collect()
    }
}

impl MessageSink for BufferSink {
    fn write_message(&mut self, channel: OutputChannel, message: &str) -> io::Result<()> {
        self.records
            .push(SinkRecord::Message(channel, message.to_owned()));
        Ok(())
    }

    fn write_passthrough(&mut self, channel: OutputChannel, chunk: &str) -> io::Result<()> {
        self.records
            .push(SinkRecord::Passthrough(channel, chunk.to_owned()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn writer_sink_terminates_messages_only() {
        let mut sink = WriterSink::new(Vec::new());
        sink.write_message(OutputChannel::Stdout, "##teamcity[testStarted name='t']")
            .unwrap();
        sink.write_passthrough(OutputChannel::Stdout, "raw text\n")
            .unwrap();
        sink.write_passthrough(OutputChannel::Stderr, "no newline")
            .unwrap();
        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            written,
            "##teamcity[testStarted name='t']\nraw text\nno newline"
        );
    }
}
