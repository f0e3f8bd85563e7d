// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::OutputOpts;
use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::PathBuf,
};
use teststream_convert::{OutputChannel, TestEventsConverter, WriterSink};
use tracing::debug;

/// Converts a test runner's JSON event stream into service messages.
///
/// Runner output is consumed one line at a time; protocol events become
/// service messages, everything else is forwarded verbatim.
#[derive(Debug, Parser)]
#[command(name = "teststream", version, about)]
pub struct TeststreamApp {
    /// Read runner output from this file instead of stdin
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Channel identity to attribute the input to
    #[arg(long, value_enum, default_value_t, value_name = "CHANNEL")]
    channel: ChannelOpt,

    #[clap(flatten)]
    output: OutputOpts,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum ChannelOpt {
    #[default]
    Stdout,
    Stderr,
}

impl From<ChannelOpt> for OutputChannel {
    fn from(channel: ChannelOpt) -> Self {
        match channel {
            ChannelOpt::Stdout => OutputChannel::Stdout,
            ChannelOpt::Stderr => OutputChannel::Stderr,
        }
    }
}

impl TeststreamApp {
    /// Runs the conversion to completion.
    pub fn exec(self) -> Result<()> {
        self.output.init();
        let channel: OutputChannel = self.channel.into();

        match &self.input {
            Some(path) => {
                let file = File::open(path)
                    .wrap_err_with(|| format!("failed to open input file `{}`", path.display()))?;
                self.convert_stream(channel, BufReader::new(file))
            }
            None => {
                let stdin = io::stdin();
                let lock = stdin.lock();
                self.convert_stream(channel, lock)
            }
        }
    }

    fn convert_stream(&self, channel: OutputChannel, mut reader: impl BufRead) -> Result<()> {
        let stdout = io::stdout();
        let mut converter = TestEventsConverter::new(WriterSink::new(io::BufWriter::new(
            stdout.lock(),
        )));

        let mut chunks = 0u64;
        let mut line = String::new();
        loop {
            line.clear();
            let read = read_chunk(&mut reader, &mut line)
                .wrap_err("failed to read runner output")?;
            if read == 0 {
                break;
            }
            chunks += 1;
            converter
                .process_chunk(channel, &line)
                .wrap_err_with(|| format!("conversion failed on chunk {chunks}"))?;
        }
        // A stream that was cut off before `done` still has open suites.
        converter.finish(channel).wrap_err("conversion failed while finalizing")?;
        debug!(chunks, "conversion complete");

        let mut writer = converter.into_sink().into_inner();
        writer.flush().wrap_err("failed to flush output")?;
        Ok(())
    }
}

/// Reads one line including its terminator, replacing invalid UTF-8 so a
/// garbled chunk is forwarded rather than aborting the run.
fn read_chunk(reader: &mut impl BufRead, line: &mut String) -> io::Result<usize> {
    let mut bytes = Vec::new();
    let read = reader.read_until(b'\n', &mut bytes)?;
    line.push_str(&String::from_utf8_lossy(&bytes));
    Ok(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_cli() {
        TeststreamApp::command().debug_assert();
    }

    #[test]
    fn read_chunk_keeps_terminators() {
        let mut reader = io::Cursor::new(b"one\ntwo".to_vec());
        let mut line = String::new();
        assert_eq!(read_chunk(&mut reader, &mut line).unwrap(), 4);
        assert_eq!(line, "one\n");
        line.clear();
        assert_eq!(read_chunk(&mut reader, &mut line).unwrap(), 3);
        assert_eq!(line, "two");
        line.clear();
        assert_eq!(read_chunk(&mut reader, &mut line).unwrap(), 0);
    }
}
