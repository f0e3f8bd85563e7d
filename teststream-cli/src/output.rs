// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Args;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Copy, Clone, Debug, Args)]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, global = true, env = "TESTSTREAM_VERBOSE")]
    pub(crate) verbose: bool,
}

impl OutputOpts {
    /// Installs the stderr log subscriber.
    ///
    /// `TESTSTREAM_LOG` takes a tracing target filter and overrides the
    /// default level; converted output on stdout is never mixed with logs.
    pub(crate) fn init(self) {
        let level_str = std::env::var("TESTSTREAM_LOG").unwrap_or_default();
        let targets = if level_str.is_empty() {
            let default = if self.verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };
            Targets::new().with_default(default)
        } else {
            level_str.parse().expect("unable to parse TESTSTREAM_LOG")
        };

        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(targets);
        tracing_subscriber::registry().with(layer).init();
    }
}
