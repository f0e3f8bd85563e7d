// Copyright (c) The teststream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use teststream_cli::TeststreamApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    let app = TeststreamApp::parse();
    app.exec()
}
