// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Loads the configuration, starts logging and runs the gateway until a
/// shutdown signal arrives.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = super::load_config(cli)?;
    init_logging(&config.logging);

    RuntimeBuilder::new()
        .config(config)
        .skip_warmup(args.skip_warmup)
        .build()?
        .run()
        .await
}
