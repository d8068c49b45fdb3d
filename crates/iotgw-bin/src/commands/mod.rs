// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod oids;
mod run;
mod validate;
mod version;
mod zabbix;

pub use oids::oids;
pub use run::run;
pub use validate::{validate, validation_warnings};
pub use version::version;
pub use zabbix::zabbix_template;

use iotgw_config::{ConfigLoader, GatewayConfig};

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run::run(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Oids(args) => oids::oids(&cli, args),
        Commands::Version => version::version(&cli),
        Commands::ZabbixTemplate(args) => zabbix::zabbix_template(&cli, args),
    }
}

/// Loads the configuration named on the command line, or defaults plus
/// environment overrides when none was given.
pub(crate) fn load_config(cli: &Cli) -> BinResult<GatewayConfig> {
    let mut config = ConfigLoader::new()
        .load_optional(cli.config.as_deref())
        .map_err(|e| {
            let source = cli
                .config
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "defaults".to_string());
            BinError::from(e).with_context(format!("Failed to load configuration from {source}"))
        })?;
    cli.apply_overrides(&mut config);
    Ok(config)
}
