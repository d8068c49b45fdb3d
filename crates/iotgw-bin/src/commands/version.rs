// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

fn enabled(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

/// Prints component versions and compiled-in features.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("iotgw - OPC UA to HTTP/SNMP gateway");
    println!();
    println!("Version Information:");
    println!("  iotgw-bin:    {}", crate::VERSION);
    println!("  iotgw-core:   {}", iotgw_core::VERSION);
    println!("  iotgw-api:    {}", iotgw_api::VERSION);
    println!("  iotgw-config: {}", iotgw_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!("  OPC UA transport: {}", enabled(cfg!(feature = "real-transport")));
    println!("  SNMP agent:       {}", enabled(cfg!(feature = "snmp-agent")));
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
