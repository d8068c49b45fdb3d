// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `oids` command.

use iotgw_core::{MetricsCollector, OidTable};

use crate::cli::{Cli, OidsArgs, OutputFormat};
use crate::error::{BinError, BinResult};

/// Prints the SNMP object table a monitoring system should poll.
pub fn oids(_cli: &Cli, args: OidsArgs) -> BinResult<()> {
    let table = OidTable::new(MetricsCollector::shared());

    match args.format {
        OutputFormat::Text => {
            println!("SNMP objects under {} (append .0 for GET):", OidTable::root());
            println!();
            for (oid, description) in table.describe() {
                println!("  {:<28} {}", oid, description);
            }
        }
        OutputFormat::Json => {
            let rows: Vec<_> = table
                .entries()
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "oid": e.oid.to_string(),
                        "instance": e.instance().to_string(),
                        "description": e.description,
                    })
                })
                .collect();
            let text = serde_json::to_string_pretty(&rows)
                .map_err(|e| BinError::runtime(format!("Failed to render JSON: {e}")))?;
            println!("{text}");
        }
    }

    Ok(())
}
