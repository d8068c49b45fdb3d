// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use iotgw_config::GatewayConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Loads and validates the configuration, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config = super::load_config(cli)?;
    let opcua = config.opcua_config()?;
    let warnings = validation_warnings(&config);
    let source = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", source);
            println!();
            println!("Summary:");
            println!("  OPC UA endpoint: {}", config.masked_endpoint());
            println!(
                "  Security:        {:?} / {:?}",
                opcua.security_mode, opcua.security_policy
            );
            println!("  Namespace:       {}", config.opcua.namespace);
            println!("  HTTP:            {}", config.server.socket_addr());
            println!("  Auth:            {}", on_off(config.auth.enabled));
            println!(
                "  Rate limit:      {} ({} per {:?})",
                on_off(config.rate_limit.enabled),
                config.rate_limit.max_requests,
                config.rate_limit.window
            );
            println!(
                "  SNMP:            {} (port {})",
                on_off(config.snmp.enabled),
                config.snmp.port
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_pretty_json(&config.redacted())?);
            }
        }
        OutputFormat::Json => {
            let redacted = config.redacted();
            let output = serde_json::json!({
                "valid": true,
                "source": source,
                "summary": {
                    "endpoint": config.masked_endpoint(),
                    "namespace": config.opcua.namespace,
                    "http": config.server.socket_addr().to_string(),
                    "auth_enabled": config.auth.enabled,
                    "rate_limit_enabled": config.rate_limit.enabled,
                    "snmp_enabled": config.snmp.enabled,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&redacted) } else { None },
            });
            println!("{}", to_pretty_json(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Settings that are valid but probably not what the operator meant.
pub fn validation_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let auth = &config.auth;

    if auth.enabled && !auth.has_credentials() {
        warnings.push(
            "Authentication is enabled but no API key or username is configured; \
             every protected request will be rejected"
                .to_string(),
        );
    }
    if config.opcua.security_mode > 1
        && (config.opcua.certificate_file.is_none() || config.opcua.private_key_file.is_none())
    {
        warnings.push(
            "OPC UA security is enabled without a certificate and private key".to_string(),
        );
    }
    if config.server.expose_config && !auth.enabled {
        warnings.push("GET /config is exposed without authentication".to_string());
    }
    if config.snmp.enabled && !cfg!(feature = "snmp-agent") {
        warnings.push("SNMP is enabled but this build lacks the `snmp-agent` feature".to_string());
    }
    if config.snmp.enabled && config.snmp.community == "public" {
        warnings.push("SNMP community is the default 'public'".to_string());
    }

    warnings
}

fn on_off(on: bool) -> &'static str {
    if on {
        "enabled"
    } else {
        "disabled"
    }
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| BinError::runtime(format!("Failed to render JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warns_when_auth_has_no_credentials() {
        let config = GatewayConfig::default();
        let warnings = validation_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("every protected request")));
    }

    #[test]
    fn test_no_auth_warning_with_api_key() {
        let mut config = GatewayConfig::default();
        config.auth.api_key = Some("k".into());
        let warnings = validation_warnings(&config);
        assert!(!warnings.iter().any(|w| w.contains("every protected request")));
    }

    #[test]
    fn test_warns_on_public_config_endpoint() {
        let mut config = GatewayConfig::default();
        config.auth.enabled = false;
        let warnings = validation_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("GET /config")));
    }

    #[test]
    fn test_warns_on_security_without_certificate() {
        let mut config = GatewayConfig::default();
        config.opcua.security_mode = 3;
        let warnings = validation_warnings(&config);
        assert!(warnings.iter().any(|w| w.contains("certificate")));
    }
}
