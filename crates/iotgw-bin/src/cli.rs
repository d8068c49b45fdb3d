// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: Start the gateway (default)
//! - `validate`: Validate the configuration
//! - `oids`: Print the SNMP OID table
//! - `zabbix-template`: Generate a Zabbix template for the SNMP objects
//! - `version`: Show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use iotgw_config::{GatewayConfig, LogLevel};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// iotgw - OPC UA to HTTP/SNMP gateway
///
/// Exposes the variables of one OPC UA server over a small JSON API and
/// publishes the gateway's own health as SNMP values.
#[derive(Parser, Debug)]
#[command(
    name = "iotgw",
    author = "Sylvex <contact@sylvex.io>",
    version = iotgw_core::VERSION,
    about = "OPC UA to HTTP/SNMP gateway",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (YAML, TOML or JSON). Defaults plus
    /// environment overrides when omitted.
    #[arg(short, long, env = "IOTGW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(
        short,
        long,
        env = "IOTGW_LOG_LEVEL",
        value_parser = parse_log_level,
        global = true
    )]
    pub log_level: Option<LogLevel>,

    /// Log format; overrides the file
    #[arg(long, env = "IOTGW_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration
    ///
    /// Loads and validates the configuration without connecting anywhere.
    Validate(ValidateArgs),

    /// Print the SNMP OID table
    Oids(OidsArgs),

    /// Generate a Zabbix template for the SNMP objects
    ///
    /// `--version` selects the SNMP version here, not the program version.
    #[command(disable_version_flag = true)]
    ZabbixTemplate(ZabbixArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Do not connect to the OPC UA server before the first request
    #[arg(long)]
    pub skip_warmup: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Print the parsed configuration (secrets redacted)
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `oids` command.
#[derive(Args, Debug, Default, Clone)]
pub struct OidsArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `zabbix-template` command.
#[derive(Args, Debug, Clone)]
pub struct ZabbixArgs {
    /// SNMP version the template polls with
    #[arg(short = 'v', long = "version", default_value = "3")]
    pub snmp_version: SnmpVersion,

    /// SNMPv3 security name
    #[arg(short, long, default_value = "opcgwuser")]
    pub user: String,

    /// SNMPv3 security level
    #[arg(long, default_value = "authPriv", ignore_case = true)]
    pub level: SecurityLevel,

    /// SNMPv3 authentication protocol
    #[arg(short, long, default_value = "sha256", ignore_case = true)]
    pub auth: AuthProtocol,

    /// SNMPv3 privacy protocol
    #[arg(short, long = "priv", default_value = "aes128", ignore_case = true)]
    pub privacy: PrivProtocol,

    /// Default value of the community macro (SNMPv1/v2c)
    #[arg(long, default_value = "public")]
    pub community: String,

    /// Write the template to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl Default for ZabbixArgs {
    fn default() -> Self {
        Self {
            snmp_version: SnmpVersion::V3,
            user: "opcgwuser".to_string(),
            level: SecurityLevel::AuthPriv,
            auth: AuthProtocol::Sha256,
            privacy: PrivProtocol::Aes128,
            community: "public".to_string(),
            output: None,
        }
    }
}

// =============================================================================
// Enums
// =============================================================================

/// SNMP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SnmpVersion {
    /// SNMPv1
    #[value(name = "1")]
    V1,
    /// SNMPv2c
    #[value(name = "2c")]
    V2c,
    /// SNMPv3
    #[value(name = "3")]
    V3,
}

impl SnmpVersion {
    /// Community-based versions (v1, v2c).
    pub fn uses_community(self) -> bool {
        !matches!(self, Self::V3)
    }

    /// Label as printed in help and descriptions.
    pub fn label(self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V2c => "2c",
            Self::V3 => "3",
        }
    }
}

/// SNMPv3 security level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SecurityLevel {
    /// No authentication, no privacy
    #[value(name = "noAuthNoPriv")]
    NoAuthNoPriv,
    /// Authentication without privacy
    #[value(name = "authNoPriv")]
    AuthNoPriv,
    /// Authentication and privacy
    #[value(name = "authPriv")]
    AuthPriv,
}

/// SNMPv3 authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum AuthProtocol {
    /// MD5
    Md5,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

/// SNMPv3 privacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PrivProtocol {
    /// DES
    Des,
    /// AES-128
    Aes128,
    /// AES-192
    Aes192,
    /// AES-256
    Aes256,
    /// AES-192 (Cisco)
    #[value(name = "aes192c")]
    Aes192c,
    /// AES-256 (Cisco)
    #[value(name = "aes256c")]
    Aes256c,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormat> for iotgw_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => iotgw_config::LogFormat::Text,
            LogFormat::Json => iotgw_config::LogFormat::Json,
            LogFormat::Compact => iotgw_config::LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

fn parse_log_level(value: &str) -> Result<LogLevel, String> {
    LogLevel::parse(value)
        .ok_or_else(|| format!("unknown log level '{value}' (trace, debug, info, warn, error)"))
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Run` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Applies the logging flags on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut GatewayConfig) {
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format.into();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::try_parse_from(["iotgw"]).unwrap();
        assert!(matches!(cli.effective_command(), Commands::Run(_)));
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::try_parse_from([
            "iotgw",
            "validate",
            "-c",
            "/etc/iotgw/iotgw.yaml",
            "--log-level",
            "DEBUG",
            "--log-format",
            "json",
            "--strict",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/iotgw/iotgw.yaml")));
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        match cli.effective_command() {
            Commands::Validate(args) => assert!(args.strict),
            other => panic!("unexpected command: {other:?}"),
        }

        let mut config = GatewayConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, iotgw_config::LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Cli::try_parse_from(["iotgw", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_zabbix_args_defaults_and_version_flag() {
        let cli = Cli::try_parse_from(["iotgw", "zabbix-template"]).unwrap();
        match cli.effective_command() {
            Commands::ZabbixTemplate(args) => {
                assert_eq!(args.snmp_version, SnmpVersion::V3);
                assert_eq!(args.user, "opcgwuser");
                assert_eq!(args.level, SecurityLevel::AuthPriv);
                assert_eq!(args.auth, AuthProtocol::Sha256);
                assert_eq!(args.privacy, PrivProtocol::Aes128);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from([
            "iotgw",
            "zabbix-template",
            "--version",
            "2c",
            "--user",
            "zabbix",
            "--level",
            "authnopriv",
            "--auth",
            "SHA1",
            "--priv",
            "AES256",
        ])
        .unwrap();
        match cli.effective_command() {
            Commands::ZabbixTemplate(args) => {
                assert_eq!(args.snmp_version, SnmpVersion::V2c);
                assert!(args.snmp_version.uses_community());
                assert_eq!(args.user, "zabbix");
                assert_eq!(args.level, SecurityLevel::AuthNoPriv);
                assert_eq!(args.auth, AuthProtocol::Sha1);
                assert_eq!(args.privacy, PrivProtocol::Aes256);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_zabbix_rejects_unknown_version() {
        assert!(Cli::try_parse_from(["iotgw", "zabbix-template", "--version", "4"]).is_err());
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::try_parse_from(["iotgw", "run", "--skip-warmup"]).unwrap();
        match cli.effective_command() {
            Commands::Run(args) => assert!(args.skip_warmup),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
