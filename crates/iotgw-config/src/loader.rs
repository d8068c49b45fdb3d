// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file (or start from defaults when there is none)
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Parse by extension: YAML, TOML or JSON
//! 4. Apply environment overrides (`IOTGW_*`, then the legacy names)
//! 5. Validate
//!
//! # Environment Overrides
//!
//! ```text
//! IOTGW_OPC_ENDPOINT=opc.tcp://plc:4840     OPC_ENDPOINT=...
//! IOTGW_SERVER_PORT=8080                    SERVER_PORT=...
//! IOTGW_CONNECTION_RETRY_DELAY=5000         CONNECTION_RETRY_DELAY=...   (milliseconds)
//! ```
//!
//! The prefixed name wins when both are set.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{GatewayConfig, LogLevel};

/// Default environment prefix.
pub const ENV_PREFIX: &str = "IOTGW";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Loads [`GatewayConfig`] from files, strings and the environment.
///
/// # Examples
///
/// ```no_run
/// use iotgw_config::loader::ConfigLoader;
///
/// let config = ConfigLoader::new().load("iotgw.yaml").unwrap();
/// println!("endpoint: {}", config.masked_endpoint());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    resolve_env_vars: bool,
    legacy_env: bool,
}

impl ConfigLoader {
    /// Creates a loader with env resolution on.
    pub fn new() -> Self {
        Self {
            env_prefix: ENV_PREFIX.to_string(),
            resolve_env_vars: true,
            legacy_env: true,
        }
    }

    /// Sets the environment prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables placeholders and overrides.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables the unprefixed legacy variable names.
    pub fn with_legacy_env(mut self, enabled: bool) -> Self {
        self.legacy_env = enabled;
        self
    }

    /// Loads `path`, or defaults plus env overrides when `path` is `None`.
    pub fn load_optional(&self, path: Option<&Path>) -> ConfigResult<GatewayConfig> {
        match path {
            Some(path) => self.load(path),
            None => self.load_defaults(),
        }
    }

    /// Loads and validates a configuration file.
    ///
    /// The format follows the extension: `.yaml`/`.yml`, `.toml` or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }
        let content = fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let format = ConfigFormat::from_path(path)?;

        let mut config = self
            .parse(&content, format)
            .map_err(|e| match e {
                ConfigError::Serialization { message } => ConfigError::parse(path, message),
                other => other,
            })?;
        self.finish(&mut config)?;

        info!(endpoint = %config.masked_endpoint(), "Configuration loaded");
        Ok(config)
    }

    /// Parses `content` in `format`, then applies overrides and validates.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
        let mut config = self.parse(content, format)?;
        self.finish(&mut config)?;
        Ok(config)
    }

    /// Defaults plus env overrides.
    pub fn load_defaults(&self) -> ConfigResult<GatewayConfig> {
        debug!("No configuration file given; using defaults");
        let mut config = GatewayConfig::default();
        self.finish(&mut config)?;
        Ok(config)
    }

    fn finish(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        if self.resolve_env_vars {
            self.apply_env_overrides(config)?;
        }
        config.validate()
    }

    fn parse(&self, content: &str, format: ConfigFormat) -> ConfigResult<GatewayConfig> {
        let content = if self.resolve_env_vars {
            resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        if content.trim().is_empty() {
            return Ok(GatewayConfig::default());
        }

        match format {
            ConfigFormat::Yaml => parse_yaml(&content),
            ConfigFormat::Toml => {
                toml::from_str(&content).map_err(|e| ConfigError::serialization(e.to_string()))
            }
            ConfigFormat::Json => serde_json::from_str(&content)
                .map_err(|e| ConfigError::serialization(e.to_string())),
        }
    }

    /// Looks up `<PREFIX>_<name>`, then the legacy name.
    fn lookup(&self, name: &str, legacy: Option<&str>) -> Option<(String, String)> {
        let prefixed = format!("{}_{}", self.env_prefix, name);
        if let Ok(value) = env::var(&prefixed) {
            return Some((prefixed, value));
        }
        let legacy = legacy.filter(|_| self.legacy_env)?;
        env::var(legacy).ok().map(|value| (legacy.to_string(), value))
    }

    fn apply_env_overrides(&self, config: &mut GatewayConfig) -> ConfigResult<()> {
        let opcua = &mut config.opcua;
        if let Some((_, v)) = self.lookup("OPC_ENDPOINT", Some("OPC_ENDPOINT")) {
            opcua.endpoint = v;
        }
        if let Some((name, v)) = self.lookup("OPC_SECURITY_MODE", Some("OPC_SECURITY_MODE")) {
            opcua.security_mode = parse_env(&name, &v)?;
        }
        if let Some((_, v)) = self.lookup("OPC_SECURITY_POLICY", Some("OPC_SECURITY_POLICY")) {
            opcua.security_policy = v;
        }
        if let Some((name, v)) = self.lookup("OPC_NAMESPACE", Some("OPC_NAMESPACE")) {
            opcua.namespace = parse_env(&name, &v)?;
        }
        if let Some((_, v)) = self.lookup("OPC_APPLICATION_URI", Some("OPC_APPLICATION_URI")) {
            opcua.application_uri = v;
        }
        if let Some((_, v)) = self.lookup("OPC_CERTIFICATE_FILE", Some("OPC_CERTIFICATE_FILE")) {
            opcua.certificate_file = Some(PathBuf::from(v));
        }
        if let Some((_, v)) = self.lookup("OPC_PRIVATE_KEY_FILE", Some("OPC_PRIVATE_KEY_FILE")) {
            opcua.private_key_file = Some(PathBuf::from(v));
        }
        if let Some((_, v)) = self.lookup("OPC_TRUSTED_FOLDER", Some("OPC_TRUSTED_FOLDER")) {
            opcua.trusted_folder = Some(PathBuf::from(v));
        }
        if let Some((_, v)) = self.lookup("OPC_REJECTED_FOLDER", Some("OPC_REJECTED_FOLDER")) {
            opcua.rejected_folder = Some(PathBuf::from(v));
        }

        let conn = &mut config.connection;
        if let Some((name, v)) = self.lookup("CONNECTION_RETRY_MAX", Some("CONNECTION_RETRY_MAX")) {
            conn.retry_max = parse_env(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("CONNECTION_RETRY_DELAY", Some("CONNECTION_RETRY_DELAY")) {
            conn.retry_delay = parse_millis(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("CONNECTION_INITIAL_DELAY", Some("CONNECTION_INITIAL_DELAY")) {
            conn.initial_delay = parse_millis(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("CONNECTION_MAX_RETRY", Some("CONNECTION_MAX_RETRY")) {
            conn.max_retry = parse_env(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("CONNECTION_MAX_DELAY", Some("CONNECTION_MAX_DELAY")) {
            conn.max_delay = parse_millis(&name, &v)?;
        }

        if let Some((name, v)) = self.lookup("SERVER_PORT", Some("SERVER_PORT")) {
            config.server.port = parse_env(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("SERVER_BIND_ADDRESS", None) {
            config.server.bind_address = parse_env(&name, &v)?;
        }

        if let Some((name, v)) = self.lookup("LOG_LEVEL", Some("LOG_LEVEL")) {
            config.logging.level = LogLevel::parse(&v)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected a log level"))?;
        }

        let auth = &mut config.auth;
        if let Some((_, v)) = self.lookup("API_KEY", Some("API_KEY")) {
            auth.api_key = Some(v);
        }
        if let Some((_, v)) = self.lookup("AUTH_USERNAME", Some("AUTH_USERNAME")) {
            auth.username = Some(v);
        }
        if let Some((_, v)) = self.lookup("AUTH_PASSWORD", Some("AUTH_PASSWORD")) {
            auth.password = Some(v);
        }
        if let Some((_, v)) = self.lookup("AUTH_ENABLED", None) {
            auth.enabled = parse_bool(&v);
        }

        let limit = &mut config.rate_limit;
        if let Some((name, v)) = self.lookup("RATE_LIMIT_WINDOW_MS", Some("RATE_LIMIT_WINDOW_MS")) {
            limit.window = parse_millis(&name, &v)?;
        }
        if let Some((name, v)) = self.lookup("RATE_LIMIT_MAX", Some("RATE_LIMIT_MAX")) {
            limit.max_requests = parse_env(&name, &v)?;
        }

        let snmp = &mut config.snmp;
        if let Some((name, v)) = self.lookup("SNMP_PORT", Some("SNMP_PORT")) {
            snmp.port = parse_env(&name, &v)?;
        }
        if let Some((_, v)) = self.lookup("SNMP_COMMUNITY", Some("SNMP_COMMUNITY")) {
            snmp.community = v;
        }
        if let Some((_, v)) = self.lookup("SNMP_ENABLED", None) {
            snmp.enabled = parse_bool(&v);
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML.
    Yaml,
    /// TOML.
    Toml,
    /// JSON.
    Json,
}

impl ConfigFormat {
    /// Format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Replaces `${VAR}` and `${VAR:default}` with environment values.
///
/// An unset variable without a default is left as written.
pub fn resolve_env_placeholders(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            result.push_str(&rest[start..]);
            return result;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };
        match (env::var(name), default) {
            (Ok(value), _) => result.push_str(&value),
            (Err(_), Some(default)) => result.push_str(default),
            (Err(_), None) => {
                warn!(variable = name, "Environment variable not found");
                result.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }
    result.push_str(rest);
    result
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::invalid_env_var(
            name,
            format!("cannot parse '{value}' as {}", std::any::type_name::<T>()),
        )
    })
}

fn parse_millis(name: &str, value: &str) -> ConfigResult<Duration> {
    parse_env::<u64>(name, value).map(Duration::from_millis)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

/// YAML goes through the `config` crate.
fn parse_yaml<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

/// Loads `path` with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    ConfigLoader::new().load(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_yaml() {
        let file = write_temp(
            ".yaml",
            r#"
opcua:
  endpoint: opc.tcp://plc.local:4840
  namespace: 3
connection:
  retry_max: 2
  retry_delay: 10s
server:
  port: 8080
"#,
        );
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load(file.path())
            .unwrap();

        assert_eq!(config.opcua.endpoint, "opc.tcp://plc.local:4840");
        assert_eq!(config.opcua.namespace, 3);
        assert_eq!(config.connection.retry_max, 2);
        assert_eq!(config.connection.retry_delay, Duration::from_secs(10));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.max_requests, 100);
    }

    #[test]
    fn test_load_toml() {
        let file = write_temp(
            ".toml",
            r#"
[opcua]
endpoint = "opc.tcp://10.0.0.5:4840"

[rate_limit]
window = "1m"
max_requests = 10
"#,
        );
        let config = ConfigLoader::new()
            .with_env_vars(false)
            .load(file.path())
            .unwrap();
        assert_eq!(config.opcua.endpoint, "opc.tcp://10.0.0.5:4840");
        assert_eq!(config.rate_limit.window, Duration::from_secs(60));
    }

    #[test]
    fn test_load_json_unknown_field_rejected() {
        let file = write_temp(".json", r#"{"opcua": {"endpont": "opc.tcp://x:1"}}"#);
        let err = ConfigLoader::new()
            .with_env_vars(false)
            .load(file.path())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_endpoint_fails_validation() {
        let err = ConfigLoader::new()
            .with_env_vars(false)
            .load_from_str("opcua:\n  endpoint: tcp://plc:4840\n", ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/iotgw.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")).unwrap(), ConfigFormat::Toml);
        assert!(ConfigFormat::from_path(Path::new("a.ini")).is_err());
    }

    #[test]
    fn test_placeholder_default_and_missing() {
        assert_eq!(
            resolve_env_placeholders("port: ${IOTGW_TEST_UNSET_VAR_1:3100}"),
            "port: 3100"
        );
        assert_eq!(
            resolve_env_placeholders("x: ${IOTGW_TEST_UNSET_VAR_2} y"),
            "x: ${IOTGW_TEST_UNSET_VAR_2} y"
        );
        assert_eq!(resolve_env_placeholders("open ${brace"), "open ${brace");
    }

    #[test]
    fn test_prefixed_override_with_custom_prefix() {
        env::set_var("IOTGWLOADERTEST_SERVER_PORT", "4100");
        env::set_var("IOTGWLOADERTEST_CONNECTION_RETRY_DELAY", "2500");
        let config = ConfigLoader::new()
            .with_env_prefix("IOTGWLOADERTEST")
            .with_legacy_env(false)
            .load_defaults()
            .unwrap();
        env::remove_var("IOTGWLOADERTEST_SERVER_PORT");
        env::remove_var("IOTGWLOADERTEST_CONNECTION_RETRY_DELAY");

        assert_eq!(config.server.port, 4100);
        assert_eq!(config.connection.retry_delay, Duration::from_millis(2500));
    }

    #[test]
    fn test_unparsable_override_is_error() {
        env::set_var("IOTGWBADTEST_OPC_NAMESPACE", "two");
        let err = ConfigLoader::new()
            .with_env_prefix("IOTGWBADTEST")
            .with_legacy_env(false)
            .load_defaults()
            .unwrap_err();
        env::remove_var("IOTGWBADTEST_OPC_NAMESPACE");

        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "IOTGWBADTEST_OPC_NAMESPACE"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("on"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("off"));
    }
}
