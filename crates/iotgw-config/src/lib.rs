// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # iotgw-config
//!
//! Configuration for the iotgw OPC UA gateway.
//!
//! ## Quick Start
//!
//! ```no_run
//! use iotgw_config::ConfigLoader;
//!
//! let config = ConfigLoader::new().load("iotgw.yaml").unwrap();
//! let opcua = config.opcua_config().unwrap();
//! let pool = config.pool_config();
//! ```
//!
//! ## Environment Variables
//!
//! Values in files may reference the environment:
//!
//! ```yaml
//! opcua:
//!   endpoint: "${PLC_ENDPOINT:opc.tcp://127.0.0.1:4840}"
//! ```
//!
//! Individual settings can be overridden with `IOTGW_*` variables or the
//! legacy unprefixed names (`OPC_ENDPOINT`, `SERVER_PORT`, `API_KEY`, ...).

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, resolve_env_placeholders, ConfigFormat, ConfigLoader, ENV_PREFIX};
pub use schema::{
    mask_endpoint, AuthConfig, ConnectionSection, CorsConfig, GatewayConfig, LogFormat, LogLevel,
    LoggingConfig, OpcUaSection, RateLimitConfig, ServerConfig, SnmpConfig,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
