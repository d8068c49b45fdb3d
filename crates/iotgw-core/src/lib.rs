// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # iotgw-core
//!
//! Observability surface shared by every iotgw crate.
//!
//! The OPC UA session pool and the HTTP layer both report into a single
//! [`MetricsCollector`] through the [`MetricsSink`] trait. The collector is
//! then exposed three ways:
//!
//! ```text
//!   SessionPool ─┐                      ┌─> GET /metrics (JSON)
//!   Gateways ────┼─> MetricsSink ─> MetricsCollector ─┼─> GET /metrics/prometheus
//!   HTTP layer ──┘                      └─> OidTable ─> SNMP GET/GETNEXT
//! ```
//!
//! The SNMP agent itself lives behind the `snmp-agent` feature; the OID
//! table and its value scaling are always available.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod snmp;

pub use error::{CoreError, CoreResult};
pub use metrics::{
    HttpMetrics, MetricsCollector, MetricsSink, MetricsSnapshot, NoopMetrics, OpcUaMetrics,
    SystemMetrics, SystemSampler,
};
pub use snmp::{ObjectId, OidEntry, OidTable};

#[cfg(feature = "snmp-agent")]
pub use snmp::agent::SnmpAgent;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
