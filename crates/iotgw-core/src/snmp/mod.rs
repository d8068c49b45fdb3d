// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SNMP view over the metrics collector.
//!
//! Every metric is a read-only Integer32 scalar under the gateway's
//! enterprise arc. Scalars are addressed by their `.0` instance:
//!
//! ```text
//! 1.3.6.1.4.1.12345.1
//! ├── .1.{1..9}  OPC UA counters
//! ├── .2.{1..9}  HTTP counters
//! └── .3.{1..5}  system values (cpu x100, mem x100, total MB, free MB, uptime s)
//! ```
//!
//! [`OidTable`] owns the mapping and answers GET/GETNEXT lookups. The UDP
//! agent that serves it is in [`agent`] behind the `snmp-agent` feature.

#[cfg(feature = "snmp-agent")]
pub mod agent;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::CoreError;
use crate::metrics::{MetricsCollector, MetricsSnapshot};

/// Enterprise arc all gateway objects live under.
pub const ENTERPRISE_ARC: [u32; 8] = [1, 3, 6, 1, 4, 1, 12345, 1];

const BYTES_PER_MB: u64 = 1_048_576;

// =============================================================================
// ObjectId
// =============================================================================

/// A dotted-decimal SNMP object identifier.
///
/// Ordering is lexicographic over arcs, which is the GETNEXT walk order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(Vec<u32>);

impl ObjectId {
    /// Creates an OID from its arcs.
    pub fn new(arcs: impl Into<Vec<u32>>) -> Self {
        Self(arcs.into())
    }

    /// Returns the arcs.
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Returns a copy with `arc` appended.
    pub fn child(&self, arc: u32) -> Self {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Self(arcs)
    }

    /// Returns `true` if `self` lies under `prefix` (or equals it).
    pub fn starts_with(&self, prefix: &ObjectId) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl FromStr for ObjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(CoreError::invalid_oid(s, "empty"));
        }
        trimmed
            .split('.')
            .map(|arc| {
                arc.parse::<u32>()
                    .map_err(|_| CoreError::invalid_oid(s, format!("bad arc '{}'", arc)))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for arc in &self.0 {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

// =============================================================================
// OidEntry
// =============================================================================

type Reader = fn(&MetricsSnapshot) -> i32;

/// One registered scalar.
#[derive(Clone)]
pub struct OidEntry {
    /// Object OID (without the `.0` instance suffix).
    pub oid: ObjectId,
    /// Human-readable description for monitoring configuration.
    pub description: &'static str,
    read: Reader,
}

impl OidEntry {
    /// The instance OID that GET requests address.
    pub fn instance(&self) -> ObjectId {
        self.oid.child(0)
    }

    /// Reads this scalar's value from a snapshot.
    pub fn value(&self, snapshot: &MetricsSnapshot) -> i32 {
        (self.read)(snapshot)
    }
}

impl fmt::Debug for OidEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OidEntry")
            .field("oid", &self.oid.to_string())
            .field("description", &self.description)
            .finish()
    }
}

fn saturate(value: u64) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn saturate_f64(value: f64) -> i32 {
    if value.is_nan() {
        0
    } else {
        value.clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }
}

// =============================================================================
// OidTable
// =============================================================================

/// The gateway's SNMP object table.
#[derive(Debug, Clone)]
pub struct OidTable {
    entries: Vec<OidEntry>,
    metrics: Arc<MetricsCollector>,
}

impl OidTable {
    /// Builds the table over `metrics`.
    pub fn new(metrics: Arc<MetricsCollector>) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(23),
            metrics,
        };

        // OPC UA
        table.register(1, 1, "Number of OPC UA connections", |s| saturate(s.opcua.opcua_connections));
        table.register(1, 2, "Number of OPC UA errors", |s| saturate(s.opcua.opcua_errors));
        table.register(1, 3, "Number of OPC UA reconnections", |s| saturate(s.opcua.opcua_reconnects));
        table.register(1, 4, "Number of OPC UA requests", |s| saturate(s.opcua.opcua_requests));
        table.register(1, 5, "Number of OPC UA request errors", |s| {
            saturate(s.opcua.opcua_requests_errors)
        });
        table.register(1, 6, "Number of OPC UA read operations", |s| {
            saturate(s.opcua.opcua_read_operations)
        });
        table.register(1, 7, "Number of OPC UA write operations", |s| {
            saturate(s.opcua.opcua_write_operations)
        });
        table.register(1, 8, "Last OPC UA response time (ms)", |s| {
            saturate(s.opcua.opcua_last_response_time)
        });
        table.register(1, 9, "Average OPC UA response time (ms)", |s| {
            saturate_f64(s.opcua.opcua_avg_response_time)
        });

        // HTTP
        table.register(2, 1, "Number of HTTP requests", |s| saturate(s.http.http_requests));
        table.register(2, 2, "Number of HTTP errors", |s| saturate(s.http.http_errors));
        table.register(2, 3, "Number of HTTP 2xx responses", |s| saturate(s.http.http_2xx));
        table.register(2, 4, "Number of HTTP 3xx responses", |s| saturate(s.http.http_3xx));
        table.register(2, 5, "Number of HTTP 4xx responses", |s| saturate(s.http.http_4xx));
        table.register(2, 6, "Number of HTTP 5xx responses", |s| saturate(s.http.http_5xx));
        table.register(2, 7, "Last HTTP response time (ms)", |s| {
            saturate(s.http.http_last_response_time)
        });
        table.register(2, 8, "Average HTTP response time (ms)", |s| {
            saturate_f64(s.http.http_avg_response_time)
        });
        table.register(2, 9, "Number of rate limit hits", |s| saturate(s.http.rate_limit));

        // System: percentages scaled by 100 to keep two decimals in an integer.
        table.register(3, 1, "CPU usage (percentage * 100)", |s| {
            saturate_f64((s.system.cpu_usage * 100.0).round())
        });
        table.register(3, 2, "Memory usage (percentage * 100)", |s| {
            saturate_f64((s.system.memory_usage * 100.0).round())
        });
        table.register(3, 3, "Total memory (MB)", |s| saturate(s.system.total_memory / BYTES_PER_MB));
        table.register(3, 4, "Free memory (MB)", |s| saturate(s.system.free_memory / BYTES_PER_MB));
        table.register(3, 5, "Server uptime (seconds)", |s| saturate_f64(s.system.uptime.round()));

        table.entries.sort_by(|a, b| a.oid.cmp(&b.oid));
        table
    }

    fn register(&mut self, group: u32, index: u32, description: &'static str, read: Reader) {
        let oid = ObjectId::new(ENTERPRISE_ARC.to_vec()).child(group).child(index);
        self.entries.push(OidEntry {
            oid,
            description,
            read,
        });
    }

    /// The enterprise subtree root.
    pub fn root() -> ObjectId {
        ObjectId::new(ENTERPRISE_ARC.to_vec())
    }

    /// Number of registered scalars.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered entries in walk order.
    pub fn entries(&self) -> &[OidEntry] {
        &self.entries
    }

    /// Looks up an entry by object OID.
    pub fn entry(&self, oid: &ObjectId) -> Option<&OidEntry> {
        self.entries.iter().find(|e| &e.oid == oid)
    }

    /// GET: value of the scalar instance `oid` (`<object>.0`).
    pub fn get(&self, oid: &ObjectId) -> Option<i32> {
        let entry = self.entries.iter().find(|e| &e.instance() == oid)?;
        Some(entry.value(&self.metrics.snapshot()))
    }

    /// GETNEXT: first instance strictly after `oid` in walk order.
    pub fn get_next(&self, oid: &ObjectId) -> Option<(ObjectId, i32)> {
        let entry = self.entries.iter().find(|e| &e.instance() > oid)?;
        Some((entry.instance(), entry.value(&self.metrics.snapshot())))
    }

    /// `(oid, description)` pairs for logging.
    pub fn describe(&self) -> impl Iterator<Item = (String, &'static str)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.oid.to_string(), e.description))
    }

    /// Logs the OID map at info level.
    pub fn log_descriptions(&self, port: u16, community: &str) {
        tracing::info!(port, community, "SNMP configuration for monitoring");
        for (oid, description) in self.describe() {
            tracing::info!(oid = %oid, "{}", description);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
