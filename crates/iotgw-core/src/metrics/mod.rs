// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway metrics.
//!
//! Counters are plain atomics so that recording never blocks a request path,
//! mirrored into a Prometheus registry that is built once per collector.
//! Response times are tracked as "last" and cumulative mean in milliseconds.
//!
//! | Group | Counters |
//! |-------|----------|
//! | OPC UA | connections, errors, reconnects, requests, request errors, reads, writes, response time |
//! | HTTP | requests, errors, 2xx/3xx/4xx/5xx, response time, rate-limit hits |
//! | System | CPU %, memory %, total/free bytes, uptime |

mod export;
mod system;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::{CoreError, CoreResult};
use export::PrometheusExport;

pub use system::{SystemMetrics, SystemSampler};

// =============================================================================
// MetricsSink
// =============================================================================

/// Mutable observability sink consumed by the session pool, the gateways and
/// the HTTP middleware.
///
/// Every method has a no-op default so test doubles only override what they
/// assert on.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// A pooled OPC UA session became live.
    fn opcua_connection_opened(&self) {}

    /// A pooled OPC UA session was torn down.
    fn opcua_connection_closed(&self) {}

    /// An OPC UA connect, session or operation fault.
    fn opcua_error(&self) {}

    /// A connection-lost recovery was started.
    fn opcua_reconnect(&self) {}

    /// A read or write request reached the gateway.
    fn opcua_request(&self) {}

    /// A read or write request failed.
    fn opcua_request_error(&self) {}

    /// A read was issued against a session.
    fn opcua_read(&self) {}

    /// A write was issued against a session.
    fn opcua_write(&self) {}

    /// Round-trip time of a gateway operation.
    fn opcua_response_time(&self, _elapsed: Duration) {}

    /// An HTTP request arrived.
    fn http_request(&self) {}

    /// An HTTP response was produced.
    fn http_response(&self, _status: u16, _elapsed: Duration) {}

    /// A request was rejected by the rate limiter.
    fn rate_limited(&self) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}

// =============================================================================
// Snapshots
// =============================================================================

/// OPC UA counters, serialised with the gateway's historical field names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpcUaMetrics {
    /// Currently open pooled connections.
    pub opcua_connections: u64,
    /// Connect, session and operation faults.
    pub opcua_errors: u64,
    /// Connection-lost recoveries.
    pub opcua_reconnects: u64,
    /// Gateway requests.
    pub opcua_requests: u64,
    /// Failed gateway requests.
    pub opcua_requests_errors: u64,
    /// Reads issued.
    pub opcua_read_operations: u64,
    /// Writes issued.
    pub opcua_write_operations: u64,
    /// Last response time (ms).
    pub opcua_last_response_time: u64,
    /// Mean response time (ms).
    pub opcua_avg_response_time: f64,
}

/// HTTP counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpMetrics {
    /// Requests received.
    pub http_requests: u64,
    /// Responses with status >= 400.
    pub http_errors: u64,
    /// 2xx responses.
    pub http_2xx: u64,
    /// 3xx responses.
    pub http_3xx: u64,
    /// 4xx responses.
    pub http_4xx: u64,
    /// 5xx responses.
    pub http_5xx: u64,
    /// Last response time (ms).
    pub http_last_response_time: u64,
    /// Mean response time (ms).
    pub http_avg_response_time: f64,
    /// Requests rejected by the rate limiter.
    pub rate_limit: u64,
}

/// Flat view over every metric group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// OPC UA group.
    #[serde(flatten)]
    pub opcua: OpcUaMetrics,
    /// HTTP group.
    #[serde(flatten)]
    pub http: HttpMetrics,
    /// System group.
    #[serde(flatten)]
    pub system: SystemMetrics,
}

// =============================================================================
// ResponseTimer
// =============================================================================

#[derive(Debug, Default)]
struct ResponseTimer {
    last_ms: AtomicU64,
    total_ms: AtomicU64,
    count: AtomicU64,
}

impl ResponseTimer {
    fn record(&self, elapsed: Duration) {
        let ms = elapsed.as_millis().min(u128::from(u64::MAX)) as u64;
        self.last_ms.store(ms, Ordering::Relaxed);
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn last(&self) -> u64 {
        self.last_ms.load(Ordering::Relaxed)
    }

    fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_ms.load(Ordering::Relaxed) as f64 / count as f64
    }
}

// =============================================================================
// MetricsCollector
// =============================================================================

/// Process-wide metrics collector.
///
/// Shared as `Arc<MetricsCollector>`; the pool and gateways see it only as
/// `Arc<dyn MetricsSink>`.
#[derive(Debug)]
pub struct MetricsCollector {
    opcua_connections: AtomicU64,
    opcua_errors: AtomicU64,
    opcua_reconnects: AtomicU64,
    opcua_requests: AtomicU64,
    opcua_requests_errors: AtomicU64,
    opcua_reads: AtomicU64,
    opcua_writes: AtomicU64,
    opcua_timer: ResponseTimer,

    http_requests: AtomicU64,
    http_errors: AtomicU64,
    http_2xx: AtomicU64,
    http_3xx: AtomicU64,
    http_4xx: AtomicU64,
    http_5xx: AtomicU64,
    http_timer: ResponseTimer,
    rate_limit: AtomicU64,

    sampler: SystemSampler,
    system: RwLock<SystemMetrics>,
    export: Option<PrometheusExport>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Creates a collector with every counter at zero.
    pub fn new() -> Self {
        let export = match PrometheusExport::new() {
            Ok(export) => Some(export),
            Err(e) => {
                tracing::warn!(error = %e, "Prometheus registry unavailable; text export disabled");
                None
            }
        };
        Self {
            opcua_connections: AtomicU64::new(0),
            opcua_errors: AtomicU64::new(0),
            opcua_reconnects: AtomicU64::new(0),
            opcua_requests: AtomicU64::new(0),
            opcua_requests_errors: AtomicU64::new(0),
            opcua_reads: AtomicU64::new(0),
            opcua_writes: AtomicU64::new(0),
            opcua_timer: ResponseTimer::default(),
            http_requests: AtomicU64::new(0),
            http_errors: AtomicU64::new(0),
            http_2xx: AtomicU64::new(0),
            http_3xx: AtomicU64::new(0),
            http_4xx: AtomicU64::new(0),
            http_5xx: AtomicU64::new(0),
            http_timer: ResponseTimer::default(),
            rate_limit: AtomicU64::new(0),
            sampler: SystemSampler::new(),
            system: RwLock::new(SystemMetrics::default()),
            export,
        }
    }

    /// Creates a shared collector.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// OPC UA counters.
    pub fn opcua(&self) -> OpcUaMetrics {
        OpcUaMetrics {
            opcua_connections: self.opcua_connections.load(Ordering::Relaxed),
            opcua_errors: self.opcua_errors.load(Ordering::Relaxed),
            opcua_reconnects: self.opcua_reconnects.load(Ordering::Relaxed),
            opcua_requests: self.opcua_requests.load(Ordering::Relaxed),
            opcua_requests_errors: self.opcua_requests_errors.load(Ordering::Relaxed),
            opcua_read_operations: self.opcua_reads.load(Ordering::Relaxed),
            opcua_write_operations: self.opcua_writes.load(Ordering::Relaxed),
            opcua_last_response_time: self.opcua_timer.last(),
            opcua_avg_response_time: self.opcua_timer.mean(),
        }
    }

    /// HTTP counters.
    pub fn http(&self) -> HttpMetrics {
        HttpMetrics {
            http_requests: self.http_requests.load(Ordering::Relaxed),
            http_errors: self.http_errors.load(Ordering::Relaxed),
            http_2xx: self.http_2xx.load(Ordering::Relaxed),
            http_3xx: self.http_3xx.load(Ordering::Relaxed),
            http_4xx: self.http_4xx.load(Ordering::Relaxed),
            http_5xx: self.http_5xx.load(Ordering::Relaxed),
            http_last_response_time: self.http_timer.last(),
            http_avg_response_time: self.http_timer.mean(),
            rate_limit: self.rate_limit.load(Ordering::Relaxed),
        }
    }

    /// System values, refreshed before returning.
    pub fn system(&self) -> SystemMetrics {
        self.refresh_system();
        self.cached_system()
    }

    /// System values as of the last refresh.
    pub fn cached_system(&self) -> SystemMetrics {
        self.system.read().clone()
    }

    /// Samples CPU, memory and uptime.
    pub fn refresh_system(&self) {
        let sample = self.sampler.sample();
        *self.system.write() = sample;
    }

    /// Every group, with system values as of the last refresh.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            opcua: self.opcua(),
            http: self.http(),
            system: self.cached_system(),
        }
    }

    /// Spawns a task that refreshes system values every `every`.
    ///
    /// The caller owns the handle and aborts it on shutdown.
    pub fn start_system_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                collector.refresh_system();
                tracing::trace!("System metrics refreshed");
            }
        })
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> CoreResult<String> {
        let export = self.export.as_ref().ok_or(CoreError::ExportUnavailable)?;
        export.render(&self.snapshot())
    }

    fn exported(&self, pick: impl FnOnce(&PrometheusExport) -> &prometheus::IntCounter) {
        if let Some(export) = &self.export {
            pick(export).inc();
        }
    }
}

impl MetricsSink for MetricsCollector {
    fn opcua_connection_opened(&self) {
        let open = self.opcua_connections.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(open, "OPC UA connection counter incremented");
    }

    fn opcua_connection_closed(&self) {
        // Never below zero.
        let _ = self
            .opcua_connections
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        tracing::debug!(
            open = self.opcua_connections.load(Ordering::Relaxed),
            "OPC UA connection counter decremented"
        );
    }

    fn opcua_error(&self) {
        self.opcua_errors.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_errors);
    }

    fn opcua_reconnect(&self) {
        self.opcua_reconnects.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_reconnects);
    }

    fn opcua_request(&self) {
        self.opcua_requests.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_requests);
    }

    fn opcua_request_error(&self) {
        self.opcua_requests_errors.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_request_errors);
    }

    fn opcua_read(&self) {
        self.opcua_reads.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_reads);
    }

    fn opcua_write(&self) {
        self.opcua_writes.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.opcua_writes);
    }

    fn opcua_response_time(&self, elapsed: Duration) {
        self.opcua_timer.record(elapsed);
    }

    fn http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.http_requests);
    }

    fn http_response(&self, status: u16, elapsed: Duration) {
        self.http_timer.record(elapsed);
        match status {
            200..=299 => {
                self.http_2xx.fetch_add(1, Ordering::Relaxed);
                self.exported(|e| &e.http_2xx);
            }
            300..=399 => {
                self.http_3xx.fetch_add(1, Ordering::Relaxed);
                self.exported(|e| &e.http_3xx);
            }
            400..=499 => {
                self.http_4xx.fetch_add(1, Ordering::Relaxed);
                self.exported(|e| &e.http_4xx);
            }
            500..=u16::MAX => {
                self.http_5xx.fetch_add(1, Ordering::Relaxed);
                self.exported(|e| &e.http_5xx);
            }
            _ => {}
        }
        if status >= 400 {
            self.http_errors.fetch_add(1, Ordering::Relaxed);
            self.exported(|e| &e.http_errors);
        }
    }

    fn rate_limited(&self) {
        self.rate_limit.fetch_add(1, Ordering::Relaxed);
        self.exported(|e| &e.rate_limited);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_counter_never_negative() {
        let metrics = MetricsCollector::new();
        metrics.opcua_connection_closed();
        assert_eq!(metrics.opcua().opcua_connections, 0);

        metrics.opcua_connection_opened();
        metrics.opcua_connection_opened();
        metrics.opcua_connection_closed();
        assert_eq!(metrics.opcua().opcua_connections, 1);
    }

    #[test]
    fn test_response_time_mean() {
        let metrics = MetricsCollector::new();
        metrics.opcua_response_time(Duration::from_millis(10));
        metrics.opcua_response_time(Duration::from_millis(30));

        let opcua = metrics.opcua();
        assert_eq!(opcua.opcua_last_response_time, 30);
        assert!((opcua.opcua_avg_response_time - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_http_status_classes() {
        let metrics = MetricsCollector::new();
        for status in [200, 204, 302, 400, 401, 429, 500, 503] {
            metrics.http_request();
            metrics.http_response(status, Duration::from_millis(1));
        }

        let http = metrics.http();
        assert_eq!(http.http_requests, 8);
        assert_eq!(http.http_2xx, 2);
        assert_eq!(http.http_3xx, 1);
        assert_eq!(http.http_4xx, 3);
        assert_eq!(http.http_5xx, 2);
        assert_eq!(http.http_errors, 5);
    }

    #[test]
    fn test_snapshot_uses_historical_field_names() {
        let metrics = MetricsCollector::new();
        metrics.opcua_read();
        metrics.rate_limited();

        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["opcuaReadOperations"], 1);
        assert_eq!(json["rateLimit"], 1);
        assert!(json.get("http2xx").is_some());
        assert!(json.get("cpuUsage").is_some());
        assert!(json.get("uptime").is_some());
    }

    #[test]
    fn test_render_prometheus() {
        let metrics = MetricsCollector::new();
        metrics.opcua_write();
        metrics.opcua_write();

        let text = metrics.render_prometheus().unwrap();
        assert!(text.contains("iotgw_opcua_write_operations 2"));
        assert!(text.contains("# HELP iotgw_http_requests HTTP requests"));
    }

    #[test]
    fn test_render_prometheus_types_and_repeat_scrapes() {
        let metrics = MetricsCollector::new();
        metrics.http_request();
        metrics.http_response(503, Duration::from_millis(4));
        metrics.opcua_connection_opened();

        let first = metrics.render_prometheus().unwrap();
        assert!(first.contains("# TYPE iotgw_http_requests counter"));
        assert!(first.contains("# TYPE iotgw_http_5xx counter"));
        assert!(first.contains("# TYPE iotgw_opcua_connections gauge"));
        assert!(first.contains("# TYPE iotgw_system_uptime_seconds gauge"));

        // Counters keep accumulating in the same registry between scrapes.
        metrics.http_request();
        metrics.opcua_connection_closed();
        let second = metrics.render_prometheus().unwrap();
        assert!(second.contains("iotgw_http_requests 2"));
        assert!(second.contains("iotgw_http_errors 1"));
        assert!(second.contains("iotgw_opcua_connections 0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_refresh_task() {
        let metrics = MetricsCollector::shared();
        let handle = metrics.start_system_refresh(Duration::from_secs(5));
        tokio::time::sleep(Duration::from_secs(6)).await;
        handle.abort();
        assert!(metrics.cached_system().uptime >= 0.0);
    }
}
