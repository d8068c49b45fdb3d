// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Prometheus registry owned by the collector.
//!
//! Monotonic values are `IntCounter`s incremented alongside the atomics.
//! Point-in-time values (open connections, response times, host figures) are
//! gauges set from a snapshot just before encoding.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

use super::MetricsSnapshot;
use crate::error::CoreResult;

const NAMESPACE: &str = "iotgw";

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let metric = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntGauge> {
    let metric = IntGauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<Gauge> {
    let metric = Gauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

#[derive(Debug)]
pub(super) struct PrometheusExport {
    registry: Registry,

    pub opcua_errors: IntCounter,
    pub opcua_reconnects: IntCounter,
    pub opcua_requests: IntCounter,
    pub opcua_request_errors: IntCounter,
    pub opcua_reads: IntCounter,
    pub opcua_writes: IntCounter,

    pub http_requests: IntCounter,
    pub http_errors: IntCounter,
    pub http_2xx: IntCounter,
    pub http_3xx: IntCounter,
    pub http_4xx: IntCounter,
    pub http_5xx: IntCounter,
    pub rate_limited: IntCounter,

    opcua_connections: IntGauge,
    opcua_last_response: IntGauge,
    opcua_avg_response: Gauge,
    http_last_response: IntGauge,
    http_avg_response: Gauge,
    cpu_usage: Gauge,
    memory_usage: Gauge,
    total_memory: IntGauge,
    free_memory: IntGauge,
    uptime: Gauge,
}

impl PrometheusExport {
    pub fn new() -> prometheus::Result<Self> {
        let r = Registry::new();
        Ok(Self {
            opcua_errors: counter(&r, "opcua_errors", "OPC UA faults")?,
            opcua_reconnects: counter(&r, "opcua_reconnects", "OPC UA connection-lost recoveries")?,
            opcua_requests: counter(&r, "opcua_requests", "Gateway requests")?,
            opcua_request_errors: counter(&r, "opcua_request_errors", "Failed gateway requests")?,
            opcua_reads: counter(&r, "opcua_read_operations", "OPC UA reads issued")?,
            opcua_writes: counter(&r, "opcua_write_operations", "OPC UA writes issued")?,

            http_requests: counter(&r, "http_requests", "HTTP requests")?,
            http_errors: counter(&r, "http_errors", "HTTP responses with status >= 400")?,
            http_2xx: counter(&r, "http_2xx", "HTTP 2xx responses")?,
            http_3xx: counter(&r, "http_3xx", "HTTP 3xx responses")?,
            http_4xx: counter(&r, "http_4xx", "HTTP 4xx responses")?,
            http_5xx: counter(&r, "http_5xx", "HTTP 5xx responses")?,
            rate_limited: counter(&r, "http_rate_limited", "Requests rejected by the rate limiter")?,

            opcua_connections: int_gauge(&r, "opcua_connections", "Open pooled OPC UA connections")?,
            opcua_last_response: int_gauge(&r, "opcua_last_response_ms", "Last OPC UA response time")?,
            opcua_avg_response: gauge(&r, "opcua_avg_response_ms", "Mean OPC UA response time")?,
            http_last_response: int_gauge(&r, "http_last_response_ms", "Last HTTP response time")?,
            http_avg_response: gauge(&r, "http_avg_response_ms", "Mean HTTP response time")?,
            cpu_usage: gauge(&r, "system_cpu_usage_percent", "CPU usage")?,
            memory_usage: gauge(&r, "system_memory_usage_percent", "Memory usage")?,
            total_memory: int_gauge(&r, "system_total_memory_bytes", "Total memory")?,
            free_memory: int_gauge(&r, "system_free_memory_bytes", "Free memory")?,
            uptime: gauge(&r, "system_uptime_seconds", "Process uptime")?,
            registry: r,
        })
    }

    /// Sets the gauges from `snapshot` and encodes the whole registry.
    pub fn render(&self, snapshot: &MetricsSnapshot) -> CoreResult<String> {
        let saturate = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        let opcua = &snapshot.opcua;
        let http = &snapshot.http;
        let system = &snapshot.system;

        self.opcua_connections.set(saturate(opcua.opcua_connections));
        self.opcua_last_response.set(saturate(opcua.opcua_last_response_time));
        self.opcua_avg_response.set(opcua.opcua_avg_response_time);
        self.http_last_response.set(saturate(http.http_last_response_time));
        self.http_avg_response.set(http.http_avg_response_time);
        self.cpu_usage.set(system.cpu_usage);
        self.memory_usage.set(system.memory_usage);
        self.total_memory.set(saturate(system.total_memory));
        self.free_memory.set(saturate(system.free_memory));
        self.uptime.set(system.uptime);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
