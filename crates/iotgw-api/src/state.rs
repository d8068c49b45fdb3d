// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use iotgw_config::GatewayConfig;
use iotgw_core::{MetricsCollector, MetricsSink};
use iotgw_opcua::{ReadGateway, SessionPool, WriteGateway};

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
///
/// Cheap to clone: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration.
    pub config: Arc<GatewayConfig>,
    /// The shared session pool.
    pub pool: SessionPool,
    /// Read path.
    pub reader: ReadGateway,
    /// Write path.
    pub writer: WriteGateway,
    /// Metrics collector.
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Creates a state with gateways over `pool` in the configured namespace.
    pub fn new(config: GatewayConfig, pool: SessionPool, metrics: Arc<MetricsCollector>) -> Self {
        let namespace = config.opcua.namespace;
        Self {
            reader: ReadGateway::new(pool.clone(), namespace),
            writer: WriteGateway::new(pool.clone(), namespace),
            config: Arc::new(config),
            pool,
            metrics,
        }
    }

    /// Replaces the read gateway, e.g. to disable the unpooled fallback.
    pub fn with_reader(mut self, reader: ReadGateway) -> Self {
        self.reader = reader;
        self
    }

    /// The collector as a sink.
    pub fn sink(&self) -> Arc<dyn MetricsSink> {
        self.metrics.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<GatewayConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<MetricsCollector> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}
