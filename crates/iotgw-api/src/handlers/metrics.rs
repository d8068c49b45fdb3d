// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Metrics handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use iotgw_core::{HttpMetrics, MetricsCollector, MetricsSnapshot, OpcUaMetrics, SystemMetrics};

use crate::error::ApiError;
use crate::response::MetricsEnvelope;

type Collector = State<Arc<MetricsCollector>>;

/// GET /metrics
pub async fn all(State(metrics): Collector) -> Json<MetricsEnvelope<MetricsSnapshot>> {
    metrics.refresh_system();
    Json(MetricsEnvelope::success(metrics.snapshot()))
}

/// GET /metrics/opcua
pub async fn opcua(State(metrics): Collector) -> Json<MetricsEnvelope<OpcUaMetrics>> {
    Json(MetricsEnvelope::success(metrics.opcua()))
}

/// GET /metrics/http
pub async fn http(State(metrics): Collector) -> Json<MetricsEnvelope<HttpMetrics>> {
    Json(MetricsEnvelope::success(metrics.http()))
}

/// GET /metrics/system
pub async fn system(State(metrics): Collector) -> Json<MetricsEnvelope<SystemMetrics>> {
    Json(MetricsEnvelope::success(metrics.system()))
}

/// GET /metrics/prometheus
pub async fn prometheus(State(metrics): Collector) -> Response {
    metrics.refresh_system();
    match metrics.render_prometheus() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => ApiError::internal("Failed to render metrics")
            .with_message(e.to_string())
            .into_response(),
    }
}
