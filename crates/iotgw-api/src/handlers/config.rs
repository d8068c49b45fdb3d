// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Effective configuration handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use iotgw_config::GatewayConfig;

/// GET /config
///
/// Secrets are removed and endpoint credentials masked.
pub async fn effective_config(State(config): State<Arc<GatewayConfig>>) -> Json<GatewayConfig> {
    Json(config.redacted())
}
