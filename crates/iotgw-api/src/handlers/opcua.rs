// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `/api/opcua` node handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use iotgw_opcua::PoolStatus;
use serde::Deserialize;
use serde_json::Value;
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::response::{NodeValueResponse, WriteAck};
use crate::state::AppState;

/// Body of `POST /api/opcua/read`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReadRequest {
    /// Namespace index, as a number or a string.
    #[serde(default)]
    pub namespace: Option<Value>,
    /// Identifier within the namespace.
    #[serde(default)]
    pub node_id: Option<String>,
}

/// Body of `POST /api/opcua/write/{nodeId}`.
#[derive(Debug, Default, Deserialize)]
pub struct NodeWriteRequest {
    /// Value to write. A JSON `null` counts as present.
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,
}

fn present<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// GET /api/opcua/nodes/{nodeId}/read
pub async fn read_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> ApiResult<Json<NodeValueResponse>> {
    let value = read_value(&state, &node_id).await?;
    Ok(Json(NodeValueResponse { node_id, value }))
}

/// POST /api/opcua/read
pub async fn read_by_body(
    State(state): State<AppState>,
    body: Option<Json<NodeReadRequest>>,
) -> ApiResult<Json<NodeValueResponse>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let namespace = request.namespace.as_ref().and_then(namespace_text);
    let (Some(namespace), Some(node)) = (namespace, request.node_id.filter(|n| !n.is_empty()))
    else {
        return Err(ApiError::bad_request("Bad Request")
            .with_message("namespace and nodeId are required in request body"));
    };

    let node_id = format!("ns={namespace};s={node}");
    let value = read_value(&state, &node_id).await?;
    Ok(Json(NodeValueResponse { node_id, value }))
}

/// POST /api/opcua/write/{nodeId}
pub async fn write_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    body: Option<Json<NodeWriteRequest>>,
) -> ApiResult<Json<WriteAck>> {
    let Some(value) = body.and_then(|Json(b)| b.value) else {
        return Err(ApiError::bad_request("Bad Request")
            .with_message("Value is required in request body"));
    };

    state.writer.write_one(&node_id, value).await.map_err(|e| {
        error!(node_id = %node_id, error = %e, "Error writing to OPC UA node");
        ApiError::internal("Failed to write to OPC UA node").with_message(e.to_string())
    })?;

    Ok(Json(WriteAck {
        node_id,
        message: "Value written successfully".to_string(),
    }))
}

/// GET /api/opcua/status
pub async fn status(State(state): State<AppState>) -> Json<PoolStatus> {
    Json(state.pool.status())
}

/// The serialised read outcome, or `false` when the read failed.
async fn read_value(state: &AppState, node_id: &str) -> ApiResult<Value> {
    let outcome = state.reader.read(node_id).await.map_err(|e| {
        error!(node_id = %node_id, error = %e, "Error reading OPC UA node");
        ApiError::internal("Failed to read OPC UA node").with_message(e.to_string())
    })?;

    match outcome {
        Some(outcome) => serde_json::to_value(&outcome).map_err(|e| {
            ApiError::internal("Failed to read OPC UA node").with_message(e.to_string())
        }),
        None => Ok(Value::Bool(false)),
    }
}

/// Namespace from a number or a non-empty string.
fn namespace_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
