// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API response types.

use iotgw_opcua::OperationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Gateway bodies
// =============================================================================

/// `GET /iotgateway/read` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    /// One row per requested id.
    pub read_results: Vec<OperationResult>,
}

impl ReadResponse {
    /// Body with a single row.
    pub fn single(row: OperationResult) -> Self {
        Self {
            read_results: vec![row],
        }
    }
}

/// `POST /iotgateway/write` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    /// One row per item, or a single `"batch"` row.
    pub write_results: Vec<OperationResult>,
}

// =============================================================================
// OPC UA bodies
// =============================================================================

/// Node read body. `value` is the full read outcome, or `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeValueResponse {
    /// Node address as requested.
    pub node_id: String,
    /// Read outcome.
    pub value: Value,
}

/// Node write acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    /// Node address as requested.
    pub node_id: String,
    /// Confirmation text.
    pub message: String,
}

// =============================================================================
// Health
// =============================================================================

/// `GET /health` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `"UP"` while the process serves requests.
    pub status: String,
    /// `"CONNECTED"` or `"DISCONNECTED"`.
    pub opc_client: String,
    /// Endpoint with credentials masked.
    pub opc_endpoint: String,
    /// Epoch milliseconds.
    pub time: i64,
}

impl HealthResponse {
    /// Builds the body for the current pool state.
    pub fn new(live: bool, endpoint: impl Into<String>) -> Self {
        Self {
            status: "UP".to_string(),
            opc_client: if live { "CONNECTED" } else { "DISCONNECTED" }.to_string(),
            opc_endpoint: endpoint.into(),
            time: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// `{"status": "success", "data": ...}` envelope used by the metrics routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEnvelope<T> {
    /// Always `"success"`.
    pub status: String,
    /// Payload.
    pub data: T,
}

impl<T> MetricsEnvelope<T> {
    /// Wraps `data`.
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_response_field_name() {
        let body = ReadResponse::single(OperationResult::read_failure("sensor1"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["readResults"][0]["id"], "sensor1");
        assert_eq!(json["readResults"][0]["s"], false);
        assert_eq!(json["readResults"][0]["v"], Value::Null);
    }

    #[test]
    fn test_health_response_shape() {
        let json = serde_json::to_value(HealthResponse::new(false, "opc.tcp://plc:4840")).unwrap();
        assert_eq!(json["status"], "UP");
        assert_eq!(json["opcClient"], "DISCONNECTED");
        assert_eq!(json["opcEndpoint"], "opc.tcp://plc:4840");
        assert!(json["time"].as_i64().unwrap() > 0);
    }
}
