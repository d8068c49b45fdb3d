// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batch write gateway.
//!
//! One session is acquired per batch. Every item then runs independently:
//! a missing field, an unconvertible value, a non-Good status or a transport
//! error becomes a failure row for that item while the loop carries on.

use std::time::Instant;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::client::pool::{SessionHandle, SessionPool};
use crate::codec::{convert, detect_type};
use crate::error::{GatewayError, GatewayResult};
use crate::gateway::OperationResult;
use crate::types::{NodeId, OpcUaDataType};

/// Identifier used for the single row of a batch that could not start.
pub const BATCH_ID: &str = "batch";

// =============================================================================
// WriteItem
// =============================================================================

/// One element of a write request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteItem {
    /// Attribute identifier.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,

    /// Raw value. An explicit `null` is present; only a missing key is `None`.
    #[serde(default, deserialize_with = "present")]
    pub value: Option<Value>,

    /// Declared OPC UA type name.
    #[serde(default, rename = "dataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl WriteItem {
    /// Item with an inferred type.
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: Some(id.into()),
            value: Some(value),
            data_type: None,
        }
    }

    /// Sets the declared type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// `true` when both `id` (non-empty) and `value` are present.
    pub fn is_complete(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty()) && self.value.is_some()
    }
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

// =============================================================================
// WriteGateway
// =============================================================================

/// Writes batches of items through the pooled session.
#[derive(Debug, Clone)]
pub struct WriteGateway {
    pool: SessionPool,
    namespace: u16,
}

impl WriteGateway {
    /// Creates a gateway writing into `namespace`.
    pub fn new(pool: SessionPool, namespace: u16) -> Self {
        Self { pool, namespace }
    }

    /// Writes every item, returning one row per item in input order.
    ///
    /// When no session can be obtained, returns a single `"batch"` row.
    pub async fn write_batch(&self, items: &[WriteItem]) -> Vec<OperationResult> {
        let handle = match self.pool.acquire().await {
            Ok(handle) => handle,
            Err(e) => {
                self.pool.metrics().opcua_request_error();
                error!(items = items.len(), error = %e, "Write batch aborted: no OPC UA session");
                let reason = GatewayError::SessionUnavailable(e);
                return vec![OperationResult::failure(
                    BATCH_ID,
                    format!("Error: {reason}"),
                    Value::Null,
                )];
            }
        };

        info!(items = items.len(), "Processing write batch");
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.write_item(&handle, item).await);
        }

        let failed = results.iter().filter(|r| !r.s).count();
        if failed > 0 {
            warn!(items = items.len(), failed, "Write batch completed with failures");
        }
        results
    }

    /// Writes a single value, failing when the row is not a success.
    pub async fn write_one(&self, id: &str, value: Value) -> GatewayResult<OperationResult> {
        if id.is_empty() {
            return Err(GatewayError::AttributeNotSpecified);
        }
        let handle = self
            .pool
            .acquire()
            .await
            .map_err(GatewayError::SessionUnavailable)?;

        let row = self.write_item(&handle, &WriteItem::new(id, value)).await;
        if row.s {
            Ok(row)
        } else {
            Err(GatewayError::WriteRejected(row.r))
        }
    }

    async fn write_item(&self, handle: &SessionHandle, item: &WriteItem) -> OperationResult {
        let id = item.id.clone().unwrap_or_default();
        let value = match (&item.value, item.is_complete()) {
            (Some(value), true) => value,
            _ => {
                debug!(id = %id, "Write item missing id or value");
                return OperationResult::failure(id, "Error: Missing id or value", Value::Null);
            }
        };

        let data_type = match item.data_type.as_deref() {
            Some(name) => OpcUaDataType::parse_or_variant(name),
            None => detect_type(Some(value)),
        };
        let coerced = convert(Some(value), data_type);
        let echo = coerced.to_json();
        let typed = match coerced.into_value() {
            Ok(typed) => typed,
            Err(e) => {
                warn!(id = %id, data_type = %data_type, error = %e, "Write value not convertible");
                return OperationResult::failure(id, format!("Error: {e}"), Value::Null);
            }
        };

        let node = NodeId::for_attribute(self.namespace, &id);
        let metrics = self.pool.metrics();
        metrics.opcua_request();
        let started = Instant::now();
        let result = handle.session().write(&node, typed).await;
        metrics.opcua_response_time(started.elapsed());

        match result {
            Ok(status) if status.is_good() => {
                metrics.opcua_write();
                debug!(node_id = %node, data_type = %data_type, "Write succeeded");
                OperationResult::new(id, true, status.name(), echo)
            }
            Ok(status) => {
                metrics.opcua_write();
                metrics.opcua_request_error();
                warn!(node_id = %node, status = status.name(), "Write rejected by server");
                OperationResult::failure(
                    id,
                    format!("Error: {}", status.description()),
                    Value::from(status.value()),
                )
            }
            Err(e) => {
                metrics.opcua_request_error();
                metrics.opcua_error();
                error!(node_id = %node, error = %e, "Error writing OPC UA value");
                OperationResult::failure(id, format!("Error: {e}"), Value::Null)
            }
        }
    }
}
