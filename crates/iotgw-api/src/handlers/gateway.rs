// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! `/iotgateway` read and write handlers.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use iotgw_opcua::{OperationResult, WriteItem};
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::response::{ReadResponse, WriteResponse};
use crate::state::AppState;

const NOT_AN_ARRAY: &str = "The request body must be an array of values to write";
const INCOMPLETE_ITEM: &str = "Each element must have 'id' and 'value'";

/// Query string of `GET /iotgateway/read`.
#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    /// Attribute identifier.
    pub ids: Option<String>,
}

// =============================================================================
// Read
// =============================================================================

/// GET /iotgateway/read?ids=<id>
pub async fn read(State(state): State<AppState>, Query(query): Query<ReadQuery>) -> Response {
    let Some(id) = query.ids.filter(|ids| !ids.is_empty()) else {
        warn!("Read request without specified ID");
        return ApiError::bad_request("ID is required").into_response();
    };

    info!(id = %id, "Processing read request");
    match state.reader.read(&id).await {
        Ok(Some(outcome)) => {
            let row = outcome.to_operation_result(&id);
            info!(id = %id, status = %row.r, "Read response sent");
            Json(ReadResponse::single(row)).into_response()
        }
        Ok(None) => {
            warn!(id = %id, "Error reading OPC UA value");
            Json(ReadResponse::single(OperationResult::read_failure(&id))).into_response()
        }
        Err(e) => {
            error!(id = %id, error = %e, "Error in /iotgateway/read endpoint");
            let row = OperationResult::failure(&id, format!("Internal error: {e}"), Value::Null);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ReadResponse::single(row))).into_response()
        }
    }
}

// =============================================================================
// Write
// =============================================================================

/// POST /iotgateway/write
///
/// The whole body is validated before any item is written.
pub async fn write(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<WriteResponse>> {
    let items = parse_write_body(&body)?;
    let write_results = state.writer.write_batch(&items).await;
    Ok(Json(WriteResponse { write_results }))
}

/// Parses and validates a write body.
pub fn parse_write_body(body: &[u8]) -> ApiResult<Vec<WriteItem>> {
    let Ok(Value::Array(elements)) = serde_json::from_slice::<Value>(body) else {
        return Err(ApiError::bad_request(NOT_AN_ARRAY));
    };

    if !elements.iter().all(has_id_and_value) {
        return Err(ApiError::bad_request(INCOMPLETE_ITEM));
    }

    elements
        .into_iter()
        .map(serde_json::from_value::<WriteItem>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            error!(error = %e, "Error in write operation");
            ApiError::internal("Error processing write operation")
        })
}

/// `id` must be truthy and the `value` key present, even when `null`.
fn has_id_and_value(element: &Value) -> bool {
    let Some(object) = element.as_object() else {
        return false;
    };
    let id_ok = match object.get("id") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    };
    id_ok && object.contains_key("value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_write_body_rejects_non_array() {
        let err = parse_write_body(br#"{"id":"x","value":1}"#).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { ref error, .. } if error == NOT_AN_ARRAY));

        let err = parse_write_body(b"not json").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { ref error, .. } if error == NOT_AN_ARRAY));
    }

    #[test]
    fn test_parse_write_body_requires_id_and_value() {
        for body in [
            br#"[{"id":"a","value":1},{"value":2}]"#.as_slice(),
            br#"[{"id":"","value":1}]"#.as_slice(),
            br#"[{"id":0,"value":1}]"#.as_slice(),
            br#"[{"id":"a"}]"#.as_slice(),
        ] {
            let err = parse_write_body(body).unwrap_err();
            assert!(matches!(err, ApiError::BadRequest { ref error, .. } if error == INCOMPLETE_ITEM));
        }
    }

    #[test]
    fn test_parse_write_body_accepts_null_value() {
        let items = parse_write_body(br#"[{"id":"a","value":null,"dataType":"String"}]"#).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value, Some(Value::Null));
        assert_eq!(items[0].data_type.as_deref(), Some("String"));
    }

    #[test]
    fn test_parse_write_body_empty_array() {
        assert!(parse_write_body(b"[]").unwrap().is_empty());
    }
}
