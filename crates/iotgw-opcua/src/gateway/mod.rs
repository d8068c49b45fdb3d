// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read and write gateways over the shared session pool.
//!
//! Both gateways turn runtime faults into [`OperationResult`] rows or a
//! `None` read; only caller bugs and systemic failures surface as
//! [`GatewayError`](crate::error::GatewayError).

pub mod read;
pub mod write;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::transport::ReadOutcome;

pub use read::ReadGateway;
pub use write::{WriteGateway, WriteItem};

/// Reason text for a read that returned `None`.
pub const READ_FAILURE_REASON: &str = "Error reading OPC UA value";

// =============================================================================
// OperationResult
// =============================================================================

/// One row of a read or write response.
///
/// Serialises exactly as `{"id","s","r","v","t"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Attribute identifier.
    pub id: String,
    /// Success flag.
    pub s: bool,
    /// Status or reason text.
    pub r: String,
    /// Resulting value.
    pub v: Value,
    /// Epoch milliseconds.
    pub t: i64,
}

impl OperationResult {
    /// Builds a row stamped with the current time.
    pub fn new(id: impl Into<String>, s: bool, r: impl Into<String>, v: Value) -> Self {
        Self {
            id: id.into(),
            s,
            r: r.into(),
            v,
            t: Utc::now().timestamp_millis(),
        }
    }

    /// Failed row.
    pub fn failure(id: impl Into<String>, r: impl Into<String>, v: Value) -> Self {
        Self::new(id, false, r, v)
    }

    /// Row for a read that could not be performed.
    pub fn read_failure(id: impl Into<String>) -> Self {
        Self::failure(id, READ_FAILURE_REASON, Value::Null)
    }
}

impl ReadOutcome {
    /// HTTP row for this read: `s` is true only for a Good status.
    pub fn to_operation_result(&self, id: impl Into<String>) -> OperationResult {
        OperationResult::new(id, self.is_good(), self.status.name(), self.value_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use crate::value::OpcUaValue;
    use serde_json::json;

    #[test]
    fn test_operation_result_keys() {
        let row = ReadOutcome::good(OpcUaValue::Int32(89)).to_operation_result("sensor1");
        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();

        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["id", "r", "s", "t", "v"]);
        assert_eq!(json["s"], json!(true));
        assert_eq!(json["r"], "Good");
        assert_eq!(json["v"], 89);
    }

    #[test]
    fn test_non_good_read_row() {
        let row = ReadOutcome::status_only(StatusCode::BAD_NODE_ID_UNKNOWN).to_operation_result("x");
        assert!(!row.s);
        assert_eq!(row.r, "BadNodeIdUnknown");
        assert_eq!(row.v, Value::Null);
    }

    #[test]
    fn test_read_failure_row() {
        let row = OperationResult::read_failure("sensor1");
        assert_eq!(row.r, "Error reading OPC UA value");
        assert!(!row.s);
        assert!(row.t > 0);
    }
}
