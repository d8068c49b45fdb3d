// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! The pool never talks to a protocol stack directly. It asks a
//! [`TransportFactory`] for a fresh [`OpcUaTransport`] per connection
//! attempt, connects it, opens one [`OpcUaSession`] over it, and listens to
//! the transport's [`ConnectionEvent`] stream for out-of-band loss.
//!
//! ```text
//! TransportFactory::create()
//!        │
//!        ▼
//! OpcUaTransport ──connect(endpoint)──► create_session() ──► OpcUaSession
//!        │                                                   read / write / close
//!        └── events(): BackoffAttempt | ConnectionLost | ConnectionRestored | Keepalive
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::error::OpcUaResult;
use crate::status::StatusCode;
use crate::types::NodeId;
use crate::value::OpcUaValue;

// =============================================================================
// ConnectionEvent
// =============================================================================

/// Lifecycle signals emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport is about to retry a connect.
    BackoffAttempt {
        /// 1-based retry number.
        retry: u32,
        /// Delay before the retry.
        delay: Duration,
    },

    /// An established connection dropped.
    ConnectionLost,

    /// The transport reconnected on its own.
    ConnectionRestored,

    /// Keepalive round-trip completed.
    Keepalive,
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BackoffAttempt { retry, delay } => {
                write!(f, "backoff (retry {}, delay {:?})", retry, delay)
            }
            Self::ConnectionLost => write!(f, "connection_lost"),
            Self::ConnectionRestored => write!(f, "connection_reestablished"),
            Self::Keepalive => write!(f, "keepalive"),
        }
    }
}

// =============================================================================
// ReadOutcome
// =============================================================================

/// Result of a single read: status, value and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutcome {
    /// Protocol status.
    #[serde(rename = "statusCode")]
    pub status: StatusCode,

    /// Value, when the server returned one.
    #[serde(serialize_with = "serialize_value")]
    pub value: Option<OpcUaValue>,

    /// Source timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Server timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
}

fn serialize_value<S: serde::Serializer>(
    value: &Option<OpcUaValue>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let json = match value {
        Some(v) => json!({ "dataType": v.data_type().name(), "value": v.to_json() }),
        None => Value::Null,
    };
    json.serialize(serializer)
}

impl ReadOutcome {
    /// Good read with a value.
    pub fn good(value: OpcUaValue) -> Self {
        Self {
            status: StatusCode::GOOD,
            value: Some(value),
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// Read that returned only a status.
    pub fn status_only(status: StatusCode) -> Self {
        Self {
            status,
            value: None,
            source_timestamp: None,
            server_timestamp: Some(Utc::now()),
        }
    }

    /// `true` when the status is exactly Good.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }

    /// The value as JSON, `null` when absent.
    pub fn value_json(&self) -> Value {
        self.value.as_ref().map(OpcUaValue::to_json).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Traits
// =============================================================================

/// One logical session over a connected transport.
#[async_trait]
pub trait OpcUaSession: Send + Sync {
    /// Reads the Value attribute of `node_id`.
    async fn read(&self, node_id: &NodeId) -> OpcUaResult<ReadOutcome>;

    /// Writes the Value attribute of `node_id`.
    async fn write(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<StatusCode>;

    /// Closes the session.
    async fn close(&self) -> OpcUaResult<()>;
}

/// A client connection to one OPC UA server.
///
/// Methods take `&self`: the transport is shared between the pool and its
/// event listener.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    /// Connects to `endpoint`.
    async fn connect(&self, endpoint: &str) -> OpcUaResult<()>;

    /// Disconnects. Safe to call when not connected.
    async fn disconnect(&self) -> OpcUaResult<()>;

    /// Opens a session over the connection.
    async fn create_session(&self) -> OpcUaResult<Arc<dyn OpcUaSession>>;

    /// Subscribes to lifecycle events.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;
}

/// Builds transports. One transport per connection attempt.
pub trait TransportFactory: Send + Sync {
    /// Creates an unconnected transport.
    fn create(&self) -> OpcUaResult<Arc<dyn OpcUaTransport>>;

    /// Name for logs.
    fn name(&self) -> &str {
        "opcua"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_outcome_json_shape() {
        let outcome = ReadOutcome {
            status: StatusCode::GOOD,
            value: Some(OpcUaValue::Int32(89)),
            source_timestamp: None,
            server_timestamp: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["statusCode"]["name"], "Good");
        assert_eq!(json["value"]["value"], 89);
        assert_eq!(json["value"]["dataType"], "Int32");
        assert!(json.get("serverTimestamp").is_none());
    }

    #[test]
    fn test_status_only_outcome() {
        let outcome = ReadOutcome::status_only(StatusCode::BAD);
        assert!(!outcome.is_good());
        assert_eq!(outcome.value_json(), Value::Null);
    }

    #[test]
    fn test_event_display() {
        let event = ConnectionEvent::BackoffAttempt {
            retry: 2,
            delay: Duration::from_millis(1500),
        };
        assert_eq!(event.to_string(), "backoff (retry 2, delay 1.5s)");
        assert_eq!(ConnectionEvent::ConnectionLost.to_string(), "connection_lost");
    }
}
