// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA side of the gateway.
//!
//! # Error Categories
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint unreachable, transport closed, cooldown
//! ├── Session       - Session creation and lifecycle
//! ├── Operation     - Read/write faults raised by the transport
//! ├── Conversion    - A coerced value cannot be encoded
//! └── Configuration - Invalid node ids, data types, settings
//!
//! GatewayError
//! ├── AttributeNotSpecified - Caller bug: empty identifier
//! ├── SessionUnavailable    - No pooled or fallback session
//! ├── WriteRejected         - Single-node write came back non-Good
//! └── Opc                   - Anything else from the layer below
//! ```

use thiserror::Error;

/// Result alias for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

/// Result alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// OpcUaError
// =============================================================================

/// The main error type for OPC UA operations.
#[derive(Debug, Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Read/write operation errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Value conversion errors.
    #[error("{0}")]
    Conversion(#[from] ConversionError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcUaError {
    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(error: SessionError) -> Self {
        Self::Session(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a conversion error.
    #[inline]
    pub fn conversion(error: ConversionError) -> Self {
        Self::Conversion(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_retryable(),
            Self::Session(_) => true,
            Self::Operation(e) => e.is_retryable(),
            Self::Conversion(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the error category for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Operation(_) => "operation",
            Self::Conversion(_) => "conversion",
            Self::Configuration(_) => "configuration",
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Transport-level connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The server refused or could not be reached.
    #[error("Connection refused to '{endpoint}': {reason}")]
    Refused {
        /// Target endpoint.
        endpoint: String,
        /// Underlying reason.
        reason: String,
    },

    /// No endpoint matches the configured security settings.
    #[error("No suitable endpoint found with security '{security}'")]
    NoSuitableEndpoint {
        /// Requested mode/policy pair.
        security: String,
    },

    /// The transport closed underneath an operation.
    #[error("Connection closed unexpectedly")]
    Closed,

    /// Operation attempted without a connected transport.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// The pool failed to establish a session.
    #[error("Failed to connect to '{endpoint}' (attempt {attempt}/{max_attempts}): {reason}")]
    EstablishFailed {
        /// Target endpoint.
        endpoint: String,
        /// Consecutive failure count after this attempt.
        attempt: u32,
        /// Configured maximum before cooldown.
        max_attempts: u32,
        /// Underlying reason.
        reason: String,
    },

    /// The pool was closed and refuses new acquisitions.
    #[error("Session pool is closed")]
    PoolClosed,
}

impl ConnectionError {
    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a no-suitable-endpoint error.
    pub fn no_suitable_endpoint(security: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security: security.into(),
        }
    }

    /// Creates an establish-failed error.
    pub fn establish_failed(
        endpoint: impl Into<String>,
        attempt: u32,
        max_attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::EstablishFailed {
            endpoint: endpoint.into(),
            attempt,
            max_attempts,
            reason: reason.into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NoSuitableEndpoint { .. } | Self::PoolClosed)
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Session lifecycle errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// `createSession` failed.
    #[error("Failed to create session: {reason}")]
    CreateFailed {
        /// Underlying reason.
        reason: String,
    },

    /// The session was already closed.
    #[error("Session closed")]
    Closed,
}

impl SessionError {
    /// Creates a create-failed error.
    pub fn create_failed(reason: impl Into<String>) -> Self {
        Self::CreateFailed {
            reason: reason.into(),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Errors raised while issuing a read or write.
#[derive(Debug, Error)]
pub enum OperationError {
    /// Read request failed at the transport.
    #[error("Read failed for '{node_id}': {reason}")]
    ReadFailed {
        /// Target node.
        node_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// Write request failed at the transport.
    #[error("Write failed for '{node_id}': {reason}")]
    WriteFailed {
        /// Target node.
        node_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// The operation did not complete in time.
    #[error("Operation on '{node_id}' timed out")]
    TimedOut {
        /// Target node.
        node_id: String,
    },
}

impl OperationError {
    /// Creates a read-failed error.
    pub fn read_failed(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if a later attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

// =============================================================================
// ConversionError
// =============================================================================

/// A coerced value cannot be submitted as the requested type.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Numeric coercion produced the not-a-number sentinel for an integer type.
    #[error("Cannot write non-numeric value as {data_type}")]
    NotANumber {
        /// Target data type name.
        data_type: String,
    },

    /// Numeric value does not fit the integer type.
    #[error("Value {value} is out of range for {data_type}")]
    OutOfRange {
        /// Target data type name.
        data_type: String,
        /// The coerced number.
        value: f64,
    },
}

impl ConversionError {
    /// Creates a not-a-number error.
    pub fn not_a_number(data_type: impl Into<String>) -> Self {
        Self::NotANumber {
            data_type: data_type.into(),
        }
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(data_type: impl Into<String>, value: f64) -> Self {
        Self::OutOfRange {
            data_type: data_type.into(),
            value,
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings or identifiers.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Node id string could not be parsed.
    #[error("Invalid node id '{node_id}': {reason}")]
    InvalidNodeId {
        /// The rejected input.
        node_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Unknown data type name.
    #[error("Invalid data type '{0}'")]
    InvalidDataType(String),

    /// Unknown security mode.
    #[error("Invalid security mode '{0}'")]
    InvalidSecurityMode(String),

    /// Unknown security policy.
    #[error("Invalid security policy '{0}'")]
    InvalidSecurityPolicy(String),

    /// Transport support is not compiled in.
    #[error("OPC UA transport unavailable: {0}")]
    TransportUnavailable(String),
}

impl ConfigurationError {
    /// Creates an invalid node id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// GatewayError
// =============================================================================

/// Errors surfaced by the read/write gateways.
///
/// Runtime read/write faults are not errors at this boundary; they become
/// failure rows. Only caller bugs and systemic failures are raised.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Read invoked without an identifier.
    #[error("Attribute not specified")]
    AttributeNotSpecified,

    /// Neither a pooled nor a fallback session could be obtained.
    #[error("OPC UA session unavailable: {0}")]
    SessionUnavailable(#[source] OpcUaError),

    /// A single-node write returned a failure row.
    #[error("{0}")]
    WriteRejected(String),

    /// Error from the OPC UA layer.
    #[error(transparent)]
    Opc(#[from] OpcUaError),
}

impl GatewayError {
    /// Returns `true` if the caller, not the remote system, is at fault.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::AttributeNotSpecified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_retryability() {
        let refused = OpcUaError::connection(ConnectionError::refused("opc.tcp://h:4840", "ECONNREFUSED"));
        assert_eq!(refused.category(), "connection");
        assert!(refused.is_retryable());

        let closed = OpcUaError::connection(ConnectionError::PoolClosed);
        assert!(!closed.is_retryable());

        let nan = OpcUaError::conversion(ConversionError::not_a_number("Int32"));
        assert_eq!(nan.category(), "conversion");
        assert!(!nan.is_retryable());
    }

    #[test]
    fn test_gateway_error_messages() {
        assert_eq!(GatewayError::AttributeNotSpecified.to_string(), "Attribute not specified");
        assert!(GatewayError::AttributeNotSpecified.is_caller_error());

        let unavailable = GatewayError::SessionUnavailable(OpcUaError::connection(
            ConnectionError::NotConnected,
        ));
        assert_eq!(
            unavailable.to_string(),
            "OPC UA session unavailable: Not connected to OPC UA server"
        );
        assert!(!unavailable.is_caller_error());
    }
}
