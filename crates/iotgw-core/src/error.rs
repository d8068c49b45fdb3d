// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the metrics and SNMP surface.

use thiserror::Error;

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while exporting metrics or serving SNMP.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Prometheus registry or encoder failure.
    #[error("Prometheus export failed: {0}")]
    Prometheus(#[from] prometheus::Error),

    /// The registry could not be built at startup.
    #[error("Prometheus export unavailable")]
    ExportUnavailable,

    /// Exported text was not valid UTF-8.
    #[error("Metrics encoding failed: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    /// Malformed object identifier.
    #[error("Invalid OID '{oid}': {reason}")]
    InvalidOid {
        /// The rejected input.
        oid: String,
        /// Why it was rejected.
        reason: String,
    },

    /// SNMP agent could not bind or run.
    #[error("SNMP agent error: {message}")]
    Snmp {
        /// Error message.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid OID error.
    pub fn invalid_oid(oid: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOid {
            oid: oid.into(),
            reason: reason.into(),
        }
    }

    /// Creates an SNMP agent error.
    pub fn snmp(message: impl Into<String>) -> Self {
        Self::Snmp {
            message: message.into(),
        }
    }
}
