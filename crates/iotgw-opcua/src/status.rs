// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA status codes with their symbolic names and descriptions.
//!
//! Only the codes a gateway realistically sees on connect, read and write
//! are tabled. Unknown codes fall back to their severity ("Good",
//! "Uncertain", "Bad") for the description and report `Unknown` as name.

use std::borrow::Cow;
use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

const SEVERITY_MASK: u32 = 0xC000_0000;
const UNCERTAIN_BIT: u32 = 0x4000_0000;
const BAD_BIT: u32 = 0x8000_0000;

/// `(code, name, description)`, sorted by code.
static KNOWN: &[(u32, &str, &str)] = &[
    (0x0000_0000, "Good", "The operation succeeded."),
    (0x4000_0000, "Uncertain", "The operation was uncertain."),
    (0x8000_0000, "Bad", "The operation failed."),
    (0x8001_0000, "BadUnexpectedError", "An unexpected error occurred."),
    (0x8002_0000, "BadInternalError", "An internal error occurred as a result of a programming or configuration error."),
    (0x8003_0000, "BadOutOfMemory", "Not enough memory to complete the operation."),
    (0x8004_0000, "BadResourceUnavailable", "An operating system resource is not available."),
    (0x8005_0000, "BadCommunicationError", "A low level communication error occurred."),
    (0x8006_0000, "BadEncodingError", "Encoding halted because of invalid data in the objects being serialized."),
    (0x8007_0000, "BadDecodingError", "Decoding halted because of invalid data in the stream."),
    (0x800A_0000, "BadTimeout", "The operation timed out."),
    (0x800B_0000, "BadServiceUnsupported", "The server does not support the requested service."),
    (0x800C_0000, "BadShutdown", "The operation was cancelled because the application is shutting down."),
    (0x800D_0000, "BadServerNotConnected", "The operation could not complete because the client is not connected to the server."),
    (0x800E_0000, "BadServerHalted", "The server has stopped and cannot process any requests."),
    (0x800F_0000, "BadNothingToDo", "No processing could be done because there was nothing to do."),
    (0x8010_0000, "BadTooManyOperations", "The request could not be processed because it specified too many operations."),
    (0x8012_0000, "BadCertificateInvalid", "The certificate provided as a parameter is not valid."),
    (0x8013_0000, "BadSecurityChecksFailed", "An error occurred verifying security."),
    (0x801F_0000, "BadUserAccessDenied", "User does not have permission to perform the requested operation."),
    (0x8020_0000, "BadIdentityTokenInvalid", "The user identity token is not valid."),
    (0x8021_0000, "BadIdentityTokenRejected", "The user identity token is valid but the server has rejected it."),
    (0x8022_0000, "BadSecureChannelIdInvalid", "The specified secure channel is no longer valid."),
    (0x8025_0000, "BadSessionIdInvalid", "The session id is not valid."),
    (0x8026_0000, "BadSessionClosed", "The session was closed by the client."),
    (0x8027_0000, "BadSessionNotActivated", "The session cannot be used because ActivateSession has not been called."),
    (0x8031_0000, "BadNoCommunication", "Communication with the data source is defined, but not established, and there is no last known value available."),
    (0x8032_0000, "BadWaitingForInitialData", "Waiting for the server to obtain values from the underlying data source."),
    (0x8033_0000, "BadNodeIdInvalid", "The syntax of the node id is not valid."),
    (0x8034_0000, "BadNodeIdUnknown", "The node id refers to a node that does not exist in the server address space."),
    (0x8035_0000, "BadAttributeIdInvalid", "The attribute is not supported for the specified Node."),
    (0x8036_0000, "BadIndexRangeInvalid", "The syntax of the index range parameter is invalid."),
    (0x803A_0000, "BadNotReadable", "The access level does not allow reading or subscribing to the Node."),
    (0x803B_0000, "BadNotWritable", "The access level does not allow writing to the Node."),
    (0x803C_0000, "BadOutOfRange", "The value was out of range."),
    (0x803D_0000, "BadNotSupported", "The requested operation is not supported."),
    (0x803E_0000, "BadNotFound", "A requested item was not found or a search operation ended without success."),
    (0x8056_0000, "BadTooManySessions", "The server has reached its maximum number of sessions."),
    (0x8073_0000, "BadWriteNotSupported", "The server does not support writing the combination of value, status and timestamps provided."),
    (0x8074_0000, "BadTypeMismatch", "The value supplied for the attribute is not of the same type as the attribute's value."),
    (0x8086_0000, "BadSecureChannelClosed", "The secure channel has been closed."),
    (0x80AB_0000, "BadInvalidArgument", "One or more arguments are invalid."),
    (0x80AC_0000, "BadConnectionRejected", "Could not establish a network connection to remote server."),
    (0x80AD_0000, "BadDisconnect", "The server has disconnected from the client."),
    (0x80AE_0000, "BadConnectionClosed", "The network connection has been closed."),
    (0x80AF_0000, "BadInvalidState", "The operation cannot be completed because the object is closed, uninitialized or in some other invalid state."),
];

/// An OPC UA status code.
///
/// Serialises as `{"value": <u32>, "name": "...", "description": "..."}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(u32);

impl StatusCode {
    /// `Good`.
    pub const GOOD: Self = Self(0);
    /// Generic `Bad`.
    pub const BAD: Self = Self(BAD_BIT);
    /// `BadTypeMismatch`.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    /// `BadNodeIdUnknown`.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// `BadNotWritable`.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// `BadConnectionClosed`.
    pub const BAD_CONNECTION_CLOSED: Self = Self(0x80AE_0000);

    /// Wraps a raw code.
    #[inline]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The raw numeric code.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// `true` only for exactly `Good`.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 == 0
    }

    /// `true` when the severity bits say Bad.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & BAD_BIT != 0
    }

    /// `true` when the severity bits say Uncertain.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & SEVERITY_MASK == UNCERTAIN_BIT
    }

    fn lookup(&self) -> Option<&'static (u32, &'static str, &'static str)> {
        KNOWN
            .binary_search_by_key(&self.0, |entry| entry.0)
            .ok()
            .map(|i| &KNOWN[i])
    }

    /// Symbolic name, e.g. `"Good"` or `"BadTypeMismatch"`.
    pub fn name(&self) -> &'static str {
        self.lookup().map(|e| e.1).unwrap_or("Unknown")
    }

    /// Human-readable description.
    pub fn description(&self) -> Cow<'static, str> {
        match self.lookup() {
            Some(entry) => Cow::Borrowed(entry.2),
            None => {
                let severity = if self.is_bad() {
                    "Bad"
                } else if self.is_uncertain() {
                    "Uncertain"
                } else {
                    "Good"
                };
                Cow::Owned(format!("{} (status code 0x{:08X}).", severity, self.0))
            }
        }
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StatusCode", 3)?;
        state.serialize_field("value", &self.0)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("description", &self.description())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(KNOWN.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(StatusCode::GOOD.name(), "Good");
        assert!(StatusCode::GOOD.is_good());
        assert_eq!(StatusCode::BAD.description(), "The operation failed.");

        let mismatch = StatusCode::BAD_TYPE_MISMATCH;
        assert_eq!(mismatch.value(), 2_155_085_824);
        assert_eq!(mismatch.name(), "BadTypeMismatch");
        assert_eq!(
            mismatch.description(),
            "The value supplied for the attribute is not of the same type as the attribute's value."
        );
        assert!(mismatch.is_bad());
        assert!(!mismatch.is_good());
    }

    #[test]
    fn test_unknown_code_uses_severity() {
        let code = StatusCode::new(0x40A0_0000);
        assert_eq!(code.name(), "Unknown");
        assert!(code.is_uncertain());
        assert!(code.description().starts_with("Uncertain"));
    }

    #[test]
    fn test_serialises_as_object() {
        let json = serde_json::to_value(StatusCode::GOOD).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "value": 0,
                "name": "Good",
                "description": "The operation succeeded."
            })
        );
    }
}
