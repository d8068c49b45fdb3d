// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA side of the gateway.
//!
//! This crate owns the single shared OPC UA session and the translation
//! between the gateway's loosely typed JSON values and typed OPC UA values.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                HTTP layer (iotgw-api)                        │
//! └──────────────┬───────────────────────────────┬───────────────┘
//!                │ read(id)                      │ write_batch(items)
//!                ▼                               ▼
//! ┌──────────────────────────┐     ┌──────────────────────────────┐
//! │  ReadGateway             │     │  WriteGateway  ──► codec     │
//! │  (pooled + fallback)     │     │  (per-item isolation)        │
//! └──────────────┬───────────┘     └──────────────┬───────────────┘
//!                └───────────────┬────────────────┘
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │  SessionPool                  │
//!                │  single-flight (re)connect    │
//!                └───────────────┬───────────────┘
//!                                ▼
//!                ┌───────────────────────────────┐
//!                │  TransportFactory / Transport │
//!                │  (opcua crate, or a mock)     │
//!                └───────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - `real-transport`: transport backed by the `opcua` crate client.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod codec;
pub mod error;
pub mod gateway;
pub mod status;
pub mod types;
pub mod value;

pub use client::{
    ConnectionEvent, OpcUaSession, OpcUaTransport, PoolState, PoolStatus, ReadOutcome,
    SessionHandle, SessionPool, TransportFactory,
};
pub use codec::{convert, detect_type, Coerced};
pub use error::{
    ConfigurationError, ConnectionError, ConversionError, GatewayError, GatewayResult,
    OpcUaError, OpcUaResult, OperationError, SessionError,
};
pub use gateway::{OperationResult, ReadGateway, WriteGateway, WriteItem};
pub use status::StatusCode;
pub use types::{
    mask_endpoint, ConnectionStrategy, NodeId, NodeIdentifier, OpcUaConfig, OpcUaDataType,
    PoolConfig, SecurityMode, SecurityPolicy,
};
pub use value::OpcUaValue;

#[cfg(feature = "real-transport")]
pub use client::{RealOpcUaTransport, RealTransportFactory};
