// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client side: the transport seam and the session pool.
//!
//! # Modules
//!
//! - [`transport`]: traits the pool drives (`TransportFactory`, `OpcUaTransport`, `OpcUaSession`)
//! - [`pool`]: single shared session with single-flight reconnection
//! - `real_transport`: `opcua` crate backend (feature `real-transport`)

pub mod pool;
pub mod transport;

#[cfg(feature = "real-transport")]
pub mod real_transport;

#[cfg(test)]
pub(crate) mod mock;

pub use pool::{PoolState, PoolStatus, SessionHandle, SessionPool};
pub use transport::{
    ConnectionEvent, OpcUaSession, OpcUaTransport, ReadOutcome, TransportFactory,
};

#[cfg(feature = "real-transport")]
pub use real_transport::{RealTransportFactory, RealOpcUaTransport};
