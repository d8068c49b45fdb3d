// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # iotgw Integration Tests
//!
//! End-to-end tests that drive the session pool, the gateways and the HTTP
//! router against a scripted OPC UA transport.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p iotgw-tests
//! cargo test -p iotgw-tests --test integration_pool
//! cargo test -p iotgw-tests --test integration_gateway
//! cargo test -p iotgw-tests --test integration_api
//! cargo test -p iotgw-tests --test integration_config
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use iotgw_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = MockServer::new();
//!     server.set_value("sensor1", OpcUaValue::Int32(89));
//!     let gateway = TestGateway::new(&server);
//!     let (status, body) = gateway.get("/iotgateway/read?ids=sensor1").await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, wait_until};
}
