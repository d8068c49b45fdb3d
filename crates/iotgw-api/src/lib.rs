// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # iotgw-api
//!
//! HTTP API for the iotgw OPC UA gateway.
//!
//! ## Routes
//!
//! | Route | Auth |
//! |-------|------|
//! | `GET /health` | public |
//! | `GET /config` | public, when `server.expose_config` |
//! | `GET /iotgateway/read?ids=` / `POST /iotgateway/write` | API key or Basic |
//! | `GET /api/opcua/nodes/{nodeId}/read`, `POST /api/opcua/read` | public |
//! | `POST /api/opcua/write/{nodeId}`, `GET /api/opcua/status` | public |
//! | `GET /metrics[/opcua\|/http\|/system\|/prometheus]` | API key or Basic |
//!
//! Every route is rate limited per client IP.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use server::ApiServer;
pub use state::AppState;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
