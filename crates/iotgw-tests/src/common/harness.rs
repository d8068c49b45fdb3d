// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! [`TestGateway`] wires a [`SessionPool`], the gateways and the HTTP
//! router over a [`MockServer`], the same way the binary does over a real
//! transport.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use iotgw_api::middleware::API_KEY_HEADER;
use iotgw_api::{ApiServer, AppState};
use iotgw_config::GatewayConfig;
use iotgw_core::MetricsCollector;
use iotgw_opcua::{ReadGateway, SessionPool, WriteGateway};
use serde_json::Value;
use tower::ServiceExt;

use super::fixtures::{ConfigFixtures, TEST_API_KEY};
use super::mocks::MockServer;

/// A gateway assembled over a mock server.
pub struct TestGateway {
    /// The scripted server.
    pub server: MockServer,
    /// Effective configuration.
    pub config: GatewayConfig,
    /// The shared pool.
    pub pool: SessionPool,
    /// The collector every component reports into.
    pub metrics: Arc<MetricsCollector>,
    router: Router,
}

impl TestGateway {
    /// Gateway over `server` with [`ConfigFixtures::gateway`].
    pub fn new(server: &MockServer) -> Self {
        Self::with_config(server, ConfigFixtures::gateway())
    }

    /// Gateway over `server` with `config`.
    pub fn with_config(server: &MockServer, config: GatewayConfig) -> Self {
        let metrics = MetricsCollector::shared();
        let opcua = config
            .opcua_config()
            .expect("fixture config must convert");
        let pool = SessionPool::new(
            opcua,
            config.pool_config(),
            server.factory(),
            metrics.clone(),
        );
        let state = AppState::new(config.clone(), pool.clone(), metrics.clone());
        let router = ApiServer::new(state).router();

        Self {
            server: server.clone(),
            config,
            pool,
            metrics,
            router,
        }
    }

    /// Read gateway over the shared pool.
    pub fn reader(&self) -> ReadGateway {
        ReadGateway::new(self.pool.clone(), self.config.opcua.namespace)
    }

    /// Write gateway over the shared pool.
    pub fn writer(&self) -> WriteGateway {
        WriteGateway::new(self.pool.clone(), self.config.opcua.namespace)
    }

    /// Sends `request` through the full middleware stack.
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    /// Authenticated GET.
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(API_KEY_HEADER, TEST_API_KEY)
            .body(Body::empty())
            .expect("valid request");
        into_json(self.send(request).await).await
    }

    /// Authenticated POST with a JSON body.
    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(API_KEY_HEADER, TEST_API_KEY)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        into_json(self.send(request).await).await
    }

    /// GET without credentials.
    pub async fn get_anonymous(&self, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }
}

/// Status and JSON body of `response`. A non-JSON body becomes a string.
pub async fn into_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let json = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, json)
}
