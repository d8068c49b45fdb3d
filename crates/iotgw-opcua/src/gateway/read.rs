// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read gateway.
//!
//! Reads go through the pooled session. When the pool cannot produce one,
//! a throwaway connection is opened for the single read and closed again.
//! A failed read invalidates the pooled session so the next caller
//! reconnects rather than reusing a dead handle.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::client::pool::{SessionHandle, SessionPool};
use crate::client::transport::ReadOutcome;
use crate::error::{GatewayError, GatewayResult};
use crate::types::NodeId;

/// Resolves attribute identifiers and reads them through the pool.
#[derive(Debug, Clone)]
pub struct ReadGateway {
    pool: SessionPool,
    namespace: u16,
    fallback: bool,
}

impl ReadGateway {
    /// Creates a gateway reading from `namespace`, with the unpooled fallback on.
    pub fn new(pool: SessionPool, namespace: u16) -> Self {
        Self {
            pool,
            namespace,
            fallback: true,
        }
    }

    /// Enables or disables the unpooled fallback.
    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    /// Namespace used for bare attribute names.
    pub fn namespace(&self) -> u16 {
        self.namespace
    }

    /// Reads the attribute `id`.
    ///
    /// Returns `Ok(None)` when the read could not be performed. An empty
    /// `id` is a caller error and fails before any session is touched.
    pub async fn read(&self, id: &str) -> GatewayResult<Option<ReadOutcome>> {
        if id.is_empty() {
            return Err(GatewayError::AttributeNotSpecified);
        }
        let node = NodeId::for_attribute(self.namespace, id);
        Ok(self.read_node(&node).await)
    }

    /// Reads an explicit node address. `None` when the read failed.
    pub async fn read_node(&self, node: &NodeId) -> Option<ReadOutcome> {
        let metrics = self.pool.metrics();
        metrics.opcua_request();
        let started = Instant::now();

        let (handle, pooled) = self.session_for(node).await?;

        debug!(node_id = %node, pooled, "Reading OPC UA value");
        let result = handle.session().read(node).await;
        if !pooled {
            handle.close().await;
        }
        metrics.opcua_response_time(started.elapsed());

        match result {
            Ok(outcome) => {
                metrics.opcua_read();
                info!(
                    node_id = %node,
                    status = outcome.status.name(),
                    "Read completed"
                );
                Some(outcome)
            }
            Err(e) => {
                metrics.opcua_request_error();
                metrics.opcua_error();
                error!(node_id = %node, error = %e, "Error reading OPC UA value");
                if pooled {
                    self.pool.invalidate(&handle).await;
                }
                None
            }
        }
    }

    async fn session_for(&self, node: &NodeId) -> Option<(SessionHandle, bool)> {
        let metrics = self.pool.metrics();
        let pool_err = match self.pool.acquire().await {
            Ok(handle) => return Some((handle, true)),
            Err(e) => e,
        };

        if !self.fallback {
            metrics.opcua_request_error();
            warn!(node_id = %node, error = %pool_err, "No pooled OPC UA session for read");
            return None;
        }

        warn!(
            node_id = %node,
            error = %pool_err,
            "Pooled session unavailable; reading over a one-off connection"
        );
        match self.pool.open_unpooled().await {
            Ok(handle) => Some((handle, false)),
            Err(e) => {
                metrics.opcua_request_error();
                metrics.opcua_error();
                error!(node_id = %node, error = %e, "Fallback OPC UA connection failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockFactory, MockState};
    use crate::error::{OpcUaError, OperationError};
    use crate::types::{OpcUaConfig, PoolConfig};
    use crate::value::OpcUaValue;
    use iotgw_core::NoopMetrics;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn gateway(factory: &MockFactory) -> ReadGateway {
        let pool = SessionPool::new(
            OpcUaConfig::new("opc.tcp://plc:4840"),
            PoolConfig::default(),
            Arc::new(factory.clone()),
            Arc::new(NoopMetrics),
        );
        ReadGateway::new(pool, 2)
    }

    #[tokio::test]
    async fn test_read_good_value() {
        let factory = MockFactory::default();
        factory.state.script_read(Ok(ReadOutcome::good(OpcUaValue::Int32(89))));
        let gw = gateway(&factory);

        let outcome = gw.read("sensor1").await.unwrap().unwrap();
        let row = outcome.to_operation_result("sensor1");

        assert!(row.s);
        assert_eq!(row.r, "Good");
        assert_eq!(row.v, 89);
        assert_eq!(factory.state.reads.lock()[0], NodeId::string(2, "sensor1"));
    }

    #[tokio::test]
    async fn test_read_without_id_touches_nothing() {
        let factory = MockFactory::default();
        let gw = gateway(&factory);

        let err = gw.read("").await.unwrap_err();
        assert!(matches!(err, GatewayError::AttributeNotSpecified));
        assert_eq!(MockState::count(&factory.state.connects), 0);
        assert!(factory.state.reads.lock().is_empty());
    }

    #[tokio::test]
    async fn test_read_error_invalidates_pool() {
        let factory = MockFactory::default();
        factory.state.script_read(Err(OpcUaError::operation(OperationError::read_failed(
            "ns=2;s=sensor1",
            "BadSessionClosed",
        ))));
        let gw = gateway(&factory);

        assert!(gw.read("sensor1").await.unwrap().is_none());
        assert!(!gw.pool.is_live());
        assert_eq!(MockState::count(&factory.state.closes), 1);
    }

    #[tokio::test]
    async fn test_fallback_read_closes_one_off_connection() {
        let factory = MockFactory::default();
        // The pooled connect fails; the fallback connect succeeds.
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        factory.state.script_read(Ok(ReadOutcome::good(OpcUaValue::Double(21.5))));
        let gw = gateway(&factory);

        let outcome = gw.read("ns=3;i=1001").await.unwrap().unwrap();
        assert_eq!(outcome.value_json(), 21.5);
        assert_eq!(factory.state.reads.lock()[0], NodeId::numeric(3, 1001));
        assert_eq!(MockState::count(&factory.state.closes), 1);
        assert!(!gw.pool.is_live());
    }

    #[tokio::test]
    async fn test_no_fallback_returns_none() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        let gw = gateway(&factory).with_fallback(false);

        assert!(gw.read("sensor1").await.unwrap().is_none());
        assert_eq!(MockState::count(&factory.state.connects), 1);
    }
}
