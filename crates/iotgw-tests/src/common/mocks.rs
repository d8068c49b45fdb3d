// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock OPC UA Server
//!
//! [`MockServer`] is a [`TransportFactory`] whose transports and sessions
//! answer from an in-memory address space. Tests script values, write
//! statuses and connect failures, then inspect what the gateway did.
//!
//! ```rust,ignore
//! let server = MockServer::new();
//! server.set_value("sensor1", OpcUaValue::Int32(89));
//! server.set_write_status("setpoint", StatusCode::BAD_TYPE_MISMATCH);
//! server.fail_next_connects(2);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iotgw_opcua::{
    ConnectionError, ConnectionEvent, NodeId, OpcUaError, OpcUaResult, OpcUaSession,
    OpcUaTransport, OpcUaValue, OperationError, ReadOutcome, StatusCode, TransportFactory,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Namespace used for bare attribute names in the fixtures.
pub const TEST_NAMESPACE: u16 = 2;

// =============================================================================
// MockServer
// =============================================================================

#[derive(Default)]
struct ServerState {
    values: Mutex<HashMap<NodeId, OpcUaValue>>,
    read_statuses: Mutex<HashMap<NodeId, StatusCode>>,
    read_faults: Mutex<HashMap<NodeId, String>>,
    write_statuses: Mutex<HashMap<NodeId, StatusCode>>,
    connect_delay: Mutex<Option<Duration>>,
    fail_connects: AtomicUsize,

    transports: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    sessions: AtomicUsize,
    session_closes: AtomicUsize,
    reads: Mutex<Vec<NodeId>>,
    writes: Mutex<Vec<(NodeId, OpcUaValue)>>,
    senders: Mutex<Vec<broadcast::Sender<ConnectionEvent>>>,
}

/// Scripted OPC UA server. Clones share state.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<ServerState>,
}

impl MockServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// The server as a shared factory.
    pub fn factory(&self) -> Arc<dyn TransportFactory> {
        Arc::new(self.clone())
    }

    fn node(id: &str) -> NodeId {
        NodeId::for_attribute(TEST_NAMESPACE, id)
    }

    // ---- scripting ----------------------------------------------------------

    /// Serves `value` with a Good status for attribute `id`.
    pub fn set_value(&self, id: &str, value: OpcUaValue) {
        self.state.values.lock().insert(Self::node(id), value);
    }

    /// Serves a value-less read with `status` for attribute `id`.
    pub fn set_read_status(&self, id: &str, status: StatusCode) {
        self.state.read_statuses.lock().insert(Self::node(id), status);
    }

    /// Makes reads of `id` fail at the transport.
    pub fn fail_reads_of(&self, id: &str, reason: &str) {
        self.state
            .read_faults
            .lock()
            .insert(Self::node(id), reason.to_string());
    }

    /// Answers writes to `id` with `status`.
    pub fn set_write_status(&self, id: &str, status: StatusCode) {
        self.state.write_statuses.lock().insert(Self::node(id), status);
    }

    /// The next `n` connects are refused.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.fail_connects.store(n, Ordering::SeqCst);
    }

    /// Every connect sleeps `delay` first.
    pub fn set_connect_delay(&self, delay: Duration) {
        *self.state.connect_delay.lock() = Some(delay);
    }

    /// Emits `event` on the most recently created transport.
    pub fn emit(&self, event: ConnectionEvent) {
        if let Some(tx) = self.state.senders.lock().last() {
            let _ = tx.send(event);
        }
    }

    // ---- inspection ---------------------------------------------------------

    /// Transports created.
    pub fn transports(&self) -> usize {
        self.state.transports.load(Ordering::SeqCst)
    }

    /// Connect attempts, failed ones included.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Disconnects.
    pub fn disconnects(&self) -> usize {
        self.state.disconnects.load(Ordering::SeqCst)
    }

    /// Sessions created.
    pub fn sessions(&self) -> usize {
        self.state.sessions.load(Ordering::SeqCst)
    }

    /// Sessions closed.
    pub fn session_closes(&self) -> usize {
        self.state.session_closes.load(Ordering::SeqCst)
    }

    /// Nodes read, in order.
    pub fn reads(&self) -> Vec<NodeId> {
        self.state.reads.lock().clone()
    }

    /// Writes received, in order.
    pub fn writes(&self) -> Vec<(NodeId, OpcUaValue)> {
        self.state.writes.lock().clone()
    }

    /// The value currently stored for `id`.
    pub fn value_of(&self, id: &str) -> Option<OpcUaValue> {
        self.state.values.lock().get(&Self::node(id)).cloned()
    }
}

impl TransportFactory for MockServer {
    fn create(&self) -> OpcUaResult<Arc<dyn OpcUaTransport>> {
        self.state.transports.fetch_add(1, Ordering::SeqCst);
        let (tx, _) = broadcast::channel(16);
        self.state.senders.lock().push(tx.clone());
        Ok(Arc::new(MockTransport {
            state: Arc::clone(&self.state),
            events: tx,
        }))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// =============================================================================
// MockTransport
// =============================================================================

struct MockTransport {
    state: Arc<ServerState>,
    events: broadcast::Sender<ConnectionEvent>,
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&self, endpoint: &str) -> OpcUaResult<()> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let refuse = self
            .state
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refuse {
            return Err(OpcUaError::connection(ConnectionError::refused(
                endpoint,
                "connection refused by mock",
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.state.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_session(&self) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        self.state.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// MockSession
// =============================================================================

struct MockSession {
    state: Arc<ServerState>,
}

#[async_trait]
impl OpcUaSession for MockSession {
    async fn read(&self, node_id: &NodeId) -> OpcUaResult<ReadOutcome> {
        self.state.reads.lock().push(node_id.clone());

        if let Some(reason) = self.state.read_faults.lock().get(node_id) {
            return Err(OpcUaError::operation(OperationError::read_failed(
                node_id.to_string(),
                reason.clone(),
            )));
        }
        if let Some(status) = self.state.read_statuses.lock().get(node_id) {
            return Ok(ReadOutcome::status_only(*status));
        }
        match self.state.values.lock().get(node_id) {
            Some(value) => Ok(ReadOutcome::good(value.clone())),
            None => Ok(ReadOutcome::status_only(StatusCode::BAD_NODE_ID_UNKNOWN)),
        }
    }

    async fn write(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<StatusCode> {
        self.state.writes.lock().push((node_id.clone(), value.clone()));

        let status = self
            .state
            .write_statuses
            .lock()
            .get(node_id)
            .copied()
            .unwrap_or(StatusCode::GOOD);
        if status.is_good() {
            self.state.values.lock().insert(node_id.clone(), value);
        }
        Ok(status)
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.state.session_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
