// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-crate scripted transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::client::transport::{
    ConnectionEvent, OpcUaSession, OpcUaTransport, ReadOutcome, TransportFactory,
};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, OperationError};
use crate::status::StatusCode;
use crate::types::NodeId;
use crate::value::OpcUaValue;

#[derive(Default)]
pub(crate) struct MockState {
    pub connects: AtomicUsize,
    pub sessions: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub closes: AtomicUsize,
    pub fail_connects: AtomicUsize,
    pub reads: Mutex<Vec<NodeId>>,
    pub writes: Mutex<Vec<(NodeId, OpcUaValue)>>,
    pub read_script: Mutex<VecDeque<OpcUaResult<ReadOutcome>>>,
    pub write_script: Mutex<VecDeque<OpcUaResult<StatusCode>>>,
    pub senders: Mutex<Vec<broadcast::Sender<ConnectionEvent>>>,
}

impl MockState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    /// Emits on the most recently created transport.
    pub fn emit_latest(&self, event: ConnectionEvent) {
        if let Some(tx) = self.senders.lock().last() {
            let _ = tx.send(event);
        }
    }

    pub fn script_read(&self, outcome: OpcUaResult<ReadOutcome>) {
        self.read_script.lock().push_back(outcome);
    }

    pub fn script_write(&self, outcome: OpcUaResult<StatusCode>) {
        self.write_script.lock().push_back(outcome);
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockFactory {
    pub state: Arc<MockState>,
}

impl TransportFactory for MockFactory {
    fn create(&self) -> OpcUaResult<Arc<dyn OpcUaTransport>> {
        let (tx, _) = broadcast::channel(16);
        self.state.senders.lock().push(tx.clone());
        Ok(Arc::new(MockTransport {
            state: Arc::clone(&self.state),
            events: tx,
        }))
    }
}

struct MockTransport {
    state: Arc<MockState>,
    events: broadcast::Sender<ConnectionEvent>,
}

#[async_trait]
impl OpcUaTransport for MockTransport {
    async fn connect(&self, endpoint: &str) -> OpcUaResult<()> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let fail = self
            .state
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(OpcUaError::connection(ConnectionError::refused(
                endpoint,
                "scripted failure",
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

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl OpcUaSession for MockSession {
    async fn read(&self, node_id: &NodeId) -> OpcUaResult<ReadOutcome> {
        self.state.reads.lock().push(node_id.clone());
        let scripted = self.state.read_script.lock().pop_front();
        scripted.unwrap_or_else(|| {
            Err(OpcUaError::operation(OperationError::read_failed(
                node_id.to_string(),
                "no scripted read",
            )))
        })
    }

    async fn write(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<StatusCode> {
        self.state.writes.lock().push((node_id.clone(), value));
        let scripted = self.state.write_script.lock().pop_front();
        scripted.unwrap_or(Ok(StatusCode::GOOD))
    }

    async fn close(&self) -> OpcUaResult<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
