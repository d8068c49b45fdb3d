// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session pool: the single shared transport+session pair.
//!
//! # State machine
//!
//! ```text
//!            acquire / warmup
//!   Empty ─────────────────────► Connecting ──ok──► Live
//!     ▲                              │               │
//!     │ close_all / invalidate       └─err─► Backoff │ connection lost
//!     │                                        ▲     ▼
//!     └─────────────────────────────── any ─┘  Reconnecting ──ok──► Live
//!                                              │
//!                                              └─err─► Backoff
//! ```
//!
//! - One connect sequence at a time: acquisitions and recoveries serialise
//!   on a single async lock; callers that arrive while it is held re-check
//!   for a live handle before connecting.
//! - A live handle is served without touching that lock, so backoff and
//!   cooldown never delay reads or writes on an established session.
//! - Every handle carries a generation. Lifecycle events from an older
//!   transport never invalidate a newer handle.
//!
//! # Retry budget
//!
//! Each failed establishment increments the retry counter and is reported
//! to its caller. When the counter reaches `retry_max`, a cooldown deadline
//! of `retry_delay` is recorded. The next acquisition waits out whatever is
//! left of the cooldown, resets the counter to zero and tries again. The
//! counter never exceeds `retry_max` and the pool never retries without a
//! caller asking.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use iotgw_core::MetricsSink;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::client::transport::{ConnectionEvent, OpcUaSession, OpcUaTransport, TransportFactory};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult};
use crate::types::{OpcUaConfig, PoolConfig};

// =============================================================================
// PoolState
// =============================================================================

/// Pool lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// No handle.
    #[default]
    Empty,
    /// A connect+createSession sequence is in flight.
    Connecting,
    /// Handle valid.
    Live,
    /// A live session signalled loss; recovery in flight.
    Reconnecting,
    /// Last establishment failed.
    Backoff,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "Empty",
            Self::Connecting => "Connecting",
            Self::Live => "Live",
            Self::Reconnecting => "Reconnecting",
            Self::Backoff => "Backoff",
        };
        f.write_str(name)
    }
}

// =============================================================================
// SessionHandle
// =============================================================================

/// A connected transport plus the session opened over it.
///
/// Cheap to clone. Gateways take one per operation and drop it afterwards.
#[derive(Clone)]
pub struct SessionHandle {
    transport: Arc<dyn OpcUaTransport>,
    session: Arc<dyn OpcUaSession>,
    generation: u64,
}

impl SessionHandle {
    /// The session to issue reads and writes on.
    pub fn session(&self) -> &dyn OpcUaSession {
        self.session.as_ref()
    }

    /// Generation this handle was created in (0 for unpooled handles).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if both handles wrap the same session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.session, &other.session)
    }

    /// Closes the session, then the transport. Failures are logged only.
    pub async fn close(&self) {
        if let Err(e) = self.session.close().await {
            warn!(error = %e, generation = self.generation, "Error closing OPC UA session");
        }
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, generation = self.generation, "Error disconnecting OPC UA client");
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PoolStatus
// =============================================================================

/// Snapshot for health and status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    /// Current state.
    pub state: PoolState,
    /// `true` when a handle is available.
    pub live: bool,
    /// Configured endpoint, credentials masked.
    pub endpoint: String,
    /// Consecutive failed establishments.
    pub retry_count: u32,
    /// Failures before cooldown.
    pub max_retries: u32,
    /// Last successful establishment.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// A connection-lost recovery is in flight.
    pub reconnecting: bool,
}

// =============================================================================
// SessionPool
// =============================================================================

/// Owner of the single shared OPC UA session.
///
/// Cloning yields another reference to the same pool.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    opcua: OpcUaConfig,
    config: PoolConfig,
    factory: Arc<dyn TransportFactory>,
    metrics: Arc<dyn MetricsSink>,

    handle: RwLock<Option<SessionHandle>>,
    state: watch::Sender<PoolState>,
    connect_lock: tokio::sync::Mutex<()>,
    listener: Mutex<Option<JoinHandle<()>>>,

    retry_count: AtomicU32,
    cooldown_until: Mutex<Option<Instant>>,
    reconnecting: AtomicBool,
    closed: AtomicBool,
    generation: AtomicU64,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
}

impl SessionPool {
    /// Creates an empty pool. Nothing connects until the first acquisition.
    pub fn new(
        opcua: OpcUaConfig,
        config: PoolConfig,
        factory: Arc<dyn TransportFactory>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let (state, _) = watch::channel(PoolState::Empty);
        Self {
            inner: Arc::new(PoolInner {
                opcua,
                config,
                factory,
                metrics,
                handle: RwLock::new(None),
                state,
                connect_lock: tokio::sync::Mutex::new(()),
                listener: Mutex::new(None),
                retry_count: AtomicU32::new(0),
                cooldown_until: Mutex::new(None),
                reconnecting: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                last_connected_at: RwLock::new(None),
            }),
        }
    }

    /// Returns the live handle, connecting first if there is none.
    ///
    /// Idempotent while live: no second connect is issued.
    pub async fn acquire(&self) -> OpcUaResult<SessionHandle> {
        if let Some(handle) = self.inner.live_handle() {
            return Ok(handle);
        }
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(OpcUaError::connection(ConnectionError::PoolClosed));
        }

        let _guard = self.inner.connect_lock.lock().await;
        // Whoever held the lock may have connected already.
        if let Some(handle) = self.inner.live_handle() {
            return Ok(handle);
        }
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(OpcUaError::connection(ConnectionError::PoolClosed));
        }
        self.inner.connect_locked(PoolState::Connecting).await
    }

    /// Startup acquisition. Failure is logged, not returned.
    pub async fn warmup(&self) -> bool {
        match self.acquire().await {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    endpoint = %self.inner.opcua.display_endpoint(),
                    error = %e,
                    "Initial OPC UA connection failed; will retry on demand"
                );
                false
            }
        }
    }

    /// Opens a throwaway handle outside the pool.
    ///
    /// The caller closes it with [`SessionHandle::close`]. No events are
    /// observed and no pool state changes.
    pub async fn open_unpooled(&self) -> OpcUaResult<SessionHandle> {
        let transport = self.inner.factory.create()?;
        let endpoint = &self.inner.opcua.endpoint;
        info!(endpoint = %self.inner.opcua.display_endpoint(), "Opening unpooled OPC UA connection");

        if let Err(e) = transport.connect(endpoint).await {
            if let Err(close_err) = transport.disconnect().await {
                debug!(error = %close_err, "Disconnect after failed unpooled open failed");
            }
            return Err(e);
        }
        match transport.create_session().await {
            Ok(session) => Ok(SessionHandle {
                transport,
                session,
                generation: 0,
            }),
            Err(e) => {
                if let Err(close_err) = transport.disconnect().await {
                    debug!(error = %close_err, "Disconnect after failed unpooled open failed");
                }
                Err(e)
            }
        }
    }

    /// Drops `handle` from the pool if it is still the pooled one, closing it.
    ///
    /// Used after a failed read so the next caller reconnects instead of
    /// reusing a zombie session.
    pub async fn invalidate(&self, handle: &SessionHandle) {
        let taken = {
            let mut slot = self.inner.handle.write();
            match slot.as_ref() {
                Some(current) if current.generation == handle.generation => slot.take(),
                _ => None,
            }
        };

        let Some(taken) = taken else {
            debug!(generation = handle.generation, "Handle already replaced; nothing to invalidate");
            return;
        };

        self.inner.abort_listener();
        self.inner.set_state(PoolState::Empty);
        self.inner.metrics.opcua_connection_closed();
        warn!(generation = taken.generation, "Pooled OPC UA session invalidated");
        taken.close().await;
    }

    /// Closes the pooled session and transport. Idempotent.
    ///
    /// After this call the pool refuses new acquisitions.
    pub async fn close_all(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let taken = self.inner.handle.write().take();
        self.inner.abort_listener();
        self.inner.set_state(PoolState::Empty);

        match taken {
            Some(handle) => {
                self.inner.metrics.opcua_connection_closed();
                handle.close().await;
                info!(endpoint = %self.inner.opcua.display_endpoint(), "OPC UA connections closed");
            }
            None => debug!("No pooled OPC UA connection to close"),
        }
    }

    /// `true` when a handle is available.
    pub fn is_live(&self) -> bool {
        self.inner.handle.read().is_some()
    }

    /// Current state.
    pub fn state(&self) -> PoolState {
        *self.inner.state.borrow()
    }

    /// Follows state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PoolState> {
        self.inner.state.subscribe()
    }

    /// Consecutive failed establishments.
    pub fn retry_count(&self) -> u32 {
        self.inner.retry_count.load(Ordering::Acquire)
    }

    /// Configured client settings.
    pub fn opcua_config(&self) -> &OpcUaConfig {
        &self.inner.opcua
    }

    /// Status snapshot.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            state: self.state(),
            live: self.is_live(),
            endpoint: self.inner.opcua.display_endpoint(),
            retry_count: self.retry_count(),
            max_retries: self.inner.config.retry_max,
            last_connected_at: *self.inner.last_connected_at.read(),
            reconnecting: self.inner.reconnecting.load(Ordering::Acquire),
        }
    }

    /// Metrics sink shared with the gateways.
    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.inner.metrics
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("endpoint", &self.inner.opcua.display_endpoint())
            .field("state", &self.state())
            .field("retry_count", &self.retry_count())
            .finish()
    }
}

// =============================================================================
// PoolInner
// =============================================================================

impl PoolInner {
    fn live_handle(&self) -> Option<SessionHandle> {
        self.handle.read().clone()
    }

    fn set_state(&self, next: PoolState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Session pool state changed");
        }
    }

    fn abort_listener(&self) {
        if let Some(task) = self.listener.lock().take() {
            task.abort();
        }
    }

    /// Runs one establishment. Caller holds `connect_lock`.
    async fn connect_locked(self: &Arc<Self>, entering: PoolState) -> OpcUaResult<SessionHandle> {
        let max = self.config.retry_max;

        if self.retry_count.load(Ordering::Acquire) >= max {
            // The deadline stays set until the wait completes, so a waiter
            // dropped mid-sleep leaves the cooldown in force.
            let deadline = *self.cooldown_until.lock();
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if !remaining.is_zero() {
                    info!(
                        wait_ms = remaining.as_millis() as u64,
                        "Waiting for retry cooldown before reconnecting"
                    );
                }
                tokio::time::sleep_until(deadline).await;
            }
            if self.closed.load(Ordering::Acquire) {
                return Err(OpcUaError::connection(ConnectionError::PoolClosed));
            }
            *self.cooldown_until.lock() = None;
            self.retry_count.store(0, Ordering::Release);
            info!(max_retries = max, "Retry counter reset after cooldown");
        }

        self.set_state(entering);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let shown = self.opcua.display_endpoint();
        info!(endpoint = %shown, generation, "Initializing OPC UA connection");

        match self.establish(generation).await {
            Ok(handle) => {
                *self.handle.write() = Some(handle.clone());
                self.retry_count.store(0, Ordering::Release);
                *self.last_connected_at.write() = Some(Utc::now());
                self.set_state(PoolState::Live);
                self.metrics.opcua_connection_opened();
                info!(endpoint = %shown, generation, "OPC UA session established");

                if self.closed.load(Ordering::Acquire) {
                    // close_all ran while we were connecting.
                    let taken = self.handle.write().take();
                    self.abort_listener();
                    self.set_state(PoolState::Empty);
                    if let Some(taken) = taken {
                        self.metrics.opcua_connection_closed();
                        taken.close().await;
                    }
                    return Err(OpcUaError::connection(ConnectionError::PoolClosed));
                }
                Ok(handle)
            }
            Err(e) => {
                let attempt = self
                    .retry_count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some((n + 1).min(max)))
                    .map(|prev| (prev + 1).min(max))
                    .unwrap_or(max);
                self.set_state(PoolState::Backoff);
                self.metrics.opcua_error();

                if attempt >= max {
                    *self.cooldown_until.lock() = Some(Instant::now() + self.config.retry_delay);
                    error!(
                        endpoint = %shown,
                        error = %e,
                        max_retries = max,
                        cooldown_ms = self.config.retry_delay.as_millis() as u64,
                        "Maximum retry attempts reached; next attempt waits for cooldown"
                    );
                } else {
                    warn!(
                        endpoint = %shown,
                        error = %e,
                        attempt,
                        max_retries = max,
                        "Error initializing OPC UA client"
                    );
                }

                Err(OpcUaError::connection(ConnectionError::establish_failed(
                    &shown,
                    attempt,
                    max,
                    e.to_string(),
                )))
            }
        }
    }

    /// connect + createSession on a fresh transport.
    async fn establish(self: &Arc<Self>, generation: u64) -> OpcUaResult<SessionHandle> {
        let transport = self.factory.create()?;

        // Subscribe before connecting so backoff events during connect are seen.
        let listener = self.spawn_listener(transport.events(), generation);
        let previous = self.listener.lock().replace(listener);
        if let Some(previous) = previous {
            previous.abort();
        }

        let result = async {
            transport.connect(&self.opcua.endpoint).await?;
            transport.create_session().await
        }
        .await;

        match result {
            Ok(session) => Ok(SessionHandle {
                transport,
                session,
                generation,
            }),
            Err(e) => {
                self.abort_listener();
                if let Err(close_err) = transport.disconnect().await {
                    debug!(error = %close_err, "Disconnect after failed establishment failed");
                }
                Err(e)
            }
        }
    }

    fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ConnectionEvent>,
        generation: u64,
    ) -> JoinHandle<()> {
        let weak: Weak<PoolInner> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, generation, "Connection event listener lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(inner) = weak.upgrade() else { break };
                if !inner.on_event(event, generation) {
                    break;
                }
            }
            debug!(generation, "Connection event listener stopped");
        })
    }

    /// Reacts to one lifecycle event. Returns `false` to stop listening.
    fn on_event(self: &Arc<Self>, event: ConnectionEvent, generation: u64) -> bool {
        match event {
            ConnectionEvent::BackoffAttempt { retry, delay } => {
                warn!(
                    endpoint = %self.opcua.display_endpoint(),
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying connection to OPC UA server"
                );
                true
            }
            ConnectionEvent::ConnectionRestored => {
                info!(generation, "OPC UA connection reestablished");
                self.retry_count.store(0, Ordering::Release);
                true
            }
            ConnectionEvent::Keepalive => {
                debug!(generation, "OPC UA keepalive received");
                true
            }
            ConnectionEvent::ConnectionLost => !self.on_connection_lost(generation),
        }
    }

    /// Nulls the handle at once and starts a single recovery.
    ///
    /// Returns `true` when this event invalidated the live handle.
    fn on_connection_lost(self: &Arc<Self>, generation: u64) -> bool {
        let is_current = self
            .handle
            .read()
            .as_ref()
            .is_some_and(|h| h.generation == generation);
        if !is_current {
            debug!(generation, "Ignoring connection loss from a stale transport");
            return false;
        }

        if self
            .reconnecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(generation, "Reconnection already in progress");
            return false;
        }

        let taken = {
            let mut slot = self.handle.write();
            match slot.as_ref() {
                Some(current) if current.generation == generation => slot.take(),
                _ => None,
            }
        };
        let Some(dead) = taken else {
            self.reconnecting.store(false, Ordering::Release);
            return false;
        };

        error!(endpoint = %self.opcua.display_endpoint(), generation, "OPC UA connection lost. Restarting client");
        self.set_state(PoolState::Reconnecting);
        self.metrics.opcua_reconnect();
        self.metrics.opcua_connection_closed();

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            dead.close().await;

            let _guard = inner.connect_lock.lock().await;
            let still_empty = inner.handle.read().is_none();
            if still_empty && !inner.closed.load(Ordering::Acquire) {
                if let Err(e) = inner.connect_locked(PoolState::Reconnecting).await {
                    error!(error = %e, "Error during reconnection");
                }
            }
            inner.reconnecting.store(false, Ordering::Release);
        });
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::{MockFactory, MockState};
    use iotgw_core::NoopMetrics;
    use std::time::Duration;

    fn pool_with(factory: &MockFactory, retry_max: u32) -> SessionPool {
        SessionPool::new(
            OpcUaConfig::new("opc.tcp://plc:4840"),
            PoolConfig {
                retry_max,
                retry_delay: Duration::from_secs(5),
            },
            Arc::new(factory.clone()),
            Arc::new(NoopMetrics),
        )
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_acquire_is_idempotent_while_live() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();

        assert!(first.same_session(&second));
        assert_eq!(MockState::count(&factory.state.connects), 1);
        assert_eq!(MockState::count(&factory.state.sessions), 1);
        assert_eq!(pool.state(), PoolState::Live);
        assert!(pool.status().last_connected_at.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_acquire_connects_once() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.acquire().await.map(|h| h.generation()) })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 1);
        }
        assert_eq!(MockState::count(&factory.state.connects), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_counter_resets_after_cooldown() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(2, Ordering::SeqCst);
        let pool = pool_with(&factory, 2);

        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.retry_count(), 1);
        assert_eq!(pool.state(), PoolState::Backoff);

        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.retry_count(), 2);

        let started = Instant::now();
        let handle = pool.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(pool.retry_count(), 0);
        assert_eq!(handle.generation(), 3);
        assert_eq!(MockState::count(&factory.state.connects), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_keeps_cooldown() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        let pool = pool_with(&factory, 1);
        let started = Instant::now();
        assert!(pool.acquire().await.is_err());

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert_eq!(pool.retry_count(), 1);

        pool.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert_eq!(pool.retry_count(), 0);
        assert_eq!(MockState::count(&factory.state.connects), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_during_cooldown_skips_connect() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        let pool = pool_with(&factory, 1);
        assert!(pool.acquire().await.is_err());

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        pool.close_all().await;

        assert!(matches!(
            waiter.await.unwrap(),
            Err(OpcUaError::Connection(ConnectionError::PoolClosed))
        ));
        assert_eq!(MockState::count(&factory.state.connects), 1);
        assert_eq!(pool.state(), PoolState::Empty);
    }

    #[tokio::test]
    async fn test_failed_connect_disconnects_transport() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        let pool = pool_with(&factory, 5);

        let err = pool.acquire().await.unwrap_err();
        assert!(err.to_string().contains("attempt 1/5"));
        assert_eq!(MockState::count(&factory.state.disconnects), 1);
        assert!(!pool.is_live());
    }

    #[tokio::test]
    async fn test_connection_lost_recovers() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);
        let first = pool.acquire().await.unwrap();

        factory.state.emit_latest(ConnectionEvent::ConnectionLost);
        let state = Arc::clone(&factory.state);
        let watched = pool.clone();
        wait_until(move || {
            MockState::count(&state.connects) == 2
                && watched.is_live()
                && !watched.status().reconnecting
        })
        .await;

        let second = pool.acquire().await.unwrap();
        assert!(!first.same_session(&second));
        assert_eq!(second.generation(), 2);
        assert_eq!(MockState::count(&factory.state.closes), 1);
        assert_eq!(MockState::count(&factory.state.connects), 2);
    }

    #[tokio::test]
    async fn test_invalidate_ignores_replaced_handle() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);
        let first = pool.acquire().await.unwrap();

        pool.invalidate(&first).await;
        assert_eq!(pool.state(), PoolState::Empty);
        let second = pool.acquire().await.unwrap();

        // A late invalidate for the old generation leaves the new one alone.
        pool.invalidate(&first).await;
        assert!(pool.is_live());
        assert_eq!(second.generation(), 2);
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);
        pool.acquire().await.unwrap();

        pool.close_all().await;
        pool.close_all().await;

        assert_eq!(pool.state(), PoolState::Empty);
        assert_eq!(MockState::count(&factory.state.closes), 1);
        assert!(matches!(
            pool.acquire().await,
            Err(OpcUaError::Connection(ConnectionError::PoolClosed))
        ));
    }

    #[tokio::test]
    async fn test_unpooled_handle_leaves_pool_untouched() {
        let factory = MockFactory::default();
        let pool = pool_with(&factory, 5);

        let handle = pool.open_unpooled().await.unwrap();
        assert_eq!(handle.generation(), 0);
        assert_eq!(pool.state(), PoolState::Empty);
        handle.close().await;
        assert_eq!(MockState::count(&factory.state.disconnects), 1);
    }

    #[tokio::test]
    async fn test_failed_unpooled_open_disconnects_transport() {
        let factory = MockFactory::default();
        factory.state.fail_connects.store(1, Ordering::SeqCst);
        let pool = pool_with(&factory, 5);

        assert!(pool.open_unpooled().await.is_err());
        assert_eq!(MockState::count(&factory.state.disconnects), 1);
        assert_eq!(pool.state(), PoolState::Empty);
    }
}
