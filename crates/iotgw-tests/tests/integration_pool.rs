// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Session Pool Integration Tests
//!
//! - `test_pool_acquire_*`: idempotent and single-flight acquisition
//! - `test_pool_retry_*`: retry budget and cooldown
//! - `test_pool_connection_*`: out-of-band loss and recovery
//! - `test_pool_close_*`: shutdown

use std::time::Duration;

use iotgw_opcua::{ConnectionError, ConnectionEvent, OpcUaError, PoolState};
use iotgw_tests::prelude::*;

// =============================================================================
// Acquisition
// =============================================================================

#[tokio::test]
async fn test_pool_acquire_is_idempotent() {
    init_test_logging();
    let server = MockServer::new();
    let gateway = TestGateway::new(&server);

    let first = gateway.pool.acquire().await.unwrap();
    let second = gateway.pool.acquire().await.unwrap();

    assert!(first.same_session(&second));
    assert_eq!(server.transports(), 1);
    assert_eq!(server.connects(), 1);
    assert_eq!(server.sessions(), 1);
    assert_eq!(gateway.metrics.opcua().opcua_connections, 1);
}

#[tokio::test]
async fn test_pool_acquire_single_flight_under_contention() {
    let server = MockServer::new();
    server.set_connect_delay(Duration::from_millis(50));
    let gateway = TestGateway::new(&server);

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = gateway.pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|h| h.generation()) })
        })
        .collect();

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 1);
    }
    assert_eq!(server.connects(), 1);
    assert_eq!(server.sessions(), 1);
}

// =============================================================================
// Retry budget
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pool_retry_budget_then_cooldown_resets() {
    let server = MockServer::new();
    server.fail_next_connects(3);
    let gateway = TestGateway::new(&server);
    let pool = &gateway.pool;

    for expected in 1..=3 {
        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.retry_count(), expected);
        assert_eq!(pool.state(), PoolState::Backoff);
    }
    assert_eq!(server.disconnects(), 3);

    let started = tokio::time::Instant::now();
    let handle = pool.acquire().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(pool.retry_count(), 0);
    assert!(pool.is_live());
    assert_eq!(handle.generation(), 4);
    assert_eq!(gateway.metrics.opcua().opcua_errors, 3);
}

#[tokio::test]
async fn test_pool_retry_counter_never_exceeds_max() {
    let server = MockServer::new();
    server.fail_next_connects(usize::MAX);
    let gateway = TestGateway::new(&server);

    for _ in 0..5 {
        let _ = gateway.pool.acquire().await;
        assert!(gateway.pool.retry_count() <= gateway.config.connection.retry_max);
    }
    let status = gateway.pool.status();
    assert!(!status.live);
    assert_eq!(status.max_retries, 3);
}

#[tokio::test(start_paused = true)]
async fn test_pool_retry_cancelled_wait_keeps_cooldown() {
    let server = MockServer::new();
    server.fail_next_connects(3);
    let gateway = TestGateway::new(&server);
    let started = tokio::time::Instant::now();
    for _ in 0..3 {
        assert!(gateway.pool.acquire().await.is_err());
    }

    let waiter = {
        let pool = gateway.pool.clone();
        tokio::spawn(async move { pool.acquire().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    waiter.abort();
    let _ = waiter.await;
    assert_eq!(gateway.pool.retry_count(), 3);

    gateway.pool.acquire().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(server.connects(), 4);
}

// =============================================================================
// Connection loss
// =============================================================================

#[tokio::test]
async fn test_pool_connection_lost_recovers_once() {
    let server = MockServer::new();
    let gateway = TestGateway::new(&server);
    let first = gateway.pool.acquire().await.unwrap();

    // Duplicate loss signals must start only one recovery.
    server.emit(ConnectionEvent::ConnectionLost);
    server.emit(ConnectionEvent::ConnectionLost);

    let watched = gateway.pool.clone();
    let counted = server.clone();
    wait_until(move || {
        counted.connects() == 2 && watched.is_live() && !watched.status().reconnecting
    })
    .await;

    let second = gateway.pool.acquire().await.unwrap();
    assert!(!first.same_session(&second));
    assert_eq!(second.generation(), 2);
    assert_eq!(server.session_closes(), 1);
    assert_eq!(server.connects(), 2);
    assert_eq!(gateway.metrics.opcua().opcua_reconnects, 1);
}

#[tokio::test]
async fn test_pool_connection_lost_failed_reconnect_enters_backoff() {
    let server = MockServer::new();
    let gateway = TestGateway::new(&server);
    gateway.pool.acquire().await.unwrap();

    server.set_connect_delay(Duration::from_millis(50));
    server.fail_next_connects(1);
    server.emit(ConnectionEvent::ConnectionLost);

    let watched = gateway.pool.clone();
    wait_until(move || watched.state() == PoolState::Reconnecting).await;
    assert!(!gateway.pool.is_live());

    let watched = gateway.pool.clone();
    wait_until(move || {
        watched.state() == PoolState::Backoff && !watched.status().reconnecting
    })
    .await;

    let status = gateway.pool.status();
    assert!(!status.live);
    assert_eq!(status.retry_count, 1);
    assert_eq!(server.connects(), 2);
    // The lost transport and the failed replacement.
    assert_eq!(server.disconnects(), 2);
    assert_eq!(server.session_closes(), 1);
    assert_eq!(gateway.metrics.opcua().opcua_reconnects, 1);

    // The next caller gets a fresh session within budget.
    let handle = gateway.pool.acquire().await.unwrap();
    assert_eq!(handle.generation(), 3);
    assert_eq!(gateway.pool.retry_count(), 0);
}

#[tokio::test]
async fn test_pool_connection_restored_clears_retry_count() {
    let server = MockServer::new();
    let gateway = TestGateway::new(&server);
    gateway.pool.acquire().await.unwrap();

    server.emit(ConnectionEvent::BackoffAttempt {
        retry: 1,
        delay: Duration::from_millis(10),
    });
    server.emit(ConnectionEvent::ConnectionRestored);
    server.emit(ConnectionEvent::Keepalive);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(gateway.pool.is_live());
    assert_eq!(gateway.pool.retry_count(), 0);
    assert_eq!(server.connects(), 1);
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test]
async fn test_pool_close_all_rejects_later_acquisitions() {
    let server = MockServer::new();
    let gateway = TestGateway::new(&server);
    gateway.pool.acquire().await.unwrap();

    gateway.pool.close_all().await;
    gateway.pool.close_all().await;

    assert_eq!(gateway.pool.state(), PoolState::Empty);
    assert_eq!(server.session_closes(), 1);
    assert!(matches!(
        gateway.pool.acquire().await,
        Err(OpcUaError::Connection(ConnectionError::PoolClosed))
    ));
}
