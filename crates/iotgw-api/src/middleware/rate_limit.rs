// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Rate limiting middleware.
//!
//! Fixed window per client IP: at most `max_requests` per `window`. The
//! window starts at a client's first request and resets once it elapses.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use iotgw_config::RateLimitConfig;
use iotgw_core::MetricsSink;
use tower::{Layer, Service};

use crate::error::ApiError;

/// Entries kept before expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

// =============================================================================
// Window
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

// =============================================================================
// Rate Limiter State
// =============================================================================

/// Shared state for the rate limiter.
#[derive(Debug)]
pub struct RateLimiterState {
    config: RateLimitConfig,
    clients: DashMap<IpAddr, Window>,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed,
    /// Request is rate limited.
    Limited {
        /// Seconds until the window resets, at least 1.
        retry_after: u64,
    },
}

impl RateLimiterState {
    /// Creates a new rate limiter state.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: DashMap::new(),
        }
    }

    /// Checks and counts a request from `client`.
    pub fn check(&self, client: IpAddr) -> RateLimitResult {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }

        let window = self.config.window;
        let result = {
            let mut entry = self.clients.entry(client).or_insert(Window {
                started: now,
                count: 0,
            });
            if now.duration_since(entry.started) >= window {
                *entry = Window {
                    started: now,
                    count: 0,
                };
            }

            if entry.count < self.config.max_requests {
                entry.count += 1;
                RateLimitResult::Allowed
            } else {
                let remaining = window.saturating_sub(now.duration_since(entry.started));
                RateLimitResult::Limited {
                    retry_after: ceil_secs(remaining).max(1),
                }
            }
        };

        if self.clients.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }
        result
    }

    /// Drops windows that have elapsed.
    pub fn sweep(&self, now: Instant) {
        let window = self.config.window;
        self.clients
            .retain(|_, w| now.duration_since(w.started) < window);
    }

    /// Number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

// =============================================================================
// RateLimitLayer
// =============================================================================

/// Layer for rate limiting.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimiterState>,
    metrics: Arc<dyn MetricsSink>,
}

impl RateLimitLayer {
    /// Creates a new rate limit layer reporting hits to `metrics`.
    pub fn new(config: RateLimitConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            state: Arc::new(RateLimiterState::new(config)),
            metrics,
        }
    }

    /// Returns the shared state for monitoring.
    pub fn state(&self) -> Arc<RateLimiterState> {
        self.state.clone()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            state: self.state.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

// =============================================================================
// RateLimitMiddleware
// =============================================================================

/// Middleware for rate limiting.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    state: Arc<RateLimiterState>,
    metrics: Arc<dyn MetricsSink>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        // Requests without connection info (in-process callers) share one bucket.
        let client_ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip())
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        let result = self.state.check(client_ip);
        if let RateLimitResult::Limited { .. } = result {
            self.metrics.rate_limited();
        }

        Box::pin(async move {
            match result {
                RateLimitResult::Allowed => inner.call(req).await,
                RateLimitResult::Limited { retry_after } => {
                    tracing::warn!(client_ip = %client_ip, retry_after, "Rate limit exceeded");
                    Ok(ApiError::rate_limit_exceeded(retry_after).into_response())
                }
            }
        })
    }
}
