// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP middleware.

pub mod auth;
pub mod metrics;
pub mod rate_limit;

pub use auth::{authenticate, AuthLayer, AuthOutcome, API_KEY_HEADER};
pub use metrics::MetricsLayer;
pub use rate_limit::{RateLimitLayer, RateLimitResult, RateLimiterState};
