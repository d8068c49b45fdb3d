// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API request handlers.

pub mod config;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod opcua;

pub use config::effective_config;
pub use health::health;
