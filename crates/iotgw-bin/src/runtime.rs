// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Gateway runtime orchestration.
//!
//! Startup order:
//!
//! 1. Metrics collector and system sampler
//! 2. Session pool over the transport factory
//! 3. HTTP server
//! 4. Pool warm-up (failure is only a warning)
//! 5. SNMP agent, when enabled
//!
//! Shutdown runs in reverse: HTTP server, SNMP agent, then every session.

use std::sync::Arc;
use std::time::Duration;

use iotgw_api::{ApiServer, AppState};
use iotgw_config::GatewayConfig;
use iotgw_core::MetricsCollector;
use iotgw_opcua::{OpcUaConfig, SessionPool, TransportFactory};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// How long in-flight HTTP requests may take to drain on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// GatewayRuntime
// =============================================================================

/// The running gateway: owns the configuration, the transport factory and
/// the shutdown coordinator.
pub struct GatewayRuntime {
    config: Arc<GatewayConfig>,
    opcua: OpcUaConfig,
    factory: Arc<dyn TransportFactory>,
    shutdown: ShutdownCoordinator,
    skip_warmup: bool,
}

impl GatewayRuntime {
    /// Coordinator that stops this runtime.
    pub fn shutdown_coordinator(&self) -> ShutdownCoordinator {
        self.shutdown.clone()
    }

    /// Configuration the runtime was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Binds the configured address and runs until shutdown.
    pub async fn run(self) -> BinResult<()> {
        let addr = self.config.server.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            BinError::init(format!("Failed to bind {addr}: {e}")).with_context("starting HTTP server")
        })?;
        self.run_on(listener).await
    }

    /// Runs on an already bound listener until shutdown.
    pub async fn run_on(self, listener: TcpListener) -> BinResult<()> {
        info!(
            version = iotgw_core::VERSION,
            endpoint = %self.config.masked_endpoint(),
            transport = self.factory.name(),
            "Starting iotgw gateway"
        );

        let metrics = MetricsCollector::shared();
        let sampler = metrics.start_system_refresh(self.config.snmp.refresh_interval);

        let pool = SessionPool::new(
            self.opcua.clone(),
            self.config.pool_config(),
            self.factory.clone(),
            metrics.clone(),
        );

        let state = AppState::new(self.config.as_ref().clone(), pool.clone(), metrics.clone());
        let server = ApiServer::new(state);
        let mut server_task = tokio::spawn(server.serve(listener, self.shutdown.shutdown_signal()));

        if !self.skip_warmup && pool.warmup().await {
            info!("OPC UA session established");
        }

        let snmp = SnmpService::start(&self.config, &metrics).await;

        info!("iotgw gateway is ready");

        let early_exit = tokio::select! {
            _ = self.shutdown.wait_for_shutdown() => None,
            joined = &mut server_task => Some(joined),
        };

        info!("Shutting down");
        self.shutdown.initiate_shutdown();

        let result = match early_exit {
            Some(joined) => flatten(joined),
            None => match tokio::time::timeout(DRAIN_TIMEOUT, &mut server_task).await {
                Ok(joined) => flatten(joined),
                Err(_) => {
                    warn!(timeout = ?DRAIN_TIMEOUT, "HTTP server did not drain in time");
                    server_task.abort();
                    Ok(())
                }
            },
        };

        snmp.stop();
        pool.close_all().await;
        sampler.abort();

        if let Err(e) = &result {
            error!(error = %e, "HTTP server stopped with an error");
        }
        info!("iotgw gateway shutdown complete");
        result
    }
}

fn flatten(
    joined: Result<iotgw_api::ApiResult<()>, tokio::task::JoinError>,
) -> BinResult<()> {
    match joined {
        Ok(result) => result.map_err(BinError::from),
        Err(e) => Err(BinError::runtime(format!("HTTP server task failed: {e}"))),
    }
}

// =============================================================================
// SNMP
// =============================================================================

/// The SNMP agent, when built in and enabled.
struct SnmpService {
    #[cfg(feature = "snmp-agent")]
    agent: Option<iotgw_core::SnmpAgent>,
}

impl SnmpService {
    #[cfg(feature = "snmp-agent")]
    async fn start(config: &GatewayConfig, metrics: &Arc<MetricsCollector>) -> Self {
        if !config.snmp.enabled {
            return Self { agent: None };
        }

        let addr = std::net::SocketAddr::new(config.server.bind_address, config.snmp.port);
        let table = iotgw_core::OidTable::new(metrics.clone());
        match iotgw_core::SnmpAgent::start(addr, &config.snmp.community, table).await {
            Ok(agent) => Self { agent: Some(agent) },
            Err(e) => {
                error!(error = %e, "Failed to start SNMP agent; continuing without it");
                Self { agent: None }
            }
        }
    }

    #[cfg(not(feature = "snmp-agent"))]
    async fn start(config: &GatewayConfig, _metrics: &Arc<MetricsCollector>) -> Self {
        if config.snmp.enabled {
            warn!("SNMP is enabled but this build lacks the `snmp-agent` feature");
        }
        Self {}
    }

    fn stop(self) {
        #[cfg(feature = "snmp-agent")]
        {
            if let Some(agent) = self.agent {
                agent.stop();
            }
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`GatewayRuntime`].
pub struct RuntimeBuilder {
    config: Option<GatewayConfig>,
    factory: Option<Arc<dyn TransportFactory>>,
    skip_warmup: bool,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self {
            config: None,
            factory: None,
            skip_warmup: false,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `factory` instead of the built-in OPC UA transport.
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Skips connecting before the first request.
    pub fn skip_warmup(mut self, skip: bool) -> Self {
        self.skip_warmup = skip;
        self
    }

    /// Validates the configuration and resolves the transport.
    pub fn build(self) -> BinResult<GatewayRuntime> {
        let config = self
            .config
            .ok_or_else(|| BinError::config("No configuration provided"))?;
        config.validate()?;
        let opcua = config.opcua_config()?;

        let factory = match self.factory {
            Some(factory) => factory,
            None => default_transport(&opcua)?,
        };

        Ok(GatewayRuntime {
            config: Arc::new(config),
            opcua,
            factory,
            shutdown: ShutdownCoordinator::new(),
            skip_warmup: self.skip_warmup,
        })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "real-transport")]
fn default_transport(opcua: &OpcUaConfig) -> BinResult<Arc<dyn TransportFactory>> {
    Ok(Arc::new(iotgw_opcua::RealTransportFactory::new(opcua.clone())))
}

#[cfg(not(feature = "real-transport"))]
fn default_transport(_opcua: &OpcUaConfig) -> BinResult<Arc<dyn TransportFactory>> {
    Err(BinError::config(
        "no OPC UA transport available: rebuild with `--features real-transport`",
    ))
}

// =============================================================================
// Tests
// =============================================================================
