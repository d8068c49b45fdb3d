// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Transport backed by the `opcua` crate client.
//!
//! The `opcua` 0.12 client API is blocking, so every call into it runs on
//! the blocking pool. Connect retries follow the configured
//! [`ConnectionStrategy`](crate::types::ConnectionStrategy) and announce
//! each retry as [`ConnectionEvent::BackoffAttempt`]. The session's
//! connection status callback feeds `ConnectionLost` / `ConnectionRestored`
//! into the same event channel. While connected, a keepalive task reads the
//! server state every `keepalive_interval` and emits `Keepalive`, or
//! `ConnectionLost` once a read fails.
//!
//! # Example
//!
//! ```rust,ignore
//! use iotgw_opcua::client::RealTransportFactory;
//! use iotgw_opcua::types::OpcUaConfig;
//!
//! let factory = RealTransportFactory::new(OpcUaConfig::new("opc.tcp://plc:4840"));
//! let pool = SessionPool::new(opcua, pool_config, Arc::new(factory), metrics);
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::client::transport::{
    ConnectionEvent, OpcUaSession, OpcUaTransport, ReadOutcome, TransportFactory,
};
use crate::error::{
    ConnectionError, ConversionError, OpcUaError, OpcUaResult, OperationError, SessionError,
};
use crate::status::StatusCode as GwStatusCode;
use crate::types::{
    mask_endpoint, NodeId, NodeIdentifier, OpcUaConfig, SecurityMode, SecurityPolicy as GwPolicy,
};
use crate::value::OpcUaValue;

type SharedSession = Arc<OpcUaRwLock<Session>>;

const EVENT_CAPACITY: usize = 32;

/// `Server_ServerStatus_State`, namespace 0.
const SERVER_STATE_NODE: u32 = 2259;

// =============================================================================
// RealTransportFactory
// =============================================================================

/// Builds [`RealOpcUaTransport`]s from a fixed configuration.
#[derive(Debug, Clone)]
pub struct RealTransportFactory {
    config: Arc<OpcUaConfig>,
}

impl RealTransportFactory {
    /// Creates a factory for `config`.
    pub fn new(config: OpcUaConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl TransportFactory for RealTransportFactory {
    fn create(&self) -> OpcUaResult<Arc<dyn OpcUaTransport>> {
        Ok(Arc::new(RealOpcUaTransport::new(Arc::clone(&self.config))))
    }

    fn name(&self) -> &str {
        "opcua-0.12"
    }
}

// =============================================================================
// RealOpcUaTransport
// =============================================================================

/// One `opcua` client connection.
pub struct RealOpcUaTransport {
    config: Arc<OpcUaConfig>,
    session: RwLock<Option<SharedSession>>,
    events: broadcast::Sender<ConnectionEvent>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl RealOpcUaTransport {
    /// Creates an unconnected transport.
    pub fn new(config: Arc<OpcUaConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            session: RwLock::new(None),
            events,
            keepalive: Mutex::new(None),
        }
    }

    fn start_keepalive(&self, session: SharedSession) {
        let Some(period) = keepalive_period(&self.config) else {
            debug!("OPC UA keepalive disabled");
            return;
        };
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let polled = Arc::clone(&session);
                let alive = tokio::task::spawn_blocking(move || read_server_state(&polled))
                    .await
                    .unwrap_or(false);
                if alive {
                    let _ = events.send(ConnectionEvent::Keepalive);
                } else {
                    warn!("OPC UA keepalive read failed");
                    let _ = events.send(ConnectionEvent::ConnectionLost);
                    break;
                }
            }
        });
        if let Some(previous) = self.keepalive.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_keepalive(&self) {
        if let Some(task) = self.keepalive.lock().take() {
            task.abort();
        }
    }

    async fn connect_once(&self, endpoint: &str) -> OpcUaResult<SharedSession> {
        let config = Arc::clone(&self.config);
        let endpoint = endpoint.to_string();
        let events = self.events.clone();

        tokio::task::spawn_blocking(move || open_session(&config, &endpoint, events))
            .await
            .map_err(|e| {
                OpcUaError::connection(ConnectionError::refused(
                    &self.config.endpoint,
                    format!("connect task failed: {e}"),
                ))
            })?
    }

    fn current(&self) -> OpcUaResult<SharedSession> {
        self.session
            .read()
            .clone()
            .ok_or_else(|| OpcUaError::connection(ConnectionError::NotConnected))
    }
}

#[async_trait]
impl OpcUaTransport for RealOpcUaTransport {
    async fn connect(&self, endpoint: &str) -> OpcUaResult<()> {
        let strategy = &self.config.strategy;
        let mut attempt = 0u32;

        loop {
            match self.connect_once(endpoint).await {
                Ok(session) => {
                    self.start_keepalive(Arc::clone(&session));
                    *self.session.write() = Some(session);
                    info!(endpoint = %mask_endpoint(endpoint), "Connected to OPC UA server");
                    return Ok(());
                }
                Err(e) if e.is_retryable() && attempt < strategy.max_retry => {
                    let delay = strategy.delay_for_attempt(attempt);
                    attempt += 1;
                    let _ = self.events.send(ConnectionEvent::BackoffAttempt {
                        retry: attempt,
                        delay,
                    });
                    debug!(endpoint = %mask_endpoint(endpoint), error = %e, retry = attempt, "Connect attempt failed");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.stop_keepalive();
        let Some(session) = self.session.write().take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || {
            let session = session.read();
            if session.is_connected() {
                session.disconnect();
            }
        })
        .await
        .map_err(|_| OpcUaError::connection(ConnectionError::Closed))?;
        info!(endpoint = %self.config.display_endpoint(), "Disconnected from OPC UA server");
        Ok(())
    }

    async fn create_session(&self) -> OpcUaResult<Arc<dyn OpcUaSession>> {
        // connect_to_endpoint already created and activated the session.
        let session = self
            .current()
            .map_err(|e| OpcUaError::session(SessionError::create_failed(e.to_string())))?;
        Ok(Arc::new(RealOpcUaSession { session }))
    }

    fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }
}

impl Drop for RealOpcUaTransport {
    fn drop(&mut self) {
        self.stop_keepalive();
    }
}

/// Keepalive period, or `None` when the interval is zero.
fn keepalive_period(config: &OpcUaConfig) -> Option<Duration> {
    Some(config.keepalive_interval).filter(|d| !d.is_zero())
}

/// Blocking read of the server state variable; `true` if it came back good.
fn read_server_state(session: &SharedSession) -> bool {
    let request = ReadValueId {
        node_id: opcua::types::NodeId::new(0, SERVER_STATE_NODE),
        attribute_id: AttributeId::Value as u32,
        index_range: UAString::null(),
        data_encoding: QualifiedName::null(),
    };
    match session.read().read(&[request], TimestampsToReturn::Neither, 0.0) {
        Ok(values) => values
            .first()
            .is_some_and(|v| v.status.map_or(true, |s| s.is_good())),
        Err(status) => {
            trace!(status = %status, "Server state read failed");
            false
        }
    }
}

/// Blocking connect: endpoint discovery, then session creation.
fn open_session(
    config: &OpcUaConfig,
    endpoint: &str,
    events: broadcast::Sender<ConnectionEvent>,
) -> OpcUaResult<SharedSession> {
    let mut client = build_client(config)?;

    let endpoints = client
        .get_server_endpoints_from_url(endpoint)
        .map_err(|status| {
            OpcUaError::connection(ConnectionError::refused(endpoint, status.to_string()))
        })?;

    let policy = to_opcua_policy(config.security_policy);
    let mode = to_message_security_mode(config.security_mode);
    let description = endpoints
        .into_iter()
        .find(|e| e.security_policy_uri.as_ref() == policy.to_uri() && e.security_mode == mode)
        .ok_or_else(|| {
            OpcUaError::connection(ConnectionError::no_suitable_endpoint(format!(
                "{}/{}",
                config.security_policy, config.security_mode
            )))
        })?;

    debug!(
        security_policy = %description.security_policy_uri,
        security_mode = ?description.security_mode,
        "Found matching endpoint"
    );

    let session = client
        .connect_to_endpoint(description, IdentityToken::Anonymous)
        .map_err(|status| {
            OpcUaError::connection(ConnectionError::refused(endpoint, status.to_string()))
        })?;

    session
        .write()
        .set_connection_status_callback(ConnectionStatusCallback::new(move |connected| {
            let event = if connected {
                ConnectionEvent::ConnectionRestored
            } else {
                ConnectionEvent::ConnectionLost
            };
            let _ = events.send(event);
        }));

    Ok(session)
}

fn build_client(config: &OpcUaConfig) -> OpcUaResult<Client> {
    let mut builder = ClientBuilder::new()
        .application_name(config.application_name.as_str())
        .application_uri(config.application_uri.as_str())
        .session_retry_limit(0)
        .session_timeout(u32::try_from(config.session_timeout.as_millis()).unwrap_or(u32::MAX));

    if config.uses_security() {
        if let Some(pki) = config.trusted_folder.as_ref().and_then(|p| p.parent()) {
            builder = builder.pki_dir(pki);
        }
        if let Some(cert) = &config.certificate_file {
            builder = builder.certificate_path(cert);
        }
        if let Some(key) = &config.private_key_file {
            builder = builder.private_key_path(key);
        }
        builder = builder.create_sample_keypair(config.certificate_file.is_none());
    } else {
        builder = builder.trust_server_certs(true);
    }

    builder.client().ok_or_else(|| {
        OpcUaError::connection(ConnectionError::refused(
            &config.endpoint,
            "invalid client configuration",
        ))
    })
}

fn to_opcua_policy(policy: GwPolicy) -> SecurityPolicy {
    match policy {
        GwPolicy::None => SecurityPolicy::None,
        GwPolicy::Basic128Rsa15 => SecurityPolicy::Basic128Rsa15,
        GwPolicy::Basic256 => SecurityPolicy::Basic256,
        GwPolicy::Basic256Sha256 => SecurityPolicy::Basic256Sha256,
        GwPolicy::Aes128Sha256RsaOaep => SecurityPolicy::Aes128Sha256RsaOaep,
        GwPolicy::Aes256Sha256RsaPss => SecurityPolicy::Aes256Sha256RsaPss,
    }
}

fn to_message_security_mode(mode: SecurityMode) -> MessageSecurityMode {
    match mode {
        SecurityMode::None => MessageSecurityMode::None,
        SecurityMode::Sign => MessageSecurityMode::Sign,
        SecurityMode::SignAndEncrypt => MessageSecurityMode::SignAndEncrypt,
    }
}

// =============================================================================
// RealOpcUaSession
// =============================================================================

struct RealOpcUaSession {
    session: SharedSession,
}

#[async_trait]
impl OpcUaSession for RealOpcUaSession {
    async fn read(&self, node_id: &NodeId) -> OpcUaResult<ReadOutcome> {
        let session = Arc::clone(&self.session);
        let target = to_opcua_node_id(node_id);
        let name = node_id.to_string();
        trace!(node_id = %name, "Reading node value");

        let values = tokio::task::spawn_blocking(move || {
            let request = ReadValueId {
                node_id: target,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                data_encoding: QualifiedName::null(),
            };
            session.read().read(&[request], TimestampsToReturn::Both, 0.0)
        })
        .await
        .map_err(|e| OpcUaError::operation(OperationError::read_failed(&name, e.to_string())))?
        .map_err(|status| OpcUaError::operation(OperationError::read_failed(&name, status.to_string())))?;

        let Some(data_value) = values.into_iter().next() else {
            return Ok(ReadOutcome::status_only(GwStatusCode::BAD));
        };

        let status = GwStatusCode::new(data_value.status.map(|s| s.bits()).unwrap_or(0));
        Ok(ReadOutcome {
            status,
            value: data_value.value.as_ref().map(from_variant),
            source_timestamp: data_value.source_timestamp.map(|t| t.as_chrono()),
            server_timestamp: data_value.server_timestamp.map(|t| t.as_chrono()),
        })
    }

    async fn write(&self, node_id: &NodeId, value: OpcUaValue) -> OpcUaResult<GwStatusCode> {
        let session = Arc::clone(&self.session);
        let target = to_opcua_node_id(node_id);
        let variant = to_variant(&value)?;
        let name = node_id.to_string();
        trace!(node_id = %name, "Writing node value");

        let results = tokio::task::spawn_blocking(move || {
            let request = WriteValue {
                node_id: target,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::new_now(variant),
            };
            session.read().write(&[request])
        })
        .await
        .map_err(|e| OpcUaError::operation(OperationError::write_failed(&name, e.to_string())))?
        .map_err(|status| OpcUaError::operation(OperationError::write_failed(&name, status.to_string())))?;

        Ok(results
            .first()
            .map(|s| GwStatusCode::new(s.bits()))
            .unwrap_or(GwStatusCode::BAD))
    }

    async fn close(&self) -> OpcUaResult<()> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || {
            let session = session.read();
            if session.is_connected() {
                session.disconnect();
            }
        })
        .await
        .map_err(|_| OpcUaError::session(SessionError::Closed))
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_opcua_node_id(node_id: &NodeId) -> opcua::types::NodeId {
    let ns = node_id.namespace_index;
    match &node_id.identifier {
        NodeIdentifier::Numeric(v) => opcua::types::NodeId::new(ns, *v),
        NodeIdentifier::String(v) => opcua::types::NodeId::new(ns, v.clone()),
        NodeIdentifier::Guid(v) => opcua::types::NodeId::new(ns, opcua::types::Guid::from(*v)),
        NodeIdentifier::Opaque(v) => {
            opcua::types::NodeId::new(ns, opcua::types::ByteString::from(v.as_slice()))
        }
    }
}

fn from_variant(variant: &Variant) -> OpcUaValue {
    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => OpcUaValue::DateTime(v.as_chrono()),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::Array(array) => OpcUaValue::Array(array.values.iter().map(from_variant).collect()),
        other => OpcUaValue::String(format!("{other:?}")),
    }
}

fn to_variant(value: &OpcUaValue) -> OpcUaResult<Variant> {
    Ok(match value {
        OpcUaValue::Null => Variant::Empty,
        OpcUaValue::Boolean(v) => Variant::Boolean(*v),
        OpcUaValue::SByte(v) => Variant::SByte(*v),
        OpcUaValue::Byte(v) => Variant::Byte(*v),
        OpcUaValue::Int16(v) => Variant::Int16(*v),
        OpcUaValue::UInt16(v) => Variant::UInt16(*v),
        OpcUaValue::Int32(v) => Variant::Int32(*v),
        OpcUaValue::UInt32(v) => Variant::UInt32(*v),
        OpcUaValue::Int64(v) => Variant::Int64(*v),
        OpcUaValue::UInt64(v) => Variant::UInt64(*v),
        OpcUaValue::Float(v) => Variant::Float(*v),
        OpcUaValue::Double(v) => Variant::Double(*v),
        OpcUaValue::String(v) => Variant::String(UAString::from(v.as_str())),
        OpcUaValue::DateTime(v) => Variant::DateTime(Box::new(opcua::types::DateTime::from(*v))),
        OpcUaValue::ByteString(v) => Variant::ByteString(opcua::types::ByteString::from(v.as_slice())),
        OpcUaValue::Array(items) => {
            let variants = items.iter().map(to_variant).collect::<OpcUaResult<Vec<_>>>()?;
            let array = opcua::types::Array::new(VariantTypeId::Variant, variants).map_err(|_| {
                OpcUaError::conversion(ConversionError::not_a_number("Array"))
            })?;
            Variant::Array(Box::new(array))
        }
    })
}

impl std::fmt::Debug for RealOpcUaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealOpcUaTransport")
            .field("endpoint", &self.config.display_endpoint())
            .field("connected", &self.session.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_conversion_keeps_type() {
        let value = OpcUaValue::UInt16(42);
        let variant = to_variant(&value).unwrap();
        assert_eq!(from_variant(&variant), value);
    }

    #[test]
    fn test_policy_mapping() {
        assert_eq!(to_opcua_policy(GwPolicy::Basic256Sha256), SecurityPolicy::Basic256Sha256);
        assert_eq!(
            to_message_security_mode(SecurityMode::SignAndEncrypt),
            MessageSecurityMode::SignAndEncrypt
        );
    }

    #[test]
    fn test_keepalive_period_zero_disables() {
        let mut config = OpcUaConfig::default();
        assert_eq!(keepalive_period(&config), Some(Duration::from_secs(10)));

        config.keepalive_interval = Duration::ZERO;
        assert_eq!(keepalive_period(&config), None);
    }

    #[tokio::test]
    async fn test_unconnected_transport_has_no_session() {
        let transport = RealOpcUaTransport::new(Arc::new(OpcUaConfig::default()));
        assert!(transport.create_session().await.is_err());
        assert!(transport.disconnect().await.is_ok());
    }
}
