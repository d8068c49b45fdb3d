// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SNMPv2c agent serving the [`OidTable`] over UDP.

use std::net::SocketAddr;
use std::sync::Arc;

use async_snmp::{
    Agent, BoxFuture, GetNextResult, GetResult, MibHandler, Oid, RequestContext, Value, VarBind,
};
use tokio::task::JoinHandle;

use super::{ObjectId, OidTable};
use crate::error::{CoreError, CoreResult};

/// Adapts the gateway table to the agent's handler trait.
struct TableHandler {
    table: OidTable,
}

fn to_object_id(oid: &Oid) -> ObjectId {
    ObjectId::new(oid.arcs().to_vec())
}

fn to_oid(id: &ObjectId) -> Oid {
    Oid::from_slice(id.arcs())
}

impl MibHandler for TableHandler {
    fn get<'a>(&'a self, _ctx: &'a RequestContext, oid: &'a Oid) -> BoxFuture<'a, GetResult> {
        Box::pin(async move {
            match self.table.get(&to_object_id(oid)) {
                Some(value) => GetResult::Value(Value::Integer(value)),
                None => GetResult::NoSuchObject,
            }
        })
    }

    fn get_next<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        oid: &'a Oid,
    ) -> BoxFuture<'a, GetNextResult> {
        Box::pin(async move {
            match self.table.get_next(&to_object_id(oid)) {
                Some((next, value)) => {
                    GetNextResult::Value(VarBind::new(to_oid(&next), Value::Integer(value)))
                }
                None => GetNextResult::EndOfMibView,
            }
        })
    }
}

/// Running SNMP agent.
///
/// Dropping the agent without calling [`SnmpAgent::stop`] leaves the task
/// running until the runtime shuts down.
pub struct SnmpAgent {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl SnmpAgent {
    /// Binds `addr` and starts answering GET/GETNEXT for `community`.
    pub async fn start(addr: SocketAddr, community: &str, table: OidTable) -> CoreResult<Self> {
        table.log_descriptions(addr.port(), community);

        let agent = Agent::builder()
            .bind(addr.to_string())
            .community(community.as_bytes())
            .handler(to_oid(&OidTable::root()), Arc::new(TableHandler { table }))
            .build()
            .await
            .map_err(|e| CoreError::snmp(format!("bind {} failed: {}", addr, e)))?;

        tracing::info!(addr = %addr, "SNMP agent listening");

        let task = tokio::spawn(async move {
            if let Err(e) = agent.run().await {
                tracing::error!(error = %e, "SNMP agent stopped");
            }
        });

        Ok(Self { addr, task })
    }

    /// Bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops the agent.
    pub fn stop(self) {
        self.task.abort();
        tracing::info!(addr = %self.addr, "SNMP agent stopped");
    }
}

impl std::fmt::Debug for SnmpAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnmpAgent").field("addr", &self.addr).finish()
    }
}
