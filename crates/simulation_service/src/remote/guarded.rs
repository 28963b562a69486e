//! Timeout and circuit breaker decorator for remote transports.

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerState};
use super::RemoteTransport;
use crate::config::RemoteSettings;
use crate::error::SimulationError;
use async_trait::async_trait;
use dashmap::DashMap;
use grid_types::{
    AgentCircuitData, AgentData, AgentId, EntityTransferContext, GridRegion, ObjectHandoff,
    RegionId, TeleportFlags, Vector3,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Wraps a [`RemoteTransport`] with a per-call timeout and one circuit
/// breaker per remote endpoint.
///
/// Endpoints are keyed by the destination's server URI (the release URI for
/// `release_agent`). Only transport-level failures count against an
/// endpoint: timeouts and [`SimulationError::Remote`] results. A destination
/// refusing admission is a healthy endpoint.
///
/// Closed breakers left idle for `endpoint_idle` are dropped whenever a new
/// endpoint is first seen, so the map tracks the endpoints in recent use.
/// Open and half-open breakers are kept until they recover.
pub struct GuardedTransport {
    inner: Arc<dyn RemoteTransport>,
    settings: RemoteSettings,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl GuardedTransport {
    pub fn new(inner: Arc<dyn RemoteTransport>, settings: RemoteSettings) -> Self {
        Self {
            inner,
            settings,
            breakers: DashMap::new(),
        }
    }

    /// Current breaker state for an endpoint, if it has been called.
    pub async fn endpoint_state(&self, endpoint: &str) -> Option<CircuitBreakerState> {
        let breaker = self.breakers.get(endpoint).map(|b| b.value().clone())?;
        Some(breaker.state().await)
    }

    /// Number of endpoints with a breaker.
    pub fn tracked_endpoints(&self) -> usize {
        self.breakers.len()
    }

    /// Forgets closed breakers that have been idle for the configured
    /// period. Returns how many were dropped.
    pub fn prune_idle_endpoints(&self) -> usize {
        let idle = self.settings.endpoint_idle();
        let before = self.breakers.len();
        self.breakers
            .retain(|_, breaker| Arc::strong_count(breaker) > 1 || !breaker.is_idle(idle));
        let pruned = before.saturating_sub(self.breakers.len());
        if pruned > 0 {
            debug!("🧹 Dropped {} idle remote endpoints", pruned);
        }
        pruned
    }

    fn breaker(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(endpoint) {
            return breaker.value().clone();
        }

        self.prune_idle_endpoints();
        self.breakers
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(endpoint, self.settings.circuit_breaker.clone()))
            })
            .clone()
    }

    /// Runs one call under the endpoint's breaker and the call timeout.
    ///
    /// Returns the call's result, or the reason it was not obtained.
    async fn guard<T, F>(
        &self,
        endpoint: &str,
        operation: &'static str,
        call: F,
        healthy: fn(&T) -> bool,
    ) -> Result<T, String>
    where
        F: Future<Output = T> + Send,
        T: Send,
    {
        let breaker = self.breaker(endpoint);
        if !breaker.can_execute().await {
            debug!("⚡ Skipping {} to {}: circuit open", operation, endpoint);
            return Err(format!("{endpoint} is currently unreachable"));
        }

        match tokio::time::timeout(self.settings.timeout(), call).await {
            Ok(result) => {
                if healthy(&result) {
                    breaker.record_success().await;
                } else {
                    breaker.record_failure().await;
                }
                Ok(result)
            }
            Err(_) => {
                breaker.record_failure().await;
                warn!(
                    "⏰ {} to {} timed out after {}ms",
                    operation, endpoint, self.settings.timeout_ms
                );
                Err(format!("{operation} to {endpoint} timed out"))
            }
        }
    }
}

fn transport_healthy(result: &Result<(), SimulationError>) -> bool {
    !matches!(result, Err(SimulationError::Remote(_)))
}

fn always_healthy(_: &bool) -> bool {
    true
}

#[async_trait]
impl RemoteTransport for GuardedTransport {
    async fn create_agent(
        &self,
        source: Option<&GridRegion>,
        destination: &GridRegion,
        circuit: &AgentCircuitData,
        teleport_flags: TeleportFlags,
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        let endpoint = destination.server_uri();
        let call = self.inner.create_agent(source, destination, circuit, teleport_flags, ctx);
        self.guard(&endpoint, "create_agent", call, transport_healthy)
            .await
            .unwrap_or_else(|reason| Err(SimulationError::Remote(reason)))
    }

    async fn update_agent(
        &self,
        destination: &GridRegion,
        data: &AgentData,
        ctx: &EntityTransferContext,
    ) -> bool {
        let endpoint = destination.server_uri();
        let call = self.inner.update_agent(destination, data, ctx);
        self.guard(&endpoint, "update_agent", call, always_healthy)
            .await
            .unwrap_or(false)
    }

    async fn query_access(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        agent_home_uri: &str,
        via_teleport: bool,
        position: Vector3,
        features: &[Uuid],
        ctx: &EntityTransferContext,
    ) -> Result<(), SimulationError> {
        let endpoint = destination.server_uri();
        let call = self.inner.query_access(
            destination,
            agent_id,
            agent_home_uri,
            via_teleport,
            position,
            features,
            ctx,
        );
        self.guard(&endpoint, "query_access", call, transport_healthy)
            .await
            .unwrap_or_else(|reason| Err(SimulationError::Remote(reason)))
    }

    async fn release_agent(&self, origin_id: RegionId, agent_id: AgentId, uri: &str) -> bool {
        let call = self.inner.release_agent(origin_id, agent_id, uri);
        self.guard(uri, "release_agent", call, always_healthy)
            .await
            .unwrap_or(false)
    }

    async fn close_agent(
        &self,
        destination: &GridRegion,
        agent_id: AgentId,
        auth_token: &str,
    ) -> bool {
        let endpoint = destination.server_uri();
        let call = self.inner.close_agent(destination, agent_id, auth_token);
        self.guard(&endpoint, "close_agent", call, always_healthy)
            .await
            .unwrap_or(false)
    }

    async fn create_object(
        &self,
        destination: &GridRegion,
        position: Vector3,
        object: ObjectHandoff,
    ) -> bool {
        let endpoint = destination.server_uri();
        let call = self.inner.create_object(destination, position, object);
        self.guard(&endpoint, "create_object", call, always_healthy)
            .await
            .unwrap_or(false)
    }
}
