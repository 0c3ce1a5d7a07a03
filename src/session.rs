//! A single conformance session
//!
//! install → resolve → run → (optional) delete, executed sequentially.
//! Resolution and run failures do not prevent cleanup, and neither does the
//! session timeout; the first error seen is the one returned.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cluster::ClusterQuery;
use crate::config::ConformanceConfig;
use crate::events::EventSink;
use crate::lifecycle::{Actuator, ToolLifecycleManager};
use crate::probe::Probe;
use crate::resolver::EndpointResolver;
use crate::runner::{ConformanceResponse, ConformanceRunner, ToolConnector};
use crate::{Error, Result};

/// What a caller asks a session to do
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRequest {
    /// Identifier attached to every event of the session
    pub operation_id: String,
    /// Mesh under test
    pub mesh_name: String,
    /// Install the tool before running
    pub install: bool,
    /// Delete the tool afterwards, whatever the outcome
    pub cleanup: bool,
}

impl SessionRequest {
    /// Request that installs, runs and leaves the tool in place
    pub fn new(operation_id: impl Into<String>, mesh_name: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            mesh_name: mesh_name.into(),
            install: true,
            cleanup: false,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.operation_id.trim().is_empty() {
            return Err(Error::validation("operation id must not be empty"));
        }
        if self.mesh_name.trim().is_empty() {
            return Err(Error::validation("mesh name must not be empty"));
        }
        Ok(())
    }
}

/// Runs conformance sessions
pub struct ConformanceSession {
    lifecycle: ToolLifecycleManager,
    resolver: EndpointResolver,
    runner: ConformanceRunner,
    timeout: Option<Duration>,
}

impl ConformanceSession {
    /// Assemble a session from its stages
    pub fn new(
        lifecycle: ToolLifecycleManager,
        resolver: EndpointResolver,
        runner: ConformanceRunner,
    ) -> Self {
        Self {
            lifecycle,
            resolver,
            runner,
            timeout: None,
        }
    }

    /// Bound install, resolve and run by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wire up every stage from configuration and collaborators
    pub fn from_config(
        config: &ConformanceConfig,
        cluster: Arc<dyn ClusterQuery>,
        probe: Arc<dyn Probe>,
        actuator: Arc<dyn Actuator>,
        connector: Arc<dyn ToolConnector>,
        events: EventSink,
    ) -> Self {
        let lifecycle = ToolLifecycleManager::new(actuator, events.clone(), config.settle_interval);
        let resolver = EndpointResolver::new(
            cluster,
            probe,
            config.namespace.clone(),
            config.service_name.clone(),
            config.probe_timeout,
        );
        let runner = ConformanceRunner::new(connector, events);
        Self::new(lifecycle, resolver, runner).with_timeout(config.session_timeout)
    }

    /// Lifecycle stage, for callers that install or delete on their own
    pub fn lifecycle(&self) -> &ToolLifecycleManager {
        &self.lifecycle
    }

    /// Resolution stage
    pub fn resolver(&self) -> &EndpointResolver {
        &self.resolver
    }

    /// Run one session
    ///
    /// The session timeout bounds install, resolve and run. Cleanup runs
    /// after it, so an expired session still deletes the tool.
    pub async fn run(&self, request: &SessionRequest) -> Result<ConformanceResponse> {
        request.validate()?;
        let op = request.operation_id.as_str();

        let staged = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.install_and_run(request))
                .await
                .unwrap_or_else(|_| {
                    warn!(operation_id = %op, timeout = ?limit, "Conformance session timed out");
                    Ok(Err(Error::Timeout(limit)))
                }),
            None => self.install_and_run(request).await,
        };
        // A failed install leaves nothing to clean up
        let outcome = staged?;

        if request.cleanup {
            let cleanup = self.lifecycle.delete(op).await;
            if let (Ok(_), Err(e)) = (&outcome, cleanup) {
                return Err(e);
            }
        }

        if outcome.is_ok() {
            info!(operation_id = %op, mesh = %request.mesh_name, "Conformance session finished");
        }
        outcome
    }

    /// Outer error: install failed. Inner: resolve and run outcome.
    async fn install_and_run(
        &self,
        request: &SessionRequest,
    ) -> Result<Result<ConformanceResponse>> {
        let op = request.operation_id.as_str();

        if request.install {
            self.lifecycle.install(op).await?;
        }

        Ok(match self.resolver.resolve().await {
            Ok(endpoint) => self.runner.run(endpoint, &request.mesh_name, op).await,
            Err(e) => {
                warn!(operation_id = %op, error = %e, "Unable to locate SMI conformance tool");
                Err(e)
            }
        })
    }
}
