//! Conformance test invocation and result mapping
//!
//! The runner opens a gRPC client to a resolved [`Endpoint`], submits a
//! single RunTest request and turns the tool's answer into a
//! [`ConformanceResponse`]. Every outcome is reported as exactly one event:
//!
//! - connect or call failure → ERROR, [`Error::Transport`]
//! - call succeeded but carried no result → ERROR, [`Error::ToolCrash`]
//! - result received but not encodable → ERROR, [`Error::Serialization`]
//! - result received → INFO with the serialized response in its details
//!
//! There is no retry; the caller decides whether to run again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tonic::transport::{Channel, Endpoint as TonicEndpoint};
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventSink};
use crate::proto;
use crate::proto::smi_conformance_client::SmiConformanceClient;
use crate::resolver::Endpoint;
use crate::{Error, Result, MONITORED_BY_LABEL, MONITORED_BY_VALUE};

// =============================================================================
// Request / Response Types
// =============================================================================

/// Request submitted to the conformance tool
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestRequest {
    /// Annotations applied to the tool's test workloads
    pub annotations: HashMap<String, String>,
    /// Labels applied to the tool's test workloads
    pub labels: HashMap<String, String>,
    /// Name of the mesh under test
    pub mesh_name: String,
}

impl TestRequest {
    /// Request with no annotations and the monitored-by label set
    pub fn new(mesh_name: impl Into<String>) -> Self {
        let labels = HashMap::from([(
            MONITORED_BY_LABEL.to_string(),
            MONITORED_BY_VALUE.to_string(),
        )]);
        Self {
            annotations: HashMap::new(),
            labels,
            mesh_name: mesh_name.into(),
        }
    }
}

impl From<TestRequest> for proto::Request {
    fn from(req: TestRequest) -> Self {
        Self {
            annotations: req.annotations,
            labels: req.labels,
            meshname: req.mesh_name,
        }
    }
}

/// Normalized result of a conformance run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConformanceResponse {
    /// Suite summary, copied verbatim from the tool
    #[serde(rename = "tests", default, skip_serializing_if = "String::is_empty")]
    pub tests_summary: String,
    /// Failure summary, copied verbatim from the tool
    #[serde(rename = "failures", default, skip_serializing_if = "String::is_empty")]
    pub failures_summary: String,
    /// Per-test results in the order the tool returned them
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SingleTestResult>,
}

/// Result of one test case
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleTestResult {
    /// Test case name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Time the test took, as reported by the tool
    #[serde(rename = "time", default, skip_serializing_if = "String::is_empty")]
    pub elapsed: String,
    /// Assertion count, as reported by the tool
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assertions: String,
    /// Present only when the test failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

/// Failure details for a test case
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// Failure text
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Failure message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl From<proto::Response> for ConformanceResponse {
    fn from(raw: proto::Response) -> Self {
        Self {
            tests_summary: raw.tests,
            failures_summary: raw.failures,
            results: raw
                .single_test_result
                .into_iter()
                .map(SingleTestResult::from)
                .collect(),
        }
    }
}

impl From<proto::SingleTestResult> for SingleTestResult {
    fn from(raw: proto::SingleTestResult) -> Self {
        Self {
            name: raw.name,
            elapsed: raw.time,
            assertions: raw.assertions,
            failure: raw.failure.map(|f| Failure {
                text: f.test,
                message: f.message,
            }),
        }
    }
}

// =============================================================================
// Tool Client Abstraction
// =============================================================================

/// An open client to the conformance tool
///
/// The connection is released when the value is dropped.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConformanceTool: Send + Sync {
    /// Run the suite; `Ok(None)` means the call succeeded but carried no result
    async fn run_test(&self, request: TestRequest) -> Result<Option<proto::Response>>;
}

/// Opens clients to the conformance tool
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Connect to the tool at `endpoint`
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ConformanceTool>>;
}

/// Connector speaking plain-text gRPC
#[derive(Clone, Debug)]
pub struct GrpcConnector {
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl GrpcConnector {
    /// Create a connector with the given timeouts
    pub fn new(connect_timeout: Duration, request_timeout: Option<Duration>) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }
}

#[async_trait]
impl ToolConnector for GrpcConnector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn ConformanceTool>> {
        let mut tonic_endpoint = TonicEndpoint::from_shared(endpoint.uri())
            .map_err(|e| Error::transport(format!("invalid endpoint {}: {}", endpoint, e)))?
            .connect_timeout(self.connect_timeout);
        if let Some(timeout) = self.request_timeout {
            tonic_endpoint = tonic_endpoint.timeout(timeout);
        }

        let channel = tonic_endpoint
            .connect()
            .await
            .map_err(|e| Error::transport(format!("failed to connect to {}: {}", endpoint, e)))?;

        debug!(endpoint = %endpoint, "Created client for SMI conformance tool");
        Ok(Box::new(GrpcConformanceTool {
            client: SmiConformanceClient::new(channel),
        }))
    }
}

/// gRPC client to the conformance tool
pub struct GrpcConformanceTool {
    client: SmiConformanceClient<Channel>,
}

#[async_trait]
impl ConformanceTool for GrpcConformanceTool {
    async fn run_test(&self, request: TestRequest) -> Result<Option<proto::Response>> {
        let mut client = self.client.clone();
        let response = client
            .run_test(proto::Request::from(request))
            .await
            .map_err(|status| Error::transport(format!("RunTest failed: {}", status)))?
            .into_inner();

        // proto3 cannot tell a null message from an empty one
        if is_empty_response(&response) {
            return Ok(None);
        }
        Ok(Some(response))
    }
}

fn is_empty_response(response: &proto::Response) -> bool {
    response.tests.is_empty()
        && response.failures.is_empty()
        && response.single_test_result.is_empty()
}

// =============================================================================
// Runner
// =============================================================================

/// Invokes the conformance tool and reports its result
pub struct ConformanceRunner {
    connector: Arc<dyn ToolConnector>,
    events: EventSink,
}

impl ConformanceRunner {
    /// Create a runner emitting into `events`
    pub fn new(connector: Arc<dyn ToolConnector>, events: EventSink) -> Self {
        Self { connector, events }
    }

    /// Run the suite against `mesh_name` through the tool at `endpoint`
    pub async fn run(
        &self,
        endpoint: Endpoint,
        mesh_name: &str,
        operation_id: &str,
    ) -> Result<ConformanceResponse> {
        if operation_id.trim().is_empty() {
            return Err(Error::validation("operation id must not be empty"));
        }
        if mesh_name.trim().is_empty() {
            return Err(Error::validation("mesh name must not be empty"));
        }

        let tool = match self.connector.connect(&endpoint).await {
            Ok(tool) => tool,
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Unable to connect to SMI conformance tool");
                self.report_failure(
                    operation_id,
                    "Unable to connect to SMI conformance tool",
                    e.to_string(),
                )
                .await;
                return Err(e);
            }
        };

        let outcome = tool.run_test(TestRequest::new(mesh_name)).await;
        // Close the connection before reporting
        drop(tool);

        let raw = match outcome {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.report_failure(operation_id, "SMI tool connection crashed", "Tool unreachable")
                    .await;
                return Err(Error::tool_crash("Tool unreachable"));
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "SMI conformance test failed");
                self.report_failure(
                    operation_id,
                    "Error while running SMI conformance test",
                    e.to_string(),
                )
                .await;
                return Err(e);
            }
        };
        debug!("Tests ran successfully for SMI conformance tool");

        let response = ConformanceResponse::from(raw);
        debug!(?response, "Tests results");

        let json = self.encode_results(operation_id, &response).await?;
        self.events
            .emit(Event::info(
                operation_id,
                "SMI conformance test completed successfully",
                format!("Tests Results: {}\n", json),
            ))
            .await?;

        info!(
            mesh = %mesh_name,
            tests = %response.tests_summary,
            failures = %response.failures_summary,
            "SMI conformance test completed"
        );
        Ok(response)
    }

    async fn encode_results<T: Serialize>(&self, operation_id: &str, results: &T) -> Result<String> {
        match serde_json::to_string(results) {
            Ok(json) => Ok(json),
            Err(e) => {
                let err = Error::serialization(format!("failed to encode test results: {}", e));
                self.report_failure(
                    operation_id,
                    "Error while encoding SMI conformance test results",
                    err.to_string(),
                )
                .await;
                Err(err)
            }
        }
    }

    async fn report_failure(&self, operation_id: &str, summary: &str, details: impl Into<String>) {
        if let Err(e) = self
            .events
            .emit(Event::error(operation_id, summary, details))
            .await
        {
            warn!(error = %e, "Failed to deliver failure event");
        }
    }
}
