//! Integration tests for the gRPC conformance runner
//!
//! A canned conformance tool is served by tonic on an ephemeral local port.
//! The resolver sees it as a node's InternalIP, so the real TCP probe,
//! gRPC connector and result mapping are all exercised.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::NodeAddress;
use tokio::task::JoinHandle;
use tonic::{Request, Response, Status};

use mesh_conformance::cluster::ClusterQuery;
use mesh_conformance::events::{self, EventType};
use mesh_conformance::probe::{Probe, TcpProbe};
use mesh_conformance::proto;
use mesh_conformance::proto::smi_conformance_server::{SmiConformance, SmiConformanceServer};
use mesh_conformance::resolver::{Endpoint, EndpointResolver};
use mesh_conformance::runner::{ConformanceRunner, GrpcConnector};
use mesh_conformance::Error;

// =============================================================================
// Test Fixtures
// =============================================================================

/// Conformance tool that answers every RunTest with a fixed outcome
#[derive(Clone)]
struct CannedTool {
    reply: Result<proto::Response, Status>,
    received: Arc<Mutex<Vec<proto::Request>>>,
}

#[tonic::async_trait]
impl SmiConformance for CannedTool {
    async fn run_test(
        &self,
        request: Request<proto::Request>,
    ) -> Result<Response<proto::Response>, Status> {
        self.received.lock().unwrap().push(request.into_inner());
        self.reply.clone().map(Response::new)
    }
}

/// Start the canned tool and return its address
async fn serve(tool: CannedTool) -> (SocketAddr, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(SmiConformanceServer::new(tool))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;
    (addr, handle)
}

/// Cluster with a single node whose InternalIP is loopback
struct LoopbackCluster {
    node_port: u16,
}

#[async_trait]
impl ClusterQuery for LoopbackCluster {
    async fn service_node_ports(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Vec<Option<i32>>, Error> {
        Ok(vec![Some(i32::from(self.node_port))])
    }

    async fn node_addresses(&self) -> Result<Vec<Vec<NodeAddress>>, Error> {
        Ok(vec![vec![
            NodeAddress {
                type_: "InternalIP".to_string(),
                address: "127.0.0.1".to_string(),
            },
            NodeAddress {
                type_: "ExternalIP".to_string(),
                address: "203.0.113.9".to_string(),
            },
        ]])
    }
}

/// Probe that reports every address as reachable
struct AssumeReachable;

#[async_trait]
impl Probe for AssumeReachable {
    async fn probe(&self, _host: &str, _port: u16, _timeout: Duration) -> bool {
        true
    }
}

/// Resolve the tool's endpoint through the loopback cluster
async fn resolve(node_port: u16, probe: impl Probe + 'static) -> Endpoint {
    EndpointResolver::new(
        Arc::new(LoopbackCluster { node_port }),
        Arc::new(probe),
        "meshery",
        "smi-conformance",
        Duration::from_secs(1),
    )
    .resolve()
    .await
    .unwrap()
}

fn tool(reply: Result<proto::Response, Status>) -> (CannedTool, Arc<Mutex<Vec<proto::Request>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    (
        CannedTool {
            reply,
            received: received.clone(),
        },
        received,
    )
}

fn connector() -> Arc<GrpcConnector> {
    Arc::new(GrpcConnector::new(Duration::from_secs(2), Some(Duration::from_secs(5))))
}

// =============================================================================
// Stories
// =============================================================================

/// Story: the tool is found on the internal address and its results reported
#[tokio::test]
async fn story_resolved_tool_runs_and_reports_results() {
    let (canned, received) = tool(Ok(proto::Response {
        tests: "2".to_string(),
        failures: "1".to_string(),
        single_test_result: vec![
            proto::SingleTestResult {
                name: "traffic-access".to_string(),
                time: "4.1".to_string(),
                assertions: "6".to_string(),
                failure: None,
            },
            proto::SingleTestResult {
                name: "traffic-split".to_string(),
                time: "9.0".to_string(),
                assertions: "3".to_string(),
                failure: Some(proto::Failure {
                    test: "assert 2".to_string(),
                    message: "weights not honoured".to_string(),
                }),
            },
        ],
    }));
    let (addr, server) = serve(canned).await;

    let endpoint = resolve(addr.port(), TcpProbe).await;
    assert_eq!(endpoint.to_string(), format!("127.0.0.1:{}", addr.port()));

    let (sink, mut stream) = events::channel(8);
    let runner = ConformanceRunner::new(connector(), sink);
    let response = runner.run(endpoint, "osm", "op-42").await.unwrap();

    assert_eq!(response.tests_summary, "2");
    assert_eq!(response.failures_summary, "1");
    assert_eq!(response.results[0].name, "traffic-access");
    assert!(response.results[0].failure.is_none());
    assert_eq!(
        response.results[1].failure.as_ref().unwrap().message,
        "weights not honoured"
    );

    let event = stream.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::Info);
    assert_eq!(event.operation_id, "op-42");
    let json = event
        .details
        .strip_prefix("Tests Results: ")
        .unwrap()
        .trim_end();
    let decoded: serde_json::Value = serde_json::from_str(json).unwrap();
    assert!(decoded["results"][0].get("failure").is_none());
    assert_eq!(decoded["results"][1]["failure"]["text"], "assert 2");

    let requests = received.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].meshname, "osm");
    assert!(requests[0].annotations.is_empty());
    assert_eq!(
        requests[0].labels.get("openservicemesh.io/monitored-by"),
        Some(&"osm".to_string())
    );
    drop(requests);

    server.abort();
}

/// Story: an empty answer from the tool means it crashed mid-run
#[tokio::test]
async fn story_empty_answer_is_reported_as_crash() {
    let (canned, _received) = tool(Ok(proto::Response::default()));
    let (addr, server) = serve(canned).await;

    let endpoint = resolve(addr.port(), TcpProbe).await;

    let (sink, mut stream) = events::channel(8);
    let runner = ConformanceRunner::new(connector(), sink);
    let err = runner
        .run(endpoint, "osm", "op-1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ToolCrash(_)));
    let event = stream.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::Error);
    assert_eq!(event.summary, "SMI tool connection crashed");

    server.abort();
}

/// Story: a gRPC error status is a transport failure, not a crash
#[tokio::test]
async fn story_error_status_is_transport_failure() {
    let (canned, _received) = tool(Err(Status::unavailable("mesh not ready")));
    let (addr, server) = serve(canned).await;

    let endpoint = resolve(addr.port(), TcpProbe).await;

    let (sink, mut stream) = events::channel(8);
    let runner = ConformanceRunner::new(connector(), sink);
    let err = runner
        .run(endpoint, "osm", "op-1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    assert!(err.to_string().contains("mesh not ready"));
    let event = stream.recv().await.unwrap();
    assert_eq!(event.event_type, EventType::Error);
    assert!(stream.try_recv().is_err());

    server.abort();
}

/// Story: nothing listening on the endpoint
#[tokio::test]
async fn story_unreachable_tool_is_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    // Keep the loopback address even though nothing answers on it
    let endpoint = resolve(port, AssumeReachable).await;
    assert_eq!(endpoint.host(), "127.0.0.1");

    let (sink, mut stream) = events::channel(8);
    let runner = ConformanceRunner::new(connector(), sink);
    let err = runner
        .run(endpoint, "osm", "op-1")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    let event = stream.recv().await.unwrap();
    assert_eq!(event.summary, "Unable to connect to SMI conformance tool");
}
