//! Integration tests for cluster queries
//!
//! These tests read from whatever cluster the default kubeconfig points at.
//! They never create or delete resources.

use kube::Client;

use mesh_conformance::cluster::{ClusterQuery, KubeClusterQuery};
use mesh_conformance::Error;

async fn cluster() -> KubeClusterQuery {
    let client = Client::try_default()
        .await
        .expect("a cluster reachable through the default kubeconfig");
    KubeClusterQuery::new(client)
}

/// Story: every cluster has at least one node with an InternalIP
#[tokio::test]
#[ignore]
async fn story_nodes_report_internal_addresses() {
    let nodes = cluster().await.node_addresses().await.unwrap();

    assert!(!nodes.is_empty());
    assert!(nodes[0].iter().any(|a| a.type_ == "InternalIP"));
}

/// Story: asking for a service that does not exist is a lookup failure
#[tokio::test]
#[ignore]
async fn story_missing_service_is_lookup_error() {
    let err = cluster()
        .await
        .service_node_ports("default", "no-such-smi-conformance")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ServiceLookup(_)));
}

/// Story: the API server's own Service declares a port but no NodePort
#[tokio::test]
#[ignore]
async fn story_cluster_ip_service_has_no_node_port() {
    let ports = cluster()
        .await
        .service_node_ports("default", "kubernetes")
        .await
        .unwrap();

    assert!(!ports.is_empty());
    assert_eq!(ports[0], None);
}
