//! Cluster queries used to locate the conformance tool
//!
//! The resolver only needs two read operations from the Kubernetes API:
//! the NodePorts of the tool's Service and the address records of the
//! cluster's nodes. They sit behind a trait so resolution can be tested
//! without a cluster.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, NodeAddress, Service};
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

/// Trait abstracting the Kubernetes queries used by the resolver
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    /// Exposed NodePorts of a Service, in declaration order
    ///
    /// Ports without an allocated NodePort are reported as `None`.
    async fn service_node_ports(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<Option<i32>>>;

    /// Address records of every node, in listing order
    async fn node_addresses(&self) -> Result<Vec<Vec<NodeAddress>>>;
}

/// ClusterQuery backed by the Kubernetes API
pub struct KubeClusterQuery {
    client: Client,
}

impl KubeClusterQuery {
    /// Create a new KubeClusterQuery wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterQuery for KubeClusterQuery {
    async fn service_node_ports(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Vec<Option<i32>>> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let svc = api
            .get(name)
            .await
            .map_err(|e| Error::service_lookup(e.to_string()))?;

        let ports = svc
            .spec
            .and_then(|spec| spec.ports)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.node_port)
            .collect();

        Ok(ports)
    }

    async fn node_addresses(&self) -> Result<Vec<Vec<NodeAddress>>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&Default::default())
            .await
            .map_err(|e| Error::node_lookup(e.to_string()))?;

        Ok(nodes
            .items
            .into_iter()
            .map(|node| {
                node.status
                    .and_then(|status| status.addresses)
                    .unwrap_or_default()
            })
            .collect())
    }
}
