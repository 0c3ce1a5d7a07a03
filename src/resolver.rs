//! Endpoint resolution for the conformance tool
//!
//! The tool is exposed through a NodePort Service. When the caller runs
//! inside the cluster network the node's InternalIP answers and is preferred;
//! otherwise the node's ExternalIP is used without probing, since a caller
//! outside the internal network has no other way in.
//!
//! Only the first node in the listing is consulted.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cluster::ClusterQuery;
use crate::probe::Probe;
use crate::{Error, Result};

/// Node address type for in-cluster routing
pub const INTERNAL_IP: &str = "InternalIP";

/// Node address type for out-of-cluster routing
pub const EXTERNAL_IP: &str = "ExternalIP";

/// Address at which the conformance tool is reachable
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Host part of the endpoint
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port part of the endpoint
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Plain-text gRPC URI for this endpoint
    pub fn uri(&self) -> String {
        format!("http://{}", self)
    }

    #[cfg(test)]
    pub(crate) fn new_unchecked(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Formats as an authority: `host:port`, with IPv6 hosts bracketed
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Locates the conformance tool in the cluster
pub struct EndpointResolver {
    cluster: Arc<dyn ClusterQuery>,
    probe: Arc<dyn Probe>,
    namespace: String,
    service_name: String,
    probe_timeout: Duration,
}

impl EndpointResolver {
    /// Create a resolver for the given service
    pub fn new(
        cluster: Arc<dyn ClusterQuery>,
        probe: Arc<dyn Probe>,
        namespace: impl Into<String>,
        service_name: impl Into<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            cluster,
            probe,
            namespace: namespace.into(),
            service_name: service_name.into(),
            probe_timeout,
        }
    }

    /// Resolve the host:port at which the tool answers
    pub async fn resolve(&self) -> Result<Endpoint> {
        let ports = self
            .cluster
            .service_node_ports(&self.namespace, &self.service_name)
            .await?;
        let port = match ports.first() {
            Some(Some(port)) => u16::try_from(*port).map_err(|_| {
                Error::service_lookup(format!(
                    "service {}/{} has invalid node port {}",
                    self.namespace, self.service_name, port
                ))
            })?,
            Some(None) => {
                return Err(Error::service_lookup(format!(
                    "service {}/{} has no node port allocated",
                    self.namespace, self.service_name
                )))
            }
            None => {
                return Err(Error::service_lookup(format!(
                    "service {}/{} declares no ports",
                    self.namespace, self.service_name
                )))
            }
        };

        let nodes = self.cluster.node_addresses().await?;
        let first = nodes
            .into_iter()
            .next()
            .ok_or_else(|| Error::node_lookup("cluster has no nodes"))?;

        let addresses: HashMap<String, String> = first
            .into_iter()
            .map(|addr| (addr.type_, addr.address))
            .collect();

        let host = self.select_host(&addresses, port).await?;
        let endpoint = Endpoint { host, port };
        info!(endpoint = %endpoint, "Resolved conformance tool endpoint");
        Ok(endpoint)
    }

    async fn select_host(
        &self,
        addresses: &HashMap<String, String>,
        port: u16,
    ) -> Result<String> {
        let internal = addresses.get(INTERNAL_IP).filter(|a| !a.is_empty());
        let external = addresses.get(EXTERNAL_IP).filter(|a| !a.is_empty());

        if let Some(internal) = internal {
            if self.probe.probe(internal, port, self.probe_timeout).await {
                return Ok(internal.clone());
            }
            debug!(address = %internal, port = port, "Internal address unreachable, using external");
        }

        external.cloned().ok_or_else(|| {
            Error::no_reachable_address(match internal {
                Some(internal) => format!(
                    "internal address {}:{} unreachable and node has no {}",
                    internal, port, EXTERNAL_IP
                ),
                None => format!("node has neither {} nor {}", INTERNAL_IP, EXTERNAL_IP),
            })
        })
    }
}
