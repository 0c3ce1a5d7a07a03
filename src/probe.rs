//! Bounded-time TCP reachability checks

use std::future::Future;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::net::TcpStream;
use tracing::debug;

/// Trait for checking whether an address accepts connections
///
/// This trait abstracts the network check for testability.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    /// True only if a connection to `host:port` is established within `timeout`
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool;
}

/// Probe that opens a plain TCP connection
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpProbe;

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, host: &str, port: u16, timeout: Duration) -> bool {
        connects_within(host, port, timeout, TcpStream::connect((host, port))).await
    }
}

async fn connects_within<F>(host: &str, port: u16, timeout: Duration, connect: F) -> bool
where
    F: Future<Output = io::Result<TcpStream>>,
{
    match tokio::time::timeout(timeout, connect).await {
        // The stream is dropped here, closing the connection
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(host = %host, port = port, error = %e, "TCP check failed");
            false
        }
        Err(_) => {
            debug!(host = %host, port = port, timeout_ms = timeout.as_millis(), "TCP check timed out");
            false
        }
    }
}
