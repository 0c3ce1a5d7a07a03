//! Configuration for a conformance session

use std::path::PathBuf;
use std::time::Duration;

use crate::{DEFAULT_DELETE_SCRIPT, DEFAULT_INSTALL_SCRIPT, DEFAULT_NAMESPACE, DEFAULT_SERVICE_NAME};

/// Settings shared by every stage of a conformance session
#[derive(Clone, Debug)]
pub struct ConformanceConfig {
    /// Namespace the conformance tool runs in
    pub namespace: String,
    /// Service exposing the conformance tool
    pub service_name: String,
    /// Script that installs the tool
    pub install_script: PathBuf,
    /// Script that removes the tool
    pub delete_script: PathBuf,
    /// Budget for the internal-address reachability check
    pub probe_timeout: Duration,
    /// Wait after install for cluster-side resources to be created
    pub settle_interval: Duration,
    /// gRPC connection timeout
    pub connect_timeout: Duration,
    /// Deadline for the RunTest call (None = unbounded)
    pub request_timeout: Option<Duration>,
    /// Capacity of the bounded event queue
    pub event_buffer: usize,
    /// Deadline for a whole session (None = unbounded)
    pub session_timeout: Option<Duration>,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            install_script: PathBuf::from(DEFAULT_INSTALL_SCRIPT),
            delete_script: PathBuf::from(DEFAULT_DELETE_SCRIPT),
            probe_timeout: Duration::from_secs(5),
            settle_interval: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            event_buffer: 32,
            session_timeout: None,
        }
    }
}
