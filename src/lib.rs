//! Mesh Conformance - runs the SMI conformance tool against a service mesh
//!
//! This crate coordinates a conformance run end to end: it installs the
//! external conformance tool into the cluster, finds a reachable address for
//! it, invokes it over gRPC and reports the normalized result as events.
//!
//! # Session Flow
//!
//! install → resolve → run → (optional) delete
//!
//! Every stage emits progress events into an [`events::EventSink`] owned by
//! the caller. Resolution and run failures never block cleanup.
//!
//! # Modules
//!
//! - [`probe`] - Bounded-time TCP reachability checks
//! - [`cluster`] - Cluster queries for the tool's service and node addresses
//! - [`resolver`] - Picks the internal or external address for the tool
//! - [`lifecycle`] - Installs and deletes the tool via external scripts
//! - [`runner`] - Calls the tool and maps its result into [`runner::ConformanceResponse`]
//! - [`session`] - Ties the stages together for a single request
//! - [`events`] - Event records and the bounded event channel
//! - [`config`] - Configuration and defaults
//! - [`proto`] - gRPC protocol definitions for the conformance tool
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod probe;
pub mod proto;
pub mod resolver;
pub mod runner;
pub mod session;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Namespace the conformance tool is installed into
pub const DEFAULT_NAMESPACE: &str = "meshery";

/// Name of the Service exposing the conformance tool
pub const DEFAULT_SERVICE_NAME: &str = "smi-conformance";

/// Script that installs the conformance tool
pub const DEFAULT_INSTALL_SCRIPT: &str = "./scripts/create_smi.sh";

/// Script that removes the conformance tool
pub const DEFAULT_DELETE_SCRIPT: &str = "./scripts/delete_smi.sh";

/// Label marking workloads as monitored by the mesh under test
pub const MONITORED_BY_LABEL: &str = "openservicemesh.io/monitored-by";

/// Value of [`MONITORED_BY_LABEL`] for the monitored mesh implementation
pub const MONITORED_BY_VALUE: &str = "osm";
