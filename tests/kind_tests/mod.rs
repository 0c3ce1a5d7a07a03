//! Cluster-backed tests
//!
//! - `cluster_queries`: Stories about reading the tool's Service and the
//!   cluster's node addresses through the Kubernetes API

mod cluster_queries;
