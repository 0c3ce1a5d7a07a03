//! gRPC protocol definitions for the SMI conformance tool
//!
//! This module contains the generated Protobuf and gRPC code for the
//! single unary call exposed by the conformance tool once it is installed
//! in the cluster.
//!
//! # Protocol Overview
//!
//! The tool listens on a plain TCP NodePort. The caller sends one
//! `Request` naming the mesh under test together with the labels and
//! annotations the tool should apply to the workloads it deploys, and
//! receives a `Response` carrying the suite summary and one
//! `SingleTestResult` per test case.
//!
//! # Example
//!
//! ```ignore
//! use mesh_conformance::proto::smi_conformance_client::SmiConformanceClient;
//!
//! let mut client = SmiConformanceClient::connect("http://10.0.0.5:30080").await?;
//! let response = client.run_test(Request { meshname: "osm".into(), ..Default::default() }).await?;
//! ```

#![allow(missing_docs)] // Generated code doesn't have docs
#![allow(clippy::doc_overindented_list_items)] // Generated proto docs have formatting issues

/// Generated protobuf and gRPC code for the conformance tool
pub mod smi {
    /// Conformance tool protocol
    pub mod conformance {
        tonic::include_proto!("smi.conformance");
    }
}

// Re-export commonly used types at the module level for convenience
pub use smi::conformance::*;
