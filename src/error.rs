//! Error types for conformance orchestration

use std::time::Duration;

use thiserror::Error;

/// Main error type for conformance operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Install or delete script could not be located
    #[error("executable not found: {path}")]
    ExecutableNotFound {
        /// Path or name that was looked up
        path: String,
    },

    /// Install or delete script failed to start or exited non-zero
    #[error("command failed: {command} - {message}")]
    CommandFailed {
        /// The command that failed
        command: String,
        /// Error message
        message: String,
    },

    /// The conformance service could not be read from the cluster
    #[error("unable to get service: {0}")]
    ServiceLookup(String),

    /// Cluster nodes could not be listed
    #[error("unable to get nodes: {0}")]
    NodeLookup(String),

    /// No candidate address for the conformance tool is usable
    #[error("no reachable address: {0}")]
    NoReachableAddress(String),

    /// Connecting to or calling the conformance tool failed
    #[error("transport error: {0}")]
    Transport(String),

    /// The tool answered but returned no usable result
    #[error("conformance tool crashed: {0}")]
    ToolCrash(String),

    /// Request rejected before any work was started
    #[error("validation error: {0}")]
    Validation(String),

    /// The event stream consumer has gone away
    #[error("event sink closed")]
    EventSinkClosed,

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The whole session exceeded its deadline
    #[error("session timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Create an executable-not-found error for the given path
    pub fn executable_not_found(path: impl Into<String>) -> Self {
        Self::ExecutableNotFound { path: path.into() }
    }

    /// Create a command failure error
    pub fn command_failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create a service lookup error with the given message
    pub fn service_lookup(msg: impl Into<String>) -> Self {
        Self::ServiceLookup(msg.into())
    }

    /// Create a node lookup error with the given message
    pub fn node_lookup(msg: impl Into<String>) -> Self {
        Self::NodeLookup(msg.into())
    }

    /// Create a no-reachable-address error with the given message
    pub fn no_reachable_address(msg: impl Into<String>) -> Self {
        Self::NoReachableAddress(msg.into())
    }

    /// Create a transport error with the given message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a tool crash error with the given message
    pub fn tool_crash(msg: impl Into<String>) -> Self {
        Self::ToolCrash(msg.into())
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// True for failures while installing or deleting the tool
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::ExecutableNotFound { .. } | Self::CommandFailed { .. }
        )
    }

    /// True for failures while locating the tool's endpoint
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Self::ServiceLookup(_) | Self::NodeLookup(_) | Self::NoReachableAddress(_)
        )
    }
}
