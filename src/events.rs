//! Progress and result events
//!
//! Events flow through a bounded tokio channel owned by the caller. The
//! sending half is cloned into each component; the receiving half is handed
//! to whatever framework reports progress for the operation. A full queue
//! makes `emit` wait, so a slow consumer applies backpressure to every
//! session sharing the sink.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Severity of an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    /// Milestone reached
    Info,
    /// Milestone failed
    Error,
}

/// A single progress or result notification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Identifier supplied by the caller for the operation
    pub operation_id: String,
    /// Severity
    pub event_type: EventType,
    /// One-line summary
    pub summary: String,
    /// Free-form details
    pub details: String,
}

impl Event {
    /// Create an INFO event
    pub fn info(
        operation_id: impl Into<String>,
        summary: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            event_type: EventType::Info,
            summary: summary.into(),
            details: details.into(),
        }
    }

    /// Create an ERROR event
    pub fn error(
        operation_id: impl Into<String>,
        summary: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            operation_id: operation_id.into(),
            event_type: EventType::Error,
            summary: summary.into(),
            details: details.into(),
        }
    }
}

/// Sending half of the event channel
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<Event>,
}

/// Receiving half of the event channel
pub type EventStream = mpsc::Receiver<Event>;

/// Create a bounded event channel with the given capacity
pub fn channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSink { tx }, rx)
}

impl EventSink {
    /// Deliver an event, waiting for queue space if the consumer is behind
    pub async fn emit(&self, event: Event) -> Result<()> {
        self.tx.send(event).await.map_err(|_| Error::EventSinkClosed)
    }
}
