//! Job event notifications.

use crate::error::QueueResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kinds of event a job publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobEventKind {
    /// Progress update from the job handler
    Progress,
}

/// Message published on the queue's `events` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Job id
    pub id: String,
    /// Event kind
    pub event: JobEventKind,
    /// Event payload
    pub data: Value,
}

impl JobEvent {
    /// Progress event for a job.
    pub fn progress(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            event: JobEventKind::Progress,
            data,
        }
    }
}

/// Publish/subscribe transport used for job events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a raw message on a channel, returning the number of receivers.
    async fn publish(&self, channel: &str, message: &str) -> QueueResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_progress_event_shape() {
        let event = JobEvent::progress("12", json!(42));
        let encoded = serde_json::to_string(&event).unwrap();
        assert_eq!(encoded, r#"{"id":"12","event":"progress","data":42}"#);
    }

    #[test]
    fn test_progress_event_decodes() {
        let event: JobEvent =
            serde_json::from_str(r#"{"id":"3","event":"progress","data":{"done":1}}"#).unwrap();
        assert_eq!(event.event, JobEventKind::Progress);
        assert_eq!(event.data, json!({"done": 1}));
    }
}
