//! The JSON envelope written to every connection during a broadcast.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Event types emitted by the ingestion pipeline.
pub const EVENT_PIPELINE_PROGRESS: &str = "pipeline_progress";
pub const EVENT_URL_DETECTED: &str = "url_detected";

/// Stage outcome carried by a pipeline progress event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Started,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::Started => "started",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape delivered to clients: `{type, session_id, timestamp, data}`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, session_id: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            data,
        }
    }

    /// Serialize with an RFC-3339 timestamp, the shape clients consume.
    pub fn to_json_value(&self) -> Value {
        json!({
            "type": self.event_type,
            "session_id": self.session_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "data": self.data,
        })
    }
}
