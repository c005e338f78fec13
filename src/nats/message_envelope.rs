/// Record envelope for NATS JetStream
///
/// Wraps a record body with metadata for tracking across the ingest,
/// success and failure subjects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEnvelope {
    /// Unique record ID, kept across stages
    pub record_id: Uuid,

    /// Record content
    pub body: String,

    /// Free-form attributes carried with the record
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Timestamp when the record was received
    pub received_at: DateTime<Utc>,

    /// Redeliveries before this envelope was produced
    #[serde(default)]
    pub retry_count: u32,

    /// Source file or identifier
    pub source: Option<String>,
}

impl RecordEnvelope {
    /// Create a new record envelope
    pub fn new(body: String, source: Option<String>) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            body,
            attributes: HashMap::new(),
            received_at: Utc::now(),
            retry_count: 0,
            source,
        }
    }

    /// Interpret a message payload.
    ///
    /// Returns the envelope and whether the payload actually was one. A
    /// payload that is not an envelope becomes the body of a fresh envelope,
    /// so callers should read content through [`RecordEnvelope::content`]
    /// only for real envelopes and use the raw payload otherwise.
    pub fn from_payload(payload: &[u8]) -> (Self, bool) {
        match serde_json::from_slice::<RecordEnvelope>(payload) {
            Ok(envelope) => (envelope, true),
            Err(_) => {
                let body = String::from_utf8_lossy(payload).into_owned();
                (Self::new(body, None), false)
            }
        }
    }

    /// Envelope for the transformed record: same id and metadata, new body.
    pub fn with_body(&self, body: String) -> Self {
        Self {
            body,
            received_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn content(&self) -> &[u8] {
        self.body.as_bytes()
    }
}
