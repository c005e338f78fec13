//! JetStream-backed host.
//!
//! Records are pulled one at a time from a durable consumer on the ingest
//! subject. Committing publishes the record to the success or failure
//! subject and then acks the source message. If that publish fails the
//! message is nak'ed so JetStream redelivers it (up to `max_deliver`).
//!
//! The host is synchronous; every call blocks on the given tokio runtime
//! handle, so it must be used from threads outside that runtime.

use async_nats::jetstream;
use async_nats::jetstream::consumer::PullConsumer;
use futures::StreamExt;
use std::io::Cursor;
use std::time::Duration;
use tokio::runtime::Handle;
use uuid::Uuid;

use crate::host::{
    take_staged, HostError, HostSession, Outcome, RecordHandle, StagedWriter, StagingSlot,
};
use crate::nats::client::{NatsClient, NatsConfig};
use crate::nats::message_envelope::RecordEnvelope;

/// A message checked out of the ingest consumer.
pub struct JetStreamRecord {
    message: jetstream::Message,
    envelope: RecordEnvelope,
    /// Envelope body, or the raw payload when it was not an envelope
    content: Vec<u8>,
    staged: StagingSlot,
}

impl JetStreamRecord {
    fn new(message: jetstream::Message) -> Self {
        let (mut envelope, wrapped) = RecordEnvelope::from_payload(&message.payload);
        let content = if wrapped {
            envelope.content().to_vec()
        } else {
            message.payload.to_vec()
        };

        if let Ok(info) = message.info() {
            envelope.retry_count = info.delivered.saturating_sub(1).max(0) as u32;
        }

        Self {
            message,
            envelope,
            content,
            staged: StagingSlot::default(),
        }
    }

    pub fn envelope(&self) -> &RecordEnvelope {
        &self.envelope
    }
}

impl RecordHandle for JetStreamRecord {
    fn record_id(&self) -> Uuid {
        self.envelope.record_id
    }
}

pub struct JetStreamHost {
    runtime: Handle,
    jetstream: jetstream::Context,
    consumer: PullConsumer,
    success_subject: String,
    failure_subject: String,
    fetch_timeout: Duration,
}

impl JetStreamHost {
    pub fn new(runtime: Handle, client: &NatsClient, consumer: PullConsumer) -> Self {
        let config: &NatsConfig = client.config();
        Self {
            runtime,
            jetstream: client.jetstream().clone(),
            consumer,
            success_subject: config.success_subject(),
            failure_subject: config.failure_subject(),
            fetch_timeout: config.fetch_timeout(),
        }
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), async_nats::Error> {
        let ack = self.jetstream
            .publish(subject.to_string(), payload.into())
            .await?;
        ack.await?;
        Ok(())
    }

    /// Payload routed to the outcome's subject.
    fn routed_payload(record: &JetStreamRecord, outcome: Outcome) -> Result<Vec<u8>, HostError> {
        match outcome {
            Outcome::Success => {
                let content = take_staged(&record.staged).unwrap_or_else(|| record.content.clone());
                let body = String::from_utf8(content).map_err(|e| {
                    HostError::Commit(format!("transformed content is not UTF-8: {}", e))
                })?;
                serde_json::to_vec(&record.envelope.with_body(body))
                    .map_err(|e| HostError::Commit(format!("failed to encode envelope: {}", e)))
            }
            // Failure keeps the original message untouched
            Outcome::Failure => Ok(record.message.payload.to_vec()),
        }
    }

    async fn nak(message: &jetstream::Message, record_id: Uuid) {
        if let Err(e) = message.ack_with(jetstream::AckKind::Nak(None)).await {
            tracing::error!("Failed to NAK record {}: {}", record_id, e);
        }
    }
}

impl HostSession for JetStreamHost {
    type Record = JetStreamRecord;
    type Reader = Cursor<Vec<u8>>;
    type Writer = StagedWriter;

    fn dequeue(&self) -> Option<JetStreamRecord> {
        self.runtime.block_on(async {
            let mut batch = match self.consumer
                .batch()
                .max_messages(1)
                .expires(self.fetch_timeout)
                .messages()
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!("Failed to fetch messages: {}", e);
                    return None;
                }
            };

            match batch.next().await {
                Some(Ok(message)) => Some(JetStreamRecord::new(message)),
                Some(Err(e)) => {
                    tracing::error!("Error receiving message: {}", e);
                    None
                }
                None => None,
            }
        })
    }

    fn open_transaction(
        &self,
        record: &JetStreamRecord,
    ) -> Result<(Self::Reader, Self::Writer), HostError> {
        Ok((
            Cursor::new(record.content.clone()),
            StagedWriter::new(record.staged.clone()),
        ))
    }

    fn commit(&self, record: JetStreamRecord, outcome: Outcome) -> Result<(), HostError> {
        let record_id = record.record_id();
        let subject = match outcome {
            Outcome::Success => &self.success_subject,
            Outcome::Failure => &self.failure_subject,
        };

        self.runtime.block_on(async {
            let payload = match Self::routed_payload(&record, outcome) {
                Ok(payload) => payload,
                Err(e) => {
                    Self::nak(&record.message, record_id).await;
                    return Err(e);
                }
            };

            if let Err(e) = self.publish(subject, payload).await {
                Self::nak(&record.message, record_id).await;
                return Err(HostError::Commit(format!(
                    "failed to publish record {} to {}: {}",
                    record_id, subject, e
                )));
            }

            record.message.ack().await.map_err(|e| {
                HostError::Commit(format!("failed to ACK record {}: {}", record_id, e))
            })?;

            tracing::debug!("Record {} routed to {}", record_id, subject);
            Ok(())
        })
    }
}
