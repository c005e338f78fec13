/// NATS JetStream client for record queues
///
/// Provides connection management, stream/consumer setup and envelope
/// publishing. All record subjects live under one prefix:
/// `<prefix>.ingest`, `<prefix>.success` and `<prefix>.failure`.

use async_nats::jetstream;
use async_nats::jetstream::consumer::PullConsumer;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::nats::message_envelope::RecordEnvelope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    #[serde(rename = "stream")]
    pub stream_name: String,
    pub subject_prefix: String,
    pub consumer: String,
    /// Deliveries before JetStream stops redelivering a nak'ed message
    pub max_deliver: i64,
    /// How long one dequeue waits for a message
    pub fetch_timeout_ms: u64,
    pub max_age_secs: u64,
    pub max_bytes: i64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("NATS_URL")
                .unwrap_or_else(|_| "nats://localhost:4222".to_string()),
            stream_name: std::env::var("NATS_STREAM")
                .unwrap_or_else(|_| "RECORDS".to_string()),
            subject_prefix: "records".to_string(),
            consumer: std::env::var("NATS_CONSUMER")
                .unwrap_or_else(|_| "flowstep".to_string()),
            max_deliver: 3,
            fetch_timeout_ms: 500,
            max_age_secs: 24 * 60 * 60, // 24 hours
            max_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

impl NatsConfig {
    pub fn ingest_subject(&self) -> String {
        format!("{}.ingest", self.subject_prefix)
    }

    pub fn success_subject(&self) -> String {
        format!("{}.success", self.subject_prefix)
    }

    pub fn failure_subject(&self) -> String {
        format!("{}.failure", self.subject_prefix)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    config: NatsConfig,
}

impl NatsClient {
    /// Connect to NATS and make sure the record stream exists
    pub async fn connect(config: NatsConfig) -> Result<Self, async_nats::Error> {
        let client = async_nats::connect(&config.url).await?;
        tracing::info!("Connected to NATS at {}", config.url);

        let jetstream = jetstream::new(client.clone());

        // One stream captures ingest, success and failure subjects
        let _stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![format!("{}.>", config.subject_prefix)],
                max_age: Duration::from_secs(config.max_age_secs),
                max_bytes: config.max_bytes,
                storage: jetstream::stream::StorageType::File,
                num_replicas: 1,
                ..Default::default()
            })
            .await?;

        tracing::info!("JetStream stream '{}' ready", config.stream_name);

        Ok(Self {
            client,
            jetstream,
            config,
        })
    }

    /// Durable pull consumer over the ingest subject with explicit acks
    pub async fn pull_consumer(&self) -> Result<PullConsumer, async_nats::Error> {
        let stream = self.jetstream.get_stream(&self.config.stream_name).await?;
        let consumer = stream
            .get_or_create_consumer(
                &self.config.consumer,
                jetstream::consumer::pull::Config {
                    durable_name: Some(self.config.consumer.clone()),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    max_deliver: self.config.max_deliver,
                    filter_subject: self.config.ingest_subject(),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(
            "Consumer '{}' ready on subject {}",
            self.config.consumer,
            self.config.ingest_subject()
        );

        Ok(consumer)
    }

    /// Publish a record envelope to the ingest subject and wait for the ack
    pub async fn publish_record(&self, envelope: &RecordEnvelope) -> Result<(), async_nats::Error> {
        let subject = self.config.ingest_subject();
        let payload = serde_json::to_vec(envelope)?;

        let ack = self.jetstream
            .publish(subject.clone(), payload.into())
            .await?;
        ack.await?;

        tracing::debug!(
            "Published record {} to JetStream subject {}",
            envelope.record_id,
            subject
        );

        Ok(())
    }

    pub fn config(&self) -> &NatsConfig {
        &self.config
    }

    /// Get JetStream context for advanced operations
    pub fn jetstream(&self) -> &jetstream::Context {
        &self.jetstream
    }

    /// Check if the NATS connection is active
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects_use_prefix() {
        let config = NatsConfig {
            subject_prefix: "orders".to_string(),
            ..NatsConfig::default()
        };

        assert_eq!(config.ingest_subject(), "orders.ingest");
        assert_eq!(config.success_subject(), "orders.success");
        assert_eq!(config.failure_subject(), "orders.failure");
    }

    #[test]
    fn test_yaml_overrides_selected_fields() {
        let config: NatsConfig = serde_yaml::from_str("stream: AUDIT\nmax_deliver: 5\n").unwrap();

        assert_eq!(config.stream_name, "AUDIT");
        assert_eq!(config.max_deliver, 5);
        assert_eq!(config.subject_prefix, "records");
        assert_eq!(config.fetch_timeout(), Duration::from_millis(500));
    }
}
