/// NATS JetStream integration module
///
/// Provides the record envelope, the NATS client and a JetStream-backed host
/// for running a stage as a queue worker

pub mod message_envelope;
pub mod client;
pub mod host;

pub use message_envelope::RecordEnvelope;
pub use client::{NatsClient, NatsConfig};
pub use host::{JetStreamHost, JetStreamRecord};
