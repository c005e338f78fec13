//! # Flowstep: Record Transform Stage
//!
//! Flowstep runs one processing step of a record pipeline: take a record
//! from a host queue, decode its content as a document, transform it, encode
//! the result back into the record and route the record to `success` or
//! `failure`.
//!
//! ## Features
//!
//! - **Document model**: JSON-compatible tree with order-preserving mappings
//! - **Codecs**: JSON (compact or pretty) and YAML
//! - **Transform registry**: built-in transforms (`convert_key_case`, `add_field`,
//!   `add_uuid_field`, `remove_duplicates`) plus custom factories, chained from YAML
//! - **Hosts**: in-memory queue for local runs and tests, NATS JetStream for workers
//! - **Worker pool**: several threads sharing one stage and one host
//!
//! ## Example
//!
//! ```
//! use flowstep::{InMemoryHost, RecordTransformStage};
//!
//! let host = InMemoryHost::new();
//! host.enqueue(r#"{"a": 1}"#);
//!
//! let attempt = RecordTransformStage::identity().process(&host).unwrap();
//! assert!(attempt.succeeded());
//! assert_eq!(host.succeeded()[0].content, br#"{"a":1}"#.to_vec());
//! ```
//!
//! ## Example: configuration
//!
//! ```yaml
//! transforms:
//!   - transform: convert_key_case
//!     args: { case: snake }
//!   - transform: add_uuid_field
//!     args:
//!       field: record_uuid
//!       template: "${customer_id}-${created_at:date}"
//! ```

// Core modules
pub mod document;
pub mod codec;
pub mod transform_registry;
pub mod transforms;

// Stage and hosts
pub mod host;
pub mod stage;
pub mod worker;
pub mod config;

// NATS JetStream integration
pub mod nats;

// Re-export key types
pub use document::{Document, Mapping};
pub use codec::{Codec, CodecError, Format, JsonCodec, YamlCodec};
pub use transform_registry::{Transform, TransformArgs, TransformError, TransformRegistry};
pub use transforms::Chain;
pub use host::{HostError, HostSession, InMemoryHost, MemoryRecord, Outcome, RecordHandle};
pub use stage::{Attempt, RecordTransformStage, StageError};
pub use worker::{run_pool, run_worker, WorkerConfig, WorkerStats};
pub use config::{ConfigError, ConfiguredStage, StageConfig};

// Re-export nats types
pub use nats::{JetStreamHost, NatsClient, NatsConfig, RecordEnvelope};
