//! Record transform stage.
//!
//! One call to [`RecordTransformStage::process`] handles at most one record:
//!
//! 1. Dequeue a record; return `None` if the queue is empty
//! 2. Open a read/write transaction and read the whole prior content
//! 3. Decode it into a [`Document`]
//! 4. Apply the transform
//! 5. Encode the result into a complete buffer, then write it in one go
//! 6. Commit the record to success, or to failure if any step failed
//!
//! Errors never escape `process`; they are reported through the commit
//! outcome and the returned [`Attempt`].

use std::fmt;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::codec::{Codec, CodecError, JsonCodec};
use crate::document::Document;
use crate::host::{HostError, HostSession, Outcome, RecordHandle};
use crate::transform_registry::{Transform, TransformError};
use crate::transforms::Identity;

/// Why an attempt was routed to failure.
#[derive(Debug)]
pub enum StageError {
    /// The host could not open the record's content
    Transaction(HostError),
    /// Reading the prior content failed
    Read(std::io::Error),
    /// The content is not a valid document
    Decode(CodecError),
    /// The transform rejected the document
    Transform(TransformError),
    /// The transformed document could not be encoded
    Encode(CodecError),
    /// Writing the new content failed
    Write(std::io::Error),
}

impl StageError {
    /// Short machine-friendly name of the failing step.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::Transaction(_) => "transaction",
            StageError::Read(_) => "read",
            StageError::Decode(_) => "decode",
            StageError::Transform(_) => "transform",
            StageError::Encode(_) => "encode",
            StageError::Write(_) => "write",
        }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Transaction(e) => write!(f, "Failed to open record content: {}", e),
            StageError::Read(e) => write!(f, "Failed to read record content: {}", e),
            StageError::Decode(e) => write!(f, "Failed to decode record content: {}", e),
            StageError::Transform(e) => write!(f, "Transform failed: {}", e),
            StageError::Encode(e) => write!(f, "Failed to encode transformed document: {}", e),
            StageError::Write(e) => write!(f, "Failed to write record content: {}", e),
        }
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageError::Transaction(e) => Some(e),
            StageError::Read(e) | StageError::Write(e) => Some(e),
            StageError::Decode(e) | StageError::Encode(e) => Some(e),
            StageError::Transform(e) => Some(e),
        }
    }
}

/// Report of one processed record.
#[derive(Debug)]
pub struct Attempt {
    pub record_id: Uuid,
    pub outcome: Outcome,
    /// Set when the outcome is failure
    pub error: Option<StageError>,
    /// Set when the host rejected the commit itself
    pub commit_error: Option<HostError>,
    pub bytes_read: usize,
    pub bytes_written: usize,
    pub elapsed: Duration,
}

impl Attempt {
    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

#[derive(Default)]
struct Progress {
    bytes_read: usize,
    bytes_written: usize,
}

/// Read-decode-transform-encode-write-commit stage over one record at a time.
///
/// The stage holds no mutable state, so a single instance can be shared by
/// several worker threads as long as the transform is stateless.
#[derive(Debug, Clone)]
pub struct RecordTransformStage<T, C = JsonCodec> {
    transform: T,
    codec: C,
}

impl RecordTransformStage<Identity, JsonCodec> {
    /// Stage that rewrites every record's JSON content unchanged.
    pub fn identity() -> Self {
        Self::new(Identity)
    }
}

impl<T: Transform> RecordTransformStage<T, JsonCodec> {
    /// Create a stage with the JSON codec.
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            codec: JsonCodec::new(),
        }
    }
}

impl<T: Transform, C: Codec> RecordTransformStage<T, C> {
    /// Replace the codec.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> RecordTransformStage<T, C2> {
        RecordTransformStage {
            transform: self.transform,
            codec,
        }
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Process at most one record from the host.
    ///
    /// # Returns
    /// * `None` - No record was available; nothing was opened or committed
    /// * `Some(attempt)` - Exactly one record was committed, to the outcome
    ///   recorded in the attempt
    pub fn process<H: HostSession>(&self, host: &H) -> Option<Attempt> {
        let record = host.dequeue()?;
        let record_id = record.record_id();
        let span = tracing::debug_span!("record", id = %record_id);
        let _enter = span.enter();
        let started = Instant::now();

        let mut progress = Progress::default();
        let result = self.run_transaction(host, &record, &mut progress);

        let outcome = match &result {
            Ok(()) => {
                tracing::debug!(
                    "Record {} transformed by {} ({} -> {} bytes)",
                    record_id,
                    self.transform.name(),
                    progress.bytes_read,
                    progress.bytes_written
                );
                Outcome::Success
            }
            Err(e) => {
                tracing::warn!("Record {} routed to failure: {}", record_id, e);
                Outcome::Failure
            }
        };

        let commit_error = match host.commit(record, outcome) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!("Failed to commit record {} to {}: {}", record_id, outcome, e);
                Some(e)
            }
        };

        Some(Attempt {
            record_id,
            outcome,
            error: result.err(),
            commit_error,
            bytes_read: progress.bytes_read,
            bytes_written: progress.bytes_written,
            elapsed: started.elapsed(),
        })
    }

    /// Steps 2-5. The reader and writer are dropped when this returns, on
    /// every path, before the caller commits.
    fn run_transaction<H: HostSession>(
        &self,
        host: &H,
        record: &H::Record,
        progress: &mut Progress,
    ) -> Result<(), StageError> {
        let (mut reader, mut writer) = host
            .open_transaction(record)
            .map_err(StageError::Transaction)?;

        let mut input = Vec::new();
        reader.read_to_end(&mut input).map_err(StageError::Read)?;
        drop(reader);
        progress.bytes_read = input.len();

        let document = self.codec.decode(&input).map_err(StageError::Decode)?;
        let output = self.apply(document)?;
        let encoded = self.codec.encode(&output).map_err(StageError::Encode)?;

        writer.write_all(&encoded).map_err(StageError::Write)?;
        writer.flush().map_err(StageError::Write)?;
        progress.bytes_written = encoded.len();

        Ok(())
    }

    fn apply(&self, document: Document) -> Result<Document, StageError> {
        self.transform.apply(document).map_err(StageError::Transform)
    }
}
