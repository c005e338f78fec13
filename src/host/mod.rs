//! Host queue interface.
//!
//! The stage consumes the host framework only through [`HostSession`]:
//! dequeue a record, open a read/write transaction over its content, and
//! commit it to an [`Outcome`]. Adapters live in submodules.

pub mod memory;

pub use memory::{ClaimedRecord, CommittedRecord, InMemoryHost, MemoryRecord};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Terminal routing decision for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    /// Relation name used by hosts that route by name.
    pub fn relation(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relation())
    }
}

/// Error type for host operations
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// The record's content could not be opened
    Transaction(String),
    /// The record could not be routed
    Commit(String),
    /// The host itself is unreachable
    Unavailable(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::Transaction(msg) => write!(f, "Transaction error: {}", msg),
            HostError::Commit(msg) => write!(f, "Commit error: {}", msg),
            HostError::Unavailable(msg) => write!(f, "Host unavailable: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

/// A record handle checked out from a host.
pub trait RecordHandle {
    /// Stable identifier used in logs.
    fn record_id(&self) -> Uuid;
}

/// Interface a host framework exposes to a record transform stage.
///
/// Methods take `&self` so one host can be shared by several worker threads;
/// each dequeued record is owned by exactly one caller until it is moved into
/// [`HostSession::commit`].
pub trait HostSession: Sync {
    type Record: RecordHandle;
    type Reader: Read;
    type Writer: Write;

    /// Take the next available record without waiting indefinitely.
    ///
    /// `None` means nothing is available right now.
    fn dequeue(&self) -> Option<Self::Record>;

    /// Open a scoped transaction over a record's content.
    ///
    /// The reader yields the full prior content once. Bytes written to the
    /// writer become the new content only if the record is later committed
    /// with [`Outcome::Success`]; a [`Outcome::Failure`] commit must leave the
    /// original content in place.
    fn open_transaction(
        &self,
        record: &Self::Record,
    ) -> Result<(Self::Reader, Self::Writer), HostError>;

    /// Route a record to its terminal outcome and release it.
    fn commit(&self, record: Self::Record, outcome: Outcome) -> Result<(), HostError>;
}

/// Write sink that buffers bytes and publishes them to a shared slot when
/// dropped. Hosts use it to stage new content until commit.
#[derive(Debug)]
pub struct StagedWriter {
    slot: StagingSlot,
    buffer: Vec<u8>,
    touched: bool,
}

/// Slot shared between a [`StagedWriter`] and its host.
pub type StagingSlot = Arc<Mutex<Option<Vec<u8>>>>;

impl StagedWriter {
    pub fn new(slot: StagingSlot) -> Self {
        Self {
            slot,
            buffer: Vec::new(),
            touched: false,
        }
    }

    fn publish(&mut self) {
        if self.touched {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            *slot = Some(std::mem::take(&mut self.buffer));
            self.touched = false;
        }
    }
}

impl Write for StagedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.touched = true;
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Drop for StagedWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Take staged bytes out of a slot.
pub fn take_staged(slot: &StagingSlot) -> Option<Vec<u8>> {
    slot.lock().unwrap_or_else(|e| e.into_inner()).take()
}
