//! In-memory host.
//!
//! A FIFO queue of records plus success/failure relations, all behind one
//! mutex. Used by the CLI `apply` command and by tests.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::Mutex;
use uuid::Uuid;

use super::{take_staged, HostError, HostSession, Outcome, RecordHandle, StagedWriter, StagingSlot};

/// A flow record held by the in-memory host.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub content: Vec<u8>,
    pub attributes: HashMap<String, String>,
}

impl MemoryRecord {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A record after commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedRecord {
    pub record: MemoryRecord,
    pub outcome: Outcome,
    /// Whether the stage wrote new content during its transaction
    pub written: bool,
}

/// Handle to a record checked out of an [`InMemoryHost`].
#[derive(Debug)]
pub struct ClaimedRecord {
    record: MemoryRecord,
    staged: StagingSlot,
}

impl RecordHandle for ClaimedRecord {
    fn record_id(&self) -> Uuid {
        self.record.id
    }
}

#[derive(Debug, Default)]
struct HostState {
    queue: VecDeque<MemoryRecord>,
    committed: Vec<CommittedRecord>,
    dequeued: usize,
    transactions_opened: usize,
    fail_transactions: bool,
}

/// Thread-safe in-memory host.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueue raw content and return the new record's id.
    pub fn enqueue(&self, content: impl Into<Vec<u8>>) -> Uuid {
        self.enqueue_record(MemoryRecord::new(content))
    }

    pub fn enqueue_record(&self, record: MemoryRecord) -> Uuid {
        let id = record.id;
        self.state().queue.push_back(record);
        id
    }

    /// Make every following `open_transaction` fail.
    pub fn set_transaction_failure(&self, fail: bool) {
        self.state().fail_transactions = fail;
    }

    pub fn pending(&self) -> usize {
        self.state().queue.len()
    }

    pub fn dequeued(&self) -> usize {
        self.state().dequeued
    }

    pub fn transactions_opened(&self) -> usize {
        self.state().transactions_opened
    }

    pub fn commit_count(&self) -> usize {
        self.state().committed.len()
    }

    /// All committed records in commit order.
    pub fn committed(&self) -> Vec<CommittedRecord> {
        self.state().committed.clone()
    }

    /// Records routed to the success relation.
    pub fn succeeded(&self) -> Vec<MemoryRecord> {
        self.routed(Outcome::Success)
    }

    /// Records routed to the failure relation.
    pub fn failed(&self) -> Vec<MemoryRecord> {
        self.routed(Outcome::Failure)
    }

    fn routed(&self, outcome: Outcome) -> Vec<MemoryRecord> {
        self.state()
            .committed
            .iter()
            .filter(|c| c.outcome == outcome)
            .map(|c| c.record.clone())
            .collect()
    }

    /// Find the committed state of a record.
    pub fn find(&self, id: Uuid) -> Option<CommittedRecord> {
        self.state()
            .committed
            .iter()
            .find(|c| c.record.id == id)
            .cloned()
    }
}

impl HostSession for InMemoryHost {
    type Record = ClaimedRecord;
    type Reader = Cursor<Vec<u8>>;
    type Writer = StagedWriter;

    fn dequeue(&self) -> Option<ClaimedRecord> {
        let mut state = self.state();
        let record = state.queue.pop_front()?;
        state.dequeued += 1;
        Some(ClaimedRecord {
            record,
            staged: StagingSlot::default(),
        })
    }

    fn open_transaction(
        &self,
        record: &ClaimedRecord,
    ) -> Result<(Self::Reader, Self::Writer), HostError> {
        let mut state = self.state();
        if state.fail_transactions {
            return Err(HostError::Transaction(format!(
                "content of record {} is unavailable",
                record.record.id
            )));
        }
        state.transactions_opened += 1;

        Ok((
            Cursor::new(record.record.content.clone()),
            StagedWriter::new(record.staged.clone()),
        ))
    }

    fn commit(&self, claimed: ClaimedRecord, outcome: Outcome) -> Result<(), HostError> {
        let ClaimedRecord { mut record, staged } = claimed;
        let staged = take_staged(&staged);
        let written = staged.is_some();

        if outcome == Outcome::Success {
            if let Some(content) = staged {
                record.content = content;
            }
        }

        self.state().committed.push(CommittedRecord {
            record,
            outcome,
            written,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn test_fifo_dequeue() {
        let host = InMemoryHost::new();
        let first = host.enqueue("1");
        let second = host.enqueue("2");

        assert_eq!(host.dequeue().map(|r| r.record_id()), Some(first));
        assert_eq!(host.dequeue().map(|r| r.record_id()), Some(second));
        assert!(host.dequeue().is_none());
        assert_eq!(host.dequeued(), 2);
    }

    #[test]
    fn test_success_commit_replaces_content() {
        let host = InMemoryHost::new();
        let id = host.enqueue("old");
        let record = host.dequeue().unwrap();

        {
            let (mut reader, mut writer) = host.open_transaction(&record).unwrap();
            let mut content = String::new();
            reader.read_to_string(&mut content).unwrap();
            assert_eq!(content, "old");
            writer.write_all(b"new").unwrap();
        }
        host.commit(record, Outcome::Success).unwrap();

        let committed = host.find(id).unwrap();
        assert_eq!(committed.record.content, b"new".to_vec());
        assert!(committed.written);
    }

    #[test]
    fn test_failure_commit_discards_staged_content() {
        let host = InMemoryHost::new();
        let id = host.enqueue("original");
        let record = host.dequeue().unwrap();

        {
            let (_reader, mut writer) = host.open_transaction(&record).unwrap();
            writer.write_all(b"partial").unwrap();
        }
        host.commit(record, Outcome::Failure).unwrap();

        assert_eq!(host.failed()[0].content, b"original".to_vec());
        assert!(host.find(id).unwrap().written);
    }

    #[test]
    fn test_attributes_survive_commit() {
        let host = InMemoryHost::new();
        host.enqueue_record(MemoryRecord::new("{}").with_attribute("filename", "a.json"));

        let record = host.dequeue().unwrap();
        host.commit(record, Outcome::Success).unwrap();

        assert_eq!(
            host.succeeded()[0].attributes.get("filename").map(String::as_str),
            Some("a.json")
        );
    }

    #[test]
    fn test_transaction_failure_injection() {
        let host = InMemoryHost::new();
        host.enqueue("x");
        host.set_transaction_failure(true);
        let record = host.dequeue().unwrap();

        assert!(matches!(host.open_transaction(&record), Err(HostError::Transaction(_))));
        assert_eq!(host.transactions_opened(), 0);
    }
}
