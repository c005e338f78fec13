//! Integration tests for the record transform stage protocol

use std::io::{Cursor, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

use flowstep::host::{HostError, HostSession, Outcome, RecordHandle};
use flowstep::{
    run_pool, Document, InMemoryHost, RecordTransformStage, StageError, TransformError,
    WorkerConfig,
};
use serde_json::json;
use uuid::Uuid;

fn decode(bytes: &[u8]) -> Document {
    serde_json::from_slice(bytes).unwrap()
}

#[test]
fn test_each_record_is_committed_exactly_once() {
    let host = InMemoryHost::new();
    let inputs = ["{}", "[1, 2]", "{\"a\":", "\"text\"", "", "null"];
    for input in inputs {
        host.enqueue(input);
    }
    let stage = RecordTransformStage::identity();

    let mut attempts = Vec::new();
    while let Some(attempt) = stage.process(&host) {
        attempts.push(attempt);
    }

    assert_eq!(attempts.len(), inputs.len());
    assert_eq!(host.commit_count(), inputs.len());
    assert_eq!(host.succeeded().len(), 4);
    assert_eq!(host.failed().len(), 2);
}

#[test]
fn test_success_content_decodes_to_transformed_document() {
    let host = InMemoryHost::new();
    host.enqueue(r#"{"count": 2}"#);
    let double = |doc: Document| -> Result<Document, TransformError> {
        let count = doc.get("count").and_then(|d| d.as_i64()).unwrap_or(0);
        Ok(Document::from(json!({"count": count * 2})))
    };

    RecordTransformStage::new(double).process(&host).unwrap();

    assert_eq!(decode(&host.succeeded()[0].content), Document::from(json!({"count": 4})));
}

#[test]
fn test_failure_keeps_original_bytes() {
    let host = InMemoryHost::new();
    let original = b"\xff\xfe not utf-8".to_vec();
    let id = host.enqueue(original.clone());

    let attempt = RecordTransformStage::identity().process(&host).unwrap();

    assert!(matches!(attempt.error, Some(StageError::Decode(_))));
    let committed = host.find(id).unwrap();
    assert_eq!(committed.outcome, Outcome::Failure);
    assert_eq!(committed.record.content, original);
    assert!(!committed.written);
}

#[test]
fn test_transform_sees_input_only_once_and_does_not_leak_state() {
    let host = InMemoryHost::new();
    host.enqueue(r#"{"n": 1}"#);
    host.enqueue(r#"{"n": 2}"#);
    let seen = Mutex::new(Vec::new());
    let recorder = |doc: Document| -> Result<Document, TransformError> {
        seen.lock().unwrap().push(doc.clone());
        Ok(doc)
    };
    let stage = RecordTransformStage::new(recorder);

    stage.process(&host).unwrap();
    stage.process(&host).unwrap();

    let seen = seen.into_inner().unwrap();
    assert_eq!(seen, vec![
        Document::from(json!({"n": 1})),
        Document::from(json!({"n": 2})),
    ]);
}

#[test]
fn test_pool_processes_mixed_queue() {
    let host = InMemoryHost::new();
    for i in 0..40 {
        if i % 5 == 0 {
            host.enqueue("{broken");
        } else {
            host.enqueue(format!("{{\"i\": {}}}", i));
        }
    }

    let stats = run_pool(
        &RecordTransformStage::identity(),
        &host,
        &WorkerConfig::drain(3),
        &AtomicBool::new(false),
    );

    assert_eq!(stats.processed, 40);
    assert_eq!(stats.failed, 8);
    assert_eq!(host.succeeded().len(), 32);
    assert_eq!(host.failed().len(), 8);
}

/// Host whose writer rejects every write and whose commits are recorded.
#[derive(Default)]
struct BrokenWriterHost {
    queue: Mutex<Vec<Uuid>>,
    commits: Mutex<Vec<(Uuid, Outcome)>>,
}

struct Claimed(Uuid);

impl RecordHandle for Claimed {
    fn record_id(&self) -> Uuid {
        self.0
    }
}

struct RejectingWriter;

impl Write for RejectingWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl HostSession for BrokenWriterHost {
    type Record = Claimed;
    type Reader = Cursor<Vec<u8>>;
    type Writer = RejectingWriter;

    fn dequeue(&self) -> Option<Claimed> {
        self.queue.lock().unwrap().pop().map(Claimed)
    }

    fn open_transaction(&self, _record: &Claimed) -> Result<(Self::Reader, Self::Writer), HostError> {
        Ok((Cursor::new(b"{\"ok\": true}".to_vec()), RejectingWriter))
    }

    fn commit(&self, record: Claimed, outcome: Outcome) -> Result<(), HostError> {
        self.commits.lock().unwrap().push((record.0, outcome));
        Err(HostError::Commit("route closed".to_string()))
    }
}

#[test]
fn test_write_error_routes_to_failure_and_commit_error_is_reported() {
    let id = Uuid::new_v4();
    let host = BrokenWriterHost::default();
    host.queue.lock().unwrap().push(id);

    let attempt = RecordTransformStage::identity().process(&host).unwrap();

    assert_eq!(attempt.outcome, Outcome::Failure);
    assert!(matches!(attempt.error, Some(StageError::Write(_))));
    assert_eq!(attempt.commit_error, Some(HostError::Commit("route closed".to_string())));
    assert_eq!(*host.commits.lock().unwrap(), vec![(id, Outcome::Failure)]);
}
