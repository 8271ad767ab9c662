//! Ready-made collaborators: closure-backed filters and transformers, and
//! in-memory source/sink implementations.
//!
//! These cover embedding scenarios that need no external transport and give
//! tests concrete counterparts for every capability contract. Transport
//! connectors (Kafka, Elasticsearch, object stores, ...) belong in their own
//! crates.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{PullConfig, PushConfig};
use crate::contract::{Filter, PullSource, PushSink, RecordReceiver, Sink, Source, Transformer};
use crate::record::Record;

/// A [`Filter`] built from a closure.
pub struct FilterFn<F> {
    predicate: F,
}

impl<F> FilterFn<F>
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    /// Wraps a predicate closure as a pipeline filter.
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> Filter for FilterFn<F>
where
    F: Fn(&Record) -> bool + Send + Sync,
{
    fn apply(&self, record: &Record) -> bool {
        (self.predicate)(record)
    }
}

/// A [`Transformer`] that maps every record through a closure.
pub struct MapTransformer {
    name: String,
    map: Arc<dyn Fn(Record) -> Record + Send + Sync>,
}

impl MapTransformer {
    /// Creates a mapping stage with the given name.
    pub fn new(
        name: impl Into<String>,
        map: impl Fn(Record) -> Record + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            map: Arc::new(map),
        }
    }
}

#[async_trait]
impl Transformer for MapTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(
        &self,
        cancel: &CancellationToken,
        mut input: RecordReceiver,
    ) -> anyhow::Result<RecordReceiver> {
        let (tx, rx) = mpsc::channel(1);
        let map = self.map.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let record = tokio::select! {
                    _ = cancel.cancelled() => break,
                    record = input.recv() => match record {
                        Some(record) => record,
                        None => break,
                    },
                };
                let mapped = map(record);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(mapped) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// A [`Transformer`] that forwards only records matching a predicate.
///
/// Unlike the pipeline's filter chain this is an ordinary chain stage: records
/// it drops are not counted in `filtered_records`.
pub struct FilterTransformer {
    name: String,
    predicate: Arc<dyn Fn(&Record) -> bool + Send + Sync>,
}

impl FilterTransformer {
    /// Creates a predicate stage with the given name.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }
}

#[async_trait]
impl Transformer for FilterTransformer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(
        &self,
        cancel: &CancellationToken,
        mut input: RecordReceiver,
    ) -> anyhow::Result<RecordReceiver> {
        let (tx, rx) = mpsc::channel(1);
        let predicate = self.predicate.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let record = tokio::select! {
                    _ = cancel.cancelled() => break,
                    record = input.recv() => match record {
                        Some(record) => record,
                        None => break,
                    },
                };
                if !predicate(&record) {
                    continue;
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(record) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// A [`Source`] that replays a fixed set of records from memory.
///
/// Non-restartable: the records are handed out once; a second `read` yields
/// an empty stream. Also implements the pull capability, serving at most
/// `batch_size` records per pull call.
pub struct MemorySource {
    records: Mutex<Vec<Record>>,
}

impl MemorySource {
    /// Creates a source over the given records.
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    fn take(&self, limit: Option<usize>) -> Vec<Record> {
        let mut records = self.records.lock().expect("memory source lock poisoned");
        match limit {
            Some(limit) if limit < records.len() => {
                let rest = records.split_off(limit);
                std::mem::replace(&mut *records, rest)
            }
            _ => std::mem::take(&mut *records),
        }
    }

    fn stream(batch: Vec<Record>, cancel: &CancellationToken) -> RecordReceiver {
        let (tx, rx) = mpsc::channel(1);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            for record in batch {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(record) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });
        rx
    }
}

#[async_trait]
impl Source for MemorySource {
    async fn read(&self, cancel: &CancellationToken) -> anyhow::Result<RecordReceiver> {
        Ok(Self::stream(self.take(None), cancel))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.records
            .lock()
            .expect("memory source lock poisoned")
            .clear();
        Ok(())
    }

    fn as_pull(&self) -> Option<&dyn PullSource> {
        Some(self)
    }
}

#[async_trait]
impl PullSource for MemorySource {
    async fn pull(
        &self,
        cancel: &CancellationToken,
        config: &PullConfig,
    ) -> anyhow::Result<RecordReceiver> {
        Ok(Self::stream(self.take(Some(config.batch_size)), cancel))
    }
}

/// A [`Sink`] that captures delivered records in memory.
///
/// Implements the push capability as well, so the same sink exercises both
/// streaming and batch delivery. Captured records and the push call count
/// are observable for assertions and ad-hoc inspection.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
    push_calls: AtomicUsize,
}

impl MemorySink {
    /// Creates an empty capturing sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything delivered so far.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .expect("memory sink lock poisoned")
            .clone()
    }

    /// Returns how many times the push capability was invoked.
    pub fn push_calls(&self) -> usize {
        self.push_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn write(
        &self,
        cancel: &CancellationToken,
        mut input: RecordReceiver,
    ) -> anyhow::Result<()> {
        loop {
            let record = tokio::select! {
                _ = cancel.cancelled() => break,
                record = input.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };
            self.records
                .lock()
                .expect("memory sink lock poisoned")
                .push(record);
        }
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn as_push(&self) -> Option<&dyn PushSink> {
        Some(self)
    }
}

#[async_trait]
impl PushSink for MemorySink {
    async fn push(
        &self,
        _cancel: &CancellationToken,
        batch: Vec<Record>,
        _config: &PushConfig,
    ) -> anyhow::Result<()> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .expect("memory sink lock poisoned")
            .extend(batch);
        Ok(())
    }
}
