//! Stream plumbing stages between source and sink.
//!
//! Each stage is a function that takes an input receiver and returns an
//! output receiver, backed by a spawned task. Stages hand records over
//! through capacity-1 channels and select on the cancellation token at every
//! receive and send, so a cancelled stage stops its loop, drops its ends,
//! and lets its neighbors unwind through channel closure.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::contract::{Filter, RecordReceiver};
use crate::metrics::Metrics;
use crate::record::Record;

/// Spawns the filter chain stage between the source stream and the transform
/// chain.
///
/// A record must pass every filter, in configured order, to be forwarded;
/// evaluation short-circuits at the first failing predicate and the drop is
/// counted once in `filtered_records`. Survivors keep their arrival order.
pub(crate) fn spawn_filter_stage(
    filters: Vec<Arc<dyn Filter>>,
    mut input: RecordReceiver,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> RecordReceiver {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            let record = tokio::select! {
                _ = cancel.cancelled() => break,
                record = input.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };
            if filters.iter().any(|filter| !filter.apply(&record)) {
                metrics.record_filtered().await;
                tracing::trace!(record_id = %record.id, "record dropped by filter chain");
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
    rx
}

/// Spawns the delivery counting stage in front of a streaming sink.
///
/// Every record forwarded to the sink increments `records_processed`.
pub(crate) fn spawn_counting_stage(
    mut input: RecordReceiver,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> RecordReceiver {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            let record = tokio::select! {
                _ = cancel.cancelled() => break,
                record = input.recv() => match record {
                    Some(record) => record,
                    None => break,
                },
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                sent = tx.send(record) => {
                    match sent {
                        Ok(()) => metrics.record_processed(1).await,
                        Err(_) => break,
                    }
                }
            }
        }
    });
    rx
}

/// Materializes a stream into a finite ordered batch for push-mode delivery.
///
/// Returns whatever arrived before the stream closed; callers must check the
/// token before treating a truncated batch as complete.
pub(crate) async fn drain_stream(
    input: RecordReceiver,
    cancel: &CancellationToken,
) -> Vec<Record> {
    let mut stream = ReceiverStream::new(input);
    let mut batch = Vec::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            record = stream.next() => match record {
                Some(record) => batch.push(record),
                None => break,
            },
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::FilterFn;

    fn record(id: &str, fields: usize) -> Record {
        let mut r = Record::new(id);
        for i in 0..fields {
            r = r.with_field(format!("f{}", i), i as i64);
        }
        r
    }

    fn feed(records: Vec<Record>) -> RecordReceiver {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            for r in records {
                if tx.send(r).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    #[tokio::test]
    async fn test_filter_stage_preserves_survivor_order() {
        let filters: Vec<Arc<dyn Filter>> =
            vec![Arc::new(FilterFn::new(|r: &Record| !r.data.is_empty()))];
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();

        let input = feed(vec![
            record("a", 1),
            record("b", 0),
            record("c", 2),
            record("d", 0),
            record("e", 3),
        ]);
        let mut out = spawn_filter_stage(filters, input, metrics.clone(), cancel);

        let mut ids = Vec::new();
        while let Some(r) = out.recv().await {
            ids.push(r.id);
        }
        assert_eq!(ids, vec!["a", "c", "e"]);
        assert_eq!(metrics.snapshot().await.filtered_records, 2);
    }

    #[tokio::test]
    async fn test_filter_stage_counts_each_drop_once() {
        // Both filters reject the record; only the first failure counts.
        let filters: Vec<Arc<dyn Filter>> = vec![
            Arc::new(FilterFn::new(|_: &Record| false)),
            Arc::new(FilterFn::new(|_: &Record| false)),
        ];
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();

        let input = feed(vec![record("a", 1)]);
        let mut out = spawn_filter_stage(filters, input, metrics.clone(), cancel);

        assert!(out.recv().await.is_none());
        assert_eq!(metrics.snapshot().await.filtered_records, 1);
    }

    #[tokio::test]
    async fn test_counting_stage_counts_forwarded_records() {
        let metrics = Arc::new(Metrics::new());
        let cancel = CancellationToken::new();

        let input = feed(vec![record("a", 1), record("b", 1), record("c", 1)]);
        let mut out = spawn_counting_stage(input, metrics.clone(), cancel);

        let mut count = 0;
        while out.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(metrics.snapshot().await.records_processed, 3);
    }

    #[tokio::test]
    async fn test_drain_collects_in_order() {
        let cancel = CancellationToken::new();
        let input = feed(vec![record("1", 1), record("2", 1), record("3", 1)]);

        let batch = drain_stream(input, &cancel).await;
        let ids: Vec<_> = batch.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_drain_stops_on_cancellation() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<Record>(1);

        let token = cancel.clone();
        tokio::spawn(async move {
            tx.send(record("1", 1)).await.expect("receiver alive");
            token.cancel();
            // Keep the sender open so only cancellation can end the drain.
            token.cancelled().await;
        });

        let batch = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            drain_stream(rx, &cancel),
        )
        .await
        .expect("drain should return promptly after cancellation");
        assert!(batch.len() <= 1);
        assert!(cancel.is_cancelled());
    }
}
