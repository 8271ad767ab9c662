//! Concurrency-safe counters and timestamps describing pipeline runs.
//!
//! Each [`Pipeline`](crate::pipeline::Pipeline) owns exactly one [`Metrics`]
//! instance for its whole lifetime; two orchestrators never share one.
//! Mutation happens from the running pipeline, reads come from any observer
//! holding a handle; everything goes through a single read/write lock and
//! reads are atomic snapshot copies. Counters are never reset.

use serde::Serialize;
use tokio::sync::RwLock;

/// Point-in-time copy of a pipeline's metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Records handed to the sink across all runs.
    pub records_processed: u64,
    /// Failed scheduled runs.
    pub errors: u64,
    /// Records dropped by the filter chain.
    pub filtered_records: u64,
    /// Epoch seconds when the most recent run started. Zero before any run.
    pub start_time: i64,
    /// Epoch seconds when the most recent run finished. Zero before any run.
    pub end_time: i64,
    /// Epoch seconds of the last successful pull-mode acquisition.
    pub last_pull_time: i64,
    /// Epoch seconds of the last successful push-mode delivery.
    pub last_push_time: i64,
}

/// Lock-guarded mutable metrics owned by one pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: RwLock<MetricsSnapshot>,
}

impl Metrics {
    /// Creates zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an atomic copy of the current values.
    pub async fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.read().await
    }

    pub(crate) async fn record_processed(&self, count: u64) {
        self.inner.write().await.records_processed += count;
    }

    pub(crate) async fn record_error(&self) {
        self.inner.write().await.errors += 1;
    }

    pub(crate) async fn record_filtered(&self) {
        self.inner.write().await.filtered_records += 1;
    }

    pub(crate) async fn mark_run_started(&self) {
        self.inner.write().await.start_time = chrono::Utc::now().timestamp();
    }

    pub(crate) async fn mark_run_finished(&self) {
        self.inner.write().await.end_time = chrono::Utc::now().timestamp();
    }

    pub(crate) async fn mark_pulled(&self) {
        self.inner.write().await.last_pull_time = chrono::Utc::now().timestamp();
    }

    pub(crate) async fn mark_pushed(&self) {
        self.inner.write().await.last_push_time = chrono::Utc::now().timestamp();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let metrics = Metrics::new();
        metrics.record_processed(2).await;

        let before = metrics.snapshot().await;
        metrics.record_processed(3).await;
        let after = metrics.snapshot().await;

        assert_eq!(before.records_processed, 2);
        assert_eq!(after.records_processed, 5);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = metrics.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    metrics.record_filtered().await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(metrics.snapshot().await.filtered_records, 800);
    }

    #[tokio::test]
    async fn test_run_timestamps_are_stamped() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().await.start_time, 0);

        metrics.mark_run_started().await;
        metrics.mark_run_finished().await;

        let snapshot = metrics.snapshot().await;
        assert!(snapshot.start_time > 0);
        assert!(snapshot.end_time >= snapshot.start_time);
    }
}
