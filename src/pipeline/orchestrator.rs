//! The pipeline orchestrator: owns the collaborators, wires the stage graph,
//! and drives single, interval, and cron execution.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;
use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{CronConfig, PullConfig, PushConfig, Timer};
use crate::contract::{Filter, RecordReceiver, Sink, Source, Transformer};
use crate::error::PipelineError;
use crate::metrics::{Metrics, MetricsSnapshot};

use super::stage;

/// Capacity of the bounded error-report queue.
///
/// Scheduled-run failures beyond this capacity are dropped, never queued
/// against the scheduler.
pub const ERROR_QUEUE_CAPACITY: usize = 100;

/// A data pipeline: one source, a filter chain, an ordered transform chain,
/// and one sink, plus optional scheduling and pull/push configuration.
///
/// Execution methods take `&mut self`, so a pipeline has at most one active
/// run at a time; the scheduled modes serialize successive runs internally.
/// The source and sink belong exclusively to this pipeline unless the
/// collaborator implementation documents otherwise.
pub struct Pipeline {
    name: String,
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    transformers: Vec<Box<dyn Transformer>>,
    filters: Vec<Arc<dyn Filter>>,
    timer: Option<Timer>,
    cron_config: Option<CronConfig>,
    pull_config: Option<PullConfig>,
    push_config: Option<PushConfig>,
    metrics: Arc<Metrics>,
    error_tx: mpsc::Sender<PipelineError>,
    error_rx: Option<mpsc::Receiver<PipelineError>>,
}

impl Pipeline {
    /// Creates a pipeline over the given source and sink.
    pub fn new(
        name: impl Into<String>,
        source: impl Source + 'static,
        sink: impl Sink + 'static,
    ) -> Self {
        let (error_tx, error_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);
        Self {
            name: name.into(),
            source: Box::new(source),
            sink: Box::new(sink),
            transformers: Vec::new(),
            filters: Vec::new(),
            timer: None,
            cron_config: None,
            pull_config: None,
            push_config: None,
            metrics: Arc::new(Metrics::new()),
            error_tx,
            error_rx: Some(error_rx),
        }
    }

    /// Appends a transformer to the chain. Transformers run in attachment
    /// order.
    pub fn add_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Appends a filter to the chain. A record must pass every filter to
    /// reach the transform chain.
    pub fn with_filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Configures interval-mode scheduling.
    pub fn with_timer(mut self, timer: Timer) -> Self {
        self.timer = Some(timer);
        self
    }

    /// Configures cron-mode scheduling.
    pub fn with_cron(mut self, config: CronConfig) -> Self {
        self.cron_config = Some(config);
        self
    }

    /// Configures pull-mode acquisition hints. Pull mode is used only when
    /// the source also implements the pull capability.
    pub fn with_pull_config(mut self, config: PullConfig) -> Self {
        self.pull_config = Some(config);
        self
    }

    /// Configures push-mode delivery hints. Push mode is used only when the
    /// sink also implements the push capability.
    pub fn with_push_config(mut self, config: PushConfig) -> Self {
        self.push_config = Some(config);
        self
    }

    /// Returns the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns an atomic copy of the current metrics.
    pub async fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot().await
    }

    /// Returns a shared handle for observing metrics concurrently with runs.
    pub fn metrics_handle(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Hands the consuming end of the error-report queue to an observer.
    /// Returns `None` after the first call.
    pub fn take_error_receiver(&mut self) -> Option<mpsc::Receiver<PipelineError>> {
        self.error_rx.take()
    }

    /// Executes the pipeline once: acquire, filter, transform, deliver.
    ///
    /// A failure at any stage aborts the run and is returned with a stage
    /// tag; nothing is retried. A run truncated by cancellation returns
    /// `Ok(())` with metrics reflecting only the records that had already
    /// passed each stage.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        debug!(pipeline = %self.name, "starting run");
        self.metrics.mark_run_started().await;
        let result = self.run_inner(cancel).await;
        self.metrics.mark_run_finished().await;
        match &result {
            Ok(()) => debug!(pipeline = %self.name, "run complete"),
            Err(err) => warn!(pipeline = %self.name, error = %err, "run failed"),
        }
        result
    }

    async fn run_inner(&self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        let records = self.acquire(cancel).await?;

        let filtered = stage::spawn_filter_stage(
            self.filters.clone(),
            records,
            self.metrics.clone(),
            cancel.clone(),
        );

        let mut current = filtered;
        for (index, transformer) in self.transformers.iter().enumerate() {
            current = transformer
                .transform(cancel, current)
                .await
                .map_err(|source| PipelineError::Transform {
                    stage: transformer.name().to_string(),
                    index,
                    source,
                })?;
        }

        self.deliver(cancel, current).await
    }

    /// Acquires the record stream, in pull mode when both the capability and
    /// a pull configuration are present.
    async fn acquire(&self, cancel: &CancellationToken) -> Result<RecordReceiver, PipelineError> {
        if let (Some(config), Some(pull)) = (&self.pull_config, self.source.as_pull()) {
            let records = pull
                .pull(cancel, config)
                .await
                .map_err(PipelineError::Acquisition)?;
            self.metrics.mark_pulled().await;
            debug!(
                pipeline = %self.name,
                batch_size = config.batch_size,
                "acquired stream in pull mode"
            );
            return Ok(records);
        }
        self.source
            .read(cancel)
            .await
            .map_err(PipelineError::Acquisition)
    }

    /// Delivers the final stream to the sink, in push mode when both the
    /// capability and a push configuration are present.
    async fn deliver(
        &self,
        cancel: &CancellationToken,
        input: RecordReceiver,
    ) -> Result<(), PipelineError> {
        if let (Some(config), Some(push)) = (&self.push_config, self.sink.as_push()) {
            let batch = stage::drain_stream(input, cancel).await;
            if cancel.is_cancelled() {
                // The batch may be truncated; do not deliver it partially.
                return Ok(());
            }
            let count = batch.len() as u64;
            push.push(cancel, batch, config)
                .await
                .map_err(PipelineError::Delivery)?;
            self.metrics.record_processed(count).await;
            self.metrics.mark_pushed().await;
            debug!(pipeline = %self.name, records = count, "delivered batch in push mode");
            return Ok(());
        }

        let counted = stage::spawn_counting_stage(input, self.metrics.clone(), cancel.clone());
        self.sink
            .write(cancel, counted)
            .await
            .map_err(PipelineError::Delivery)
    }

    /// Repeats [`run`](Self::run) on a fixed interval.
    ///
    /// Degrades to a single run when no timer is configured. The first tick
    /// fires one interval after the loop starts. Per-tick failures are
    /// counted in the metrics and forwarded to the error-report queue; they
    /// never stop the loop. The loop ends when the token is cancelled or the
    /// timer's overall deadline elapses, returned as
    /// [`PipelineError::Cancelled`] / [`PipelineError::DeadlineElapsed`].
    pub async fn run_with_timer(&mut self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        let timer = match &self.timer {
            Some(timer) => timer.clone(),
            None => return self.run(cancel).await,
        };

        info!(
            pipeline = %self.name,
            interval_ms = timer.interval.as_millis() as u64,
            "starting interval loop"
        );

        // Cancelling the loop token stops in-flight stages as well, whether
        // the trigger was the caller's token or the deadline.
        let loop_token = cancel.child_token();
        if let Some(timeout) = timer.timeout {
            let guard = loop_token.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = guard.cancelled() => {}
                    _ = sleep(timeout) => guard.cancel(),
                }
            });
        }

        let mut ticker = interval_at(Instant::now() + timer.interval, timer.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = loop_token.cancelled() => {
                    let reason = if cancel.is_cancelled() {
                        PipelineError::Cancelled
                    } else {
                        PipelineError::DeadlineElapsed
                    };
                    info!(pipeline = %self.name, reason = %reason, "interval loop stopped");
                    return Err(reason);
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.run(&loop_token).await {
                        self.metrics.record_error().await;
                        self.report_error(err);
                    }
                }
            }
        }
    }

    /// Repeats [`run`](Self::run) on a cron schedule.
    ///
    /// Degrades to a single run when cron is absent or disabled. An invalid
    /// expression aborts before any run. The schedule is lossy: ticks missed
    /// while a run is in flight are not queued, only the next future
    /// occurrence matters. Cancellation is the final result.
    pub async fn run_with_cron(&mut self, cancel: &CancellationToken) -> Result<(), PipelineError> {
        let config = match &self.cron_config {
            Some(config) if config.enabled => config.clone(),
            _ => return self.run(cancel).await,
        };

        // The cron crate expects a seconds field; anchor five-field
        // expressions at second zero.
        let schedule = Schedule::from_str(&format!("0 {}", config.schedule.trim())).map_err(
            |err| PipelineError::Schedule {
                schedule: config.schedule.clone(),
                source: anyhow::Error::from(err),
            },
        )?;

        info!(pipeline = %self.name, schedule = %config.schedule, "starting cron loop");

        loop {
            let next = match schedule.upcoming(Utc).next() {
                Some(next) => next,
                None => {
                    return Err(PipelineError::Schedule {
                        schedule: config.schedule.clone(),
                        source: anyhow::anyhow!("schedule has no future occurrence"),
                    });
                }
            };
            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            debug!(pipeline = %self.name, next_run = %next, "sleeping until next cron occurrence");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(pipeline = %self.name, "cron loop cancelled");
                    return Err(PipelineError::Cancelled);
                }
                _ = sleep(wait) => {
                    if let Err(err) = self.run(cancel).await {
                        self.metrics.record_error().await;
                        self.report_error(err);
                    }
                }
            }
        }
    }

    /// Closes the source, then the sink. Both closes are attempted; the
    /// first failure is returned.
    pub async fn stop(&mut self) -> Result<(), PipelineError> {
        info!(pipeline = %self.name, "stopping pipeline");

        let source_result = self.source.close().await;
        let sink_result = self.sink.close().await;

        if let Err(source) = source_result {
            if let Err(sink) = &sink_result {
                warn!(pipeline = %self.name, error = %sink, "sink close also failed");
            }
            return Err(PipelineError::Shutdown {
                role: "source",
                source,
            });
        }
        sink_result.map_err(|source| PipelineError::Shutdown {
            role: "sink",
            source,
        })
    }

    /// Non-blocking hand-off to the bounded error-report queue. A full
    /// queue drops the error rather than stalling the scheduler.
    fn report_error(&self, err: PipelineError) {
        match self.error_tx.try_send(err) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(err)) => {
                warn!(pipeline = %self.name, error = %err, "error report queue full, dropping");
            }
            Err(mpsc::error::TrySendError::Closed(err)) => {
                debug!(pipeline = %self.name, error = %err, "error report receiver gone");
            }
        }
    }
}
