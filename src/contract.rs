//! Capability contracts for pipeline collaborators.
//!
//! Concrete sources, transformers, and sinks live outside the core and
//! participate through these traits. Record streams are handed between
//! stages as bounded [`mpsc`] receivers; a capacity-1 channel gives the
//! synchronous hand-off the orchestrator assumes.
//!
//! The optional pull/push capabilities are discovered through an explicit
//! query ([`Source::as_pull`], [`Sink::as_push`]) performed once at run
//! start, never through downcasting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{PullConfig, PushConfig};
use crate::record::Record;

/// Receiving end of a record stream handed from one stage to the next.
pub type RecordReceiver = mpsc::Receiver<Record>;

/// Produces a lazy, finite-or-infinite sequence of records.
///
/// A source is not restartable once closed. `read` may fail immediately
/// (configuration or connection error) or emit records until cancellation.
#[async_trait]
pub trait Source: Send + Sync {
    /// Opens the record stream.
    async fn read(&self, cancel: &CancellationToken) -> anyhow::Result<RecordReceiver>;

    /// Releases the source's resources.
    async fn close(&self) -> anyhow::Result<()>;

    /// Returns the pull capability if this source supports request/response
    /// acquisition.
    fn as_pull(&self) -> Option<&dyn PullSource> {
        None
    }
}

/// Capability extension for sources with a request/response acquisition model.
#[async_trait]
pub trait PullSource: Source {
    /// Opens the record stream in pull mode, honoring the given hints.
    async fn pull(
        &self,
        cancel: &CancellationToken,
        config: &PullConfig,
    ) -> anyhow::Result<RecordReceiver>;
}

/// Consumes one record stream and produces another.
///
/// A transformer must preserve record order within a stream unless its own
/// contract states otherwise, and must close its output when its input is
/// exhausted or the cancellation token fires, whichever comes first.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Short name used in stage-tagged errors and log fields.
    fn name(&self) -> &str;

    /// Wires this stage between the given input and a new output stream.
    async fn transform(
        &self,
        cancel: &CancellationToken,
        input: RecordReceiver,
    ) -> anyhow::Result<RecordReceiver>;
}

/// Consumes a record stream until it is exhausted or cancelled.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Drains the given stream into the sink.
    async fn write(&self, cancel: &CancellationToken, input: RecordReceiver) -> anyhow::Result<()>;

    /// Releases the sink's resources.
    async fn close(&self) -> anyhow::Result<()>;

    /// Returns the push capability if this sink prefers materialized batches.
    fn as_push(&self) -> Option<&dyn PushSink> {
        None
    }
}

/// Capability extension for sinks that accept a materialized batch.
#[async_trait]
pub trait PushSink: Sink {
    /// Delivers one materialized, ordered batch, honoring the given hints.
    async fn push(
        &self,
        cancel: &CancellationToken,
        batch: Vec<Record>,
        config: &PushConfig,
    ) -> anyhow::Result<()>;
}

/// Boolean predicate gating record admission into the transform chain.
///
/// Evaluated synchronously inline with the stream; expected to be pure.
pub trait Filter: Send + Sync {
    /// Returns true if the record may proceed.
    fn apply(&self, record: &Record) -> bool;
}

// Shared handles delegate, so an embedder can keep a reference to an owned
// collaborator (e.g. to inspect an in-memory sink after a run). A source or
// sink must still serve only one pipeline unless its implementation
// documents otherwise.

#[async_trait]
impl<T> Source for Arc<T>
where
    T: Source + ?Sized,
{
    async fn read(&self, cancel: &CancellationToken) -> anyhow::Result<RecordReceiver> {
        (**self).read(cancel).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        (**self).close().await
    }

    fn as_pull(&self) -> Option<&dyn PullSource> {
        (**self).as_pull()
    }
}

#[async_trait]
impl<T> Sink for Arc<T>
where
    T: Sink + ?Sized,
{
    async fn write(&self, cancel: &CancellationToken, input: RecordReceiver) -> anyhow::Result<()> {
        (**self).write(cancel, input).await
    }

    async fn close(&self) -> anyhow::Result<()> {
        (**self).close().await
    }

    fn as_push(&self) -> Option<&dyn PushSink> {
        (**self).as_push()
    }
}
