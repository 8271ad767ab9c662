//! fluxline: streaming data-pipeline orchestration.
//!
//! A [`Pipeline`] composes a [`Source`], an ordered chain of
//! [`Transformer`]s, and a [`Sink`] into a single executable unit, gates
//! records through a [`Filter`] chain, and runs the whole thing once, on a
//! fixed interval, or on a cron schedule. Concrete transports live outside
//! this crate and participate through the capability contracts.
//!
//! # Example
//!
//! ```no_run
//! use fluxline::adapters::{FilterFn, MemorySink, MemorySource};
//! use fluxline::{Pipeline, Record};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), fluxline::PipelineError> {
//! let source = MemorySource::new(vec![
//!     Record::new("a").with_field("level", "info"),
//!     Record::new("b"),
//! ]);
//! let mut pipeline = Pipeline::new("example", source, MemorySink::new())
//!     .with_filter(FilterFn::new(|r: &Record| !r.data.is_empty()));
//!
//! let cancel = CancellationToken::new();
//! pipeline.run(&cancel).await?;
//! pipeline.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod contract;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;

pub use config::{CronConfig, PullConfig, PushConfig, Timer};
pub use contract::{Filter, PullSource, PushSink, RecordReceiver, Sink, Source, Transformer};
pub use error::PipelineError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::{Pipeline, ERROR_QUEUE_CAPACITY};
pub use record::Record;
