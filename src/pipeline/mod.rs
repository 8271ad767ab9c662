//! Pipeline orchestration.
//!
//! This module wires a source, a filter chain, an ordered transform chain,
//! and a sink into one executable unit and drives it in single-run,
//! interval-scheduled, or cron-scheduled mode.

mod orchestrator;
pub(crate) mod stage;

pub use orchestrator::{Pipeline, ERROR_QUEUE_CAPACITY};
