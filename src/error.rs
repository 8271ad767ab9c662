//! Error types for pipeline execution.
//!
//! Every failure surfaced by the orchestrator carries a stage tag so callers
//! can tell an acquisition failure from a transform or delivery failure.
//! Collaborator errors arrive as [`anyhow::Error`] and are wrapped, never
//! swallowed.

use thiserror::Error;

/// Errors that can occur while running or scheduling a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source's read or pull call failed.
    #[error("failed to read from source: {0}")]
    Acquisition(#[source] anyhow::Error),

    /// A transform chain stage failed to wire up.
    #[error("transformer '{stage}' (index {index}) failed: {source}")]
    Transform {
        /// Name reported by the failing transformer.
        stage: String,
        /// Zero-based position in the chain.
        index: usize,
        /// Underlying collaborator error.
        source: anyhow::Error,
    },

    /// The sink's write or push call failed.
    #[error("failed to write to sink: {0}")]
    Delivery(#[source] anyhow::Error),

    /// The cron expression could not be parsed at schedule start.
    #[error("invalid cron schedule '{schedule}': {source}")]
    Schedule {
        /// The offending expression.
        schedule: String,
        /// Parser error.
        source: anyhow::Error,
    },

    /// Closing the source or sink failed during shutdown.
    #[error("failed to close {role}: {source}")]
    Shutdown {
        /// Which collaborator failed to close ("source" or "sink").
        role: &'static str,
        /// Underlying collaborator error.
        source: anyhow::Error,
    },

    /// The governing cancellation token fired.
    #[error("pipeline cancelled")]
    Cancelled,

    /// The scheduled loop's overall deadline elapsed.
    #[error("scheduled loop deadline elapsed")]
    DeadlineElapsed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_stage_tags() {
        let err = PipelineError::Acquisition(anyhow::anyhow!("broker unreachable"));
        assert!(err.to_string().contains("read from source"));

        let err = PipelineError::Transform {
            stage: "uppercase".to_string(),
            index: 2,
            source: anyhow::anyhow!("bad field"),
        };
        let text = err.to_string();
        assert!(text.contains("uppercase"));
        assert!(text.contains("index 2"));

        let err = PipelineError::Delivery(anyhow::anyhow!("index closed"));
        assert!(err.to_string().contains("write to sink"));

        let err = PipelineError::Schedule {
            schedule: "bad expr".to_string(),
            source: anyhow::anyhow!("parse failure"),
        };
        assert!(err.to_string().contains("bad expr"));

        let err = PipelineError::Shutdown {
            role: "sink",
            source: anyhow::anyhow!("flush failed"),
        };
        assert!(err.to_string().contains("close sink"));
    }
}
