//! Error types for aggregation.

use thiserror::Error;

/// Errors raised while aggregating a task's feedback.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Fewer evaluators than the task type requires. Retryable once
    /// more feedback arrives.
    #[error("Insufficient quorum: need {needed} evaluators, have {got}")]
    InsufficientQuorum {
        /// Minimum evaluator count for the task type.
        needed: usize,
        /// Usable feedback records present.
        got: usize,
    },

    /// Position extraction failed for every record.
    #[error("No usable positions in the feedback set")]
    NoUsablePositions,

    /// Handler-level failure passthrough.
    #[error("Task handler error: {0}")]
    Handler(#[from] collegium_tasks::TaskError),
}
