//! Error types for the task layer.

use thiserror::Error;

/// Errors raised while handling tasks and feedback.
#[derive(Debug, Error)]
pub enum TaskError {
    /// No handler is registered for the task type.
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    /// A feedback record does not carry the fields its task type requires.
    #[error("Malformed feedback for {task_type}: {reason}")]
    MalformedFeedback {
        /// Task type whose handler rejected the record.
        task_type: String,
        /// What was missing or invalid.
        reason: String,
    },

    /// A lifecycle transition that the state machine does not permit.
    #[error("Invalid task transition: {from} -> {to}")]
    InvalidTransition {
        /// State the task is currently in.
        from: String,
        /// State the caller asked for.
        to: String,
    },
}

impl TaskError {
    /// Shorthand for a malformed-feedback error.
    pub fn malformed(task_type: impl Into<String>, reason: impl Into<String>) -> Self {
        TaskError::MalformedFeedback {
            task_type: task_type.into(),
            reason: reason.into(),
        }
    }
}
