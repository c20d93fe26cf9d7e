//! Error types for the engine facade.

use thiserror::Error;

/// Engine-level error taxonomy.
///
/// Every public operation returns either a result or one of these;
/// nothing in the engine is allowed to crash the calling process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A single submission was malformed. Other submissions are
    /// unaffected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The task id is not known to the engine.
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// A configuration update violated a governance guardrail. The
    /// previous configuration remains active.
    #[error("Configuration rejected: {0}")]
    ConfigRejected(String),

    /// Task-layer passthrough (unknown type, invalid transition).
    #[error("Task error: {0}")]
    Task(#[from] collegium_tasks::TaskError),

    /// Aggregation passthrough (quorum, unusable positions).
    #[error("Aggregation error: {0}")]
    Aggregation(#[from] collegium_aggregation::AggregationError),

    /// Authority passthrough (unknown contributor, storage).
    #[error("Authority error: {0}")]
    Authority(#[from] collegium_authority::AuthorityError),
}

impl EngineError {
    /// Returns true for failures that may succeed on retry once the
    /// underlying condition clears (e.g., quorum reached).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Aggregation(
                collegium_aggregation::AggregationError::InsufficientQuorum { .. }
            )
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collegium_aggregation::AggregationError;

    #[test]
    fn test_quorum_is_retryable() {
        let err = EngineError::from(AggregationError::InsufficientQuorum { needed: 3, got: 1 });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_rejection_is_not_retryable() {
        let err = EngineError::ConfigRejected("weights must sum to 1".to_string());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Configuration rejected"));
    }
}
