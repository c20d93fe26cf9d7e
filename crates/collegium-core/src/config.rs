//! Engine configuration and governance guardrails.
//!
//! Configuration is versioned and swapped atomically: every computation
//! clones one `Arc` of the active configuration at entry and uses it
//! throughout, so a hot reload mid-run can never mix two versions
//! inside one computation.
//!
//! Updates that violate a guardrail are rejected whole; the previous
//! configuration stays active. The guardrails are constitutional, not
//! ordinary validation, and each produces a distinct rejection reason.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use collegium_aggregation::AggregationParams;
use collegium_authority::AuthorityParams;
use collegium_review::AdvocateParams;

use crate::error::EngineError;

/// Tolerance for the weight-sum guardrail.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Governance cap on the baseline credential weight.
const MAX_BASELINE_WEIGHT: f64 = 0.6;

/// Constitutional floor for the disagreement threshold.
const MIN_DISAGREEMENT_THRESHOLD: f64 = 0.1;

/// The full engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Authority scorer parameters.
    pub authority: AuthorityParams,

    /// Aggregation engine parameters.
    pub aggregation: AggregationParams,

    /// Devil's-advocate assigner parameters.
    pub advocate: AdvocateParams,
}

impl EngineConfig {
    /// Checks the configuration against the governance guardrails.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigRejected`] with a distinct reason
    /// for the first guardrail violated. Nothing is partially applied.
    pub fn validate(&self) -> Result<(), EngineError> {
        let weights = &self.authority.weights;
        if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::ConfigRejected(format!(
                "authority weights must sum to 1, got {:.6}",
                weights.sum()
            )));
        }
        if weights.baseline > MAX_BASELINE_WEIGHT {
            return Err(EngineError::ConfigRejected(format!(
                "baseline credential weight {:.2} exceeds governance cap of {}",
                weights.baseline, MAX_BASELINE_WEIGHT
            )));
        }
        if weights.baseline < 0.0 || weights.track_record < 0.0 || weights.recent_performance < 0.0
        {
            return Err(EngineError::ConfigRejected(
                "authority weights must be non-negative".to_string(),
            ));
        }
        if self.aggregation.disagreement_threshold < MIN_DISAGREEMENT_THRESHOLD {
            return Err(EngineError::ConfigRejected(format!(
                "disagreement threshold {:.2} is below the constitutional floor of {}",
                self.aggregation.disagreement_threshold, MIN_DISAGREEMENT_THRESHOLD
            )));
        }
        if self.aggregation.escalation_threshold < self.aggregation.disagreement_threshold
            || self.aggregation.escalation_threshold > 1.0
        {
            return Err(EngineError::ConfigRejected(
                "escalation threshold must lie between the disagreement threshold and 1"
                    .to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.authority.decay) {
            return Err(EngineError::ConfigRejected(
                "track-record decay must lie in [0, 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// A validated configuration with its version number.
#[derive(Debug, Clone)]
pub struct VersionedConfig {
    /// Monotonically increasing version, starting at 1.
    pub version: u64,
    /// The active configuration.
    pub config: Arc<EngineConfig>,
}

impl VersionedConfig {
    /// Wraps an initial configuration as version 1.
    pub fn initial(config: EngineConfig) -> Self {
        Self {
            version: 1,
            config: Arc::new(config),
        }
    }

    /// Produces the successor version holding `config`.
    pub fn successor(&self, config: EngineConfig) -> Self {
        Self {
            version: self.version + 1,
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collegium_authority::AuthorityWeights;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let mut config = EngineConfig::default();
        config.authority.weights = AuthorityWeights {
            baseline: 0.5,
            track_record: 0.5,
            recent_performance: 0.5,
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::ConfigRejected(_)));
        assert!(err.to_string().contains("sum to 1"));
    }

    #[test]
    fn test_scenario_d_baseline_cap() {
        // Proposing baseline weight 0.7 violates the governance cap.
        let mut config = EngineConfig::default();
        config.authority.weights = AuthorityWeights {
            baseline: 0.7,
            track_record: 0.2,
            recent_performance: 0.1,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("governance cap"));
    }

    #[test]
    fn test_disagreement_floor() {
        let mut config = EngineConfig::default();
        config.aggregation.disagreement_threshold = 0.05;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("constitutional floor"));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = EngineConfig::default();
        config.authority.weights = AuthorityWeights {
            baseline: -0.2,
            track_record: 1.0,
            recent_performance: 0.2,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_escalation_must_exceed_threshold() {
        let mut config = EngineConfig::default();
        config.aggregation.escalation_threshold = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decay_range() {
        let mut config = EngineConfig::default();
        config.authority.decay = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_versioning() {
        let v1 = VersionedConfig::initial(EngineConfig::default());
        assert_eq!(v1.version, 1);
        let v2 = v1.successor(EngineConfig::default());
        assert_eq!(v2.version, 2);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
