//! Credential scoring rules.
//!
//! The baseline credential score is `Σ wᵢ·fᵢ(valueᵢ)` over the
//! credentials a contributor holds, with family weights normalized over
//! the families actually held. Each `fᵢ` is either a discrete
//! value-to-score lookup or a formula run in the sandboxed interpreter.
//!
//! Scoring never fails an update: unknown families, unmapped values,
//! non-numeric formula inputs, and interpreter errors all fall back to
//! a score of 0 with a warning logged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::formula::FormulaEvaluator;
use crate::models::Credential;

/// Upper bound for a single credential score and for the baseline.
pub const MAX_CREDENTIAL_SCORE: f64 = 2.0;

/// How one credential family maps raw values to scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialRule {
    /// Discrete value-to-score table. Values are matched after
    /// trimming and lowercasing.
    Lookup(HashMap<String, f64>),
    /// Arithmetic formula over the numeric credential value, evaluated
    /// in the sandboxed interpreter.
    Formula(String),
}

/// A credential family: its blend weight and scoring rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialFamily {
    /// Relative weight within the baseline blend.
    pub weight: f64,
    /// Scoring rule for values in this family.
    pub rule: CredentialRule,
}

/// The operator-configured credential scoring table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialScoring {
    /// Families keyed by credential kind.
    pub families: HashMap<String, CredentialFamily>,
}

impl Default for CredentialScoring {
    /// Built-in rules for the legal-review deployment.
    fn default() -> Self {
        let mut families = HashMap::new();
        families.insert(
            "education".to_string(),
            CredentialFamily {
                weight: 0.3,
                rule: CredentialRule::Lookup(
                    [
                        ("paralegal".to_string(), 0.8),
                        ("jd".to_string(), 1.2),
                        ("llm".to_string(), 1.4),
                        ("phd".to_string(), 1.6),
                    ]
                    .into_iter()
                    .collect(),
                ),
            },
        );
        families.insert(
            "bar_admission".to_string(),
            CredentialFamily {
                weight: 0.4,
                rule: CredentialRule::Lookup(
                    [
                        ("active".to_string(), 1.5),
                        ("retired".to_string(), 1.0),
                        ("none".to_string(), 0.0),
                    ]
                    .into_iter()
                    .collect(),
                ),
            },
        );
        families.insert(
            "years_experience".to_string(),
            CredentialFamily {
                weight: 0.3,
                rule: CredentialRule::Formula("min(2, value / 10)".to_string()),
            },
        );
        Self { families }
    }
}

impl CredentialScoring {
    /// Creates an empty scoring table.
    pub fn empty() -> Self {
        Self {
            families: HashMap::new(),
        }
    }

    /// Scores a single credential against its family rule.
    ///
    /// Unmapped values and formula failures score 0; nothing raises.
    pub fn score_credential(&self, credential: &Credential, evaluator: &FormulaEvaluator) -> f64 {
        let family = match self.families.get(&credential.kind) {
            Some(family) => family,
            None => {
                warn!(kind = %credential.kind, "no scoring rule for credential family");
                return 0.0;
            }
        };

        let score = match &family.rule {
            CredentialRule::Lookup(table) => {
                let key = credential.value.trim().to_lowercase();
                match table.get(&key) {
                    Some(score) => *score,
                    None => {
                        warn!(
                            kind = %credential.kind,
                            value = %credential.value,
                            "unmapped credential value, scoring 0"
                        );
                        0.0
                    }
                }
            }
            CredentialRule::Formula(formula) => {
                let numeric = match credential.value.trim().parse::<f64>() {
                    Ok(numeric) => numeric,
                    Err(_) => {
                        warn!(
                            kind = %credential.kind,
                            value = %credential.value,
                            "non-numeric value for formula rule, scoring 0"
                        );
                        return 0.0;
                    }
                };
                match evaluator.evaluate_with_timeout(formula, numeric) {
                    Ok(score) => score,
                    Err(err) => {
                        warn!(
                            kind = %credential.kind,
                            error = %err,
                            "credential formula failed, scoring 0"
                        );
                        0.0
                    }
                }
            }
        };

        score.clamp(0.0, MAX_CREDENTIAL_SCORE)
    }

    /// Computes the baseline credential score for a set of credentials.
    ///
    /// Family weights are normalized over the families held, so a
    /// contributor with one configured credential is not penalized for
    /// families they have no credential in. No credentials, or no
    /// configured families among them, scores 0.
    pub fn score_baseline(&self, credentials: &[Credential], evaluator: &FormulaEvaluator) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for credential in credentials {
            if let Some(family) = self.families.get(&credential.kind) {
                weighted += family.weight * self.score_credential(credential, evaluator);
                total_weight += family.weight;
            } else {
                warn!(kind = %credential.kind, "no scoring rule for credential family");
            }
        }

        if total_weight == 0.0 {
            return 0.0;
        }
        (weighted / total_weight).clamp(0.0, MAX_CREDENTIAL_SCORE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> FormulaEvaluator {
        FormulaEvaluator::new()
    }

    #[test]
    fn test_lookup_scoring() {
        let scoring = CredentialScoring::default();
        let score =
            scoring.score_credential(&Credential::new("bar_admission", "Active"), &evaluator());
        assert!((score - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_formula_scoring() {
        let scoring = CredentialScoring::default();
        let score =
            scoring.score_credential(&Credential::new("years_experience", "12"), &evaluator());
        assert!((score - 1.2).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unmapped_value_scores_zero() {
        let scoring = CredentialScoring::default();
        let score =
            scoring.score_credential(&Credential::new("education", "astronaut"), &evaluator());
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_unknown_family_scores_zero() {
        let scoring = CredentialScoring::default();
        let score = scoring.score_credential(&Credential::new("favorite_color", "blue"), &evaluator());
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_numeric_formula_input_scores_zero() {
        let scoring = CredentialScoring::default();
        let score =
            scoring.score_credential(&Credential::new("years_experience", "a while"), &evaluator());
        assert!(score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_baseline_normalizes_over_held_families() {
        let scoring = CredentialScoring::default();
        // Only bar_admission held: its weight normalizes to 1.
        let baseline = scoring.score_baseline(
            &[Credential::new("bar_admission", "active")],
            &evaluator(),
        );
        assert!((baseline - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_baseline_blends_multiple_families() {
        let scoring = CredentialScoring::default();
        let baseline = scoring.score_baseline(
            &[
                Credential::new("bar_admission", "active"), // 1.5 at weight 0.4
                Credential::new("education", "jd"),         // 1.2 at weight 0.3
            ],
            &evaluator(),
        );
        // (0.4 * 1.5 + 0.3 * 1.2) / 0.7
        let expected = (0.4 * 1.5 + 0.3 * 1.2) / 0.7;
        assert!((baseline - expected).abs() < 1e-12);
    }

    #[test]
    fn test_baseline_empty_credentials() {
        let scoring = CredentialScoring::default();
        assert!(scoring.score_baseline(&[], &evaluator()).abs() < f64::EPSILON);
    }

    #[test]
    fn test_malformed_formula_falls_back() {
        let mut scoring = CredentialScoring::empty();
        scoring.families.insert(
            "broken".to_string(),
            CredentialFamily {
                weight: 1.0,
                rule: CredentialRule::Formula("value +".to_string()),
            },
        );
        let score = scoring.score_credential(&Credential::new("broken", "3"), &evaluator());
        assert!(score.abs() < f64::EPSILON);
    }
}
