//! The aggregation engine.
//!
//! Pulls one task's feedback through its handler, weights positions by
//! a snapshot of contributor authority, and selects between a consensus
//! output and a dissent-preserving output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use collegium_authority::AuthoritySnapshot;
use collegium_tasks::{AggregateView, FeedbackRecord, Position, Task, TaskHandler, TaskType};

use crate::disagreement::normalized_disagreement;
use crate::error::AggregationError;
use crate::support::{SupportItem, SupportTally};
use crate::Result;

/// Parameters for one aggregation run, snapshotted from the active
/// configuration at call entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationParams {
    /// Consensus threshold τ. Disagreement at or below it collapses
    /// alternatives.
    pub disagreement_threshold: f64,
    /// Band edge above which the result is flagged for structured
    /// discussion.
    pub escalation_threshold: f64,
    /// Minimum evaluator count per task type.
    pub min_evaluators: HashMap<TaskType, usize>,
    /// Fallback minimum for types without an explicit entry.
    pub default_min_evaluators: usize,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            disagreement_threshold: 0.4,
            escalation_threshold: 0.6,
            min_evaluators: HashMap::new(),
            default_min_evaluators: 3,
        }
    }
}

impl AggregationParams {
    /// Minimum evaluators for a task type.
    pub fn min_evaluators_for(&self, task_type: &TaskType) -> usize {
        self.min_evaluators
            .get(task_type)
            .copied()
            .unwrap_or(self.default_min_evaluators)
    }
}

/// Which band the disagreement landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationOutcome {
    /// `δ ≤ τ`: one position carries the result.
    Consensus,
    /// `τ < δ ≤ escalation`: alternatives are preserved.
    DissentPreserved,
    /// `δ > escalation`: alternatives preserved and the task is
    /// surfaced for a structured-discussion workflow.
    DiscussionFlagged,
}

/// A dissenting position carried alongside the primary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativePosition {
    /// The dissenting position.
    pub position: Position,
    /// Its normalized support share.
    pub weighted_support: f64,
    /// A short rationale extracted from the supporting feedback.
    pub rationale: Option<String>,
}

/// The structured result of one aggregation run.
///
/// Deterministic for a fixed (feedback, snapshot, params) triple; the
/// enclosing record in the engine facade adds the computed-at
/// timestamp, so re-running on unchanged inputs yields an identical
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    /// The aggregated task.
    pub task_id: String,
    /// Disagreement band.
    pub outcome: AggregationOutcome,
    /// Arg-max-support position.
    pub primary_position: Position,
    /// `1 − disagreement`.
    pub confidence_level: f64,
    /// Normalized Shannon entropy over the support distribution.
    pub disagreement: f64,
    /// Dissenting positions in rank order; empty on consensus.
    pub alternatives: Vec<AlternativePosition>,
    /// True when the result needs a structured-discussion workflow.
    pub discussion_flagged: bool,
    /// Feedback records that contributed a position.
    pub evaluator_count: usize,
    /// Distinct positions in the tally.
    pub position_count: usize,
}

impl AggregationResult {
    /// The view handed to handlers for consistency scoring.
    pub fn aggregate_view(&self) -> AggregateView {
        let mut support: HashMap<String, f64> = self
            .alternatives
            .iter()
            .map(|a| (a.position.key().to_string(), a.weighted_support))
            .collect();
        let alternative_total: f64 = self.alternatives.iter().map(|a| a.weighted_support).sum();
        support.insert(
            self.primary_position.key().to_string(),
            (1.0 - alternative_total).max(0.0),
        );
        AggregateView {
            primary: self.primary_position.clone(),
            support,
        }
    }
}

/// Runs aggregation with one fixed parameter set.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    params: AggregationParams,
}

impl AggregationEngine {
    /// Creates an engine from a configuration snapshot.
    pub fn new(params: AggregationParams) -> Self {
        Self { params }
    }

    /// The engine's parameters.
    pub fn params(&self) -> &AggregationParams {
        &self.params
    }

    /// Aggregates one task's feedback set.
    ///
    /// # Errors
    ///
    /// - [`AggregationError::InsufficientQuorum`] below the task type's
    ///   minimum evaluator count (also after discarding records whose
    ///   position cannot be extracted).
    /// - [`AggregationError::NoUsablePositions`] when extraction fails
    ///   for every record.
    pub fn aggregate(
        &self,
        task: &Task,
        feedback: &[FeedbackRecord],
        handler: &dyn TaskHandler,
        authority: &AuthoritySnapshot,
    ) -> Result<AggregationResult> {
        let needed = self.params.min_evaluators_for(&task.task_type);
        if feedback.len() < needed {
            return Err(AggregationError::InsufficientQuorum {
                needed,
                got: feedback.len(),
            });
        }

        let mut items = Vec::with_capacity(feedback.len());
        for record in feedback {
            match handler.extract_position(record) {
                Ok(position) => items.push(SupportItem {
                    contributor_id: record.contributor_id.clone(),
                    authority: authority.authority_of(&record.contributor_id).unwrap_or(0.0),
                    position,
                    submitted_at_ms: record.submitted_at_ms,
                    rationale: record.rationale.clone(),
                }),
                Err(err) => {
                    warn!(
                        task_id = %task.id,
                        contributor = %record.contributor_id,
                        error = %err,
                        "discarding feedback with unextractable position"
                    );
                }
            }
        }

        if items.is_empty() {
            return Err(AggregationError::NoUsablePositions);
        }
        if items.len() < needed {
            return Err(AggregationError::InsufficientQuorum {
                needed,
                got: items.len(),
            });
        }

        let evaluator_count = items.len();
        let tally = SupportTally::from_items(items);
        let disagreement = normalized_disagreement(&tally.shares());
        let primary = tally
            .primary()
            .ok_or(AggregationError::NoUsablePositions)?
            .clone();

        let consensus = disagreement <= self.params.disagreement_threshold;
        let flagged = disagreement > self.params.escalation_threshold;
        let outcome = if consensus {
            AggregationOutcome::Consensus
        } else if flagged {
            AggregationOutcome::DiscussionFlagged
        } else {
            AggregationOutcome::DissentPreserved
        };

        let alternatives = if consensus {
            Vec::new()
        } else {
            tally
                .entries()
                .iter()
                .skip(1)
                .map(|entry| AlternativePosition {
                    position: entry.position.clone(),
                    weighted_support: entry.weight,
                    rationale: entry.rationale.clone(),
                })
                .collect()
        };

        debug!(
            task_id = %task.id,
            disagreement,
            positions = tally.position_count(),
            ?outcome,
            "aggregation complete"
        );

        Ok(AggregationResult {
            task_id: task.id.clone(),
            outcome,
            primary_position: primary.position,
            confidence_level: 1.0 - disagreement,
            disagreement,
            alternatives,
            discussion_flagged: flagged,
            evaluator_count,
            position_count: tally.position_count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collegium_tasks::{FeedbackSubmission, OptionSelectionHandler, TaskState};
    use serde_json::{json, Map};
    use std::collections::HashMap;

    fn task() -> Task {
        let mut task = Task::new(TaskType::OptionSelection, json!({"options": ["x", "y"]}), 0);
        task.state = TaskState::Evaluating;
        task
    }

    fn record(contributor: &str, option: &str, at: u64) -> FeedbackRecord {
        let mut data = Map::new();
        data.insert("selected_option".to_string(), json!(option));
        FeedbackRecord::from_submission(
            FeedbackSubmission {
                contributor_id: contributor.to_string(),
                task_id: "t".to_string(),
                feedback_data: data,
                accuracy: 0.8,
                utility: 0.8,
                transparency: 0.8,
                rationale: Some(format!("{} because precedent", option)),
            },
            at,
        )
    }

    fn snapshot(scores: &[(&str, f64)]) -> AuthoritySnapshot {
        AuthoritySnapshot::new(
            scores
                .iter()
                .map(|(id, s)| (id.to_string(), *s))
                .collect::<HashMap<_, _>>(),
            0,
        )
    }

    fn engine() -> AggregationEngine {
        AggregationEngine::new(AggregationParams::default())
    }

    #[test]
    fn test_unanimous_consensus() {
        let feedback = vec![
            record("a", "x", 1),
            record("b", "x", 2),
            record("c", "x", 3),
        ];
        let snapshot = snapshot(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let result = engine()
            .aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot)
            .unwrap();

        assert_eq!(result.outcome, AggregationOutcome::Consensus);
        assert!(result.disagreement.abs() < f64::EPSILON);
        assert!((result.confidence_level - 1.0).abs() < f64::EPSILON);
        assert!(result.alternatives.is_empty());
        assert!(!result.discussion_flagged);
    }

    #[test]
    fn test_scenario_b_three_to_one_split() {
        // X backed by total authority 3.0, Y by 1.0.
        let feedback = vec![
            record("a", "x", 1),
            record("b", "x", 2),
            record("c", "x", 3),
            record("d", "y", 4),
        ];
        let snapshot = snapshot(&[("a", 1.0), ("b", 1.0), ("c", 1.0), ("d", 1.0)]);
        let result = engine()
            .aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot)
            .unwrap();

        assert_eq!(result.primary_position.key(), "x");
        assert!((result.disagreement - 0.8113).abs() < 1e-4);
        assert_eq!(result.outcome, AggregationOutcome::DiscussionFlagged);
        assert_eq!(result.alternatives.len(), 1);
        assert!((result.alternatives[0].weighted_support - 0.25).abs() < 1e-12);
        assert!(result.alternatives[0].rationale.is_some());
    }

    #[test]
    fn test_quorum_rejection() {
        let feedback = vec![record("a", "x", 1)];
        let snapshot = snapshot(&[("a", 1.0)]);
        let err = engine().aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot);
        assert!(matches!(
            err,
            Err(AggregationError::InsufficientQuorum { needed: 3, got: 1 })
        ));
    }

    #[test]
    fn test_idempotent_recompute() {
        let feedback = vec![
            record("a", "x", 1),
            record("b", "y", 2),
            record("c", "x", 3),
        ];
        let snapshot = snapshot(&[("a", 1.2), ("b", 0.8), ("c", 0.4)]);
        let handler = OptionSelectionHandler::new();

        let first = engine().aggregate(&task(), &feedback, &handler, &snapshot).unwrap();
        let second = engine().aggregate(&task(), &feedback, &handler, &snapshot).unwrap();

        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_dissent_band_preserves_alternatives_without_flag() {
        // Shares 0.88 / 0.12: binary entropy ~0.53, between τ=0.4 and 0.6.
        let feedback = vec![
            record("a", "x", 1),
            record("b", "x", 2),
            record("c", "y", 3),
        ];
        let snapshot = snapshot(&[("a", 1.1), ("b", 1.1), ("c", 0.3)]);
        let result = engine()
            .aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot)
            .unwrap();

        assert_eq!(result.outcome, AggregationOutcome::DissentPreserved);
        assert!(!result.discussion_flagged);
        assert_eq!(result.alternatives.len(), 1);
    }

    #[test]
    fn test_authority_changes_the_winner() {
        let feedback = vec![
            record("a", "x", 1),
            record("b", "y", 2),
            record("c", "y", 3),
        ];
        // One heavyweight outweighs two lightweights.
        let snapshot = snapshot(&[("a", 1.8), ("b", 0.2), ("c", 0.2)]);
        let result = engine()
            .aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot)
            .unwrap();
        assert_eq!(result.primary_position.key(), "x");
    }

    #[test]
    fn test_aggregate_view_support_sums_to_one() {
        let feedback = vec![
            record("a", "x", 1),
            record("b", "y", 2),
            record("c", "z", 3),
        ];
        let snapshot = snapshot(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
        let result = engine()
            .aggregate(&task(), &feedback, &OptionSelectionHandler::new(), &snapshot)
            .unwrap();
        let view = result.aggregate_view();
        let total: f64 = view.support.values().sum();
        assert!((total - 1.0).abs() < 1e-12);
    }
}
