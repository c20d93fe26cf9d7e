//! Core domain types: tasks, lifecycle states, and feedback records.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TaskError;

/// The type tag that selects which handler applies to a task.
///
/// The set is open-ended: unknown tags parse into [`TaskType::Other`] so
/// that a registry lookup can reject them with a precise error instead of
/// failing at deserialization time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Multi-label classification (e.g., clause categories).
    Classification,
    /// Single choice among enumerated options.
    OptionSelection,
    /// Free-text answer reduced to a canonical key.
    FreeText,
    /// A tag with no registered handler.
    Other(String),
}

impl TaskType {
    /// Returns the canonical tag string.
    pub fn tag(&self) -> &str {
        match self {
            TaskType::Classification => "classification",
            TaskType::OptionSelection => "option_selection",
            TaskType::FreeText => "free_text",
            TaskType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for TaskType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "classification" => TaskType::Classification,
            "option_selection" => TaskType::OptionSelection,
            "free_text" => TaskType::FreeText,
            other => TaskType::Other(other.to_string()),
        })
    }
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        TaskType::from_str(&tag).map_err(D::Error::custom)
    }
}

/// Task lifecycle state.
///
/// Transitions form a straight line: `Open -> Evaluating -> Aggregated ->
/// Closed`, with re-aggregation allowed while `Aggregated` (a new run
/// supersedes the previous result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Created, evaluation window not yet open.
    Open,
    /// Accepting feedback.
    Evaluating,
    /// At least one aggregation result exists.
    Aggregated,
    /// Terminal. Feedback and results are frozen.
    Closed,
}

impl TaskState {
    /// Returns true if the state machine permits `self -> to`.
    pub fn can_transition(self, to: TaskState) -> bool {
        matches!(
            (self, to),
            (TaskState::Open, TaskState::Evaluating)
                | (TaskState::Evaluating, TaskState::Aggregated)
                | (TaskState::Aggregated, TaskState::Aggregated)
                | (TaskState::Aggregated, TaskState::Closed)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskState::Open => "Open",
            TaskState::Evaluating => "Evaluating",
            TaskState::Aggregated => "Aggregated",
            TaskState::Closed => "Closed",
        };
        f.write_str(name)
    }
}

/// A unit of work put before the contributor pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Generated identifier (UUID v4).
    pub id: String,
    /// Selects the handler for this task.
    pub task_type: TaskType,
    /// Task-type-specific input shown to contributors.
    pub input_data: Value,
    /// Withheld from contributors during evaluation.
    pub ground_truth: Option<Value>,
    /// Lifecycle state.
    pub state: TaskState,
    /// Creation timestamp, epoch milliseconds.
    pub created_at_ms: u64,
}

impl Task {
    /// Creates a new task in the `Open` state with a generated id.
    pub fn new(task_type: TaskType, input_data: Value, created_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            task_type,
            input_data,
            ground_truth: None,
            state: TaskState::Open,
            created_at_ms,
        }
    }

    /// Attaches ground truth to the task.
    pub fn with_ground_truth(mut self, ground_truth: Value) -> Self {
        self.ground_truth = Some(ground_truth);
        self
    }

    /// Moves the task to a new lifecycle state.
    pub fn transition(&mut self, to: TaskState) -> Result<(), TaskError> {
        if !self.state.can_transition(to) {
            return Err(TaskError::InvalidTransition {
                from: self.state.to_string(),
                to: to.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}

/// Inbound feedback payload, as handed over by the API boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    /// Submitting contributor.
    pub contributor_id: String,
    /// Task the feedback is about.
    pub task_id: String,
    /// Task-type-specific structured data.
    pub feedback_data: Map<String, Value>,
    /// Self-reported accuracy sub-score in [0, 1].
    pub accuracy: f64,
    /// Self-reported utility sub-score in [0, 1].
    pub utility: f64,
    /// Self-reported transparency sub-score in [0, 1].
    pub transparency: f64,
    /// Free-text reasoning behind the opinion.
    pub rationale: Option<String>,
}

/// A stored feedback record.
///
/// At most one record exists per (task, contributor) pair; resubmission
/// during the evaluation window overwrites. The engine never mutates a
/// record except to attach a peer-assigned helpfulness rating.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Task the feedback belongs to.
    pub task_id: String,
    /// Contributor who submitted it.
    pub contributor_id: String,
    /// Task-type-specific structured data.
    pub feedback_data: Map<String, Value>,
    /// Accuracy sub-score in [0, 1].
    pub accuracy: f64,
    /// Utility sub-score in [0, 1].
    pub utility: f64,
    /// Transparency sub-score in [0, 1].
    pub transparency: f64,
    /// Free-text reasoning, consumed by dissent rationales and the
    /// advocate engagement metric.
    pub rationale: Option<String>,
    /// Submission timestamp, epoch milliseconds.
    pub submitted_at_ms: u64,
    /// Peer-assigned helpfulness rating in [0, 1], attached later.
    pub helpfulness: Option<f64>,
}

impl FeedbackRecord {
    /// Builds a record from an inbound submission, stamped by the engine.
    pub fn from_submission(submission: FeedbackSubmission, submitted_at_ms: u64) -> Self {
        Self {
            task_id: submission.task_id,
            contributor_id: submission.contributor_id,
            feedback_data: submission.feedback_data,
            accuracy: submission.accuracy,
            utility: submission.utility,
            transparency: submission.transparency,
            rationale: submission.rationale,
            submitted_at_ms,
            helpfulness: None,
        }
    }

    /// Mean of the three self-reported sub-scores.
    pub fn quality_mean(&self) -> f64 {
        (self.accuracy + self.utility + self.transparency) / 3.0
    }

    /// Returns a string field from `feedback_data`, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.feedback_data.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_submission() -> FeedbackSubmission {
        let mut data = Map::new();
        data.insert("selected_option".to_string(), json!("uphold"));
        FeedbackSubmission {
            contributor_id: "alice".to_string(),
            task_id: "t1".to_string(),
            feedback_data: data,
            accuracy: 0.9,
            utility: 0.6,
            transparency: 0.3,
            rationale: Some("precedent supports this".to_string()),
        }
    }

    #[test]
    fn test_task_type_roundtrip() {
        for tag in ["classification", "option_selection", "free_text"] {
            let parsed: TaskType = tag.parse().unwrap();
            assert_eq!(parsed.tag(), tag);
        }
    }

    #[test]
    fn test_task_type_other() {
        let parsed: TaskType = "summarization".parse().unwrap();
        assert_eq!(parsed, TaskType::Other("summarization".to_string()));
    }

    #[test]
    fn test_task_type_serde() {
        let json = serde_json::to_string(&TaskType::OptionSelection).unwrap();
        assert_eq!(json, "\"option_selection\"");
        let back: TaskType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TaskType::OptionSelection);
    }

    #[test]
    fn test_state_machine_happy_path() {
        let mut task = Task::new(TaskType::FreeText, json!({"q": "?"}), 0);
        assert_eq!(task.state, TaskState::Open);
        task.transition(TaskState::Evaluating).unwrap();
        task.transition(TaskState::Aggregated).unwrap();
        // Re-aggregation is allowed.
        task.transition(TaskState::Aggregated).unwrap();
        task.transition(TaskState::Closed).unwrap();
    }

    #[test]
    fn test_state_machine_rejects_skips() {
        let mut task = Task::new(TaskType::FreeText, json!({}), 0);
        assert!(task.transition(TaskState::Aggregated).is_err());
        assert!(task.transition(TaskState::Closed).is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        assert!(!TaskState::Closed.can_transition(TaskState::Open));
        assert!(!TaskState::Closed.can_transition(TaskState::Evaluating));
        assert!(!TaskState::Closed.can_transition(TaskState::Aggregated));
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = Task::new(TaskType::Classification, json!({}), 0);
        let b = Task::new(TaskType::Classification, json!({}), 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_record_from_submission() {
        let record = FeedbackRecord::from_submission(sample_submission(), 42);
        assert_eq!(record.submitted_at_ms, 42);
        assert!(record.helpfulness.is_none());
        assert_eq!(record.data_str("selected_option"), Some("uphold"));
    }

    #[test]
    fn test_quality_mean() {
        let record = FeedbackRecord::from_submission(sample_submission(), 0);
        assert!((record.quality_mean() - 0.6).abs() < f64::EPSILON);
    }
}
