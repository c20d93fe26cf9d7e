//! The built-in handler set: classification, option selection, free text.
//!
//! Each handler owns the reduction from raw feedback to a canonical
//! position and the two scoring functions for its task type. They share
//! a convention for ground truth: either the bare value or an object
//! with the same field the feedback uses.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::TaskError;
use crate::handler::{AggregateView, TaskHandler};
use crate::models::{FeedbackRecord, TaskType};
use crate::normalize::Lexicon;
use crate::position::Position;
use crate::Result;

/// Extracts a label list from either a bare array or `{"labels": [...]}`.
fn labels_of(value: &Value) -> Option<Vec<String>> {
    let array = match value {
        Value::Array(items) => items,
        Value::Object(map) => map.get("labels")?.as_array()?,
        _ => return None,
    };
    let labels: Vec<String> = array
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

/// Jaccard similarity between two label-set position keys.
fn label_jaccard(a: &Position, b: &Position) -> f64 {
    let set_a: std::collections::HashSet<&str> = a.key().split('|').collect();
    let set_b: std::collections::HashSet<&str> = b.key().split('|').collect();
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Handler for multi-label classification tasks.
///
/// The position is the sorted, deduplicated label set, so contributors
/// who pick the same labels in different orders agree.
#[derive(Debug, Default)]
pub struct ClassificationHandler;

impl ClassificationHandler {
    /// Creates the handler.
    pub fn new() -> Self {
        Self
    }
}

impl TaskHandler for ClassificationHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Classification
    }

    fn name(&self) -> &str {
        "Classification"
    }

    fn extract_position(&self, feedback: &FeedbackRecord) -> Result<Position> {
        let labels = feedback
            .feedback_data
            .get("labels")
            .and_then(|v| labels_of(v))
            .ok_or_else(|| {
                TaskError::malformed("classification", "missing or empty `labels` array")
            })?;
        Ok(Position::from_labels(labels))
    }

    fn score_consistency(&self, feedback: &FeedbackRecord, aggregate: &AggregateView) -> f64 {
        match self.extract_position(feedback) {
            Ok(position) => label_jaccard(&position, &aggregate.primary),
            Err(_) => 0.0,
        }
    }

    fn score_correctness(&self, feedback: &FeedbackRecord, ground_truth: &Value) -> f64 {
        let truth = match labels_of(ground_truth) {
            Some(labels) => Position::from_labels(labels),
            None => return 0.0,
        };
        match self.extract_position(feedback) {
            Ok(position) => label_jaccard(&position, &truth),
            Err(_) => 0.0,
        }
    }
}

// =============================================================================
// Option selection
// =============================================================================

/// Handler for single-choice tasks.
///
/// The position key is the normalized chosen option, so `" Uphold "` and
/// `"uphold"` agree.
#[derive(Debug, Default)]
pub struct OptionSelectionHandler;

impl OptionSelectionHandler {
    /// Creates the handler.
    pub fn new() -> Self {
        Self
    }

    fn option_key(option: &str) -> String {
        option
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn truth_option(ground_truth: &Value) -> Option<&str> {
        match ground_truth {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("selected_option")?.as_str(),
            _ => None,
        }
    }
}

impl TaskHandler for OptionSelectionHandler {
    fn task_type(&self) -> TaskType {
        TaskType::OptionSelection
    }

    fn name(&self) -> &str {
        "OptionSelection"
    }

    fn extract_position(&self, feedback: &FeedbackRecord) -> Result<Position> {
        let option = feedback
            .data_str("selected_option")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                TaskError::malformed("option_selection", "missing `selected_option` string")
            })?;
        Ok(Position::new(Self::option_key(option), option))
    }

    fn score_consistency(&self, feedback: &FeedbackRecord, aggregate: &AggregateView) -> f64 {
        match self.extract_position(feedback) {
            // Agreement with the winner is full credit; a dissenting
            // choice is credited with the weight behind its bucket.
            Ok(position) if position == aggregate.primary => 1.0,
            Ok(position) => aggregate.support_for(&position),
            Err(_) => 0.0,
        }
    }

    fn score_correctness(&self, feedback: &FeedbackRecord, ground_truth: &Value) -> f64 {
        let truth = match Self::truth_option(ground_truth) {
            Some(option) => Self::option_key(option),
            None => return 0.0,
        };
        match self.extract_position(feedback) {
            Ok(position) if position.key() == truth => 1.0,
            _ => 0.0,
        }
    }
}

// =============================================================================
// Free text
// =============================================================================

/// Handler for free-text answers.
///
/// The position key is a SHA-256 digest of the lexically normalized
/// answer; scoring uses weighted token overlap instead of raw equality,
/// so paraphrases that share the legal substance score high even when
/// they land in different buckets.
#[derive(Debug, Default)]
pub struct FreeTextHandler {
    lexicon: Lexicon,
}

impl FreeTextHandler {
    /// Creates the handler with the built-in legal lexicon.
    pub fn new() -> Self {
        Self {
            lexicon: Lexicon::new(),
        }
    }

    fn truth_answer(ground_truth: &Value) -> Option<&str> {
        match ground_truth {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("answer")?.as_str(),
            _ => None,
        }
    }
}

impl TaskHandler for FreeTextHandler {
    fn task_type(&self) -> TaskType {
        TaskType::FreeText
    }

    fn name(&self) -> &str {
        "FreeText"
    }

    fn extract_position(&self, feedback: &FeedbackRecord) -> Result<Position> {
        let answer = feedback
            .data_str("answer")
            .ok_or_else(|| TaskError::malformed("free_text", "missing `answer` string"))?;
        let normalized = self.lexicon.normalize(answer);
        if normalized.is_empty() {
            return Err(TaskError::malformed("free_text", "answer is empty"));
        }
        let digest = Sha256::digest(normalized.as_bytes());
        let key: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(Position::new(key, normalized))
    }

    fn score_consistency(&self, feedback: &FeedbackRecord, aggregate: &AggregateView) -> f64 {
        let answer = match feedback.data_str("answer") {
            Some(answer) => answer,
            None => return 0.0,
        };
        match self.extract_position(feedback) {
            Ok(position) if position == aggregate.primary => 1.0,
            // Different bucket: blend lexical similarity to the winning
            // answer with the weight behind the contributor's own bucket.
            Ok(position) => {
                let similarity = self.lexicon.similarity(answer, aggregate.primary.display());
                similarity.max(aggregate.support_for(&position))
            }
            Err(_) => 0.0,
        }
    }

    fn score_correctness(&self, feedback: &FeedbackRecord, ground_truth: &Value) -> f64 {
        let truth = match Self::truth_answer(ground_truth) {
            Some(answer) => answer,
            None => return 0.0,
        };
        match feedback.data_str("answer") {
            Some(answer) => self.lexicon.similarity(answer, truth),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeedbackSubmission;
    use serde_json::{json, Map};
    use std::collections::HashMap;

    fn record_with(data: Map<String, Value>) -> FeedbackRecord {
        FeedbackRecord::from_submission(
            FeedbackSubmission {
                contributor_id: "c1".to_string(),
                task_id: "t1".to_string(),
                feedback_data: data,
                accuracy: 0.8,
                utility: 0.8,
                transparency: 0.8,
                rationale: None,
            },
            0,
        )
    }

    fn labels_record(labels: &[&str]) -> FeedbackRecord {
        let mut data = Map::new();
        data.insert("labels".to_string(), json!(labels));
        record_with(data)
    }

    fn option_record(option: &str) -> FeedbackRecord {
        let mut data = Map::new();
        data.insert("selected_option".to_string(), json!(option));
        record_with(data)
    }

    fn answer_record(answer: &str) -> FeedbackRecord {
        let mut data = Map::new();
        data.insert("answer".to_string(), json!(answer));
        record_with(data)
    }

    fn view_of(primary: Position, support: &[(&str, f64)]) -> AggregateView {
        AggregateView {
            primary,
            support: support
                .iter()
                .map(|(k, w)| (k.to_string(), *w))
                .collect::<HashMap<_, _>>(),
        }
    }

    // -- Classification -------------------------------------------------------

    #[test]
    fn test_classification_extracts_sorted_labels() {
        let handler = ClassificationHandler::new();
        let position = handler
            .extract_position(&labels_record(&["Negligence", "breach"]))
            .unwrap();
        assert_eq!(position.key(), "breach|negligence");
    }

    #[test]
    fn test_classification_rejects_missing_labels() {
        let handler = ClassificationHandler::new();
        let err = handler.extract_position(&record_with(Map::new()));
        assert!(matches!(err, Err(TaskError::MalformedFeedback { .. })));
    }

    #[test]
    fn test_classification_correctness_is_jaccard() {
        let handler = ClassificationHandler::new();
        let record = labels_record(&["breach", "damages"]);
        let truth = json!(["breach", "negligence"]);
        // |{breach}| / |{breach, damages, negligence}| = 1/3
        let score = handler.score_correctness(&record, &truth);
        assert!((score - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_classification_consistency_partial_overlap() {
        let handler = ClassificationHandler::new();
        let record = labels_record(&["breach", "damages"]);
        let primary = Position::from_labels(["breach"]);
        let view = view_of(primary, &[("breach", 0.8), ("breach|damages", 0.2)]);
        let score = handler.score_consistency(&record, &view);
        assert!((score - 0.5).abs() < f64::EPSILON);
    }

    // -- Option selection -----------------------------------------------------

    #[test]
    fn test_option_normalization_collapses_case_and_spacing() {
        let handler = OptionSelectionHandler::new();
        let a = handler.extract_position(&option_record(" Uphold  Ruling ")).unwrap();
        let b = handler.extract_position(&option_record("uphold ruling")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_option_consistency_uses_bucket_weight_for_dissent() {
        let handler = OptionSelectionHandler::new();
        let record = option_record("remand");
        let view = view_of(Position::new("uphold", "uphold"), &[("uphold", 0.75), ("remand", 0.25)]);
        let score = handler.score_consistency(&record, &view);
        assert!((score - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_option_correctness_exact_match() {
        let handler = OptionSelectionHandler::new();
        assert!(
            (handler.score_correctness(&option_record("Uphold"), &json!("uphold")) - 1.0).abs()
                < f64::EPSILON
        );
        assert!(
            handler
                .score_correctness(&option_record("remand"), &json!("uphold"))
                .abs()
                < f64::EPSILON
        );
    }

    // -- Free text ------------------------------------------------------------

    #[test]
    fn test_free_text_paraphrase_of_punctuation_collapses() {
        let handler = FreeTextHandler::new();
        let a = handler
            .extract_position(&answer_record("The contract is void."))
            .unwrap();
        let b = handler
            .extract_position(&answer_record("the contract is VOID"))
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_free_text_rejects_empty_answer() {
        let handler = FreeTextHandler::new();
        let err = handler.extract_position(&answer_record("!!!"));
        assert!(matches!(err, Err(TaskError::MalformedFeedback { .. })));
    }

    #[test]
    fn test_free_text_consistency_rewards_shared_substance() {
        let handler = FreeTextHandler::new();
        let primary = handler
            .extract_position(&answer_record("the clause creates liability"))
            .unwrap();
        let view = view_of(primary, &[]);
        let near = handler.score_consistency(&answer_record("liability arises from the clause"), &view);
        let far = handler.score_consistency(&answer_record("no opinion offered here"), &view);
        assert!(near > far);
    }

    #[test]
    fn test_free_text_correctness_against_ground_truth() {
        let handler = FreeTextHandler::new();
        let record = answer_record("breach of warranty");
        let exact = handler.score_correctness(&record, &json!("breach of warranty"));
        assert!((exact - 1.0).abs() < f64::EPSILON);
        let none = handler.score_correctness(&record, &json!(42));
        assert!(none.abs() < f64::EPSILON);
    }
}
