//! Handler trait and registry.
//!
//! One [`TaskHandler`] per task type, resolved exactly once per task.
//! Unknown types are rejected at resolution time; there is no fallback
//! handler.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::TaskError;
use crate::handlers::{ClassificationHandler, FreeTextHandler, OptionSelectionHandler};
use crate::models::{FeedbackRecord, TaskType};
use crate::position::Position;
use crate::Result;

/// The slice of an aggregation result a handler needs for consistency
/// scoring: the winning position and the weighted support per bucket.
#[derive(Debug, Clone)]
pub struct AggregateView {
    /// The arg-max-support position.
    pub primary: Position,
    /// Weighted support by position key. Values sum to 1.
    pub support: HashMap<String, f64>,
}

impl AggregateView {
    /// Returns the weighted support behind a position, 0 if absent.
    pub fn support_for(&self, position: &Position) -> f64 {
        self.support.get(position.key()).copied().unwrap_or(0.0)
    }
}

/// Per-task-type strategy for extracting and scoring positions.
///
/// # Implementors
///
/// - [`ClassificationHandler`]: unordered label sets
/// - [`OptionSelectionHandler`]: single chosen option
/// - [`FreeTextHandler`]: normalized free-text answers
pub trait TaskHandler: Send + Sync {
    /// The task type this handler serves.
    fn task_type(&self) -> TaskType;

    /// Human-readable handler name for logs and reports.
    fn name(&self) -> &str;

    /// Reduces one feedback record to its canonical position.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MalformedFeedback`] when the record lacks
    /// the fields this task type requires.
    fn extract_position(&self, feedback: &FeedbackRecord) -> Result<Position>;

    /// Scores how consistent one record is with the aggregate, in [0, 1].
    fn score_consistency(&self, feedback: &FeedbackRecord, aggregate: &AggregateView) -> f64;

    /// Scores one record against withheld ground truth, in [0, 1].
    fn score_correctness(&self, feedback: &FeedbackRecord, ground_truth: &Value) -> f64;
}

/// Registry mapping task types to their handlers.
///
/// Resolution happens once per task, not per feedback item. Lookup for
/// an unregistered type is an eager [`TaskError::UnknownTaskType`] so
/// that task creation fails fast.
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Box<dyn TaskHandler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_builtin_handlers()
    }
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Creates a registry with the three built-in handlers.
    pub fn with_builtin_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ClassificationHandler::new()));
        registry.register(Box::new(OptionSelectionHandler::new()));
        registry.register(Box::new(FreeTextHandler::new()));
        registry
    }

    /// Registers a handler, replacing any existing one for the same type.
    pub fn register(&mut self, handler: Box<dyn TaskHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    /// Resolves the handler for a task type.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::UnknownTaskType`] when no handler is
    /// registered for the type.
    pub fn resolve(&self, task_type: &TaskType) -> Result<&dyn TaskHandler> {
        self.handlers
            .get(task_type)
            .map(Box::as_ref)
            .ok_or_else(|| TaskError::UnknownTaskType(task_type.tag().to_string()))
    }

    /// Returns true if a handler exists for the type.
    pub fn supports(&self, task_type: &TaskType) -> bool {
        self.handlers.contains_key(task_type)
    }

    /// Names of all registered handlers.
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.values().map(|h| h.name()).collect()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.handlers.len())
            .finish()
    }
}
