//! # Collegium Tasks
//!
//! Task domain model and the per-type handler registry.
//! Turns heterogeneous feedback into canonical, comparable positions.
//!
//! ## Overview
//!
//! Every task carries a type tag that selects exactly one [`TaskHandler`].
//! A handler knows three things about its task type:
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | `extract_position` | Reduce one feedback record to a canonical [`Position`] |
//! | `score_consistency` | How well one record agrees with the aggregate |
//! | `score_correctness` | How well one record matches withheld ground truth |
//!
//! Positions are order-independent and hashable so that semantically
//! identical answers from different contributors collapse into the same
//! aggregation bucket. Free-text answers are reduced via light lexical
//! normalization rather than raw string equality.
//!
//! Dispatch is resolved once per task, at creation time. Unknown task
//! types are rejected eagerly; there is no default handler to silently
//! degrade to.

pub mod error;
pub mod handler;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod position;

pub use error::TaskError;
pub use handler::{AggregateView, HandlerRegistry, TaskHandler};
pub use handlers::{ClassificationHandler, FreeTextHandler, OptionSelectionHandler};
pub use models::{FeedbackRecord, FeedbackSubmission, Task, TaskState, TaskType};
pub use normalize::Lexicon;
pub use position::Position;

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;
