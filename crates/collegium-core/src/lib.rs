//! # Collegium Core
//!
//! Unified facade for the Collegium community-feedback aggregation and
//! authority-scoring engine. Orchestrates the authority scorer, task
//! handler registry, aggregation engine, bias analyzer, and
//! devil's-advocate assigner.
//!
//! ## Component Coverage
//!
//! | Concern | Component | Behavior |
//! |---------|-----------|----------|
//! | Trust | Authority Scorer | Credential baseline + smoothed track record + recent sample |
//! | Opinion | Task Handlers | Canonical positions per task type |
//! | Agreement | Aggregation Engine | Entropy disagreement, dissent preservation |
//! | Integrity | Bias Analyzer | Six indicators, composite norm |
//! | Challenge | Advocate Assigner | Seeded random assignment, effectiveness |
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       COLLEGIUM CORE                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │                    ┌─────────────────┐                          │
//! │                    │     Engine      │  ← Unified Facade        │
//! │                    └────────┬────────┘                          │
//! │                             │                                   │
//! │      ┌──────────┬───────────┼───────────┬──────────┐            │
//! │      ▼          ▼           ▼           ▼          ▼            │
//! │ ┌─────────┐ ┌────────┐ ┌──────────┐ ┌───────┐ ┌──────────┐     │
//! │ │Authority│ │  Task  │ │Aggregation│ │ Bias  │ │ Advocate │     │
//! │ │ Scorer  │ │Handlers│ │  Engine  │ │Analyzer│ │ Assigner │     │
//! │ └─────────┘ └────────┘ └──────────┘ └───────┘ └──────────┘     │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use collegium_core::{Engine, EngineConfig};
//!
//! let engine = Engine::temporary(EngineConfig::default())?;
//! engine.register_contributor(registration)?;
//! let task = engine.create_task(task_type, input, ground_truth)?;
//! engine.open_evaluation(&task.id)?;
//! engine.submit_feedback(submission)?;
//! let record = engine.aggregate_task(&task.id)?;
//! let bias = engine.analyze_task_bias(&task.id)?;
//! ```
//!
//! ## Design Notes
//!
//! - Every public operation returns a result or a typed failure;
//!   nothing crashes the calling process.
//! - Aggregation and bias analysis are idempotent and safely
//!   re-runnable after a retryable failure such as missing quorum.
//! - Configuration is versioned and swapped atomically; guardrail
//!   violations reject the whole update and keep the old version.

mod config;
mod engine;
mod error;

pub use config::{EngineConfig, VersionedConfig};
pub use engine::{AggregationRecord, Engine};
pub use error::EngineError;

// Re-export component types for convenience
pub use collegium_aggregation::{
    AggregationOutcome, AggregationParams, AggregationResult, AlternativePosition,
};
pub use collegium_authority::{
    AuthorityParams, AuthorityWeights, Contributor, ContributorStore, Credential,
    CredentialFamily, CredentialRule, CredentialScoring, NewContributor, QualitySignals,
};
pub use collegium_review::{
    AdvocateParams, BiasReport, BiasScope, BiasSeverity, DevilsAdvocateAssignment,
    EffectivenessReport,
};
pub use collegium_tasks::{
    FeedbackRecord, FeedbackSubmission, Position, Task, TaskState, TaskType,
};

/// Core result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
