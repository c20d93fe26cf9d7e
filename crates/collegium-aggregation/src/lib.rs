//! # Collegium Aggregation
//!
//! Authority-weighted opinion aggregation with dissent preservation.
//!
//! ## Overview
//!
//! Aggregation turns a task's feedback set into a single structured
//! result. Each canonical position is weighted by the authority of the
//! contributors asserting it, disagreement is quantified as normalized
//! Shannon entropy over the support distribution, and the disagreement
//! band decides the output shape:
//!
//! | Band | Output |
//! |------|--------|
//! | `δ ≤ τ` | Consensus: primary position only |
//! | `τ < δ ≤ escalation` | Dissent preserved: primary + weighted alternatives |
//! | `δ > escalation` | Same, flagged for structured discussion |
//!
//! The computation is deterministic and idempotent: unchanged feedback,
//! authority snapshot, and parameters produce an identical result. All
//! weights in one run come from a single [`AuthoritySnapshot`], never
//! from live scores.

pub mod disagreement;
pub mod engine;
pub mod error;
pub mod support;

pub use disagreement::normalized_disagreement;
pub use engine::{
    AggregationEngine, AggregationOutcome, AggregationParams, AggregationResult,
    AlternativePosition,
};
pub use error::AggregationError;
pub use support::{PositionSupport, SupportTally};

/// Result type for aggregation operations.
pub type Result<T> = std::result::Result<T, AggregationError>;
