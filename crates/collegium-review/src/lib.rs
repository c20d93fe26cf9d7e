//! # Collegium Review
//!
//! Post-hoc analysis of the aggregate: systematic-bias indicators and
//! devil's-advocate assignments.
//!
//! ## Overview
//!
//! The bias analyzer computes six independent indicators over a task's
//! feedback set or a time window and folds them into a composite
//! Euclidean norm. An indicator that cannot be computed from the data
//! at hand scores 0 and is listed as skipped; the report as a whole
//! never fails.
//!
//! The devil's-advocate assigner designates a small randomized subset
//! of eligible contributors to argue against the emerging consensus,
//! then measures post-hoc whether the assignments introduced genuine
//! diversity and critical engagement. Randomness is injected as a
//! seedable source so assignment is reproducible in tests.

pub mod advocate;
pub mod bias;

pub use advocate::{
    AdvocateAssigner, AdvocateEntry, AdvocateParams, DevilsAdvocateAssignment,
    EffectivenessReport,
};
pub use bias::{BiasAnalyzer, BiasObservation, BiasReport, BiasScope, BiasSeverity};
