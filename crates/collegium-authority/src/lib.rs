//! # Collegium Authority
//!
//! Meritocratic trust scoring for contributors.
//!
//! ## Overview
//!
//! Every contributor carries an authority score in `[0, 2]` blended from
//! three signals:
//!
//! | Signal | Weight (default) | Source |
//! |--------|------------------|--------|
//! | Baseline credentials | 0.3 | Per-kind scoring rules over held credentials |
//! | Track record | 0.5 | Exponentially smoothed quality history |
//! | Recent performance | 0.2 | Short-window sample supplied by the caller |
//!
//! The blend weights always sum to 1 and are validated upstream by the
//! configuration guardrails. Scores are persisted in an embedded sled
//! database so authority survives restarts; history is implicit in the
//! smoothed track record, no per-update log is kept.
//!
//! Credential scoring rules are operator-configurable: a discrete
//! value-to-score lookup, or a small arithmetic formula run in a
//! sandboxed interpreter with an operation budget and a hard timeout.
//! Malformed values never fail an update; they score 0 and log a
//! warning.

pub mod credential;
pub mod error;
pub mod formula;
pub mod models;
pub mod scorer;
pub mod store;

pub use credential::{CredentialFamily, CredentialRule, CredentialScoring};
pub use error::AuthorityError;
pub use formula::{FormulaError, FormulaEvaluator};
pub use models::{Contributor, Credential, NewContributor, QualitySignals};
pub use scorer::{AuthorityParams, AuthorityScorer, AuthoritySnapshot, AuthorityWeights};
pub use store::ContributorStore;

/// Result type for authority operations.
pub type Result<T> = std::result::Result<T, AuthorityError>;
