//! Devil's-advocate assignment and effectiveness measurement.
//!
//! Before evaluation begins, a small randomized subset of eligible
//! contributors is designated to deliberately challenge the emerging
//! consensus. The per-contributor assignment probability is
//! `min(0.1, 3 / |eligible|)`, sampled without replacement; the pool
//! always yields at least one advocate and never more than three.
//!
//! After the task closes, the assignments are scored once:
//!
//! ```text
//! diversity  = |positions unique to advocates| / |all positions|
//! engagement = 0.6 · min(1, mean_reasoning_words / 50)
//!            + 0.4 · (critical_language_hits / total_feedback)
//! ```
//!
//! The random source is injected so assignment is reproducible under a
//! fixed seed.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Per-contributor assignment probability cap.
const ASSIGNMENT_RATE: f64 = 0.1;

/// Hard ceiling on advocates per task.
const MAX_ADVOCATES: usize = 3;

/// Reasoning length (in words) at which the length term saturates.
const REASONING_SATURATION_WORDS: f64 = 50.0;

/// Fixed critical-language markers for the engagement metric.
const CRITICAL_TERMS: &[&str] = &[
    "however",
    "although",
    "contrast",
    "limitation",
    "risk",
    "alternative",
    "concern",
    "counterpoint",
    "overlooked",
    "weakness",
    "instead",
    "objection",
];

/// Parameters for advocate assignment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdvocateParams {
    /// Minimum authority for eligibility.
    pub min_authority: f64,
}

impl Default for AdvocateParams {
    fn default() -> Self {
        Self { min_authority: 0.4 }
    }
}

/// One devil's-advocate assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevilsAdvocateAssignment {
    /// Assignment identifier (UUID v4).
    pub id: String,
    /// Task the advocate argues within.
    pub task_id: String,
    /// The designated contributor.
    pub contributor_id: String,
    /// Creation timestamp, epoch milliseconds.
    pub created_at_ms: u64,
    /// Critical-prompt instructions handed to the contributor.
    pub instructions: String,
}

/// Post-hoc effectiveness of a task's advocate assignments.
///
/// Computed once after the task closes, never recomputed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivenessReport {
    /// Share of positions asserted only by advocates.
    pub diversity_introduced: f64,
    /// Blended reasoning-depth and critical-language score.
    pub engagement_score: f64,
    /// How many advocates were assigned.
    pub advocate_count: usize,
    /// Measurement timestamp, epoch milliseconds.
    pub measured_at_ms: u64,
}

/// One feedback item as seen by the effectiveness measurement.
#[derive(Debug, Clone)]
pub struct AdvocateEntry {
    /// Submitting contributor.
    pub contributor_id: String,
    /// Canonical position key.
    pub position_key: String,
    /// The contributor's rationale, if any.
    pub rationale: Option<String>,
}

/// Assigns devil's advocates and measures their effect.
#[derive(Debug, Clone, Default)]
pub struct AdvocateAssigner {
    params: AdvocateParams,
}

impl AdvocateAssigner {
    /// Creates an assigner with the given parameters.
    pub fn new(params: AdvocateParams) -> Self {
        Self { params }
    }

    /// The assigner's parameters.
    pub fn params(&self) -> &AdvocateParams {
        &self.params
    }

    /// Number of advocates to draw from a pool of `eligible` size.
    ///
    /// `max(1, ⌈min(0.1, 3/n) · n⌉)` for a non-empty pool; this never
    /// exceeds [`MAX_ADVOCATES`].
    pub fn target_count(eligible: usize) -> usize {
        if eligible == 0 {
            return 0;
        }
        let rate = ASSIGNMENT_RATE.min(MAX_ADVOCATES as f64 / eligible as f64);
        let count = (rate * eligible as f64).ceil() as usize;
        count.clamp(1, MAX_ADVOCATES)
    }

    /// Designates advocates for a task.
    ///
    /// `pool` carries (contributor id, authority) pairs; contributors
    /// below the eligibility threshold are filtered out. Sampling is
    /// without replacement from the injected random source.
    pub fn assign(
        &self,
        task_id: &str,
        pool: &[(String, f64)],
        rng: &mut StdRng,
        now_ms: u64,
    ) -> Vec<DevilsAdvocateAssignment> {
        let mut eligible: Vec<&String> = pool
            .iter()
            .filter(|(_, authority)| *authority >= self.params.min_authority)
            .map(|(id, _)| id)
            .collect();
        eligible.sort();

        let count = Self::target_count(eligible.len());
        let chosen: Vec<&&String> = eligible.choose_multiple(rng, count).collect();

        debug!(
            task_id,
            eligible = eligible.len(),
            assigned = chosen.len(),
            "devil's-advocate assignment"
        );

        chosen
            .into_iter()
            .map(|contributor_id| DevilsAdvocateAssignment {
                id: Uuid::new_v4().to_string(),
                task_id: task_id.to_string(),
                contributor_id: (*contributor_id).clone(),
                created_at_ms: now_ms,
                instructions: "Argue against the emerging consensus: identify limitations, \
                               risks, and overlooked alternatives in the leading answer, and \
                               state the strongest counterpoint you can support."
                    .to_string(),
            })
            .collect()
    }

    /// Measures how much diversity and critical engagement the
    /// advocates introduced.
    pub fn measure_effectiveness(
        &self,
        assignments: &[DevilsAdvocateAssignment],
        entries: &[AdvocateEntry],
        now_ms: u64,
    ) -> EffectivenessReport {
        let advocates: HashSet<&str> = assignments
            .iter()
            .map(|a| a.contributor_id.as_str())
            .collect();

        // Which positions were asserted by advocates vs everyone else.
        let mut advocate_positions: HashSet<&str> = HashSet::new();
        let mut other_positions: HashSet<&str> = HashSet::new();
        let mut all_positions: HashSet<&str> = HashSet::new();
        for entry in entries {
            all_positions.insert(&entry.position_key);
            if advocates.contains(entry.contributor_id.as_str()) {
                advocate_positions.insert(&entry.position_key);
            } else {
                other_positions.insert(&entry.position_key);
            }
        }
        let unique_to_advocates = advocate_positions.difference(&other_positions).count();
        let diversity = if all_positions.is_empty() {
            0.0
        } else {
            unique_to_advocates as f64 / all_positions.len() as f64
        };

        // Reasoning depth and critical language among advocate entries.
        let advocate_entries: Vec<&AdvocateEntry> = entries
            .iter()
            .filter(|e| advocates.contains(e.contributor_id.as_str()))
            .collect();
        let mean_words = if advocate_entries.is_empty() {
            0.0
        } else {
            let total_words: usize = advocate_entries
                .iter()
                .filter_map(|e| e.rationale.as_deref())
                .map(|r| r.split_whitespace().count())
                .sum();
            total_words as f64 / advocate_entries.len() as f64
        };
        let critical_hits = advocate_entries
            .iter()
            .filter_map(|e| e.rationale.as_deref())
            .filter(|r| contains_critical_language(r))
            .count();
        let hit_ratio = if entries.is_empty() {
            0.0
        } else {
            critical_hits as f64 / entries.len() as f64
        };

        let engagement =
            0.6 * (mean_words / REASONING_SATURATION_WORDS).min(1.0) + 0.4 * hit_ratio;

        EffectivenessReport {
            diversity_introduced: diversity,
            engagement_score: engagement,
            advocate_count: assignments.len(),
            measured_at_ms: now_ms,
        }
    }
}

/// Returns true if the text contains any critical-language marker.
fn contains_critical_language(text: &str) -> bool {
    let lowered = text.to_lowercase();
    CRITICAL_TERMS.iter().any(|term| lowered.contains(term))
}
