//! Authority-weighted support tally.
//!
//! Buckets feedback by canonical position and accumulates the authority
//! behind each bucket. The tally order is the tie-break order: weight
//! descending, then strongest single supporter, then earliest
//! submission, then position key. The head of the tally is the primary
//! position.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use collegium_tasks::Position;

/// One contribution to the tally: who asserted what, with how much
/// authority, and when.
#[derive(Debug, Clone)]
pub struct SupportItem {
    /// Asserting contributor.
    pub contributor_id: String,
    /// Contributor authority from the run's snapshot.
    pub authority: f64,
    /// The asserted position.
    pub position: Position,
    /// Submission timestamp, epoch milliseconds.
    pub submitted_at_ms: u64,
    /// The contributor's rationale, if any.
    pub rationale: Option<String>,
}

/// Accumulated support behind one position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSupport {
    /// The position.
    pub position: Position,
    /// Normalized support share in [0, 1]; shares sum to 1.
    pub weight: f64,
    /// Sum of supporter authorities before normalization.
    pub raw_weight: f64,
    /// Supporters in submission order.
    pub supporters: Vec<String>,
    /// Highest single-supporter authority, for tie-breaking.
    pub top_authority: f64,
    /// Earliest supporting submission, for tie-breaking.
    pub earliest_ms: u64,
    /// First non-empty rationale among supporters, in submission order.
    pub rationale: Option<String>,
}

/// The full tally for one aggregation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTally {
    entries: Vec<PositionSupport>,
    total_authority: f64,
}

impl SupportTally {
    /// Builds a tally from individual support items.
    ///
    /// When the snapshot carries no authority at all (every weight is
    /// zero) each item counts with unit weight instead, so an
    /// all-newcomer pool still aggregates.
    pub fn from_items(mut items: Vec<SupportItem>) -> Self {
        items.sort_by(|a, b| {
            a.submitted_at_ms
                .cmp(&b.submitted_at_ms)
                .then_with(|| a.contributor_id.cmp(&b.contributor_id))
        });

        let zero_authority = items.iter().all(|i| i.authority <= 0.0);

        let mut buckets: HashMap<String, PositionSupport> = HashMap::new();
        let mut total = 0.0;
        for item in items {
            let authority = if zero_authority { 1.0 } else { item.authority };
            total += authority;
            let entry = buckets
                .entry(item.position.key().to_string())
                .or_insert_with(|| PositionSupport {
                    position: item.position.clone(),
                    weight: 0.0,
                    raw_weight: 0.0,
                    supporters: Vec::new(),
                    top_authority: 0.0,
                    earliest_ms: item.submitted_at_ms,
                    rationale: None,
                });
            entry.raw_weight += authority;
            entry.top_authority = entry.top_authority.max(authority);
            entry.earliest_ms = entry.earliest_ms.min(item.submitted_at_ms);
            entry.supporters.push(item.contributor_id);
            if entry.rationale.is_none() {
                if let Some(rationale) = item.rationale.filter(|r| !r.trim().is_empty()) {
                    entry.rationale = Some(rationale);
                }
            }
        }

        let mut entries: Vec<PositionSupport> = buckets.into_values().collect();
        if total > 0.0 {
            for entry in &mut entries {
                entry.weight = entry.raw_weight / total;
            }
        }

        // Tie-break order: support, strongest single supporter,
        // earliest submission, key.
        entries.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.top_authority
                        .partial_cmp(&a.top_authority)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.earliest_ms.cmp(&b.earliest_ms))
                .then_with(|| a.position.key().cmp(b.position.key()))
        });

        Self {
            entries,
            total_authority: total,
        }
    }

    /// The entries in rank order.
    pub fn entries(&self) -> &[PositionSupport] {
        &self.entries
    }

    /// The winning entry, if the tally is non-empty.
    pub fn primary(&self) -> Option<&PositionSupport> {
        self.entries.first()
    }

    /// Number of distinct positions.
    pub fn position_count(&self) -> usize {
        self.entries.len()
    }

    /// Total authority across all items.
    pub fn total_authority(&self) -> f64 {
        self.total_authority
    }

    /// Support shares in rank order.
    pub fn shares(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.weight).collect()
    }

    /// Support shares keyed by position key.
    pub fn share_map(&self) -> HashMap<String, f64> {
        self.entries
            .iter()
            .map(|e| (e.position.key().to_string(), e.weight))
            .collect()
    }
}
