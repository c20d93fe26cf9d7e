//! The authority scorer.
//!
//! `authority = α·baseline + β·track_record + γ·recent`, with
//! `α + β + γ = 1` and the result clamped to `[0, 2]`. The track record
//! evolves by exponential smoothing over quality observations; history
//! is implicit in the smoothed value, no per-update log is kept.
//!
//! Updates for different contributors run fully in parallel. Updates
//! for a single contributor serialize on a per-id lock so concurrent
//! submissions cannot interleave a read-modify-write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::CredentialScoring;
use crate::formula::FormulaEvaluator;
use crate::models::{Contributor, NewContributor, QualitySignals};
use crate::store::ContributorStore;
use crate::Result;

/// Upper bound of the authority scale.
pub const MAX_AUTHORITY: f64 = 2.0;

/// Blend weights for the three authority signals. Must sum to 1;
/// validated by the configuration guardrails upstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AuthorityWeights {
    /// Weight of the credential baseline (α).
    pub baseline: f64,
    /// Weight of the smoothed track record (β).
    pub track_record: f64,
    /// Weight of the recent-performance sample (γ).
    pub recent_performance: f64,
}

impl Default for AuthorityWeights {
    fn default() -> Self {
        Self {
            baseline: 0.3,
            track_record: 0.5,
            recent_performance: 0.2,
        }
    }
}

impl AuthorityWeights {
    /// Sum of the three weights.
    pub fn sum(&self) -> f64 {
        self.baseline + self.track_record + self.recent_performance
    }
}

/// Parameters for one authority computation, snapshotted from the
/// active configuration at call entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorityParams {
    /// Signal blend weights.
    pub weights: AuthorityWeights,
    /// Track-record smoothing factor λ in [0, 1).
    pub decay: f64,
    /// Credential scoring rules.
    pub scoring: CredentialScoring,
}

impl Default for AuthorityParams {
    fn default() -> Self {
        Self {
            weights: AuthorityWeights::default(),
            decay: 0.95,
            scoring: CredentialScoring::default(),
        }
    }
}

/// A consistent snapshot of authority scores.
///
/// Captured once before an aggregation run so every weight in the run
/// comes from the same point in time, even if submissions keep
/// updating scores concurrently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthoritySnapshot {
    scores: HashMap<String, f64>,
    /// When the snapshot was taken, epoch milliseconds.
    pub taken_at_ms: u64,
}

impl AuthoritySnapshot {
    /// Builds a snapshot from raw scores.
    pub fn new(scores: HashMap<String, f64>, taken_at_ms: u64) -> Self {
        Self {
            scores,
            taken_at_ms,
        }
    }

    /// Authority of one contributor, if present in the snapshot.
    pub fn authority_of(&self, contributor_id: &str) -> Option<f64> {
        self.scores.get(contributor_id).copied()
    }

    /// Number of contributors in the snapshot.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Iterates (id, authority) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.scores.iter()
    }
}

/// Maintains per-contributor trust scores.
pub struct AuthorityScorer {
    store: ContributorStore,
    evaluator: FormulaEvaluator,
    /// Per-contributor update locks. The map itself is guarded by a
    /// mutex; each entry serializes one contributor's updates.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuthorityScorer {
    /// Creates a scorer over the given store.
    pub fn new(store: ContributorStore) -> Self {
        Self {
            store,
            evaluator: FormulaEvaluator::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a scorer over a temporary in-memory store.
    pub fn temporary() -> Result<Self> {
        Ok(Self::new(ContributorStore::temporary()?))
    }

    /// Access to the underlying store.
    pub fn store(&self) -> &ContributorStore {
        &self.store
    }

    fn lock_for(&self, contributor_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(contributor_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Registers a new contributor and computes their initial scores.
    ///
    /// The baseline comes from the supplied credentials; the track
    /// record starts at 0 and the authority blend uses a zero recent
    /// sample.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AuthorityError::DuplicateContributor`] if the
    /// id is already registered.
    pub fn register(
        &self,
        registration: NewContributor,
        params: &AuthorityParams,
        now_ms: u64,
    ) -> Result<Contributor> {
        if self.store.contains(&registration.id)? {
            return Err(crate::AuthorityError::DuplicateContributor(registration.id));
        }

        let baseline = params
            .scoring
            .score_baseline(&registration.credentials, &self.evaluator);
        let authority = blend(&params.weights, baseline, 0.0, 0.0);

        let contributor = Contributor {
            id: registration.id,
            baseline_credential_score: baseline,
            track_record_score: 0.0,
            authority_score: authority,
            credentials: registration.credentials,
            region: registration.region,
            profession: registration.profession,
            cohort: registration.cohort,
            registered_at_ms: now_ms,
            updated_at_ms: now_ms,
        };
        self.store.put(&contributor)?;
        debug!(id = %contributor.id, authority, "registered contributor");
        Ok(contributor)
    }

    /// Updates one contributor's authority from a recent-performance
    /// sample and a quality observation.
    ///
    /// The baseline is recomputed from the held credentials so rule
    /// changes take effect without re-registration. If every quality
    /// signal is absent the track record is left untouched; the blend
    /// still runs with the new recent sample.
    pub fn update_authority(
        &self,
        contributor_id: &str,
        recent_performance: f64,
        signals: &QualitySignals,
        params: &AuthorityParams,
        now_ms: u64,
    ) -> Result<f64> {
        let lock = self.lock_for(contributor_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut contributor = self.store.get_required(contributor_id)?;

        contributor.baseline_credential_score = params
            .scoring
            .score_baseline(&contributor.credentials, &self.evaluator);

        if let Some(quality) = signals.quality() {
            let quality = quality.clamp(0.0, 1.0);
            contributor.track_record_score = (params.decay * contributor.track_record_score
                + (1.0 - params.decay) * quality)
                .clamp(0.0, 1.0);
        }

        let recent = recent_performance.clamp(0.0, 1.0);
        contributor.authority_score = blend(
            &params.weights,
            contributor.baseline_credential_score,
            contributor.track_record_score,
            recent,
        );
        contributor.updated_at_ms = now_ms;
        self.store.put(&contributor)?;

        debug!(
            id = %contributor.id,
            authority = contributor.authority_score,
            track_record = contributor.track_record_score,
            "updated authority"
        );
        Ok(contributor.authority_score)
    }

    /// Attaches a credential and recomputes the baseline and blend.
    pub fn add_credential(
        &self,
        contributor_id: &str,
        credential: crate::models::Credential,
        params: &AuthorityParams,
        now_ms: u64,
    ) -> Result<f64> {
        let lock = self.lock_for(contributor_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut contributor = self.store.get_required(contributor_id)?;
        contributor.credentials.push(credential);
        contributor.baseline_credential_score = params
            .scoring
            .score_baseline(&contributor.credentials, &self.evaluator);
        contributor.authority_score = blend(
            &params.weights,
            contributor.baseline_credential_score,
            contributor.track_record_score,
            0.0,
        );
        contributor.updated_at_ms = now_ms;
        self.store.put(&contributor)?;
        Ok(contributor.authority_score)
    }

    /// Captures a consistent snapshot of all authority scores.
    pub fn snapshot(&self, now_ms: u64) -> Result<AuthoritySnapshot> {
        let scores = self
            .store
            .list()?
            .into_iter()
            .map(|c| (c.id, c.authority_score))
            .collect();
        Ok(AuthoritySnapshot::new(scores, now_ms))
    }

    /// Contributors ordered by authority, descending; ties break on id
    /// so the ordering is stable for display.
    pub fn leaderboard(&self) -> Result<Vec<(String, f64)>> {
        let mut entries: Vec<(String, f64)> = self
            .store
            .list()?
            .into_iter()
            .map(|c| (c.id, c.authority_score))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        Ok(entries)
    }
}

impl std::fmt::Debug for AuthorityScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorityScorer")
            .field("store", &self.store)
            .finish()
    }
}

/// The three-signal blend, clamped to the authority scale.
fn blend(weights: &AuthorityWeights, baseline: f64, track_record: f64, recent: f64) -> f64 {
    (weights.baseline * baseline
        + weights.track_record * track_record
        + weights.recent_performance * recent)
        .clamp(0.0, MAX_AUTHORITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{CredentialFamily, CredentialRule, CredentialScoring};
    use crate::models::Credential;

    /// Scoring where `fixed_baseline`/`score` maps to a known value.
    fn fixed_scoring(score: f64) -> CredentialScoring {
        let mut scoring = CredentialScoring::empty();
        scoring.families.insert(
            "fixed_baseline".to_string(),
            CredentialFamily {
                weight: 1.0,
                rule: CredentialRule::Lookup(
                    [("score".to_string(), score)].into_iter().collect(),
                ),
            },
        );
        scoring
    }

    fn params_with_baseline(score: f64) -> AuthorityParams {
        AuthorityParams {
            weights: AuthorityWeights::default(),
            decay: 0.95,
            scoring: fixed_scoring(score),
        }
    }

    fn register_fixed(scorer: &AuthorityScorer, id: &str, params: &AuthorityParams) {
        scorer
            .register(
                NewContributor::new(id, vec![Credential::new("fixed_baseline", "score")]),
                params,
                0,
            )
            .unwrap();
    }

    #[test]
    fn test_scenario_a_default_weights() {
        // baseline 1.2, track record 0.7, recent 0.8 -> 0.87
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = params_with_baseline(1.2);
        register_fixed(&scorer, "alice", &params);

        // Seed the stored track record directly.
        let mut profile = scorer.store().get_required("alice").unwrap();
        profile.track_record_score = 0.7;
        scorer.store().put(&profile).unwrap();

        let authority = scorer
            .update_authority("alice", 0.8, &QualitySignals::empty(), &params, 1)
            .unwrap();
        assert!((authority - 0.87).abs() < 1e-12);
    }

    #[test]
    fn test_authority_stays_in_range() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = params_with_baseline(2.0);
        register_fixed(&scorer, "alice", &params);

        for _ in 0..50 {
            let signals = QualitySignals {
                peer_helpfulness: Some(1.0),
                ground_truth_accuracy: Some(1.0),
                cross_task_consistency: Some(1.0),
                community_helpfulness: Some(1.0),
            };
            let authority = scorer
                .update_authority("alice", 1.0, &signals, &params, 1)
                .unwrap();
            assert!((0.0..=MAX_AUTHORITY).contains(&authority));
        }
    }

    #[test]
    fn test_track_record_smoothing() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = params_with_baseline(1.0);
        register_fixed(&scorer, "alice", &params);

        let signals = QualitySignals {
            ground_truth_accuracy: Some(1.0),
            ..QualitySignals::empty()
        };
        scorer
            .update_authority("alice", 0.0, &signals, &params, 1)
            .unwrap();
        let profile = scorer.store().get_required("alice").unwrap();
        // 0.95 * 0.0 + 0.05 * 1.0
        assert!((profile.track_record_score - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_missing_signals_leave_track_record() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = params_with_baseline(1.0);
        register_fixed(&scorer, "alice", &params);

        let mut profile = scorer.store().get_required("alice").unwrap();
        profile.track_record_score = 0.42;
        scorer.store().put(&profile).unwrap();

        scorer
            .update_authority("alice", 0.5, &QualitySignals::empty(), &params, 1)
            .unwrap();
        let profile = scorer.store().get_required("alice").unwrap();
        assert!((profile.track_record_score - 0.42).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = AuthorityParams::default();
        scorer
            .register(NewContributor::new("alice", Vec::new()), &params, 0)
            .unwrap();
        let err = scorer.register(NewContributor::new("alice", Vec::new()), &params, 0);
        assert!(matches!(
            err,
            Err(crate::AuthorityError::DuplicateContributor(_))
        ));
    }

    #[test]
    fn test_update_unknown_contributor_fails() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let err = scorer.update_authority(
            "ghost",
            0.5,
            &QualitySignals::empty(),
            &AuthorityParams::default(),
            0,
        );
        assert!(matches!(
            err,
            Err(crate::AuthorityError::UnknownContributor(_))
        ));
    }

    #[test]
    fn test_add_credential_raises_baseline() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = AuthorityParams::default();
        scorer
            .register(NewContributor::new("alice", Vec::new()), &params, 0)
            .unwrap();

        let authority = scorer
            .add_credential(
                "alice",
                Credential::new("bar_admission", "active"),
                &params,
                1,
            )
            .unwrap();
        // baseline 1.5 at weight α=0.3, everything else 0.
        assert!((authority - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_is_point_in_time() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let params = params_with_baseline(1.0);
        register_fixed(&scorer, "alice", &params);

        let snapshot = scorer.snapshot(10).unwrap();
        let before = snapshot.authority_of("alice").unwrap();

        scorer
            .update_authority("alice", 1.0, &QualitySignals::empty(), &params, 11)
            .unwrap();

        // The snapshot must not see the later update.
        assert!((snapshot.authority_of("alice").unwrap() - before).abs() < f64::EPSILON);
    }

    #[test]
    fn test_leaderboard_ordering() {
        let scorer = AuthorityScorer::temporary().unwrap();
        let high = params_with_baseline(2.0);
        let low = params_with_baseline(0.5);
        register_fixed(&scorer, "strong", &high);
        register_fixed(&scorer, "weak", &low);

        let board = scorer.leaderboard().unwrap();
        assert_eq!(board[0].0, "strong");
        assert_eq!(board[1].0, "weak");
    }
}
