//! Contributor profiles, credentials, and quality signals.

use serde::{Deserialize, Serialize};

/// A verified credential held by a contributor.
///
/// Immutable once attached; scored via the per-kind rule configured in
/// [`crate::CredentialScoring`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential family tag (e.g., "bar_admission", "years_experience").
    pub kind: String,
    /// Raw value as supplied at verification time.
    pub value: String,
}

impl Credential {
    /// Creates a credential.
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// Registration payload for a new contributor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewContributor {
    /// Contributor identity.
    pub id: String,
    /// Credentials held at registration.
    pub credentials: Vec<Credential>,
    /// Optional region attribute, consumed by the bias analyzer.
    pub region: Option<String>,
    /// Optional profession attribute, consumed by the bias analyzer.
    pub profession: Option<String>,
    /// Optional demographic cohort, consumed by the bias analyzer.
    pub cohort: Option<String>,
}

impl NewContributor {
    /// Creates a registration payload with no profile attributes.
    pub fn new(id: impl Into<String>, credentials: Vec<Credential>) -> Self {
        Self {
            id: id.into(),
            credentials,
            region: None,
            profession: None,
            cohort: None,
        }
    }

    /// Sets the region attribute.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the profession attribute.
    pub fn with_profession(mut self, profession: impl Into<String>) -> Self {
        self.profession = Some(profession.into());
        self
    }

    /// Sets the demographic cohort.
    pub fn with_cohort(mut self, cohort: impl Into<String>) -> Self {
        self.cohort = Some(cohort.into());
        self
    }
}

/// A stored contributor profile.
///
/// `authority_score` is derived and recomputed on every update; it is
/// mutated only by the [`crate::AuthorityScorer`]. Contributors are
/// never deleted, only decayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contributor {
    /// Contributor identity.
    pub id: String,
    /// Credential-derived baseline in [0, 2].
    pub baseline_credential_score: f64,
    /// Smoothed historical quality in [0, 1].
    pub track_record_score: f64,
    /// Blended authority in [0, 2].
    pub authority_score: f64,
    /// Credentials, in attachment order.
    pub credentials: Vec<Credential>,
    /// Optional region attribute.
    pub region: Option<String>,
    /// Optional profession attribute.
    pub profession: Option<String>,
    /// Optional demographic cohort.
    pub cohort: Option<String>,
    /// Registration timestamp, epoch milliseconds.
    pub registered_at_ms: u64,
    /// Last score update, epoch milliseconds.
    pub updated_at_ms: u64,
}

/// The four sub-signals behind one quality observation.
///
/// Each is in `[0, 1]` when present. A missing signal is excluded from
/// the mean rather than treated as zero.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualitySignals {
    /// Peer-assigned helpfulness rating.
    pub peer_helpfulness: Option<f64>,
    /// Accuracy against withheld ground truth.
    pub ground_truth_accuracy: Option<f64>,
    /// Consistency with aggregates across tasks.
    pub cross_task_consistency: Option<f64>,
    /// Community helpfulness rating.
    pub community_helpfulness: Option<f64>,
}

impl QualitySignals {
    /// An observation with no signals present.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Unweighted mean of the present signals, `None` if all are absent.
    pub fn quality(&self) -> Option<f64> {
        let signals = [
            self.peer_helpfulness,
            self.ground_truth_accuracy,
            self.cross_task_consistency,
            self.community_helpfulness,
        ];
        let present: Vec<f64> = signals.iter().filter_map(|s| *s).collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }
}
