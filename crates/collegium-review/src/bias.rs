//! Systematic-bias indicators.
//!
//! Six independent scalar indicators, each normalized to `[0, 1]`:
//!
//! | Indicator | Signal |
//! |-----------|--------|
//! | Demographic correlation | Position choice clusters by cohort |
//! | Professional clustering | Position choice clusters by profession |
//! | Temporal drift | Early and late position distributions diverge |
//! | Geographic concentration | Feedback concentrates in few regions |
//! | Confirmation bias | Contributors repeat their own past positions |
//! | Anchoring bias | Later responses follow the first responses |
//!
//! Composite `B = √(Σ bᵢ²)` in `[0, √6]`. An indicator without enough
//! data scores 0 and is listed in `skipped_indicators`; the report
//! never fails as a whole.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use collegium_authority::Contributor;

/// Composite thresholds for severity classification.
const MEDIUM_THRESHOLD: f64 = 0.5;
const HIGH_THRESHOLD: f64 = 1.0;

/// One observed opinion: who asserted which position, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasObservation {
    /// Asserting contributor.
    pub contributor_id: String,
    /// Canonical position key.
    pub position_key: String,
    /// Submission timestamp, epoch milliseconds.
    pub submitted_at_ms: u64,
}

/// What the report covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasScope {
    /// A single task.
    Task(String),
    /// A time window, epoch milliseconds.
    Window {
        /// Window start, inclusive.
        from_ms: u64,
        /// Window end, exclusive.
        to_ms: u64,
    },
}

/// Severity classification of the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BiasSeverity {
    /// Composite below 0.5.
    Low,
    /// Composite in [0.5, 1.0].
    Medium,
    /// Composite above 1.0.
    High,
}

impl BiasSeverity {
    /// Classifies a composite score.
    pub fn classify(composite: f64) -> Self {
        if composite > HIGH_THRESHOLD {
            BiasSeverity::High
        } else if composite >= MEDIUM_THRESHOLD {
            BiasSeverity::Medium
        } else {
            BiasSeverity::Low
        }
    }
}

/// The bias report for one scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    /// What the report covers.
    pub scope: BiasScope,
    /// Position clustering by demographic cohort.
    pub demographic_correlation: f64,
    /// Position clustering by profession.
    pub professional_clustering: f64,
    /// Divergence between early and late position distributions.
    pub temporal_drift: f64,
    /// Herfindahl concentration over contributor regions.
    pub geographic_concentration: f64,
    /// Mean tendency of contributors to repeat their own positions.
    pub confirmation_bias: f64,
    /// Fraction of later responses matching the early dominant position.
    pub anchoring_bias: f64,
    /// Euclidean norm of the six components, in [0, √6].
    pub composite: f64,
    /// Severity classification of the composite.
    pub severity: BiasSeverity,
    /// Indicators that had too little data and scored 0.
    pub skipped_indicators: Vec<String>,
    /// Report generation timestamp, epoch milliseconds.
    pub generated_at_ms: u64,
}

impl BiasReport {
    /// The six components in declaration order.
    pub fn components(&self) -> [f64; 6] {
        [
            self.demographic_correlation,
            self.professional_clustering,
            self.temporal_drift,
            self.geographic_concentration,
            self.confirmation_bias,
            self.anchoring_bias,
        ]
    }
}

/// Computes bias reports.
#[derive(Debug, Clone, Default)]
pub struct BiasAnalyzer;

impl BiasAnalyzer {
    /// Creates an analyzer.
    pub fn new() -> Self {
        Self
    }

    /// Analyzes one scope.
    ///
    /// `observations` are the opinions in scope; `contributors` supplies
    /// profile attributes; `history` holds each contributor's past
    /// position keys across tasks for the confirmation indicator.
    pub fn analyze(
        &self,
        scope: BiasScope,
        observations: &[BiasObservation],
        contributors: &HashMap<String, Contributor>,
        history: &HashMap<String, Vec<String>>,
        now_ms: u64,
    ) -> BiasReport {
        let mut ordered: Vec<&BiasObservation> = observations.iter().collect();
        ordered.sort_by(|a, b| {
            a.submitted_at_ms
                .cmp(&b.submitted_at_ms)
                .then_with(|| a.contributor_id.cmp(&b.contributor_id))
        });

        let mut skipped = Vec::new();
        let mut indicator = |name: &str, value: Option<f64>| match value {
            Some(value) => value.clamp(0.0, 1.0),
            None => {
                skipped.push(name.to_string());
                0.0
            }
        };

        let demographic = indicator(
            "demographic_correlation",
            clustering(&ordered, |c| c.cohort.as_deref(), contributors),
        );
        let professional = indicator(
            "professional_clustering",
            clustering(&ordered, |c| c.profession.as_deref(), contributors),
        );
        let drift = indicator("temporal_drift", temporal_drift(&ordered));
        let geographic = indicator(
            "geographic_concentration",
            geographic_concentration(&ordered, contributors),
        );
        let confirmation = indicator("confirmation_bias", confirmation_bias(history));
        let anchoring = indicator("anchoring_bias", anchoring_bias(&ordered));

        let components = [
            demographic,
            professional,
            drift,
            geographic,
            confirmation,
            anchoring,
        ];
        let composite = components.iter().map(|c| c * c).sum::<f64>().sqrt();
        let severity = BiasSeverity::classify(composite);

        debug!(?scope, composite, ?severity, skipped = skipped.len(), "bias report");

        BiasReport {
            scope,
            demographic_correlation: demographic,
            professional_clustering: professional,
            temporal_drift: drift,
            geographic_concentration: geographic,
            confirmation_bias: confirmation,
            anchoring_bias: anchoring,
            composite,
            severity,
            skipped_indicators: skipped,
            generated_at_ms: now_ms,
        }
    }
}

/// Share distribution over position keys.
fn distribution<'a, I: Iterator<Item = &'a str>>(keys: I) -> HashMap<&'a str, f64> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for key in keys {
        *counts.entry(key).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(k, n)| (k, n as f64 / total as f64))
        .collect()
}

/// How strongly position choice clusters by a contributor attribute.
///
/// Compares the weighted mean of each group's dominant-position share
/// against the overall dominant share: 0 when grouping explains
/// nothing, 1 when every group is internally unanimous despite overall
/// disagreement. Needs at least two groups and two distinct positions.
fn clustering<'a, F>(
    observations: &[&BiasObservation],
    attribute: F,
    contributors: &'a HashMap<String, Contributor>,
) -> Option<f64>
where
    F: Fn(&'a Contributor) -> Option<&'a str>,
{
    let mut groups: HashMap<&str, Vec<&str>> = HashMap::new();
    for obs in observations {
        let value = contributors
            .get(&obs.contributor_id)
            .and_then(|c| attribute(c));
        if let Some(value) = value {
            groups.entry(value).or_default().push(obs.position_key.as_str());
        }
    }
    if groups.len() < 2 {
        return None;
    }

    let total: usize = groups.values().map(Vec::len).sum();
    let overall = distribution(groups.values().flatten().copied());
    if overall.len() < 2 {
        return None;
    }
    let baseline = overall.values().cloned().fold(0.0, f64::max);
    if baseline >= 1.0 {
        return Some(0.0);
    }

    let clustered: f64 = groups
        .values()
        .map(|members| {
            let share = members.len() as f64 / total as f64;
            let dominant = distribution(members.iter().copied())
                .values()
                .cloned()
                .fold(0.0, f64::max);
            share * dominant
        })
        .sum();

    Some((clustered - baseline) / (1.0 - baseline))
}

/// Total-variation distance between the early and late halves.
fn temporal_drift(observations: &[&BiasObservation]) -> Option<f64> {
    if observations.len() < 4 {
        return None;
    }
    let mid = observations.len() / 2;
    let early = distribution(observations[..mid].iter().map(|o| o.position_key.as_str()));
    let late = distribution(observations[mid..].iter().map(|o| o.position_key.as_str()));

    let keys: std::collections::HashSet<&str> =
        early.keys().chain(late.keys()).copied().collect();
    let drift = 0.5
        * keys
            .iter()
            .map(|k| {
                let a = early.get(k).copied().unwrap_or(0.0);
                let b = late.get(k).copied().unwrap_or(0.0);
                (a - b).abs()
            })
            .sum::<f64>();
    Some(drift)
}

/// Normalized Herfindahl index over contributor regions.
fn geographic_concentration(
    observations: &[&BiasObservation],
    contributors: &HashMap<String, Contributor>,
) -> Option<f64> {
    let regions: Vec<&str> = observations
        .iter()
        .filter_map(|o| {
            contributors
                .get(&o.contributor_id)
                .and_then(|c| c.region.as_deref())
        })
        .collect();
    if regions.len() < 2 {
        return None;
    }

    let shares = distribution(regions.iter().copied());
    let k = shares.len() as f64;
    let hhi: f64 = shares.values().map(|s| s * s).sum();
    if shares.len() == 1 {
        return Some(1.0);
    }
    Some((hhi - 1.0 / k) / (1.0 - 1.0 / k))
}

/// Mean share of each contributor's modal historical position.
fn confirmation_bias(history: &HashMap<String, Vec<String>>) -> Option<f64> {
    let mut ratios = Vec::new();
    for positions in history.values() {
        if positions.len() < 2 {
            continue;
        }
        let shares = distribution(positions.iter().map(String::as_str));
        let modal = shares.values().cloned().fold(0.0, f64::max);
        ratios.push(modal);
    }
    if ratios.is_empty() {
        None
    } else {
        Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
    }
}

/// Fraction of later responses matching the dominant position among
/// the first three.
fn anchoring_bias(observations: &[&BiasObservation]) -> Option<f64> {
    if observations.len() <= 3 {
        return None;
    }
    let anchor_shares = distribution(observations[..3].iter().map(|o| o.position_key.as_str()));
    let anchor = anchor_shares
        .iter()
        .max_by(|a, b| {
            a.1.partial_cmp(b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        })
        .map(|(k, _)| *k)?;

    let later = &observations[3..];
    let matching = later.iter().filter(|o| o.position_key == anchor).count();
    Some(matching as f64 / later.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contributor(id: &str, cohort: Option<&str>, profession: Option<&str>, region: Option<&str>) -> Contributor {
        Contributor {
            id: id.to_string(),
            baseline_credential_score: 1.0,
            track_record_score: 0.5,
            authority_score: 1.0,
            credentials: Vec::new(),
            region: region.map(str::to_string),
            profession: profession.map(str::to_string),
            cohort: cohort.map(str::to_string),
            registered_at_ms: 0,
            updated_at_ms: 0,
        }
    }

    fn obs(contributor: &str, position: &str, at: u64) -> BiasObservation {
        BiasObservation {
            contributor_id: contributor.to_string(),
            position_key: position.to_string(),
            submitted_at_ms: at,
        }
    }

    fn analyze(
        observations: &[BiasObservation],
        contributors: &HashMap<String, Contributor>,
        history: &HashMap<String, Vec<String>>,
    ) -> BiasReport {
        BiasAnalyzer::new().analyze(
            BiasScope::Task("t".to_string()),
            observations,
            contributors,
            history,
            0,
        )
    }

    #[test]
    fn test_empty_scope_skips_everything() {
        let report = analyze(&[], &HashMap::new(), &HashMap::new());
        assert_eq!(report.skipped_indicators.len(), 6);
        assert!(report.composite.abs() < f64::EPSILON);
        assert_eq!(report.severity, BiasSeverity::Low);
    }

    #[test]
    fn test_composite_is_euclidean_norm() {
        let mut contributors = HashMap::new();
        contributors.insert("a".to_string(), contributor("a", Some("c1"), None, Some("eu")));
        contributors.insert("b".to_string(), contributor("b", Some("c2"), None, Some("eu")));
        let observations = vec![
            obs("a", "x", 1),
            obs("b", "y", 2),
            obs("a", "x", 3),
            obs("b", "y", 4),
        ];
        let report = analyze(&observations, &contributors, &HashMap::new());
        let expected = report
            .components()
            .iter()
            .map(|c| c * c)
            .sum::<f64>()
            .sqrt();
        assert!((report.composite - expected).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_cohort_split_maximizes_correlation() {
        let mut contributors = HashMap::new();
        contributors.insert("a".to_string(), contributor("a", Some("c1"), None, None));
        contributors.insert("b".to_string(), contributor("b", Some("c1"), None, None));
        contributors.insert("c".to_string(), contributor("c", Some("c2"), None, None));
        contributors.insert("d".to_string(), contributor("d", Some("c2"), None, None));
        // Cohort c1 all say x, cohort c2 all say y.
        let observations = vec![
            obs("a", "x", 1),
            obs("b", "x", 2),
            obs("c", "y", 3),
            obs("d", "y", 4),
        ];
        let report = analyze(&observations, &contributors, &HashMap::new());
        assert!((report.demographic_correlation - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unanimity_means_no_correlation() {
        let mut contributors = HashMap::new();
        contributors.insert("a".to_string(), contributor("a", Some("c1"), None, None));
        contributors.insert("b".to_string(), contributor("b", Some("c2"), None, None));
        let observations = vec![obs("a", "x", 1), obs("b", "x", 2)];
        let report = analyze(&observations, &contributors, &HashMap::new());
        // Everyone agrees: grouping cannot explain anything.
        assert!(report.demographic_correlation.abs() < f64::EPSILON);
    }

    #[test]
    fn test_temporal_drift_detects_flip() {
        let observations = vec![
            obs("a", "x", 1),
            obs("b", "x", 2),
            obs("c", "y", 3),
            obs("d", "y", 4),
        ];
        let report = analyze(&observations, &HashMap::new(), &HashMap::new());
        assert!((report.temporal_drift - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_temporal_stability_is_zero_drift() {
        let observations = vec![
            obs("a", "x", 1),
            obs("b", "y", 2),
            obs("c", "x", 3),
            obs("d", "y", 4),
        ];
        let report = analyze(&observations, &HashMap::new(), &HashMap::new());
        assert!(report.temporal_drift.abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_region_concentrates_fully() {
        let mut contributors = HashMap::new();
        contributors.insert("a".to_string(), contributor("a", None, None, Some("eu")));
        contributors.insert("b".to_string(), contributor("b", None, None, Some("eu")));
        let observations = vec![obs("a", "x", 1), obs("b", "x", 2)];
        let report = analyze(&observations, &contributors, &HashMap::new());
        assert!((report.geographic_concentration - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_even_regions_score_zero_concentration() {
        let mut contributors = HashMap::new();
        contributors.insert("a".to_string(), contributor("a", None, None, Some("eu")));
        contributors.insert("b".to_string(), contributor("b", None, None, Some("us")));
        let observations = vec![obs("a", "x", 1), obs("b", "x", 2)];
        let report = analyze(&observations, &contributors, &HashMap::new());
        assert!(report.geographic_concentration.abs() < f64::EPSILON);
    }

    #[test]
    fn test_confirmation_bias_from_history() {
        let mut history = HashMap::new();
        history.insert(
            "a".to_string(),
            vec!["x".to_string(), "x".to_string(), "x".to_string(), "y".to_string()],
        );
        let observations = vec![obs("a", "x", 1)];
        let report = analyze(&observations, &HashMap::new(), &history);
        assert!((report.confirmation_bias - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_anchoring_bias_follows_early_dominant() {
        let observations = vec![
            obs("a", "x", 1),
            obs("b", "x", 2),
            obs("c", "y", 3),
            obs("d", "x", 4),
            obs("e", "x", 5),
        ];
        let report = analyze(&observations, &HashMap::new(), &HashMap::new());
        // Anchor is x; both later responses match.
        assert!((report.anchoring_bias - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(BiasSeverity::classify(0.2), BiasSeverity::Low);
        assert_eq!(BiasSeverity::classify(0.5), BiasSeverity::Medium);
        assert_eq!(BiasSeverity::classify(0.9), BiasSeverity::Medium);
        assert_eq!(BiasSeverity::classify(1.3), BiasSeverity::High);
    }

    #[test]
    fn test_report_serialization() {
        let report = analyze(&[], &HashMap::new(), &HashMap::new());
        let json = serde_json::to_string(&report).unwrap();
        let parsed: BiasReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.skipped_indicators.len(), 6);
        assert_eq!(parsed.severity, BiasSeverity::Low);
    }
}
