//! The unified engine facade.
//!
//! Orchestrates the authority scorer, handler registry, aggregation
//! engine, bias analyzer, and devil's-advocate assigner behind one API.
//! Every operation is triggered externally and runs to completion
//! synchronously; the engine has no background scheduler.
//!
//! ## Concurrency model
//!
//! - Authority updates for different contributors run in parallel;
//!   updates for one contributor serialize inside the scorer.
//! - Aggregation takes an exclusive per-task lock, so two concurrent
//!   calls for the same task cannot interleave partial reads; the
//!   second call blocks briefly and then recomputes idempotently.
//! - Configuration is versioned. Each operation clones one `Arc` of
//!   the active configuration at entry and uses it throughout, so hot
//!   reloads never mix versions inside a computation.
//! - All aggregation weights come from a single authority snapshot
//!   captured before the run.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use collegium_aggregation::{AggregationEngine, AggregationResult};
use collegium_authority::{
    AuthorityScorer, Contributor, ContributorStore, Credential, NewContributor, QualitySignals,
};
use collegium_review::{
    AdvocateAssigner, AdvocateEntry, BiasAnalyzer, BiasObservation, BiasReport, BiasScope,
    DevilsAdvocateAssignment, EffectivenessReport,
};
use collegium_tasks::{
    FeedbackRecord, FeedbackSubmission, HandlerRegistry, Task, TaskState, TaskType,
};

use crate::config::{EngineConfig, VersionedConfig};
use crate::error::EngineError;
use crate::Result;

/// Milliseconds since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A stored aggregation run: the deterministic result payload plus the
/// run metadata that supersedes, never mutates, prior runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationRecord {
    /// The deterministic result payload.
    pub result: AggregationResult,
    /// When the run completed, epoch milliseconds.
    pub computed_at_ms: u64,
    /// Configuration version the run used.
    pub config_version: u64,
}

/// The Collegium engine facade.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::temporary(EngineConfig::default())?;
/// engine.register_contributor(NewContributor::new("alice", vec![]))?;
/// let task = engine.create_task(TaskType::OptionSelection, input, None)?;
/// engine.open_evaluation(&task.id)?;
/// engine.submit_feedback(submission)?;
/// let record = engine.aggregate_task(&task.id)?;
/// ```
pub struct Engine {
    /// Versioned active configuration.
    config: RwLock<VersionedConfig>,
    /// Task handler registry, resolved once per task.
    registry: HandlerRegistry,
    /// Authority scorer over the contributor store.
    scorer: AuthorityScorer,
    /// Bias analyzer.
    bias: BiasAnalyzer,
    /// Tasks by id.
    tasks: RwLock<HashMap<String, Task>>,
    /// Feedback by task id, then contributor id. BTreeMap keeps
    /// iteration deterministic for idempotent recomputes.
    feedback: RwLock<HashMap<String, BTreeMap<String, FeedbackRecord>>>,
    /// Latest aggregation record per task.
    results: RwLock<HashMap<String, AggregationRecord>>,
    /// Devil's-advocate assignments per task.
    assignments: RwLock<HashMap<String, Vec<DevilsAdvocateAssignment>>>,
    /// Cached effectiveness reports per task; computed once.
    effectiveness: RwLock<HashMap<String, EffectivenessReport>>,
    /// Per-task aggregation locks.
    task_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Engine {
    /// Creates an engine over the given contributor store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigRejected`] if the initial
    /// configuration violates a guardrail.
    pub fn new(config: EngineConfig, store: ContributorStore) -> Result<Self> {
        config.validate()?;
        info!(
            tau = config.aggregation.disagreement_threshold,
            decay = config.authority.decay,
            "engine initialized"
        );
        Ok(Self {
            config: RwLock::new(VersionedConfig::initial(config)),
            registry: HandlerRegistry::with_builtin_handlers(),
            scorer: AuthorityScorer::new(store),
            bias: BiasAnalyzer::new(),
            tasks: RwLock::new(HashMap::new()),
            feedback: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            assignments: RwLock::new(HashMap::new()),
            effectiveness: RwLock::new(HashMap::new()),
            task_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Creates an engine over a temporary in-memory store.
    pub fn temporary(config: EngineConfig) -> Result<Self> {
        Ok(Self::new(config, ContributorStore::temporary()?)?)
    }

    // -- Configuration --------------------------------------------------------

    /// Applies a new configuration atomically.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ConfigRejected`] on guardrail violation;
    /// the previous configuration remains active.
    pub fn apply_config(&self, config: EngineConfig) -> Result<u64> {
        config.validate()?;
        let mut active = self.config.write().unwrap_or_else(|e| e.into_inner());
        *active = active.successor(config);
        info!(version = active.version, "configuration applied");
        Ok(active.version)
    }

    /// The active configuration version.
    pub fn config_version(&self) -> u64 {
        self.config.read().unwrap_or_else(|e| e.into_inner()).version
    }

    /// Clones the active configuration snapshot.
    fn config_snapshot(&self) -> (u64, Arc<EngineConfig>) {
        let active = self.config.read().unwrap_or_else(|e| e.into_inner());
        (active.version, Arc::clone(&active.config))
    }

    // -- Contributors ---------------------------------------------------------

    /// Registers a contributor and computes their initial scores.
    pub fn register_contributor(&self, registration: NewContributor) -> Result<Contributor> {
        let (_, config) = self.config_snapshot();
        Ok(self
            .scorer
            .register(registration, &config.authority, now_ms())?)
    }

    /// Attaches a credential and recomputes the contributor's scores.
    pub fn add_credential(&self, contributor_id: &str, credential: Credential) -> Result<f64> {
        let (_, config) = self.config_snapshot();
        Ok(self
            .scorer
            .add_credential(contributor_id, credential, &config.authority, now_ms())?)
    }

    /// Looks up a contributor profile.
    pub fn contributor(&self, contributor_id: &str) -> Result<Contributor> {
        Ok(self.scorer.store().get_required(contributor_id)?)
    }

    /// Contributors ordered by authority, for leaderboard display.
    pub fn leaderboard(&self) -> Result<Vec<(String, f64)>> {
        Ok(self.scorer.leaderboard()?)
    }

    // -- Task lifecycle -------------------------------------------------------

    /// Creates a task, rejecting unknown task types eagerly.
    pub fn create_task(
        &self,
        task_type: TaskType,
        input_data: Value,
        ground_truth: Option<Value>,
    ) -> Result<Task> {
        // Fail fast: resolve the handler before anything is stored.
        self.registry.resolve(&task_type)?;

        let mut task = Task::new(task_type, input_data, now_ms());
        if let Some(truth) = ground_truth {
            task = task.with_ground_truth(truth);
        }
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(task.id.clone(), task.clone());
        debug!(task_id = %task.id, task_type = %task.task_type, "task created");
        Ok(task)
    }

    /// Opens the evaluation window for a task.
    pub fn open_evaluation(&self, task_id: &str) -> Result<()> {
        self.transition_task(task_id, TaskState::Evaluating)
    }

    /// Closes a task. Results and assignments are frozen afterwards.
    pub fn close_task(&self, task_id: &str) -> Result<()> {
        self.transition_task(task_id, TaskState::Closed)
    }

    /// Looks up a task by id.
    pub fn task(&self, task_id: &str) -> Result<Task> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))
    }

    fn transition_task(&self, task_id: &str, to: TaskState) -> Result<()> {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| EngineError::UnknownTask(task_id.to_string()))?;
        task.transition(to)?;
        Ok(())
    }

    // -- Feedback -------------------------------------------------------------

    /// Accepts one feedback submission.
    ///
    /// Resubmission by the same contributor during the evaluation
    /// window overwrites the earlier record. As a side effect the
    /// submitter's authority is refreshed from the submission's
    /// self-reported quality; the full quality signals arrive later,
    /// at aggregation time.
    ///
    /// # Errors
    ///
    /// [`EngineError::Validation`] for malformed submissions; other
    /// submissions are unaffected.
    pub fn submit_feedback(&self, submission: FeedbackSubmission) -> Result<()> {
        let task = self.task(&submission.task_id)?;
        if task.state != TaskState::Evaluating {
            return Err(EngineError::Validation(format!(
                "task {} is not accepting feedback (state: {})",
                task.id, task.state
            )));
        }
        if !self.scorer.store().contains(&submission.contributor_id)? {
            return Err(EngineError::Validation(format!(
                "contributor {} is not registered",
                submission.contributor_id
            )));
        }
        for (name, score) in [
            ("accuracy", submission.accuracy),
            ("utility", submission.utility),
            ("transparency", submission.transparency),
        ] {
            if !(0.0..=1.0).contains(&score) {
                return Err(EngineError::Validation(format!(
                    "{} score {} is outside [0, 1]",
                    name, score
                )));
            }
        }

        let record = FeedbackRecord::from_submission(submission, now_ms());

        // Schema check: the handler must be able to extract a position.
        let handler = self.registry.resolve(&task.task_type)?;
        if let Err(err) = handler.extract_position(&record) {
            return Err(EngineError::Validation(err.to_string()));
        }

        let contributor_id = record.contributor_id.clone();
        let recent = record.quality_mean();
        {
            let mut feedback = self.feedback.write().unwrap_or_else(|e| e.into_inner());
            feedback
                .entry(task.id.clone())
                .or_default()
                .insert(contributor_id.clone(), record);
        }

        // Authority side effect; aggregation does not wait for it.
        let (_, config) = self.config_snapshot();
        self.scorer.update_authority(
            &contributor_id,
            recent,
            &QualitySignals::empty(),
            &config.authority,
            now_ms(),
        )?;
        Ok(())
    }

    /// Attaches a peer-assigned helpfulness rating to a feedback
    /// record and refreshes the contributor's authority with it.
    pub fn rate_helpfulness(
        &self,
        task_id: &str,
        contributor_id: &str,
        rating: f64,
    ) -> Result<()> {
        if !(0.0..=1.0).contains(&rating) {
            return Err(EngineError::Validation(format!(
                "helpfulness rating {} is outside [0, 1]",
                rating
            )));
        }
        let recent;
        {
            let mut feedback = self.feedback.write().unwrap_or_else(|e| e.into_inner());
            let record = feedback
                .get_mut(task_id)
                .and_then(|records| records.get_mut(contributor_id))
                .ok_or_else(|| {
                    EngineError::Validation(format!(
                        "no feedback from {} on task {}",
                        contributor_id, task_id
                    ))
                })?;
            record.helpfulness = Some(rating);
            recent = record.quality_mean();
        }

        let (_, config) = self.config_snapshot();
        let signals = QualitySignals {
            peer_helpfulness: Some(rating),
            ..QualitySignals::empty()
        };
        self.scorer.update_authority(
            contributor_id,
            recent,
            &signals,
            &config.authority,
            now_ms(),
        )?;
        Ok(())
    }

    /// Feedback records for a task, in contributor order.
    pub fn task_feedback(&self, task_id: &str) -> Vec<FeedbackRecord> {
        let feedback = self.feedback.read().unwrap_or_else(|e| e.into_inner());
        feedback
            .get(task_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    // -- Aggregation ----------------------------------------------------------

    /// Aggregates a task's feedback into a structured result.
    ///
    /// Idempotent for an unchanged feedback set, authority snapshot,
    /// and configuration. A successful run supersedes the previous
    /// record; a failed run (e.g., quorum) persists nothing.
    pub fn aggregate_task(&self, task_id: &str) -> Result<AggregationRecord> {
        let lock = self.task_lock(task_id);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let task = self.task(task_id)?;
        if task.state != TaskState::Evaluating && task.state != TaskState::Aggregated {
            return Err(EngineError::Task(
                collegium_tasks::TaskError::InvalidTransition {
                    from: task.state.to_string(),
                    to: TaskState::Aggregated.to_string(),
                },
            ));
        }

        let (config_version, config) = self.config_snapshot();
        let handler = self.registry.resolve(&task.task_type)?;
        let records = self.task_feedback(task_id);
        let snapshot = self.scorer.snapshot(now_ms())?;

        let engine = AggregationEngine::new(config.aggregation.clone());
        let result = engine.aggregate(&task, &records, handler, &snapshot)?;

        let record = AggregationRecord {
            result,
            computed_at_ms: now_ms(),
            config_version,
        };
        {
            let mut results = self.results.write().unwrap_or_else(|e| e.into_inner());
            results.insert(task_id.to_string(), record.clone());
        }
        self.transition_task(task_id, TaskState::Aggregated)?;

        // Feed the run back into the track records: consistency with
        // the aggregate, correctness against ground truth when held,
        // and any peer rating already attached.
        let view = record.result.aggregate_view();
        for feedback in &records {
            let signals = QualitySignals {
                peer_helpfulness: feedback.helpfulness,
                ground_truth_accuracy: task
                    .ground_truth
                    .as_ref()
                    .map(|truth| handler.score_correctness(feedback, truth)),
                cross_task_consistency: Some(handler.score_consistency(feedback, &view)),
                community_helpfulness: None,
            };
            if let Err(err) = self.scorer.update_authority(
                &feedback.contributor_id,
                feedback.quality_mean(),
                &signals,
                &config.authority,
                now_ms(),
            ) {
                warn!(
                    contributor = %feedback.contributor_id,
                    error = %err,
                    "post-aggregation authority update failed"
                );
            }
        }

        Ok(record)
    }

    /// The most recent aggregation record for a task, if any.
    pub fn latest_result(&self, task_id: &str) -> Option<AggregationRecord> {
        let results = self.results.read().unwrap_or_else(|e| e.into_inner());
        results.get(task_id).cloned()
    }

    fn task_lock(&self, task_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.task_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // -- Devil's advocates ----------------------------------------------------

    /// Designates devil's advocates for an open task.
    ///
    /// Runs once per task: repeated calls return the stored
    /// assignments. The seed makes assignment reproducible.
    pub fn assign_advocates(
        &self,
        task_id: &str,
        seed: u64,
    ) -> Result<Vec<DevilsAdvocateAssignment>> {
        let task = self.task(task_id)?;
        if task.state != TaskState::Open {
            return Err(EngineError::Validation(format!(
                "advocates are assigned before evaluation begins (task state: {})",
                task.state
            )));
        }

        {
            let assignments = self.assignments.read().unwrap_or_else(|e| e.into_inner());
            if let Some(existing) = assignments.get(task_id) {
                return Ok(existing.clone());
            }
        }

        let (_, config) = self.config_snapshot();
        let snapshot = self.scorer.snapshot(now_ms())?;
        let pool: Vec<(String, f64)> = snapshot
            .iter()
            .map(|(id, authority)| (id.clone(), *authority))
            .collect();

        let assigner = AdvocateAssigner::new(config.advocate);
        let mut rng = StdRng::seed_from_u64(seed);
        let assigned = assigner.assign(task_id, &pool, &mut rng, now_ms());

        let mut assignments = self.assignments.write().unwrap_or_else(|e| e.into_inner());
        assignments.insert(task_id.to_string(), assigned.clone());
        Ok(assigned)
    }

    /// The stored assignments for a task.
    pub fn advocate_assignments(&self, task_id: &str) -> Vec<DevilsAdvocateAssignment> {
        let assignments = self.assignments.read().unwrap_or_else(|e| e.into_inner());
        assignments.get(task_id).cloned().unwrap_or_default()
    }

    /// Measures advocate effectiveness for an aggregated or closed
    /// task. Computed once and cached; later calls return the stored
    /// report unchanged.
    pub fn advocate_effectiveness(&self, task_id: &str) -> Result<EffectivenessReport> {
        {
            let cache = self.effectiveness.read().unwrap_or_else(|e| e.into_inner());
            if let Some(report) = cache.get(task_id) {
                return Ok(report.clone());
            }
        }

        let task = self.task(task_id)?;
        if task.state != TaskState::Aggregated && task.state != TaskState::Closed {
            return Err(EngineError::Validation(format!(
                "effectiveness is measured after aggregation (task state: {})",
                task.state
            )));
        }

        let (_, config) = self.config_snapshot();
        let handler = self.registry.resolve(&task.task_type)?;
        let entries: Vec<AdvocateEntry> = self
            .task_feedback(task_id)
            .iter()
            .filter_map(|record| {
                handler.extract_position(record).ok().map(|position| AdvocateEntry {
                    contributor_id: record.contributor_id.clone(),
                    position_key: position.key().to_string(),
                    rationale: record.rationale.clone(),
                })
            })
            .collect();

        let assignments = self.advocate_assignments(task_id);
        let assigner = AdvocateAssigner::new(config.advocate);
        let report = assigner.measure_effectiveness(&assignments, &entries, now_ms());

        let mut cache = self.effectiveness.write().unwrap_or_else(|e| e.into_inner());
        Ok(cache.entry(task_id.to_string()).or_insert(report).clone())
    }

    // -- Bias analysis --------------------------------------------------------

    /// Bias report over one task's feedback set.
    pub fn analyze_task_bias(&self, task_id: &str) -> Result<BiasReport> {
        let task = self.task(task_id)?;
        let handler = self.registry.resolve(&task.task_type)?;
        let observations: Vec<BiasObservation> = self
            .task_feedback(task_id)
            .iter()
            .filter_map(|record| {
                handler.extract_position(record).ok().map(|position| BiasObservation {
                    contributor_id: record.contributor_id.clone(),
                    position_key: position.key().to_string(),
                    submitted_at_ms: record.submitted_at_ms,
                })
            })
            .collect();

        self.run_bias_analysis(BiasScope::Task(task_id.to_string()), observations)
    }

    /// Bias report over every observation inside a time window.
    pub fn analyze_window_bias(&self, from_ms: u64, to_ms: u64) -> Result<BiasReport> {
        let observations: Vec<BiasObservation> = self
            .all_observations()?
            .into_iter()
            .filter(|o| o.submitted_at_ms >= from_ms && o.submitted_at_ms < to_ms)
            .collect();
        self.run_bias_analysis(BiasScope::Window { from_ms, to_ms }, observations)
    }

    fn run_bias_analysis(
        &self,
        scope: BiasScope,
        observations: Vec<BiasObservation>,
    ) -> Result<BiasReport> {
        let contributors: HashMap<String, Contributor> = self
            .scorer
            .store()
            .list()?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();

        let mut history: HashMap<String, Vec<String>> = HashMap::new();
        for observation in self.all_observations()? {
            history
                .entry(observation.contributor_id)
                .or_default()
                .push(observation.position_key);
        }

        Ok(self
            .bias
            .analyze(scope, &observations, &contributors, &history, now_ms()))
    }

    /// Every extractable (contributor, position, time) triple across
    /// all tasks, ordered by submission time.
    fn all_observations(&self) -> Result<Vec<BiasObservation>> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        let mut observations = Vec::new();
        for task in tasks.values() {
            let handler = match self.registry.resolve(&task.task_type) {
                Ok(handler) => handler,
                Err(_) => continue,
            };
            for record in self.task_feedback(&task.id) {
                if let Ok(position) = handler.extract_position(&record) {
                    observations.push(BiasObservation {
                        contributor_id: record.contributor_id.clone(),
                        position_key: position.key().to_string(),
                        submitted_at_ms: record.submitted_at_ms,
                    });
                }
            }
        }
        observations.sort_by(|a, b| {
            a.submitted_at_ms
                .cmp(&b.submitted_at_ms)
                .then_with(|| a.contributor_id.cmp(&b.contributor_id))
        });
        Ok(observations)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("Engine")
            .field("config_version", &self.config_version())
            .field("task_count", &tasks.len())
            .finish()
    }
}
