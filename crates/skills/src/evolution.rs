//! Skill Evolution Manager (C12): three concurrent background control
//! loops (exploration, optimization, pruning), event-driven triggers on
//! failure, and crash-safe metric persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::collaborators::{LlmBackend, Marketplace, PruningLog, Registry, SkillMetadata};
use crate::metrics::{SkillMetrics, SkillStatus};
use crate::performance_tracker::SkillPerformanceTracker;

const SUPPORTED_RUNTIME_VERSIONS: &[&str] = &["1.0", "1.1", "1.2"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    pub exploration_enabled: bool,
    pub exploration_interval_hours: u64,
    pub max_skills_per_exploration: usize,
    pub min_quality_score: f64,
    pub min_compatibility_score: f64,
    pub pruning_enabled: bool,
    pub pruning_interval_hours: u64,
    pub min_uses_before_prune: u64,
    pub max_unused_days: i64,
    pub min_success_rate: f64,
    pub min_overall_score: f64,
    pub optimization_enabled: bool,
    pub optimization_interval_hours: u64,
    pub top_performers_count: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            exploration_enabled: true,
            exploration_interval_hours: 24,
            max_skills_per_exploration: 10,
            min_quality_score: 0.6,
            min_compatibility_score: 0.7,
            pruning_enabled: true,
            pruning_interval_hours: 168,
            min_uses_before_prune: 5,
            max_unused_days: 30,
            min_success_rate: 0.5,
            min_overall_score: 0.4,
            optimization_enabled: true,
            optimization_interval_hours: 24,
            top_performers_count: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub skill_id: String,
    pub quality_score: f64,
    pub compatibility_score: f64,
    pub documentation_score: f64,
    pub code_quality_score: f64,
    pub overall_score: f64,
    pub recommendation: String,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub skill_id: String,
    pub evaluation: EvaluationResult,
    pub evaluation_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneCandidate {
    pub skill_id: String,
    pub reason: String,
    /// `true` once the registry unregister and pruning-log write both
    /// succeeded. Always `true` for a dry run (nothing was attempted).
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionSummary {
    pub status_counts: HashMap<String, usize>,
    pub total_skills: usize,
    pub total_evaluations: usize,
    pub last_exploration: Option<DateTime<Utc>>,
    pub last_optimization: Option<DateTime<Utc>>,
    pub last_pruning: Option<DateTime<Utc>>,
}

/// Evaluate a skill's metadata against compatibility/documentation
/// heuristics. Deterministic and network-free except for the optional
/// LLM-scored `quality` path.
pub async fn evaluate_skill(
    metadata: &SkillMetadata,
    min_compatibility_score: f64,
    llm_backend: Option<&dyn LlmBackend>,
) -> EvaluationResult {
    let mut notes = Vec::new();

    let has_readme = metadata.readme.as_deref().is_some_and(|s| !s.trim().is_empty());
    let has_examples = metadata.examples.as_deref().is_some_and(|s| !s.trim().is_empty());
    let documentation_score = 0.5 * has_readme as u8 as f64 + 0.5 * has_examples as u8 as f64;

    let compatibility_score = match &metadata.runtime_version {
        Some(version) if SUPPORTED_RUNTIME_VERSIONS.contains(&version.as_str()) => 1.0,
        Some(version) => {
            notes.push(format!("runtime version '{version}' not in the known-good set"));
            0.5
        }
        None => 0.8,
    };

    let quality_score = match llm_backend {
        Some(backend) => {
            let prompt = format!(
                "Rate the quality of the skill '{}' from 0.0 to 1.0. Respond with only the number.",
                metadata.name
            );
            match backend.generate(&prompt).await {
                Ok(text) => text.trim().parse::<f64>().unwrap_or_else(|_| {
                    notes.push("LLM quality score was unparseable, used default".to_string());
                    0.5
                }),
                Err(e) => {
                    notes.push(format!("LLM quality scoring failed: {e}"));
                    0.5
                }
            }
        }
        None => 0.5,
    };

    let code_quality_score = 0.7;

    let overall_score =
        0.3 * quality_score + 0.3 * compatibility_score + 0.2 * documentation_score + 0.2 * code_quality_score;

    let recommendation = if overall_score >= 0.7 && compatibility_score >= min_compatibility_score {
        "activate"
    } else if overall_score >= 0.5 {
        "monitor"
    } else {
        "reject"
    }
    .to_string();

    EvaluationResult {
        skill_id: metadata.id.clone(),
        quality_score,
        compatibility_score,
        documentation_score,
        code_quality_score,
        overall_score,
        recommendation,
        notes,
    }
}

pub struct SkillEvolutionManager {
    config: EvolutionConfig,
    marketplace: Arc<dyn Marketplace>,
    registry: Arc<dyn Registry>,
    llm_backend: Option<Arc<dyn LlmBackend>>,
    pruning_log: Arc<dyn PruningLog>,
    performance_tracker: Arc<SkillPerformanceTracker>,
    data_dir: PathBuf,
    evaluation_history: Arc<RwLock<Vec<EvaluationRecord>>>,
    last_optimization: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_pruning: Arc<RwLock<Option<DateTime<Utc>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl SkillEvolutionManager {
    pub fn new(
        config: EvolutionConfig,
        marketplace: Arc<dyn Marketplace>,
        registry: Arc<dyn Registry>,
        llm_backend: Option<Arc<dyn LlmBackend>>,
        pruning_log: Arc<dyn PruningLog>,
        performance_tracker: Arc<SkillPerformanceTracker>,
        data_dir: PathBuf,
    ) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Arc::new(Self {
            config,
            marketplace,
            registry,
            llm_backend,
            pruning_log,
            performance_tracker,
            data_dir,
            evaluation_history: Arc::new(RwLock::new(Vec::new())),
            last_optimization: Arc::new(RwLock::new(None)),
            last_pruning: Arc::new(RwLock::new(None)),
            handles: Mutex::new(Vec::new()),
            shutdown_tx,
            shutdown_rx,
        })
    }

    fn metrics_path(&self) -> PathBuf {
        self.data_dir.join("skill_evolution").join("skill_metrics.json")
    }

    /// Spawn the enabled background loops. Idempotent only in the sense
    /// that calling it twice spawns a second set of loops; callers should
    /// hold the returned `Arc` for the manager's whole lifetime.
    pub async fn start(self: &Arc<Self>) {
        self.load_metrics().await;
        let mut handles = self.handles.lock().await;

        if self.config.exploration_enabled {
            let me = self.clone();
            let rx = self.shutdown_rx.clone();
            handles.push(tokio::spawn(async move { me.exploration_loop(rx).await }));
        }
        if self.config.optimization_enabled {
            let me = self.clone();
            let rx = self.shutdown_rx.clone();
            handles.push(tokio::spawn(async move { me.optimization_loop(rx).await }));
        }
        if self.config.pruning_enabled {
            let me = self.clone();
            let rx = self.shutdown_rx.clone();
            handles.push(tokio::spawn(async move { me.pruning_loop(rx).await }));
        }
    }

    /// Cancel all three loops, wait (bounded at 5s per task) for
    /// termination, then persist metrics one final time.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut handles = self.handles.lock().await;
        for handle in handles.drain(..) {
            if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
                warn!("evolution loop did not shut down in time, abandoning");
            }
        }
        self.save_metrics().await;
    }

    async fn exploration_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.exploration_interval_hours * 3600);
        let error_backoff = interval.min(Duration::from_secs(3600));
        loop {
            if *shutdown.borrow() {
                break;
            }
            let sleep_for = match self.explore_new_skills().await {
                Ok(_) => interval,
                Err(e) => {
                    error!(error = %e, "exploration loop iteration failed, backing off");
                    error_backoff
                }
            };
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(sleep_for) => {}
            }
        }
        info!("exploration loop stopped");
    }

    async fn optimization_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.optimization_interval_hours * 3600);
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.optimize_skills().await;
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("optimization loop stopped");
    }

    async fn pruning_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let interval = Duration::from_secs(self.config.pruning_interval_hours * 3600);
        loop {
            if *shutdown.borrow() {
                break;
            }
            let _ = self.prune_skills(false).await;
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        info!("pruning loop stopped");
    }

    async fn explore_new_skills(&self) -> Result<Vec<EvaluationResult>, String> {
        let candidates = self
            .marketplace
            .search("", self.config.max_skills_per_exploration)
            .await?;

        let mut evaluations = Vec::new();
        for metadata in candidates {
            if self.performance_tracker.contains(&metadata.id).await {
                continue;
            }
            let evaluation = evaluate_skill(
                &metadata,
                self.config.min_compatibility_score,
                self.llm_backend.as_deref(),
            )
            .await;

            self.evaluation_history.write().await.push(EvaluationRecord {
                skill_id: metadata.id.clone(),
                evaluation: evaluation.clone(),
                evaluation_time: Utc::now(),
            });
            self.performance_tracker
                .upsert_discovered(&metadata.id, evaluation.quality_score)
                .await;

            if evaluation.recommendation == "activate" {
                self.performance_tracker
                    .set_status(&metadata.id, SkillStatus::Evaluating)
                    .await;
                if let Err(e) = self.registry.install(&metadata).await {
                    warn!(skill_id = %metadata.id, error = %e, "install request failed");
                }
            }
            evaluations.push(evaluation);
        }

        for gap in self.performance_tracker.get_skill_gaps(0.0).await {
            if let Ok(matches) = self.marketplace.search(&gap.missing_capability, 5).await {
                info!(capability = %gap.missing_capability, found = matches.len(), "searched marketplace for skill gap");
            }
        }

        self.save_metrics().await;
        Ok(evaluations)
    }

    /// Bypass the schedule for an immediate, failure-specific exploration.
    /// Evaluates candidates and records history like a normal pass but
    /// never requests an install; returns ranked candidates for the
    /// caller to act on.
    pub async fn trigger_exploration_for_failure(
        &self,
        task_description: &str,
        error: Option<&str>,
    ) -> Result<Vec<EvaluationResult>, String> {
        let query = error.unwrap_or(task_description);
        let candidates = self
            .marketplace
            .search(query, self.config.max_skills_per_exploration)
            .await?;

        let mut evaluations = Vec::new();
        for metadata in candidates {
            if self.performance_tracker.contains(&metadata.id).await {
                continue;
            }
            let evaluation = evaluate_skill(
                &metadata,
                self.config.min_compatibility_score,
                self.llm_backend.as_deref(),
            )
            .await;
            self.evaluation_history.write().await.push(EvaluationRecord {
                skill_id: metadata.id.clone(),
                evaluation: evaluation.clone(),
                evaluation_time: Utc::now(),
            });
            evaluations.push(evaluation);
        }
        evaluations.sort_by(|a, b| b.overall_score.partial_cmp(&a.overall_score).unwrap());
        Ok(evaluations)
    }

    async fn optimize_skills(&self) {
        let active: Vec<SkillMetrics> = self
            .performance_tracker
            .get_all_stats()
            .await
            .into_iter()
            .filter(|m| matches!(m.status, SkillStatus::Active) && m.total_uses >= self.config.min_uses_before_prune)
            .collect();

        let mut by_score = active;
        by_score.sort_by(|a, b| b.overall_score.partial_cmp(&a.overall_score).unwrap());
        let top = by_score.iter().take(self.config.top_performers_count);
        for skill in top {
            info!(skill_id = %skill.skill_id, score = skill.overall_score, "top performer");
        }

        let degrading = self.performance_tracker.get_degrading_skills().await;
        let improving = self.performance_tracker.get_improving_skills().await;
        info!(degrading = degrading.len(), improving = improving.len(), "optimization pass complete");

        // TODO: adjust exploration weights using degrading/improving signals.
        // TODO: experiment with combining complementary skills.

        *self.last_optimization.write().await = Some(Utc::now());
    }

    /// Evaluate and optionally remove underperforming skills. Dry-run
    /// returns the candidate list without mutating state.
    pub async fn prune_skills(&self, dry_run: bool) -> Vec<PruneCandidate> {
        let mut candidates = Vec::new();
        for metric in self.performance_tracker.get_all_stats().await {
            if metric.total_uses < self.config.min_uses_before_prune {
                continue;
            }
            let reason = if metric.overall_score < self.config.min_overall_score {
                Some(format!("Low overall score: {:.2}", metric.overall_score))
            } else if metric.success_rate < self.config.min_success_rate {
                Some(format!("Low success rate: {:.1}%", metric.success_rate * 100.0))
            } else if let Some(days) = metric.days_unused() {
                if days > self.config.max_unused_days {
                    Some(format!("Unused for {days} days"))
                } else {
                    None
                }
            } else {
                None
            };

            if let Some(reason) = reason {
                candidates.push(PruneCandidate {
                    skill_id: metric.skill_id.clone(),
                    reason,
                    removed: dry_run,
                });
            }
        }

        if !dry_run {
            for candidate in &mut candidates {
                self.performance_tracker
                    .set_status(&candidate.skill_id, SkillStatus::Pruned)
                    .await;
                let mut ok = true;
                if let Err(e) = self.registry.unregister(&candidate.skill_id).await {
                    warn!(skill_id = %candidate.skill_id, error = %e, "unregister failed during pruning");
                    ok = false;
                }
                if let Err(e) = self
                    .pruning_log
                    .record_pruning(&candidate.skill_id, Utc::now(), &candidate.reason)
                    .await
                {
                    warn!(skill_id = %candidate.skill_id, error = %e, "failed to record pruning");
                    ok = false;
                }
                candidate.removed = ok;
            }
            *self.last_pruning.write().await = Some(Utc::now());
            self.save_metrics().await;
        }

        candidates
    }

    /// After updating a skill's execution stats, apply the evolution
    /// status-transition rule: active once `overall_score >= 0.7`,
    /// underperforming if it drops below `min_overall_score`. Left
    /// unchanged in between.
    pub async fn record_skill_usage(&self, skill_id: &str, success: bool, execution_time: f64) {
        self.performance_tracker.record_execution(skill_id, success, execution_time, None).await;
        if let Some(metric) = self.performance_tracker.get_skill_stats(skill_id).await {
            if metric.total_uses >= self.config.min_uses_before_prune {
                if metric.overall_score >= 0.7 {
                    self.performance_tracker.set_status(skill_id, SkillStatus::Active).await;
                } else if metric.overall_score < self.config.min_overall_score {
                    self.performance_tracker
                        .set_status(skill_id, SkillStatus::Underperforming)
                        .await;
                }
            }
        }
    }

    pub async fn get_skill_metrics(&self, skill_id: &str) -> Option<SkillMetrics> {
        self.performance_tracker.get_skill_stats(skill_id).await
    }

    /// Top skills by `overall_score`, restricted to `status == active`
    /// (distinct from `SkillPerformanceTracker::get_top_performers`,
    /// which is not status-filtered).
    pub async fn get_top_skills(&self, limit: usize) -> Vec<SkillMetrics> {
        let mut active: Vec<SkillMetrics> = self
            .performance_tracker
            .get_all_stats()
            .await
            .into_iter()
            .filter(|m| matches!(m.status, SkillStatus::Active))
            .collect();
        active.sort_by(|a, b| b.overall_score.partial_cmp(&a.overall_score).unwrap());
        active.truncate(limit);
        active
    }

    pub async fn get_evolution_summary(&self) -> EvolutionSummary {
        let all = self.performance_tracker.get_all_stats().await;
        let mut status_counts = HashMap::new();
        for metric in &all {
            *status_counts.entry(metric.status.as_str().to_string()).or_insert(0) += 1;
        }
        let history = self.evaluation_history.read().await;
        EvolutionSummary {
            status_counts,
            total_skills: all.len(),
            total_evaluations: history.len(),
            last_exploration: history.last().map(|r| r.evaluation_time),
            last_optimization: *self.last_optimization.read().await,
            last_pruning: *self.last_pruning.read().await,
        }
    }

    /// Write the canonical flat `skill_id -> SkillMetrics` JSON object to
    /// `skill_evolution/skill_metrics.json`.
    async fn save_metrics(&self) {
        let all = self.performance_tracker.get_all_stats().await;
        let map: HashMap<String, SkillMetrics> =
            all.into_iter().map(|m| (m.skill_id.clone(), m)).collect();
        let path = self.metrics_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(error = %e, "failed to create skill_evolution data dir");
                return;
            }
        }
        match serde_json::to_string_pretty(&map) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&path, json).await {
                    error!(error = %e, "failed to persist skill metrics");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize skill metrics"),
        }
    }

    async fn load_metrics(&self) {
        let path = self.metrics_path();
        let Ok(contents) = tokio::fs::read_to_string(&path).await else {
            return;
        };
        match serde_json::from_str::<HashMap<String, SkillMetrics>>(&contents) {
            Ok(map) => {
                self.performance_tracker.load_all(map.into_values().collect()).await;
            }
            Err(e) => error!(error = %e, "failed to parse persisted skill metrics"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeMarketplace {
        metadata: Vec<SkillMetadata>,
    }

    #[async_trait]
    impl Marketplace for FakeMarketplace {
        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<SkillMetadata>, String> {
            Ok(self.metadata.iter().take(limit).cloned().collect())
        }
    }

    struct FakeRegistry {
        installs: AtomicUsize,
        unregisters: AtomicUsize,
    }

    impl FakeRegistry {
        fn new() -> Self {
            Self {
                installs: AtomicUsize::new(0),
                unregisters: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Registry for FakeRegistry {
        async fn get_skill(&self, _id: &str) -> Result<Option<SkillMetadata>, String> {
            Ok(None)
        }
        async fn install(&self, _metadata: &SkillMetadata) -> Result<(), String> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn unregister(&self, _id: &str) -> Result<(), String> {
            self.unregisters.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn skills_dir(&self) -> &str {
            "skills"
        }
    }

    struct FakePruningLog {
        records: Mutex<Vec<(String, String)>>,
    }

    impl FakePruningLog {
        fn new() -> Self {
            Self { records: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl PruningLog for FakePruningLog {
        async fn record_pruning(&self, skill_id: &str, _timestamp: DateTime<Utc>, reason: &str) -> Result<(), String> {
            self.records.lock().await.push((skill_id.to_string(), reason.to_string()));
            Ok(())
        }
    }

    fn sample_metadata(id: &str) -> SkillMetadata {
        SkillMetadata {
            id: id.to_string(),
            name: id.to_string(),
            description: Some("a skill".to_string()),
            readme: Some("readme contents".to_string()),
            examples: Some("example usage".to_string()),
            runtime_version: Some("1.1".to_string()),
            installs: Some(10),
            top_source: None,
        }
    }

    fn manager(
        marketplace_metadata: Vec<SkillMetadata>,
        data_dir: PathBuf,
    ) -> (Arc<SkillEvolutionManager>, Arc<FakeRegistry>, Arc<FakePruningLog>) {
        let marketplace = Arc::new(FakeMarketplace { metadata: marketplace_metadata });
        let registry = Arc::new(FakeRegistry::new());
        let pruning_log = Arc::new(FakePruningLog::new());
        let tracker = Arc::new(SkillPerformanceTracker::new());
        let manager = SkillEvolutionManager::new(
            EvolutionConfig::default(),
            marketplace,
            registry.clone(),
            None,
            pruning_log.clone(),
            tracker,
            data_dir,
        );
        (manager, registry, pruning_log)
    }

    #[tokio::test]
    async fn evaluate_skill_recommends_activate_for_well_documented_skill() {
        let metadata = sample_metadata("s1");
        let evaluation = evaluate_skill(&metadata, 0.7, None).await;
        assert_eq!(evaluation.recommendation, "activate");
        assert_eq!(evaluation.documentation_score, 1.0);
        assert_eq!(evaluation.compatibility_score, 1.0);
    }

    #[tokio::test]
    async fn evaluate_skill_rejects_undocumented_unknown_runtime() {
        let metadata = SkillMetadata {
            readme: None,
            examples: None,
            runtime_version: Some("0.1".to_string()),
            ..sample_metadata("s2")
        };
        let evaluation = evaluate_skill(&metadata, 0.7, None).await;
        assert_eq!(evaluation.documentation_score, 0.0);
        assert_eq!(evaluation.compatibility_score, 0.5);
        assert_eq!(evaluation.recommendation, "reject");
    }

    #[tokio::test]
    async fn exploration_evaluates_and_installs_new_skills() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, registry, _log) = manager(vec![sample_metadata("s1")], tmp.path().to_path_buf());
        manager.explore_new_skills().await.unwrap();
        assert_eq!(registry.installs.load(Ordering::SeqCst), 1);
        let stats = manager.get_skill_metrics("s1").await.unwrap();
        assert!(matches!(stats.status, SkillStatus::Evaluating));
    }

    #[tokio::test]
    async fn trigger_exploration_for_failure_never_installs() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, registry, _log) = manager(vec![sample_metadata("s1")], tmp.path().to_path_buf());
        let results = manager.trigger_exploration_for_failure("parse a pdf", None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(registry.installs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn record_skill_usage_transitions_to_active() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, _registry, _log) = manager(vec![], tmp.path().to_path_buf());
        for _ in 0..10 {
            manager.record_skill_usage("s1", true, 0.5).await;
        }
        let stats = manager.get_skill_metrics("s1").await.unwrap();
        assert!(matches!(stats.status, SkillStatus::Active));
    }

    #[tokio::test]
    async fn record_skill_usage_transitions_to_underperforming() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, _registry, _log) = manager(vec![], tmp.path().to_path_buf());
        for _ in 0..10 {
            manager.record_skill_usage("s1", false, 4.5).await;
        }
        let stats = manager.get_skill_metrics("s1").await.unwrap();
        assert!(matches!(stats.status, SkillStatus::Underperforming));
    }

    #[tokio::test]
    async fn prune_skills_flags_low_success_rate() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, registry, log) = manager(vec![], tmp.path().to_path_buf());
        for i in 0..10 {
            manager.record_skill_usage("s", i < 2, 1.0).await;
        }
        let candidates = manager.prune_skills(false).await;
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].reason.contains("success rate") || candidates[0].reason.contains("score"));
        let stats = manager.get_skill_metrics("s").await.unwrap();
        assert!(matches!(stats.status, SkillStatus::Pruned));
        assert_eq!(registry.unregisters.load(Ordering::SeqCst), 1);
        assert_eq!(log.records.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn prune_skills_dry_run_does_not_mutate() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, registry, _log) = manager(vec![], tmp.path().to_path_buf());
        for i in 0..10 {
            manager.record_skill_usage("s", i < 2, 1.0).await;
        }
        let candidates = manager.prune_skills(true).await;
        assert_eq!(candidates.len(), 1);
        let stats = manager.get_skill_metrics("s").await.unwrap();
        assert!(!matches!(stats.status, SkillStatus::Pruned));
        assert_eq!(registry.unregisters.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn start_then_stop_terminates_within_bound_and_persists() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let dir = tmp.path();
        let (manager, _registry, _log) = manager(vec![], dir.to_path_buf());
        manager.record_skill_usage("s1", true, 1.0).await;

        manager.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        manager.stop().await;

        let path = dir.join("skill_evolution").join("skill_metrics.json");
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("\"s1\""));
    }

    #[tokio::test]
    async fn evolution_summary_counts_by_status() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let (manager, _registry, _log) = manager(vec![], tmp.path().to_path_buf());
        for _ in 0..10 {
            manager.record_skill_usage("s1", true, 0.5).await;
        }
        let summary = manager.get_evolution_summary().await;
        assert_eq!(summary.total_skills, 1);
        assert_eq!(summary.status_counts.get("active"), Some(&1));
    }
}
