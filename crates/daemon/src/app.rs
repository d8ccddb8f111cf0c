//! Application wiring: a single explicit struct owning the resilience
//! engine, metrics collector, and skill evolution manager. No singletons;
//! the caller owns the `Arc` and drives `initialize`/`shutdown`
//! (grounded on `workers/src/manager.rs`'s `WorkerPoolManager`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use async_trait::async_trait;

use sentinel_metrics::MetricsCollector;
use sentinel_resilience::{CreativeSolver, ResilienceEngine, SolutionBackend};
use sentinel_skills::{LlmBackend, SkillEvolutionManager, SkillPerformanceTracker};

use crate::collaborators::{FilesystemRegistry, HttpLlmBackend, HttpMarketplace, JsonlPruningLog};
use crate::config::DaemonConfig;

/// Adapts a skills-crate `LlmBackend` collaborator to the resilience
/// crate's `SolutionBackend` trait so a single LLM endpoint can serve
/// both code-generation (C6) and skill evaluation (C12).
struct LlmBackendAdapter(Arc<dyn LlmBackend>);

#[async_trait]
impl SolutionBackend for LlmBackendAdapter {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        self.0.generate(prompt).await
    }
}

pub struct App {
    pub config: DaemonConfig,
    pub engine: Arc<ResilienceEngine>,
    pub metrics: Arc<MetricsCollector>,
    pub performance_tracker: Arc<SkillPerformanceTracker>,
    pub evolution: Arc<SkillEvolutionManager>,
}

impl App {
    pub fn new(
        config: DaemonConfig,
        marketplace_url: &str,
        llm_endpoint: Option<&str>,
    ) -> Self {
        let llm_backend = llm_endpoint.map(|e| Arc::new(HttpLlmBackend::new(e)) as Arc<dyn LlmBackend>);

        let engine_config = sentinel_resilience::ResilienceEngineConfig {
            retry: config.retry.clone(),
            ..Default::default()
        };
        let solver_backend = llm_backend
            .clone()
            .map(|b| Box::new(LlmBackendAdapter(b)) as Box<dyn SolutionBackend>);
        let engine = Arc::new(ResilienceEngine::new(engine_config, CreativeSolver::new(solver_backend)));

        let metrics = Arc::new(MetricsCollector::new());
        let performance_tracker = Arc::new(SkillPerformanceTracker::new());

        let marketplace = Arc::new(HttpMarketplace::new(marketplace_url));
        let registry = Arc::new(FilesystemRegistry::new(config.data_dir.join("skills")));
        let pruning_log = Arc::new(JsonlPruningLog::new(config.data_dir.clone()));

        let evolution = SkillEvolutionManager::new(
            config.evolution.clone(),
            marketplace,
            registry,
            llm_backend,
            pruning_log,
            performance_tracker.clone(),
            config.data_dir.clone(),
        );

        Self { config, engine, metrics, performance_tracker, evolution }
    }

    /// Starts the evolution manager's background loops and takes an
    /// initial system metrics sample. Idempotent only for a fresh `App`.
    pub async fn initialize(&self) -> Result<()> {
        info!("initializing sentinel daemon");
        self.evolution.start().await;
        self.metrics.collect_system_metrics().await;
        Ok(())
    }

    /// Stops the evolution manager's loops (bounded wait, per-loop 5s)
    /// and writes a final metrics snapshot to `data_dir/metrics`.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down sentinel daemon");
        self.evolution.stop().await;
        let path = self.timestamped_metrics_path();
        self.metrics.save_metrics(&path).await?;
        Ok(())
    }

    fn timestamped_metrics_path(&self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        self.config
            .metrics
            .data_dir
            .join(format!("metrics_{stamp}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_and_shutdown_round_trip() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let dir = tmp.path();
        let mut config = DaemonConfig::default();
        config.data_dir = dir.to_path_buf();
        config.metrics.data_dir = dir.join("metrics");
        config.evolution.exploration_enabled = false;
        config.evolution.optimization_enabled = false;
        config.evolution.pruning_enabled = false;

        let app = App::new(config, "http://localhost:0", None);
        app.initialize().await.unwrap();
        app.shutdown().await.unwrap();

        let entries = std::fs::read_dir(dir.join("metrics")).unwrap();
        assert!(entries.count() >= 1);
    }
}
