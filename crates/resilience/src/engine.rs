//! Resilience Engine (C8): orchestrates C1–C7 behind `execute` and
//! `execute_with_alternatives`.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::alternatives::{rank_strategies, RankingGoal, Strategy, StrategyHistory};
use crate::cancellation::CancellationToken;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::creative_solver::{CreativeSolver, SolverContext};
use crate::error_kind::{classify, ErrorKind};
use crate::failure_analyzer::{FailureAnalyzer, Pattern};
use crate::progress_tracker::ProgressTracker;
use crate::retry::{retry, RetryConfig};

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteResult<T> {
    pub success: bool,
    pub value: Option<T>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub attempts: u32,
    pub strategies_tried: Vec<String>,
    pub total_time_ms: u64,
    pub recommendations: Vec<String>,
}

pub struct ResilienceEngineConfig {
    pub retry: RetryConfig,
    pub enable_creative_solving: bool,
    pub max_total_time: Option<Duration>,
    pub max_parallel_strategies: usize,
}

impl Default for ResilienceEngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            enable_creative_solving: true,
            max_total_time: None,
            max_parallel_strategies: 3,
        }
    }
}

/// The explicit application-owned orchestrator; no process-wide
/// singleton. Construct one per host application and pass it by
/// reference.
pub struct ResilienceEngine {
    config: ResilienceEngineConfig,
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
    progress: ProgressTracker,
    analyzer: FailureAnalyzer,
    history: StrategyHistory,
    solver: CreativeSolver,
}

impl ResilienceEngine {
    pub fn new(config: ResilienceEngineConfig, solver: CreativeSolver) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
            progress: ProgressTracker::new(),
            analyzer: FailureAnalyzer::new(Default::default()),
            history: StrategyHistory::new(),
            solver,
        }
    }

    async fn breaker_for(&self, operation_name: &str) -> CircuitBreaker {
        if let Some(existing) = self.breakers.read().await.get(operation_name) {
            return existing.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(operation_name.to_string())
            .or_insert_with(|| CircuitBreaker::new(CircuitBreakerConfig::new(operation_name)))
            .clone()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn failure_analyzer(&self) -> &FailureAnalyzer {
        &self.analyzer
    }

    /// Single-strategy execution with classified retry, circuit gating
    /// and optional creative fallback on terminal failure.
    pub async fn execute<F, Fut>(
        &self,
        operation_name: &str,
        op: F,
    ) -> ExecuteResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        self.execute_cancellable(operation_name, op, None).await
    }

    /// Like [`Self::execute`], but aborts an in-progress retry sleep as soon
    /// as `cancellation` fires instead of waiting out the backoff delay.
    pub async fn execute_cancellable<F, Fut>(
        &self,
        operation_name: &str,
        mut op: F,
        cancellation: Option<&CancellationToken>,
    ) -> ExecuteResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        let started = Instant::now();
        let breaker = self.breaker_for(operation_name).await;

        if !breaker.allow_request().await {
            return ExecuteResult {
                success: false,
                value: None,
                error: Some(format!("circuit '{operation_name}' is open")),
                error_kind: Some(ErrorKind::CircuitOpen),
                attempts: 0,
                strategies_tried: vec![],
                total_time_ms: started.elapsed().as_millis() as u64,
                recommendations: vec!["wait for the circuit to recover".to_string()],
            };
        }

        let task_id = self.progress.start(operation_name, None).await;

        let outcome = retry(&self.config.retry, &mut op, cancellation).await;

        if outcome.success {
            breaker.on_success().await;
            self.progress
                .record_attempt(&task_id, "primary", true, None, 0, serde_json::json!({}))
                .await;
            self.progress
                .complete(&task_id, true, outcome.value.clone().map(serde_json::Value::String))
                .await;
            return ExecuteResult {
                success: true,
                value: outcome.value,
                error: None,
                error_kind: None,
                attempts: outcome.attempts,
                strategies_tried: vec!["primary".to_string()],
                total_time_ms: started.elapsed().as_millis() as u64,
                recommendations: vec![],
            };
        }

        breaker.on_failure().await;
        let kind = outcome.error_kind.unwrap_or(ErrorKind::Unknown);
        let message = format!("{operation_name} failed: {kind}");
        self.analyzer
            .record_failure(operation_name, kind, message.clone(), None)
            .await;
        self.progress
            .record_attempt(&task_id, "primary", false, Some(message.clone()), 0, serde_json::json!({}))
            .await;

        let analysis = self.analyzer.analyze_pattern().await;
        let mut recommendations = analysis.recommendations.clone();

        if self.config.enable_creative_solving && analysis.pattern != Pattern::None {
            let solution = self
                .solver
                .solve(&message, Some(&SolverContext { attempts: outcome.attempts }), None)
                .await;
            info!(?solution.solution_type, "creative fallback proposed");
            recommendations.push(format!(
                "creative fallback available: {:?}",
                solution.solution_type
            ));
        }

        self.progress.complete(&task_id, false, None).await;

        ExecuteResult {
            success: false,
            value: None,
            error: Some(message),
            error_kind: Some(kind),
            attempts: outcome.attempts,
            strategies_tried: vec!["primary".to_string()],
            total_time_ms: started.elapsed().as_millis() as u64,
            recommendations,
        }
    }

    /// Sequential or parallel exploration across a ranked set of
    /// alternative strategies. `invoke` maps a strategy name to its async
    /// operation.
    pub async fn execute_with_alternatives<F, Fut>(
        &self,
        operation_name: &str,
        strategies: Vec<Strategy>,
        goal: RankingGoal,
        parallel: bool,
        invoke: F,
    ) -> ExecuteResult<String>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let started = Instant::now();
        let ranked = rank_strategies(&strategies, goal);
        let invoke = Arc::new(invoke);

        if parallel {
            self.execute_parallel(operation_name, ranked, invoke, started).await
        } else {
            self.execute_sequential(operation_name, ranked, invoke, started).await
        }
    }

    async fn execute_sequential<F, Fut>(
        &self,
        operation_name: &str,
        ranked: Vec<Strategy>,
        invoke: Arc<F>,
        started: Instant,
    ) -> ExecuteResult<String>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let mut tried = Vec::new();
        let mut last_error: Option<String> = None;
        let mut last_kind = ErrorKind::Unknown;

        for strategy in ranked {
            if let Some(budget) = self.config.max_total_time {
                if started.elapsed() >= budget {
                    break;
                }
            }
            tried.push(strategy.name.clone());
            let token = CancellationToken::new();
            let name = strategy.name.clone();
            let result = (invoke)(name.clone(), token).await;
            match result {
                Ok(value) => {
                    self.history.record_success(&name).await;
                    return ExecuteResult {
                        success: true,
                        value: Some(value),
                        error: None,
                        error_kind: None,
                        attempts: tried.len() as u32,
                        strategies_tried: tried,
                        total_time_ms: started.elapsed().as_millis() as u64,
                        recommendations: vec![],
                    };
                }
                Err(message) => {
                    self.history.record_failure(&name).await;
                    let kind = classify(&message);
                    self.analyzer
                        .record_failure(operation_name, kind, message.clone(), None)
                        .await;
                    last_error = Some(message);
                    last_kind = kind;
                }
            }
        }

        ExecuteResult {
            success: false,
            value: None,
            error: last_error,
            error_kind: Some(last_kind),
            attempts: tried.len() as u32,
            strategies_tried: tried,
            total_time_ms: started.elapsed().as_millis() as u64,
            recommendations: vec!["all alternative strategies exhausted".to_string()],
        }
    }

    async fn execute_parallel<F, Fut>(
        &self,
        operation_name: &str,
        ranked: Vec<Strategy>,
        invoke: Arc<F>,
        started: Instant,
    ) -> ExecuteResult<String>
    where
        F: Fn(String, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        let candidates: Vec<Strategy> = ranked
            .into_iter()
            .take(self.config.max_parallel_strategies)
            .collect();
        let tried: Vec<String> = candidates.iter().map(|s| s.name.clone()).collect();

        let mut tokens = HashMap::new();
        let mut handles = Vec::new();
        for strategy in &candidates {
            let token = CancellationToken::new();
            tokens.insert(strategy.name.clone(), token.clone());
            let invoke = invoke.clone();
            let name = strategy.name.clone();
            handles.push(tokio::spawn(async move {
                let result = (invoke)(name.clone(), token).await;
                (name, result)
            }));
        }

        let mut winner: Option<(String, String)> = None;
        let mut last_error: Option<String> = None;
        let mut last_kind = ErrorKind::Unknown;
        let mut remaining = handles.len();

        let mut futures = handles;
        while remaining > 0 && winner.is_none() {
            let (result, _index, rest) = futures::future::select_all(futures).await;
            futures = rest;
            remaining -= 1;
            match result {
                Ok((name, Ok(value))) => {
                    self.history.record_success(&name).await;
                    winner = Some((name, value));
                }
                Ok((name, Err(message))) => {
                    self.history.record_failure(&name).await;
                    let kind = classify(&message);
                    self.analyzer
                        .record_failure(operation_name, kind, message.clone(), None)
                        .await;
                    last_error = Some(message);
                    last_kind = kind;
                }
                Err(_join_error) => {}
            }
        }

        // Cancel every strategy that didn't win, including ones still
        // in-flight; mandatory regardless of whether a winner was found.
        if let Some((winner_name, _)) = &winner {
            for (name, token) in &tokens {
                if name != winner_name {
                    token.cancel();
                }
            }
        } else {
            for token in tokens.values() {
                token.cancel();
            }
        }
        for handle in futures {
            handle.abort();
        }

        match winner {
            Some((name, value)) => {
                warn!(strategy = %name, "parallel race won");
                ExecuteResult {
                    success: true,
                    value: Some(value),
                    error: None,
                    error_kind: None,
                    attempts: tried.len() as u32,
                    strategies_tried: tried,
                    total_time_ms: started.elapsed().as_millis() as u64,
                    recommendations: vec![],
                }
            }
            None => ExecuteResult {
                success: false,
                value: None,
                error: last_error,
                error_kind: Some(last_kind),
                attempts: tried.len() as u32,
                strategies_tried: tried,
                total_time_ms: started.elapsed().as_millis() as u64,
                recommendations: vec!["all parallel strategies failed".to_string()],
            },
        }
    }
}
