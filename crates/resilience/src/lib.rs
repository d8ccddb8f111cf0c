//! Classified retry, circuit breaking, failure analysis, alternative
//! strategy exploration and creative fallback for resilient tool
//! execution, orchestrated by a single `ResilienceEngine`.

pub mod alternatives;
pub mod cancellation;
pub mod circuit_breaker;
pub mod creative_solver;
pub mod engine;
pub mod error_kind;
pub mod failure_analyzer;
pub mod progress_tracker;
pub mod retry;

pub use alternatives::{rank_strategies, RankingGoal, Strategy, StrategyHistory};
pub use cancellation::CancellationToken;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use creative_solver::{CreativeSolver, Solution, SolutionBackend, SolutionType, SolverContext};
pub use engine::{ExecuteResult, ResilienceEngine, ResilienceEngineConfig};
pub use error_kind::{classify, ErrorKind};
pub use failure_analyzer::{FailureAnalyzer, FailureAnalyzerConfig, FailureRecord, Pattern, PatternAnalysis};
pub use progress_tracker::{Attempt, ProgressTracker, TaskMetrics, TaskState, TaskStatus};
pub use retry::{calculate_delay, retry, RetryConfig, RetryError, RetryOutcome, RetryStats};
