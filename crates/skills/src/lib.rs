//! Skill performance tracking and evolution (C11-C12): per-skill rolling
//! metrics, capability-gap clustering, and the three-loop background
//! manager that explores, optimizes, and prunes skills over time.

pub mod collaborators;
pub mod evolution;
pub mod metrics;
pub mod performance_tracker;

pub use collaborators::{LlmBackend, Marketplace, PruningLog, Registry, SkillMetadata};
pub use evolution::{
    evaluate_skill, EvaluationRecord, EvaluationResult, EvolutionConfig, EvolutionSummary,
    PruneCandidate, SkillEvolutionManager,
};
pub use metrics::{SkillMetrics, SkillStatus};
pub use performance_tracker::{SkillGap, SkillPerformanceTracker};
