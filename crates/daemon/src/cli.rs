//! `skill` subcommand surface (spec §6), grounded on `cli/src/main.rs`'s
//! `clap::Parser`/`Subcommand` structure. Exit codes: 0 success, 1
//! unexpected failure, 2 invalid input, 3 partial failure (prune with
//! some deletions failed).

use clap::{Parser, Subcommand};

use crate::app::App;

#[derive(Debug, Parser)]
#[command(name = "sentineld")]
#[command(about = "Resilient execution and skill-evolution daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to an optional TOML config file.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Skill performance, gap and evolution management.
    Skill {
        #[command(subcommand)]
        command: SkillCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum SkillCommand {
    /// Render a table of all skills, or a detail panel for one.
    Status { skill_id: Option<String> },
    /// Sorted by `overall_score` descending.
    Rank {
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Detected capability gaps sorted by priority.
    Gaps {
        #[arg(long, default_value_t = 0.0)]
        min_priority: f64,
    },
    /// Synchronous one-shot exploration; prints recommendations.
    Explore {
        #[arg(long)]
        auto_approve: bool,
    },
    /// Evaluate-and-optionally-remove underperforming skills.
    Prune {
        #[arg(long)]
        dry_run: bool,
    },
}

/// Exit code for the process, per spec §6.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_INVALID_INPUT: i32 = 2;
pub const EXIT_PARTIAL_FAILURE: i32 = 3;

pub async fn run_skill_command(app: &App, command: SkillCommand) -> i32 {
    match command {
        SkillCommand::Status { skill_id } => status(app, skill_id.as_deref()).await,
        SkillCommand::Rank { top } => rank(app, top).await,
        SkillCommand::Gaps { min_priority } => gaps(app, min_priority).await,
        SkillCommand::Explore { auto_approve } => explore(app, auto_approve).await,
        SkillCommand::Prune { dry_run } => prune(app, dry_run).await,
    }
}

async fn status(app: &App, skill_id: Option<&str>) -> i32 {
    match skill_id {
        Some(id) => match app.performance_tracker.get_skill_stats(id).await {
            Some(stats) => {
                println!("{}", serde_json::to_string_pretty(&stats).unwrap_or_default());
                EXIT_SUCCESS
            }
            None => {
                eprintln!("no such skill: {id}");
                EXIT_INVALID_INPUT
            }
        },
        None => {
            let all = app.performance_tracker.get_all_stats().await;
            for skill in &all {
                println!(
                    "{:<24} {:<14} score={:.2} uses={}",
                    skill.skill_id,
                    skill.status.as_str(),
                    skill.overall_score,
                    skill.total_uses
                );
            }
            EXIT_SUCCESS
        }
    }
}

async fn rank(app: &App, top: usize) -> i32 {
    let ranked = app.performance_tracker.get_top_performers(top).await;
    for (i, skill) in ranked.iter().enumerate() {
        println!("{:>2}. {:<24} {:.3}", i + 1, skill.skill_id, skill.overall_score);
    }
    EXIT_SUCCESS
}

async fn gaps(app: &App, min_priority: f64) -> i32 {
    if !(0.0..=1.0).contains(&min_priority) {
        eprintln!("min-priority must be between 0.0 and 1.0");
        return EXIT_INVALID_INPUT;
    }
    let gaps = app.performance_tracker.get_skill_gaps(min_priority).await;
    for gap in &gaps {
        println!(
            "{:<28} failures={:<4} priority={:.2}  {}",
            gap.missing_capability, gap.failure_count, gap.priority_score, gap.task_description
        );
    }
    EXIT_SUCCESS
}

async fn explore(app: &App, auto_approve: bool) -> i32 {
    let result = app
        .evolution
        .trigger_exploration_for_failure("manual exploration request", None)
        .await;
    match result {
        Ok(evaluations) => {
            for evaluation in &evaluations {
                println!(
                    "{:<24} recommendation={:<10} overall={:.2}",
                    evaluation.skill_id, evaluation.recommendation, evaluation.overall_score
                );
            }
            if auto_approve {
                println!("(auto-approve not yet wired to the registry from this CLI path)");
            }
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("exploration failed: {e}");
            EXIT_FAILURE
        }
    }
}

async fn prune(app: &App, dry_run: bool) -> i32 {
    let candidates = app.evolution.prune_skills(dry_run).await;
    for candidate in &candidates {
        println!("{:<24} {}", candidate.skill_id, candidate.reason);
    }
    if candidates.iter().any(|c| !c.removed) {
        EXIT_PARTIAL_FAILURE
    } else {
        EXIT_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DaemonConfig;

    fn test_app(dir: &std::path::Path) -> App {
        let mut config = DaemonConfig::default();
        config.data_dir = dir.to_path_buf();
        config.metrics.data_dir = dir.join("metrics");
        config.evolution.exploration_enabled = false;
        config.evolution.optimization_enabled = false;
        config.evolution.pruning_enabled = false;
        App::new(config, "http://localhost:0", None)
    }

    #[tokio::test]
    async fn gaps_rejects_out_of_range_priority() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let app = test_app(tmp.path());
        assert_eq!(gaps(&app, 1.5).await, EXIT_INVALID_INPUT);
    }

    #[tokio::test]
    async fn status_unknown_skill_is_invalid_input() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let app = test_app(tmp.path());
        assert_eq!(status(&app, Some("nope")).await, EXIT_INVALID_INPUT);
    }

    #[tokio::test]
    async fn rank_on_empty_tracker_succeeds() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let app = test_app(tmp.path());
        assert_eq!(rank(&app, 5).await, EXIT_SUCCESS);
    }
}
