//! Alternative Explorer (C5): static strategy templates per operation
//! kind, multi-criteria ranking, and rolling success/failure tracking.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingGoal {
    Balanced,
    Cost,
    Speed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub name: String,
    pub priority: f64,
    pub cost_estimate: f64,
    pub time_estimate: f64,
}

fn strategy_templates() -> HashMap<&'static str, Vec<Strategy>> {
    let mut table = HashMap::new();
    table.insert(
        "http_request",
        vec![
            Strategy {
                name: "direct".into(),
                priority: 0.9,
                cost_estimate: 1.0,
                time_estimate: 1.0,
            },
            Strategy {
                name: "proxy".into(),
                priority: 0.6,
                cost_estimate: 1.5,
                time_estimate: 2.0,
            },
            Strategy {
                name: "cached".into(),
                priority: 0.4,
                cost_estimate: 0.1,
                time_estimate: 0.2,
            },
        ],
    );
    table.insert(
        "llm_request",
        vec![
            Strategy {
                name: "primary_model".into(),
                priority: 0.9,
                cost_estimate: 2.0,
                time_estimate: 3.0,
            },
            Strategy {
                name: "secondary_model".into(),
                priority: 0.6,
                cost_estimate: 1.0,
                time_estimate: 2.0,
            },
            Strategy {
                name: "local_model".into(),
                priority: 0.3,
                cost_estimate: 0.1,
                time_estimate: 1.5,
            },
        ],
    );
    table
}

/// Enumerate strategy templates for `operation_kind`, excluding `primary`
/// if given.
pub fn enumerate_strategies(operation_kind: &str, primary: Option<&str>) -> Vec<Strategy> {
    strategy_templates()
        .get(operation_kind)
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|s| Some(s.name.as_str()) != primary)
        .collect()
}

fn normalize(values: &[f64], value: f64) -> f64 {
    let max = values.iter().cloned().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        0.0
    } else {
        value / max
    }
}

/// Rank `strategies` under `goal`. Deterministic: identical inputs produce
/// byte-identical ordering (ties broken by priority desc, then name asc).
pub fn rank_strategies(strategies: &[Strategy], goal: RankingGoal) -> Vec<Strategy> {
    let costs: Vec<f64> = strategies.iter().map(|s| s.cost_estimate).collect();
    let times: Vec<f64> = strategies.iter().map(|s| s.time_estimate).collect();

    let mut scored: Vec<(f64, Strategy)> = strategies
        .iter()
        .cloned()
        .map(|s| {
            let score = match goal {
                RankingGoal::Balanced => {
                    0.5 * s.priority
                        - 0.25 * normalize(&costs, s.cost_estimate)
                        - 0.25 * normalize(&times, s.time_estimate)
                }
                RankingGoal::Cost => -s.cost_estimate,
                RankingGoal::Speed => -s.time_estimate,
            };
            (score, s)
        })
        .collect();

    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .partial_cmp(score_a)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.priority.partial_cmp(&a.priority).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.name.cmp(&b.name))
    });

    scored.into_iter().map(|(_, s)| s).collect()
}

/// Rolling per-strategy success/failure counters.
#[derive(Default)]
pub struct StrategyHistory {
    counts: Arc<RwLock<HashMap<String, (u64, u64)>>>,
}

impl StrategyHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_success(&self, name: &str) {
        let mut counts = self.counts.write().await;
        counts.entry(name.to_string()).or_insert((0, 0)).0 += 1;
    }

    pub async fn record_failure(&self, name: &str) {
        let mut counts = self.counts.write().await;
        counts.entry(name.to_string()).or_insert((0, 0)).1 += 1;
    }

    /// Success rate for `name`; `0.5` if the strategy has never been tried.
    pub async fn success_rate(&self, name: &str) -> f64 {
        let counts = self.counts.read().await;
        match counts.get(name) {
            Some((succ, fail)) if succ + fail > 0 => *succ as f64 / (*succ + *fail) as f64,
            _ => 0.5,
        }
    }
}
