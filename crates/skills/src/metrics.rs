//! Skill metrics data model and score formulas (C11 data model).
//!
//! Formulas must match exactly:
//! `utility = min(1, total_uses / max(1, days_since_first_used) / 2)`,
//! `quality = success_rate`, `cost = max(0, 1 - avg_exec_time/5)`,
//! `overall = 0.4*success_rate + 0.3*utility + 0.2*quality + 0.1*cost`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillStatus {
    Discovered,
    Evaluating,
    Active,
    Underperforming,
    Pruned,
}

impl SkillStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SkillStatus::Discovered => "discovered",
            SkillStatus::Evaluating => "evaluating",
            SkillStatus::Active => "active",
            SkillStatus::Underperforming => "underperforming",
            SkillStatus::Pruned => "pruned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetrics {
    pub skill_id: String,
    pub total_uses: u64,
    pub successful_uses: u64,
    pub failed_uses: u64,
    pub total_exec_time: f64,
    pub avg_exec_time: f64,
    pub first_used: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
    pub success_rate: f64,
    pub recent_success_rate: f64,
    pub utility_score: f64,
    pub quality_score: f64,
    pub cost_score: f64,
    pub overall_score: f64,
    pub status: SkillStatus,
    /// Rolling window of (success, exec_time, at) used to compute
    /// `recent_success_rate`; capped at 50 entries or 24h, whichever's
    /// smaller, per the spec's "recent window" definition.
    #[serde(skip)]
    pub(crate) recent_window: Vec<(bool, DateTime<Utc>)>,
}

impl SkillMetrics {
    pub fn new(skill_id: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            total_uses: 0,
            successful_uses: 0,
            failed_uses: 0,
            total_exec_time: 0.0,
            avg_exec_time: 0.0,
            first_used: None,
            last_used: None,
            success_rate: 0.0,
            recent_success_rate: 0.0,
            utility_score: 0.0,
            quality_score: 0.0,
            cost_score: 0.0,
            overall_score: 0.0,
            status: SkillStatus::Discovered,
            recent_window: Vec::new(),
        }
    }

    pub fn update_from_execution(&mut self, success: bool, execution_time: f64) {
        let now = Utc::now();
        self.total_uses += 1;
        if success {
            self.successful_uses += 1;
        } else {
            self.failed_uses += 1;
        }
        self.total_exec_time += execution_time;
        if self.first_used.is_none() {
            self.first_used = Some(now);
        }
        self.last_used = Some(now);

        self.recent_window.push((success, now));
        let cutoff = now - chrono::Duration::hours(24);
        self.recent_window.retain(|(_, at)| *at >= cutoff);
        if self.recent_window.len() > 50 {
            let excess = self.recent_window.len() - 50;
            self.recent_window.drain(0..excess);
        }

        self.recalculate_scores();
    }

    fn recalculate_scores(&mut self) {
        self.success_rate = if self.total_uses > 0 {
            self.successful_uses as f64 / self.total_uses as f64
        } else {
            0.0
        };
        self.avg_exec_time = if self.total_uses > 0 {
            self.total_exec_time / self.total_uses as f64
        } else {
            0.0
        };
        self.recent_success_rate = if self.recent_window.is_empty() {
            self.success_rate
        } else {
            let successes = self.recent_window.iter().filter(|(s, _)| *s).count();
            successes as f64 / self.recent_window.len() as f64
        };

        let days_since_first_used = self
            .first_used
            .map(|t| (Utc::now() - t).num_seconds() as f64 / 86_400.0)
            .unwrap_or(0.0)
            .max(1.0);
        self.utility_score = (self.total_uses as f64 / days_since_first_used / 2.0).min(1.0);
        self.quality_score = self.success_rate;
        self.cost_score = (1.0 - self.avg_exec_time / 5.0).max(0.0);
        self.overall_score = 0.4 * self.success_rate
            + 0.3 * self.utility_score
            + 0.2 * self.quality_score
            + 0.1 * self.cost_score;
    }

    /// Degrading iff `recent_success_rate < success_rate - 0.15`.
    pub fn is_degrading(&self) -> bool {
        self.recent_success_rate < self.success_rate - 0.15
    }

    /// Improving iff `recent_success_rate > success_rate + 0.15`.
    pub fn is_improving(&self) -> bool {
        self.recent_success_rate > self.success_rate + 0.15
    }

    pub fn days_unused(&self) -> Option<i64> {
        self.last_used.map(|t| (Utc::now() - t).num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_successful_plus_failed_equals_total() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 1.0);
        metrics.update_from_execution(false, 2.0);
        metrics.update_from_execution(true, 1.5);
        assert_eq!(metrics.successful_uses + metrics.failed_uses, metrics.total_uses);
    }

    #[test]
    fn success_rate_and_avg_exec_time_match_spec() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 2.0);
        metrics.update_from_execution(false, 4.0);
        assert_eq!(metrics.success_rate, 0.5);
        assert_eq!(metrics.avg_exec_time, 3.0);
    }

    #[test]
    fn cost_score_formula() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 2.5);
        assert!((metrics.cost_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cost_score_floors_at_zero_for_slow_skills() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 10.0);
        assert_eq!(metrics.cost_score, 0.0);
    }

    #[test]
    fn overall_score_matches_weighted_formula() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 2.5);
        let expected = 0.4 * metrics.success_rate
            + 0.3 * metrics.utility_score
            + 0.2 * metrics.quality_score
            + 0.1 * metrics.cost_score;
        assert!((metrics.overall_score - expected).abs() < 1e-9);
    }

    #[test]
    fn score_monotonicity_on_success() {
        let mut metrics = SkillMetrics::new("s1");
        metrics.update_from_execution(true, 1.0);
        metrics.update_from_execution(false, 1.0);
        let before = metrics.success_rate;
        metrics.update_from_execution(true, 1.0);
        assert!(metrics.success_rate >= before);
    }

    #[test]
    fn no_uses_yields_zero_scores() {
        let metrics = SkillMetrics::new("s1");
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.avg_exec_time, 0.0);
    }

    #[test]
    fn degrading_and_improving_are_disjoint() {
        let mut metrics = SkillMetrics::new("s1");
        for _ in 0..10 {
            metrics.update_from_execution(true, 1.0);
        }
        assert!(!metrics.is_degrading());
        assert!(!metrics.is_improving());
    }
}
