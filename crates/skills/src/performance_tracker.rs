//! Skill Performance Tracker (C11): per-skill rolling stats, degrading/
//! improving detection, and capability-gap clustering.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::metrics::{SkillMetrics, SkillStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGap {
    pub gap_id: String,
    pub missing_capability: String,
    pub task_description: String,
    pub failure_count: u64,
    pub priority_score: f64,
}

#[derive(Default)]
pub struct SkillPerformanceTracker {
    metrics: Arc<RwLock<HashMap<String, SkillMetrics>>>,
    gaps: Arc<RwLock<HashMap<String, SkillGap>>>,
}

impl SkillPerformanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_execution(
        &self,
        skill_id: &str,
        success: bool,
        duration: f64,
        missing_capability: Option<(&str, &str)>,
    ) {
        let mut metrics = self.metrics.write().await;
        let entry = metrics
            .entry(skill_id.to_string())
            .or_insert_with(|| SkillMetrics::new(skill_id));
        entry.update_from_execution(success, duration);
        drop(metrics);

        if !success {
            if let Some((capability, task_description)) = missing_capability {
                self.record_gap(capability, task_description).await;
            }
        }
    }

    async fn record_gap(&self, capability: &str, task_description: &str) {
        let mut gaps = self.gaps.write().await;
        let normalized = capability.trim().to_lowercase();
        let entry = gaps.entry(normalized.clone()).or_insert_with(|| SkillGap {
            gap_id: normalized.clone(),
            missing_capability: capability.to_string(),
            task_description: task_description.to_string(),
            failure_count: 0,
            priority_score: 0.0,
        });
        entry.failure_count += 1;
        entry.priority_score = (entry.failure_count as f64 / 5.0).tanh();
    }

    pub async fn get_skill_stats(&self, skill_id: &str) -> Option<SkillMetrics> {
        self.metrics.read().await.get(skill_id).cloned()
    }

    pub async fn get_all_stats(&self) -> Vec<SkillMetrics> {
        self.metrics.read().await.values().cloned().collect()
    }

    pub async fn get_top_performers(&self, limit: usize) -> Vec<SkillMetrics> {
        let mut all = self.get_all_stats().await;
        all.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        all.truncate(limit);
        all
    }

    pub async fn get_degrading_skills(&self) -> Vec<SkillMetrics> {
        self.get_all_stats()
            .await
            .into_iter()
            .filter(|m| m.is_degrading())
            .collect()
    }

    pub async fn get_improving_skills(&self) -> Vec<SkillMetrics> {
        self.get_all_stats()
            .await
            .into_iter()
            .filter(|m| m.is_improving())
            .collect()
    }

    /// Register a freshly discovered skill with its evaluation-derived
    /// quality score, without affecting execution counts. The evolution
    /// manager is this map's lifecycle writer; [`Self::record_execution`]
    /// remains the runtime-execution writer.
    pub async fn upsert_discovered(&self, skill_id: &str, quality_score: f64) {
        let mut metrics = self.metrics.write().await;
        let entry = metrics
            .entry(skill_id.to_string())
            .or_insert_with(|| SkillMetrics::new(skill_id));
        entry.quality_score = quality_score;
    }

    pub async fn set_status(&self, skill_id: &str, status: SkillStatus) {
        if let Some(m) = self.metrics.write().await.get_mut(skill_id) {
            m.status = status;
        }
    }

    pub async fn remove(&self, skill_id: &str) {
        self.metrics.write().await.remove(skill_id);
    }

    pub async fn contains(&self, skill_id: &str) -> bool {
        self.metrics.read().await.contains_key(skill_id)
    }

    /// Bulk-load metrics from a persisted snapshot, overwriting any
    /// in-memory entries with the same `skill_id`.
    pub async fn load_all(&self, metrics: Vec<SkillMetrics>) {
        let mut map = self.metrics.write().await;
        for metric in metrics {
            map.insert(metric.skill_id.clone(), metric);
        }
    }

    pub async fn get_skill_gaps(&self, min_priority: f64) -> Vec<SkillGap> {
        let mut gaps: Vec<SkillGap> = self
            .gaps
            .read()
            .await
            .values()
            .filter(|g| g.priority_score >= min_priority)
            .cloned()
            .collect();
        gaps.sort_by(|a, b| {
            b.priority_score
                .partial_cmp(&a.priority_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        gaps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_executions_per_skill() {
        let tracker = SkillPerformanceTracker::new();
        tracker.record_execution("s1", true, 1.0, None).await;
        tracker.record_execution("s1", false, 2.0, None).await;
        let stats = tracker.get_skill_stats("s1").await.unwrap();
        assert_eq!(stats.total_uses, 2);
    }

    #[tokio::test]
    async fn top_performers_sorted_by_overall_score_desc() {
        let tracker = SkillPerformanceTracker::new();
        for _ in 0..10 {
            tracker.record_execution("good", true, 0.5, None).await;
        }
        for _ in 0..10 {
            tracker.record_execution("bad", false, 4.0, None).await;
        }
        let top = tracker.get_top_performers(2).await;
        assert_eq!(top[0].skill_id, "good");
    }

    #[tokio::test]
    async fn gaps_cluster_by_normalized_capability() {
        let tracker = SkillPerformanceTracker::new();
        for _ in 0..5 {
            tracker
                .record_execution("s1", false, 1.0, Some(("PDF parsing", "parse a pdf")))
                .await;
        }
        for _ in 0..5 {
            tracker
                .record_execution("s1", false, 1.0, Some(("pdf parsing", "parse another pdf")))
                .await;
        }
        let gaps = tracker.get_skill_gaps(0.0).await;
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].failure_count, 10);
    }

    #[tokio::test]
    async fn gap_priority_uses_tanh_of_failure_count() {
        let tracker = SkillPerformanceTracker::new();
        for _ in 0..5 {
            tracker
                .record_execution("s1", false, 1.0, Some(("vision", "read an image")))
                .await;
        }
        let gaps = tracker.get_skill_gaps(0.0).await;
        let expected = (5.0_f64 / 5.0).tanh();
        assert!((gaps[0].priority_score - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn upsert_discovered_sets_quality_without_uses() {
        let tracker = SkillPerformanceTracker::new();
        tracker.upsert_discovered("new-skill", 0.65).await;
        let stats = tracker.get_skill_stats("new-skill").await.unwrap();
        assert_eq!(stats.quality_score, 0.65);
        assert_eq!(stats.total_uses, 0);
    }

    #[tokio::test]
    async fn load_all_overwrites_existing_entries() {
        let tracker = SkillPerformanceTracker::new();
        tracker.record_execution("s1", true, 1.0, None).await;
        let mut loaded = SkillMetrics::new("s1");
        loaded.total_uses = 99;
        tracker.load_all(vec![loaded]).await;
        let stats = tracker.get_skill_stats("s1").await.unwrap();
        assert_eq!(stats.total_uses, 99);
    }

    #[tokio::test]
    async fn min_priority_filters_low_priority_gaps() {
        let tracker = SkillPerformanceTracker::new();
        tracker
            .record_execution("s1", false, 1.0, Some(("rare", "rare task")))
            .await;
        let gaps = tracker.get_skill_gaps(0.5).await;
        assert!(gaps.is_empty());
    }
}
