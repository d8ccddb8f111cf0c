//! Progress Tracker (C7): per-task attempt log with crash-safe
//! serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub strategy_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: String,
    pub operation_name: String,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub attempts: Vec<Attempt>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub total_attempts: usize,
    pub successful_attempts: usize,
    pub failed_attempts: usize,
    pub total_duration_ms: u64,
    pub avg_attempt_duration_ms: f64,
}

#[derive(Default)]
pub struct ProgressTracker {
    tasks: Arc<RwLock<HashMap<String, TaskState>>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, operation_name: impl Into<String>, id: Option<String>) -> String {
        let task_id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let state = TaskState {
            task_id: task_id.clone(),
            operation_name: operation_name.into(),
            status: TaskStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            attempts: Vec::new(),
            result: None,
            error: None,
        };
        self.tasks.write().await.insert(task_id.clone(), state);
        task_id
    }

    pub async fn record_attempt(
        &self,
        id: &str,
        strategy_name: impl Into<String>,
        success: bool,
        error: Option<String>,
        duration_ms: u64,
        metadata: serde_json::Value,
    ) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            task.attempts.push(Attempt {
                strategy_name: strategy_name.into(),
                success,
                error,
                duration_ms,
                metadata,
            });
        }
    }

    pub async fn complete(&self, id: &str, success: bool, result: Option<serde_json::Value>) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            task.status = if success {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            task.completed_at = Some(Utc::now());
            task.result = result;
        }
    }

    pub async fn cancel(&self, id: &str) {
        let mut tasks = self.tasks.write().await;
        if let Some(task) = tasks.get_mut(id) {
            task.status = TaskStatus::Cancelled;
            task.completed_at = Some(Utc::now());
        }
    }

    pub async fn get_state(&self, id: &str) -> Option<TaskState> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn get_attempt_history(&self, id: &str) -> Vec<Attempt> {
        self.tasks
            .read()
            .await
            .get(id)
            .map(|t| t.attempts.clone())
            .unwrap_or_default()
    }

    pub async fn get_metrics(&self, id: &str) -> Option<TaskMetrics> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(id)?;
        let total_attempts = task.attempts.len();
        let successful_attempts = task.attempts.iter().filter(|a| a.success).count();
        let failed_attempts = total_attempts - successful_attempts;
        let total_duration_ms: u64 = task.attempts.iter().map(|a| a.duration_ms).sum();
        let avg_attempt_duration_ms = if total_attempts > 0 {
            total_duration_ms as f64 / total_attempts as f64
        } else {
            0.0
        };
        Some(TaskMetrics {
            total_attempts,
            successful_attempts,
            failed_attempts,
            total_duration_ms,
            avg_attempt_duration_ms,
        })
    }

    /// Serialize a task to an opaque JSON value for crash-safe persistence.
    pub async fn save_state(&self, id: &str) -> Option<serde_json::Value> {
        let tasks = self.tasks.read().await;
        let task = tasks.get(id)?;
        serde_json::to_value(task).ok()
    }

    /// Restore a task from a value produced by [`Self::save_state`],
    /// returning its task id.
    pub async fn restore_state(&self, snapshot: serde_json::Value) -> Result<String, String> {
        let task: TaskState = serde_json::from_value(snapshot).map_err(|e| e.to_string())?;
        let id = task.task_id.clone();
        self.tasks.write().await.insert(id.clone(), task);
        Ok(id)
    }

    pub async fn clear_completed(&self) {
        let mut tasks = self.tasks.write().await;
        tasks.retain(|_, t| {
            !matches!(t.status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled)
        });
    }

    pub async fn clear_all(&self) {
        self.tasks.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn start_creates_running_task() {
        let tracker = ProgressTracker::new();
        let id = tracker.start("fetch", None).await;
        let state = tracker.get_state(&id).await.unwrap();
        assert_eq!(state.status, TaskStatus::Running);
        assert_eq!(state.operation_name, "fetch");
    }

    #[tokio::test]
    async fn attempts_are_append_only_and_ordered() {
        let tracker = ProgressTracker::new();
        let id = tracker.start("fetch", None).await;
        tracker.record_attempt(&id, "direct", false, Some("timeout".into()), 10, json!({})).await;
        tracker.record_attempt(&id, "direct", true, None, 20, json!({})).await;
        let history = tracker.get_attempt_history(&id).await;
        assert_eq!(history.len(), 2);
        assert!(!history[0].success);
        assert!(history[1].success);
    }

    #[tokio::test]
    async fn metrics_aggregate_attempts() {
        let tracker = ProgressTracker::new();
        let id = tracker.start("fetch", None).await;
        tracker.record_attempt(&id, "a", false, None, 10, json!({})).await;
        tracker.record_attempt(&id, "a", true, None, 30, json!({})).await;
        let metrics = tracker.get_metrics(&id).await.unwrap();
        assert_eq!(metrics.total_attempts, 2);
        assert_eq!(metrics.successful_attempts, 1);
        assert_eq!(metrics.failed_attempts, 1);
        assert_eq!(metrics.total_duration_ms, 40);
        assert_eq!(metrics.avg_attempt_duration_ms, 20.0);
    }

    #[tokio::test]
    async fn save_and_restore_round_trips() {
        let tracker = ProgressTracker::new();
        let id = tracker.start("fetch", Some("task-1".into())).await;
        tracker.record_attempt(&id, "a", true, None, 15, json!({"k": "v"})).await;
        tracker.complete(&id, true, Some(json!("done"))).await;

        let snapshot = tracker.save_state(&id).await.unwrap();
        let before = tracker.get_state(&id).await.unwrap();

        let fresh = ProgressTracker::new();
        let restored_id = fresh.restore_state(snapshot).await.unwrap();
        let after = fresh.get_state(&restored_id).await.unwrap();

        assert_eq!(restored_id, id);
        assert_eq!(before.task_id, after.task_id);
        assert_eq!(before.status, after.status);
        assert_eq!(before.attempts.len(), after.attempts.len());
        assert_eq!(before.result, after.result);
    }

    #[tokio::test]
    async fn clear_completed_removes_terminal_tasks_only() {
        let tracker = ProgressTracker::new();
        let running = tracker.start("a", None).await;
        let done = tracker.start("b", None).await;
        tracker.complete(&done, true, None).await;

        tracker.clear_completed().await;

        assert!(tracker.get_state(&running).await.is_some());
        assert!(tracker.get_state(&done).await.is_none());
    }
}
