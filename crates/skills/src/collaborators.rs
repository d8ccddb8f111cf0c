//! Collaborator traits the evolution manager calls into (spec §6). Hosted
//! here (not in the daemon crate) since `evolution.rs` is their only
//! caller; the daemon crate supplies concrete implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillMetadata {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub readme: Option<String>,
    pub examples: Option<String>,
    pub runtime_version: Option<String>,
    pub installs: Option<u64>,
    pub top_source: Option<String>,
}

#[async_trait]
pub trait Marketplace: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SkillMetadata>, String>;
}

#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_skill(&self, id: &str) -> Result<Option<SkillMetadata>, String>;
    async fn install(&self, metadata: &SkillMetadata) -> Result<(), String>;
    async fn unregister(&self, id: &str) -> Result<(), String>;
    fn skills_dir(&self) -> &str;
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

/// Append-only persistence interface for the pruning log; storage
/// backend is out of scope for this core (spec design note).
#[async_trait]
pub trait PruningLog: Send + Sync {
    async fn record_pruning(&self, skill_id: &str, timestamp: DateTime<Utc>, reason: &str) -> Result<(), String>;
}
