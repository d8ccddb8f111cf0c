//! Concrete collaborator implementations: an HTTP-backed marketplace/LLM
//! client (grounded on `resilience/src/health_check.rs`'s `HttpHealthCheck`
//! use of `reqwest::Client`), a filesystem-backed skill registry, and a
//! JSONL-appending pruning log.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use sentinel_skills::{LlmBackend, Marketplace, PruningLog, Registry, SkillMetadata};

/// Marketplace/LLM backend reachable over HTTP.
pub struct HttpMarketplace {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMarketplace {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build marketplace http client");
        Self { client, base_url: base_url.into() }
    }
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SkillMetadata>, String> {
        let url = format!("{}/skills/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("limit", &limit.to_string())])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("marketplace search returned {}", response.status()));
        }
        response.json::<Vec<SkillMetadata>>().await.map_err(|e| e.to_string())
    }
}

pub struct HttpLlmBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLlmBackend {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build llm backend http client");
        Self { client, endpoint: endpoint.into() }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    text: String,
}

#[async_trait]
impl LlmBackend for HttpLlmBackend {
    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt })
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("llm backend returned {}", response.status()));
        }
        let body: GenerateResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.text)
    }
}

/// Skill registry backed by a directory of installed-skill manifests.
pub struct FilesystemRegistry {
    skills_dir: PathBuf,
}

impl FilesystemRegistry {
    pub fn new(skills_dir: PathBuf) -> Self {
        Self { skills_dir }
    }

    fn manifest_path(&self, id: &str) -> PathBuf {
        self.skills_dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl Registry for FilesystemRegistry {
    async fn get_skill(&self, id: &str) -> Result<Option<SkillMetadata>, String> {
        let path = self.manifest_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => serde_json::from_str(&contents).map(Some).map_err(|e| e.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.to_string()),
        }
    }

    async fn install(&self, metadata: &SkillMetadata) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.skills_dir).await.map_err(|e| e.to_string())?;
        let path = self.manifest_path(&metadata.id);
        let json = serde_json::to_string_pretty(metadata).map_err(|e| e.to_string())?;
        tokio::fs::write(&path, json).await.map_err(|e| e.to_string())?;
        debug!(skill_id = %metadata.id, "installed skill manifest");
        Ok(())
    }

    async fn unregister(&self, id: &str) -> Result<(), String> {
        let path = self.manifest_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn skills_dir(&self) -> &str {
        self.skills_dir.to_str().unwrap_or("")
    }
}

#[derive(Serialize)]
struct PruningLogLine<'a> {
    skill_id: &'a str,
    pruned_at: DateTime<Utc>,
    reason: &'a str,
}

/// Append-only pruning log at `skill_optimization/pruning_log.jsonl`.
pub struct JsonlPruningLog {
    path: PathBuf,
}

impl JsonlPruningLog {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { path: data_dir.join("skill_optimization").join("pruning_log.jsonl") }
    }
}

#[async_trait]
impl PruningLog for JsonlPruningLog {
    async fn record_pruning(&self, skill_id: &str, timestamp: DateTime<Utc>, reason: &str) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| e.to_string())?;
        }
        let line = serde_json::to_string(&PruningLogLine { skill_id, pruned_at: timestamp, reason })
            .map_err(|e| e.to_string())?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| e.to_string())?;
        file.write_all(line.as_bytes()).await.map_err(|e| e.to_string())?;
        file.write_all(b"\n").await.map_err(|e| e.to_string())?;
        Ok(())
    }
}
