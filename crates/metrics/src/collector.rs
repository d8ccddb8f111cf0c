//! Metrics Collector (C9): counters, gauges, timers, and periodic
//! system-resource sampling.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use sysinfo::System;
use tokio::sync::RwLock;
use tracing::debug;

pub type Tags = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
    Histogram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub kind: MetricKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub tags: Tags,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerStats {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub counters: HashMap<String, f64>,
    pub gauges: HashMap<String, f64>,
    pub timers: HashMap<String, TimerStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEnvelope {
    pub summary: MetricsSummary,
    pub metrics: Vec<Metric>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_usage: f32,
    pub memory_usage: f32,
    pub load_average: f64,
}

fn metric_key(name: &str, tags: &Tags) -> String {
    if tags.is_empty() {
        return name.to_string();
    }
    let mut pairs: Vec<(&String, &String)> = tags.iter().collect();
    pairs.sort_by_key(|(k, _)| k.as_str());
    let joined = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}[{joined}]")
}

struct Inner {
    counters: HashMap<String, f64>,
    gauges: HashMap<String, f64>,
    timer_values: HashMap<String, Vec<f64>>,
    log: Vec<Metric>,
}

/// Thread-safe metric store. Cheap to clone (Arc inside); share one
/// instance across the engine, evolution loops and the self-analyzer.
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<RwLock<Inner>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                counters: HashMap::new(),
                gauges: HashMap::new(),
                timer_values: HashMap::new(),
                log: Vec::new(),
            })),
        }
    }

    pub async fn record_counter(&self, name: &str, value: f64, tags: Tags) {
        let key = metric_key(name, &tags);
        let mut inner = self.inner.write().await;
        *inner.counters.entry(key).or_insert(0.0) += value;
        inner.log.push(Metric {
            name: name.to_string(),
            value,
            kind: MetricKind::Counter,
            timestamp: chrono::Utc::now(),
            tags,
        });
    }

    pub async fn increment_counter(&self, name: &str, tags: Tags) {
        self.record_counter(name, 1.0, tags).await;
    }

    pub async fn record_gauge(&self, name: &str, value: f64, tags: Tags) {
        let key = metric_key(name, &tags);
        let mut inner = self.inner.write().await;
        inner.gauges.insert(key, value);
        inner.log.push(Metric {
            name: name.to_string(),
            value,
            kind: MetricKind::Gauge,
            timestamp: chrono::Utc::now(),
            tags,
        });
    }

    pub async fn record_timer(&self, name: &str, duration: std::time::Duration, tags: Tags) {
        let key = metric_key(name, &tags);
        let value_ms = duration.as_secs_f64() * 1000.0;
        let mut inner = self.inner.write().await;
        let values = inner.timer_values.entry(key).or_default();
        values.push(value_ms);
        // Cap history per timer to bound memory, oldest dropped first.
        if values.len() > 1000 {
            values.remove(0);
        }
        inner.log.push(Metric {
            name: name.to_string(),
            value: value_ms,
            kind: MetricKind::Timer,
            timestamp: chrono::Utc::now(),
            tags,
        });
    }

    /// Sample CPU/memory/load via `sysinfo` and record as gauges under
    /// the vocabulary the self-analyzer expects (`system.cpu_percent`,
    /// `system.memory_percent`).
    pub async fn collect_system_metrics(&self) -> SystemMetrics {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();
        // A single refresh under-samples CPU; sysinfo recommends two
        // refreshes with a short gap for an accurate reading.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        sys.refresh_cpu();

        let cpu_usage = sys.global_cpu_info().cpu_usage();
        let memory_usage = if sys.total_memory() > 0 {
            (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
        } else {
            0.0
        };
        let load_average = System::load_average().one;

        self.record_gauge("system.cpu_percent", cpu_usage as f64, Tags::new()).await;
        self.record_gauge("system.memory_percent", memory_usage as f64, Tags::new()).await;
        self.record_gauge("system.load_average", load_average, Tags::new()).await;

        debug!(cpu_usage, memory_usage, load_average, "sampled system metrics");

        SystemMetrics {
            cpu_usage,
            memory_usage,
            load_average,
        }
    }

    pub async fn get_summary(&self) -> MetricsSummary {
        let inner = self.inner.read().await;
        let timers = inner
            .timer_values
            .iter()
            .map(|(name, values)| {
                let count = values.len() as u64;
                let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let total: f64 = values.iter().sum();
                let mean = if count > 0 { total / count as f64 } else { 0.0 };
                (
                    name.clone(),
                    TimerStats {
                        count,
                        min: if count > 0 { min } else { 0.0 },
                        max: if count > 0 { max } else { 0.0 },
                        mean,
                        total,
                    },
                )
            })
            .collect();
        MetricsSummary {
            counters: inner.counters.clone(),
            gauges: inner.gauges.clone(),
            timers,
        }
    }

    async fn snapshot(&self) -> MetricsEnvelope {
        let summary = self.get_summary().await;
        let metrics = self.inner.read().await.log.clone();
        MetricsEnvelope { summary, metrics }
    }

    /// Write a stable `{summary, metrics}` JSON envelope to `path`.
    pub async fn save_metrics(&self, path: &Path) -> Result<(), std::io::Error> {
        let envelope = self.snapshot().await;
        let json = serde_json::to_string_pretty(&envelope)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped timer: records elapsed wall-clock time to `collector` when
/// dropped or explicitly stopped.
pub struct PerformanceTimer {
    name: String,
    tags: Tags,
    started: Instant,
    collector: MetricsCollector,
    stopped: bool,
}

impl PerformanceTimer {
    pub fn start(collector: MetricsCollector, name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
            started: Instant::now(),
            collector,
            stopped: false,
        }
    }

    pub async fn stop(mut self) {
        self.record().await;
        self.stopped = true;
    }

    async fn record(&self) {
        self.collector
            .record_timer(&self.name, self.started.elapsed(), self.tags.clone())
            .await;
    }
}

impl Drop for PerformanceTimer {
    fn drop(&mut self) {
        if !self.stopped {
            let collector = self.collector.clone();
            let name = self.name.clone();
            let tags = self.tags.clone();
            let elapsed = self.started.elapsed();
            tokio::spawn(async move {
                collector.record_timer(&name, elapsed, tags).await;
            });
        }
    }
}
