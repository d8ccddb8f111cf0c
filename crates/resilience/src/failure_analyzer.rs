//! Failure Analyzer (C4): bounded ring of failure records, pattern
//! detection, root-cause inference and templated recommendations.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error_kind::ErrorKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub timestamp: DateTime<Utc>,
    pub operation_name: String,
    pub error_kind: ErrorKind,
    pub error_message: String,
    pub context_digest: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pattern {
    RepeatingError,
    UnstableService,
    Cascading,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnalysis {
    pub pattern: Pattern,
    pub root_cause: String,
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

pub struct FailureAnalyzerConfig {
    pub max_records: usize,
    pub retention: ChronoDuration,
    pub pattern_threshold: usize,
    pub cascade_window: ChronoDuration,
}

impl Default for FailureAnalyzerConfig {
    fn default() -> Self {
        Self {
            max_records: 1000,
            retention: ChronoDuration::hours(24),
            pattern_threshold: 3,
            cascade_window: ChronoDuration::seconds(60),
        }
    }
}

pub struct FailureAnalyzer {
    config: FailureAnalyzerConfig,
    records: Arc<RwLock<VecDeque<FailureRecord>>>,
}

impl FailureAnalyzer {
    pub fn new(config: FailureAnalyzerConfig) -> Self {
        Self {
            config,
            records: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub async fn record_failure(
        &self,
        operation_name: impl Into<String>,
        error_kind: ErrorKind,
        error_message: impl Into<String>,
        context_digest: Option<String>,
    ) -> FailureRecord {
        let record = FailureRecord {
            timestamp: Utc::now(),
            operation_name: operation_name.into(),
            error_kind,
            error_message: error_message.into(),
            context_digest,
        };
        let mut records = self.records.write().await;
        self.evict_expired(&mut records);
        if records.len() >= self.config.max_records {
            records.pop_front();
        }
        records.push_back(record.clone());
        record
    }

    fn evict_expired(&self, records: &mut VecDeque<FailureRecord>) {
        let cutoff = Utc::now() - self.config.retention;
        while let Some(front) = records.front() {
            if front.timestamp < cutoff {
                records.pop_front();
            } else {
                break;
            }
        }
    }

    pub async fn total_failures(&self) -> usize {
        let mut records = self.records.write().await;
        self.evict_expired(&mut records);
        records.len()
    }

    pub async fn is_repeating_error(&self, kind: ErrorKind, operation_name: &str) -> bool {
        let records = self.records.read().await;
        records
            .iter()
            .filter(|r| r.operation_name == operation_name && r.error_kind == kind)
            .count()
            >= self.config.pattern_threshold
    }

    /// Scan all in-memory failures (no window argument; the ring's own
    /// retention bounds what's visible).
    pub async fn analyze_pattern(&self) -> PatternAnalysis {
        let records = self.records.read().await;
        if records.is_empty() {
            return PatternAnalysis {
                pattern: Pattern::None,
                root_cause: "no_failures".into(),
                confidence: 0.0,
                recommendations: vec![],
            };
        }

        // REPEATING_ERROR: same (operation, kind) pair seen >= threshold times.
        let mut by_op_kind: HashMap<(String, ErrorKind), usize> = HashMap::new();
        for r in records.iter() {
            *by_op_kind
                .entry((r.operation_name.clone(), r.error_kind))
                .or_insert(0) += 1;
        }
        if let Some(((op, kind), count)) = by_op_kind
            .iter()
            .filter(|(_, c)| **c >= self.config.pattern_threshold)
            .max_by_key(|(_, c)| **c)
        {
            let confidence = (*count as f64 / records.len() as f64).min(1.0);
            return PatternAnalysis {
                pattern: Pattern::RepeatingError,
                root_cause: root_cause_for(*kind),
                confidence,
                recommendations: recommendations_for(Pattern::RepeatingError, *kind, op),
            };
        }

        // UNSTABLE_SERVICE: one operation spans >= 3 distinct error kinds.
        let mut kinds_per_op: HashMap<&str, HashSet<ErrorKind>> = HashMap::new();
        for r in records.iter() {
            kinds_per_op
                .entry(r.operation_name.as_str())
                .or_default()
                .insert(r.error_kind);
        }
        if let Some((op, kinds)) = kinds_per_op.iter().find(|(_, k)| k.len() >= 3) {
            let dominant = dominant_kind(records.iter().filter(|r| r.operation_name == *op));
            return PatternAnalysis {
                pattern: Pattern::UnstableService,
                root_cause: root_cause_for(dominant),
                confidence: (kinds.len() as f64 / 8.0).min(1.0),
                recommendations: recommendations_for(Pattern::UnstableService, dominant, op),
            };
        }

        // CASCADING: >= 3 distinct operations with distinct kinds within the window.
        let window_start = Utc::now() - self.config.cascade_window;
        let recent: Vec<&FailureRecord> = records
            .iter()
            .filter(|r| r.timestamp >= window_start)
            .collect();
        let distinct_ops: HashSet<&str> = recent.iter().map(|r| r.operation_name.as_str()).collect();
        let distinct_kinds: HashSet<ErrorKind> = recent.iter().map(|r| r.error_kind).collect();
        if distinct_ops.len() >= 3 && distinct_kinds.len() >= 2 {
            let dominant = dominant_kind(recent.into_iter());
            return PatternAnalysis {
                pattern: Pattern::Cascading,
                root_cause: root_cause_for(dominant),
                confidence: (distinct_ops.len() as f64 / 8.0).min(1.0),
                recommendations: recommendations_for(Pattern::Cascading, dominant, "multiple operations"),
            };
        }

        let dominant = dominant_kind(records.iter());
        PatternAnalysis {
            pattern: Pattern::None,
            root_cause: root_cause_for(dominant),
            confidence: 0.1,
            recommendations: vec![],
        }
    }
}

fn dominant_kind<'a>(records: impl Iterator<Item = &'a FailureRecord>) -> ErrorKind {
    let mut counts: HashMap<ErrorKind, usize> = HashMap::new();
    for r in records {
        *counts.entry(r.error_kind).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|(_, c)| *c)
        .map(|(k, _)| k)
        .unwrap_or(ErrorKind::Unknown)
}

fn root_cause_for(kind: ErrorKind) -> String {
    match kind {
        ErrorKind::Network | ErrorKind::Timeout => "network_connectivity",
        ErrorKind::RateLimit => "rate_limiting",
        ErrorKind::Authentication => "authentication_failure",
        ErrorKind::ServerError => "upstream_instability",
        ErrorKind::ResourceExhausted => "resource_exhaustion",
        ErrorKind::ClientError | ErrorKind::InvalidInput => "client_misuse",
        _ => "unknown",
    }
    .to_string()
}

fn recommendations_for(pattern: Pattern, kind: ErrorKind, subject: &str) -> Vec<String> {
    let mut recs = match kind {
        ErrorKind::Network | ErrorKind::Timeout => {
            vec!["check network".to_string(), "try alternative transport".to_string()]
        }
        ErrorKind::RateLimit => vec!["back off".to_string(), "spread load".to_string()],
        ErrorKind::Authentication => {
            vec!["verify credentials".to_string(), "rotate api key".to_string()]
        }
        ErrorKind::ServerError => vec![
            "check upstream status page".to_string(),
            "consider an alternative strategy".to_string(),
        ],
        ErrorKind::ResourceExhausted => {
            vec!["free resources".to_string(), "scale capacity".to_string()]
        }
        _ => vec!["investigate logs".to_string()],
    };
    match pattern {
        Pattern::UnstableService => recs.push(format!("monitor '{subject}' closely")),
        Pattern::Cascading => recs.push("consider a broader circuit trip".to_string()),
        _ => {}
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_increase_total_failures_by_one() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        assert_eq!(analyzer.total_failures().await, 0);
        analyzer
            .record_failure("op", ErrorKind::Network, "timeout", None)
            .await;
        assert_eq!(analyzer.total_failures().await, 1);
        analyzer
            .record_failure("op", ErrorKind::Network, "timeout", None)
            .await;
        assert_eq!(analyzer.total_failures().await, 2);
    }

    #[tokio::test]
    async fn detects_repeating_error() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        for _ in 0..3 {
            analyzer
                .record_failure("http_fetch", ErrorKind::Network, "timeout", None)
                .await;
        }
        let analysis = analyzer.analyze_pattern().await;
        assert_eq!(analysis.pattern, Pattern::RepeatingError);
        assert_eq!(analysis.root_cause, "network_connectivity");
        assert!(analysis.recommendations.contains(&"check network".to_string()));
    }

    #[tokio::test]
    async fn detects_unstable_service() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        analyzer
            .record_failure("llm_call", ErrorKind::Network, "timeout", None)
            .await;
        analyzer
            .record_failure("llm_call", ErrorKind::RateLimit, "429", None)
            .await;
        analyzer
            .record_failure("llm_call", ErrorKind::ServerError, "503", None)
            .await;
        let analysis = analyzer.analyze_pattern().await;
        assert_eq!(analysis.pattern, Pattern::UnstableService);
    }

    #[tokio::test]
    async fn detects_cascading_failures() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        analyzer
            .record_failure("op_a", ErrorKind::Network, "timeout", None)
            .await;
        analyzer
            .record_failure("op_b", ErrorKind::RateLimit, "429", None)
            .await;
        analyzer
            .record_failure("op_c", ErrorKind::ServerError, "503", None)
            .await;
        let analysis = analyzer.analyze_pattern().await;
        assert_eq!(analysis.pattern, Pattern::Cascading);
    }

    #[tokio::test]
    async fn no_pattern_below_thresholds() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        analyzer
            .record_failure("op_a", ErrorKind::Network, "timeout", None)
            .await;
        let analysis = analyzer.analyze_pattern().await;
        assert_eq!(analysis.pattern, Pattern::None);
    }

    #[tokio::test]
    async fn is_repeating_error_matches_threshold() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig::default());
        for _ in 0..2 {
            analyzer
                .record_failure("op", ErrorKind::Timeout, "timeout", None)
                .await;
        }
        assert!(!analyzer.is_repeating_error(ErrorKind::Timeout, "op").await);
        analyzer
            .record_failure("op", ErrorKind::Timeout, "timeout", None)
            .await;
        assert!(analyzer.is_repeating_error(ErrorKind::Timeout, "op").await);
    }

    #[tokio::test]
    async fn ring_evicts_oldest_when_full() {
        let analyzer = FailureAnalyzer::new(FailureAnalyzerConfig {
            max_records: 2,
            ..FailureAnalyzerConfig::default()
        });
        analyzer
            .record_failure("op", ErrorKind::Network, "1", None)
            .await;
        analyzer
            .record_failure("op", ErrorKind::Network, "2", None)
            .await;
        analyzer
            .record_failure("op", ErrorKind::Network, "3", None)
            .await;
        assert_eq!(analyzer.total_failures().await, 2);
    }
}
