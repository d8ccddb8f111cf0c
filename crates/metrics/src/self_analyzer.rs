//! Self-Analyzer (C10): stateless heuristic rules over a metrics summary
//! and error-log groups, producing categorized findings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::collector::MetricsSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Performance,
    Reliability,
    Resources,
    Cost,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub recommendations: Vec<String>,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub error_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub by_severity: HashMap<String, usize>,
    pub by_category: HashMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub timestamp: DateTime<Utc>,
    pub summary: ReportSummary,
    pub findings: Vec<Finding>,
}

fn finding(
    category: Category,
    severity: Severity,
    title: impl Into<String>,
    description: impl Into<String>,
    recommendations: Vec<String>,
    data: serde_json::Value,
) -> Finding {
    Finding {
        category,
        severity,
        title: title.into(),
        description: description.into(),
        recommendations,
        data,
        timestamp: Utc::now(),
    }
}

/// Flag `task.*` timers with `mean > 30s` as slow, and timers with
/// `count > 10` and `(max-min)/mean > 2` as inconsistent.
pub fn analyze_task_performance(summary: &MetricsSummary) -> Vec<Finding> {
    let mut findings = Vec::new();
    for (name, stats) in &summary.timers {
        if !name.contains("task.") {
            continue;
        }
        let mean_secs = stats.mean / 1000.0;
        if mean_secs > 30.0 {
            findings.push(finding(
                Category::Performance,
                Severity::Warning,
                format!("Slow task detected: {name}"),
                format!("Mean duration {mean_secs:.1}s exceeds 30s threshold"),
                vec![
                    "profile the task's critical path".to_string(),
                    "consider caching or batching".to_string(),
                    "check for upstream latency".to_string(),
                ],
                serde_json::json!({ "mean_ms": stats.mean }),
            ));
        }
        if stats.count > 10 && stats.mean > 0.0 {
            let spread = (stats.max - stats.min) / stats.mean;
            if spread > 2.0 {
                findings.push(finding(
                    Category::Performance,
                    Severity::Info,
                    format!("Inconsistent task performance: {name}"),
                    format!("Spread ratio {spread:.2} across {} samples", stats.count),
                    vec!["investigate variance in downstream dependencies".to_string()],
                    serde_json::json!({ "min_ms": stats.min, "max_ms": stats.max, "count": stats.count }),
                ));
            }
        }
    }
    findings
}

/// Group error logs by `error_type`; flag groups with count > 3 as
/// warning, > 10 as error.
pub fn analyze_error_patterns(error_logs: &[ErrorLogEntry]) -> Vec<Finding> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for entry in error_logs {
        *counts.entry(entry.error_type.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 3)
        .map(|(error_type, count)| {
            let severity = if count > 10 { Severity::Error } else { Severity::Warning };
            finding(
                Category::Reliability,
                severity,
                format!("Recurring error: {error_type}"),
                format!("Seen {count} times"),
                vec!["inspect recent deploys".to_string(), "check upstream health".to_string()],
                serde_json::json!({ "error_type": error_type, "count": count }),
            )
        })
        .collect()
}

/// Flag `system.cpu_percent`/`system.memory_percent` gauges past
/// warning/error thresholds.
pub fn analyze_resource_usage(summary: &MetricsSummary) -> Vec<Finding> {
    let mut findings = Vec::new();
    if let Some(&cpu) = summary.gauges.get("system.cpu_percent") {
        if cpu > 95.0 {
            findings.push(finding(
                Category::Resources,
                Severity::Error,
                "High CPU usage detected",
                format!("CPU at {cpu:.1}%"),
                vec!["scale out workers".to_string(), "throttle background loops".to_string()],
                serde_json::json!({ "cpu_percent": cpu }),
            ));
        } else if cpu > 80.0 {
            findings.push(finding(
                Category::Resources,
                Severity::Warning,
                "High CPU usage detected",
                format!("CPU at {cpu:.1}%"),
                vec!["scale out workers".to_string()],
                serde_json::json!({ "cpu_percent": cpu }),
            ));
        }
    }
    if let Some(&mem) = summary.gauges.get("system.memory_percent") {
        if mem > 95.0 {
            findings.push(finding(
                Category::Resources,
                Severity::Error,
                "High memory usage detected",
                format!("Memory at {mem:.1}%"),
                vec!["free caches".to_string(), "restart leaking workers".to_string()],
                serde_json::json!({ "memory_percent": mem }),
            ));
        } else if mem > 85.0 {
            findings.push(finding(
                Category::Resources,
                Severity::Warning,
                "High memory usage detected",
                format!("Memory at {mem:.1}%"),
                vec!["free caches".to_string()],
                serde_json::json!({ "memory_percent": mem }),
            ));
        }
    }
    findings
}

/// Flag `avg_tokens_per_request` above 4000 as a cost warning.
pub fn analyze_cost(avg_tokens_per_request: f64) -> Vec<Finding> {
    if avg_tokens_per_request > 4000.0 {
        vec![finding(
            Category::Cost,
            Severity::Warning,
            "High token usage",
            format!("Average {avg_tokens_per_request:.0} tokens per request"),
            vec!["trim prompt context".to_string(), "cache repeated completions".to_string()],
            serde_json::json!({ "avg_tokens_per_request": avg_tokens_per_request }),
        )]
    } else {
        vec![]
    }
}

pub fn generate_report(findings: Vec<Finding>) -> Report {
    let mut by_severity = HashMap::new();
    let mut by_category = HashMap::new();
    for f in &findings {
        *by_severity.entry(format!("{:?}", f.severity).to_lowercase()).or_insert(0) += 1;
        *by_category.entry(format!("{:?}", f.category).to_lowercase()).or_insert(0) += 1;
    }
    Report {
        timestamp: Utc::now(),
        summary: ReportSummary {
            total: findings.len(),
            by_severity,
            by_category,
        },
        findings,
    }
}
