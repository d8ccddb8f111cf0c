//! Counter/gauge/timer collection, system-resource sampling, and a
//! heuristic self-analyzer that turns a metrics summary into findings.

pub mod collector;
pub mod self_analyzer;

pub use collector::{
    Metric, MetricKind, MetricsCollector, MetricsEnvelope, MetricsSummary, PerformanceTimer,
    SystemMetrics, Tags, TimerStats,
};
pub use self_analyzer::{
    analyze_cost, analyze_error_patterns, analyze_resource_usage, analyze_task_performance,
    generate_report, Category, ErrorLogEntry, Finding, Report, ReportSummary, Severity,
};
