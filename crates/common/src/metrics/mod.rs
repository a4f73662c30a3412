//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with per-stage latency histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all MedRAG metrics
pub const METRICS_PREFIX: &str = "medrag";

/// Histogram buckets for external model calls and whole requests (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
];

/// Pipeline stages that are timed individually
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ner,
    Embedding,
    Index,
    Generation,
    Total,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ner => "ner",
            Stage::Embedding => "embedding",
            Stage::Index => "index",
            Stage::Generation => "generation",
            Stage::Total => "total",
        }
    }
}

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Pipeline metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total queries processed, labelled by outcome"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Latency of each pipeline stage in seconds"
    );

    describe_counter!(
        format!("{}_entity_extraction_degraded_total", METRICS_PREFIX),
        Unit::Count,
        "Entity extractions that fell back to an empty list"
    );

    describe_counter!(
        format!("{}_query_expansions_total", METRICS_PREFIX),
        Unit::Count,
        "Queries rewritten by entity expansion"
    );

    describe_gauge!(
        format!("{}_retrieved_passages", METRICS_PREFIX),
        Unit::Count,
        "Passages selected by MMR for the last query"
    );

    describe_counter!(
        format!("{}_unknown_citation_markers_total", METRICS_PREFIX),
        Unit::Count,
        "Citation markers in generated answers with no matching source"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Times one pipeline stage; records on `finish`
pub struct StageTimer {
    stage: Stage,
    start: Instant,
}

impl StageTimer {
    pub fn start(stage: Stage) -> Self {
        Self {
            stage,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time and return it in milliseconds
    pub fn finish(self, success: bool) -> u64 {
        let elapsed = self.start.elapsed();
        let status = if success { "success" } else { "error" };

        histogram!(
            format!("{}_stage_duration_seconds", METRICS_PREFIX),
            "stage" => self.stage.as_str(),
            "status" => status
        )
        .record(elapsed.as_secs_f64());

        elapsed.as_millis() as u64
    }
}

/// Helper to record the outcome of a whole query
pub fn record_query(outcome: &str) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_degraded_extraction() {
    counter!(format!("{}_entity_extraction_degraded_total", METRICS_PREFIX)).increment(1);
}

pub fn record_expansion() {
    counter!(format!("{}_query_expansions_total", METRICS_PREFIX)).increment(1);
}

pub fn record_retrieved(count: usize) {
    gauge!(format!("{}_retrieved_passages", METRICS_PREFIX)).set(count as f64);
}

pub fn record_unknown_citation_markers(count: usize) {
    counter!(format!("{}_unknown_citation_markers_total", METRICS_PREFIX))
        .increment(count as u64);
}
