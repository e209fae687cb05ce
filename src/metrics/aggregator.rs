//! Ingest metrics aggregator instrumentation
//!
//! Counts how the aggregator's reads of the ingestion counts log went:
//! requests served, lines read or skipped, and why a result came back empty.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct AggregatorMetrics;

/// Why a line of the counts log was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    MissingField,
    BadTimestamp,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Malformed => "malformed",
            SkipReason::MissingField => "missing_field",
            SkipReason::BadTimestamp => "bad_timestamp",
        }
    }
}

/// Why an aggregation produced the empty window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    NonPositiveWindow,
    SourceUnavailable,
    ReadFailed,
    NoEvents,
}

impl EmptyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EmptyReason::NonPositiveWindow => "non_positive_window",
            EmptyReason::SourceUnavailable => "source_unavailable",
            EmptyReason::ReadFailed => "read_failed",
            EmptyReason::NoEvents => "no_events",
        }
    }
}

impl AggregatorMetrics {
    pub fn record_request(duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "aggregator", "requests")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "aggregator", "duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_lines_read(lines: u64) {
        ::metrics::counter!(phase_metric!(counter, "aggregator", "lines_read")).increment(lines);
    }

    pub fn record_line_skipped(reason: SkipReason) {
        ::metrics::counter!(
            phase_metric!(counter, "aggregator", "lines_skipped"),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    pub fn record_empty_result(reason: EmptyReason) {
        ::metrics::counter!(
            phase_metric!(counter, "aggregator", "empty_results"),
            "reason" => reason.as_str()
        )
        .increment(1);
    }

    pub fn record_result(events_retained: usize, series: usize) {
        ::metrics::histogram!(phase_metric!(histogram, "aggregator", "events_retained"))
            .record(events_retained as f64);
        ::metrics::gauge!(phase_metric!(gauge, "aggregator", "last_series_count"))
            .set(series as f64);
    }
}

impl PhaseMetrics for AggregatorMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        // bind to placeholders to satisfy must_use
        let _ = counter!(phase_metric!(counter, "aggregator", "requests"));
        let _ = counter!(phase_metric!(counter, "aggregator", "lines_read"));
        let _ = counter!(phase_metric!(counter, "aggregator", "lines_skipped"));
        let _ = counter!(phase_metric!(counter, "aggregator", "empty_results"));
        let _ = histogram!(phase_metric!(histogram, "aggregator", "duration_seconds"));
        let _ = histogram!(phase_metric!(histogram, "aggregator", "events_retained"));
        let _ = gauge!(phase_metric!(gauge, "aggregator", "last_series_count"));
    }

    fn phase_name() -> &'static str {
        "aggregator"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "aggregator", "requests"),
                metric_type: MetricType::Counter,
                help: "Total number of ingest metrics aggregations served",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "aggregator", "lines_read"),
                metric_type: MetricType::Counter,
                help: "Non-blank lines read from the ingestion counts log",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "aggregator", "lines_skipped"),
                metric_type: MetricType::Counter,
                help: "Lines dropped while parsing the ingestion counts log",
                labels: vec!["reason"],
            },
            MetricDoc {
                name: phase_metric!(counter, "aggregator", "empty_results"),
                metric_type: MetricType::Counter,
                help: "Aggregations that returned an empty window",
                labels: vec!["reason"],
            },
            MetricDoc {
                name: phase_metric!(histogram, "aggregator", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Time spent reading and aggregating the counts log",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "aggregator", "events_retained"),
                metric_type: MetricType::Histogram,
                help: "Events kept after parsing and country filtering",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "aggregator", "last_series_count"),
                metric_type: MetricType::Gauge,
                help: "Number of series in the most recent aggregation",
                labels: vec![],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_labels() {
        let skipped: Vec<&str> = [
            SkipReason::Malformed,
            SkipReason::MissingField,
            SkipReason::BadTimestamp,
        ]
        .into_iter()
        .map(SkipReason::as_str)
        .collect();
        assert_eq!(skipped, ["malformed", "missing_field", "bad_timestamp"]);

        let empty: Vec<&str> = [
            EmptyReason::NonPositiveWindow,
            EmptyReason::SourceUnavailable,
            EmptyReason::ReadFailed,
            EmptyReason::NoEvents,
        ]
        .into_iter()
        .map(EmptyReason::as_str)
        .collect();
        assert_eq!(
            empty,
            ["non_positive_window", "source_unavailable", "read_failed", "no_events"]
        );
    }

    #[test]
    fn test_metrics_documentation() {
        let docs = AggregatorMetrics::metrics_documentation();
        assert_eq!(docs.len(), 7);

        for doc in docs {
            assert!(doc.name.starts_with("basednews_aggregator_"));
        }
    }
}
