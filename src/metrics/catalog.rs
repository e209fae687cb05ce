//! Outlet catalog and status scan metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct CatalogMetrics;

impl CatalogMetrics {
    pub fn record_catalog_load(countries: usize) {
        ::metrics::counter!(phase_metric!(counter, "catalog", "loads")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "catalog", "countries")).set(countries as f64);
    }

    pub fn record_catalog_unavailable() {
        ::metrics::counter!(phase_metric!(counter, "catalog", "loads_unavailable")).increment(1);
    }

    pub fn record_status_scan(articles_latest_run: u64) {
        ::metrics::counter!(phase_metric!(counter, "catalog", "status_scans")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "catalog", "articles_latest_run"))
            .set(articles_latest_run as f64);
    }

    pub fn record_status_error() {
        ::metrics::counter!(phase_metric!(counter, "catalog", "status_errors")).increment(1);
    }
}

impl PhaseMetrics for CatalogMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge};

        let _ = counter!(phase_metric!(counter, "catalog", "loads"));
        let _ = counter!(phase_metric!(counter, "catalog", "loads_unavailable"));
        let _ = counter!(phase_metric!(counter, "catalog", "status_scans"));
        let _ = counter!(phase_metric!(counter, "catalog", "status_errors"));
        let _ = gauge!(phase_metric!(gauge, "catalog", "countries"));
        let _ = gauge!(phase_metric!(gauge, "catalog", "articles_latest_run"));
    }

    fn phase_name() -> &'static str {
        "catalog"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "catalog", "loads"),
                metric_type: MetricType::Counter,
                help: "Outlet catalog loads that found a catalog file",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "loads_unavailable"),
                metric_type: MetricType::Counter,
                help: "Outlet catalog loads that returned an empty catalog",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "status_scans"),
                metric_type: MetricType::Counter,
                help: "Status scans of the data directory",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "catalog", "status_errors"),
                metric_type: MetricType::Counter,
                help: "Status scans that stopped on an error",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "catalog", "countries"),
                metric_type: MetricType::Gauge,
                help: "Countries listed in the most recently loaded catalog",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(gauge, "catalog", "articles_latest_run"),
                metric_type: MetricType::Gauge,
                help: "Articles counted in the latest raw run directory",
                labels: vec![],
            },
        ]
    }
}
