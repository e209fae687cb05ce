//! Operational metrics for the dashboard API
//!
//! Each service area defines its own metrics in a dedicated submodule, which
//! keeps ownership clear and prevents naming conflicts. These describe the
//! service's own reads (lines skipped, empty results, scans), not the
//! ingestion data it serves.

pub mod aggregator;
pub mod catalog;
pub mod registry;

pub use aggregator::AggregatorMetrics;
pub use catalog::CatalogMetrics;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register all metrics.
///
/// Idempotent. No HTTP listener is started; the handle is kept so the API
/// router can render `/metrics` in-process.
pub fn init_metrics() {
    INIT.call_once(|| match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if HANDLE.set(handle).is_err() {
                warn!("Prometheus handle was already set");
            }
            registry::register_all_metrics();
            info!("Prometheus recorder installed");
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
        }
    });
}

/// Render the current snapshot in Prometheus text format, if installed.
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for area-specific metric collections
///
/// Each area implements this trait to provide:
/// - Metric registration at startup
/// - Consistent naming conventions
/// - Documentation of what each metric measures
pub trait PhaseMetrics {
    /// Register all metrics for this area so they appear before first use.
    fn register_metrics();

    /// Phase name used as the metric prefix
    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names following `basednews_{phase}_{name}` (counters get `_total`)
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("basednews_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("basednews_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("basednews_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
