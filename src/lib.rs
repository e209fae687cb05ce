pub mod config;
pub mod data_paths;
pub mod error;
pub mod ingest_metrics;
pub mod logging;
pub mod metrics;
pub mod outlets;
pub mod server;
pub mod status;
