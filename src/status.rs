//! Data directory status for the dashboard header.
//!
//! Reports catalog size and the article counts of the latest raw run
//! (`raw/YYYYMMDD/<outlet>.jsonl`, one article per line). Failures are
//! reported in the `error` field alongside whatever was gathered before them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::warn;

use crate::error::Result;
use crate::metrics::CatalogMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutletCount {
    pub outlet_id: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub country_count: usize,
    pub outlet_count: usize,
    pub latest_ingest_date: Option<String>,
    pub articles_latest_run: u64,
    pub outlets_latest_run: Vec<OutletCount>,
    pub data_dir: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusService {
    data_dir: PathBuf,
}

impl StatusService {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn get_status(&self) -> StatusResponse {
        let mut status = StatusResponse {
            data_dir: self.data_dir.display().to_string(),
            ..Default::default()
        };

        if let Err(e) = self.scan(&mut status) {
            warn!(data_dir = %self.data_dir.display(), error = %e, "status scan failed");
            CatalogMetrics::record_status_error();
            status.error = Some(e.to_string());
        }

        status
            .outlets_latest_run
            .sort_by(|a, b| a.outlet_id.cmp(&b.outlet_id));
        CatalogMetrics::record_status_scan(status.articles_latest_run);
        status
    }

    fn scan(&self, status: &mut StatusResponse) -> Result<()> {
        let outlets_path = self.data_dir.join("outlets.json");
        if outlets_path.exists() {
            let root: Value = serde_json::from_str(&fs::read_to_string(&outlets_path)?)?;
            if let Some(countries) = root.get("countries").and_then(Value::as_object) {
                status.country_count = countries.len();
                status.outlet_count = countries
                    .values()
                    .filter_map(Value::as_array)
                    .map(Vec::len)
                    .sum();
            }
        }

        let raw_dir = self.data_dir.join("raw");
        status.latest_ingest_date = find_latest_run(&raw_dir)?;
        let Some(latest) = status.latest_ingest_date.as_deref() else {
            return Ok(());
        };

        let latest_dir = raw_dir.join(latest);
        for entry in fs::read_dir(&latest_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            let count = count_lines(&path)?;
            let outlet_id = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            status.outlets_latest_run.push(OutletCount { outlet_id, count });
            status.articles_latest_run += count;
        }
        Ok(())
    }
}

fn run_dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{8}$").expect("valid run directory regex"))
}

/// Greatest `YYYYMMDD` directory name under `raw_dir`, if any.
pub fn find_latest_run(raw_dir: &Path) -> Result<Option<String>> {
    if !raw_dir.is_dir() {
        return Ok(None);
    }
    let mut latest: Option<String> = None;
    for entry in fs::read_dir(raw_dir)? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if run_dir_pattern().is_match(&name) && latest.as_ref().map_or(true, |l| name > *l) {
            latest = Some(name);
        }
    }
    Ok(latest)
}

/// Number of lines, counting a trailing line without a newline.
pub fn count_lines(path: &Path) -> Result<u64> {
    let reader = BufReader::new(File::open(path)?);
    let mut count = 0;
    for line in reader.split(b'\n') {
        line?;
        count += 1;
    }
    Ok(count)
}
