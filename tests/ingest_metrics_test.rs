use basednews_api::data_paths::{DataPaths, INGEST_COUNTS_FILE};
use basednews_api::ingest_metrics::IngestMetricsService;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write_log(dir: &Path, lines: &[String]) -> PathBuf {
    let path = dir.join(INGEST_COUNTS_FILE);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, lines.join("\n")).unwrap();
    path
}

fn record(country: &str, outlet: &str, name: Option<&str>, at: &str, count: u64) -> String {
    json!({
        "retrieved_at": at,
        "country": country,
        "outlet_id": outlet,
        "outlet_name": name,
        "count": count,
        "error_count": 0,
        "error_sample": null
    })
    .to_string()
}

#[test]
fn documented_example_from_data_dir() {
    let dir = tempdir().unwrap();
    write_log(
        dir.path(),
        &[
            record("US", "a", Some("Outlet A"), "2024-01-03T10:00:00Z", 5),
            record("US", "a", Some("Outlet A"), "2024-01-03T14:00:00Z", 3),
            record("US", "b", None, "2024-01-01T00:00:00Z", 2),
        ],
    );

    let service = IngestMetricsService::new(&DataPaths::new(dir.path()));
    let response = service.get_metrics(3, None);

    assert_eq!(response.days, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    assert_eq!(response.series.len(), 2);

    let a = response.series.iter().find(|s| s.outlet_id == "a").unwrap();
    assert_eq!(a.country, "US");
    assert_eq!(a.outlet_name.as_deref(), Some("Outlet A"));
    assert_eq!(a.counts, vec![0, 0, 8]);

    let b = response.series.iter().find(|s| s.outlet_id == "b").unwrap();
    assert_eq!(b.outlet_name, None);
    assert_eq!(b.counts, vec![2, 0, 0]);
}

#[test]
fn every_series_matches_window_length() {
    let dir = tempdir().unwrap();
    let mut lines = Vec::new();
    for day in 1..=20 {
        let at = format!("2024-02-{:02}T08:00:00+00:00", day);
        lines.push(record("FR", "lemonde", Some("Le Monde"), &at, day));
        if day % 3 == 0 {
            lines.push(record("fr", "liberation", Some("Libération"), &at, 1));
        }
    }
    write_log(dir.path(), &lines);

    let service = IngestMetricsService::with_candidates(vec![dir.path().join(INGEST_COUNTS_FILE)]);
    let response = service.get_metrics(7, Some("FR"));

    assert_eq!(response.days.len(), 7);
    assert_eq!(response.days.first().unwrap(), "2024-02-14");
    assert_eq!(response.days.last().unwrap(), "2024-02-20");
    for series in &response.series {
        assert_eq!(series.counts.len(), response.days.len());
    }

    let lemonde = response
        .series
        .iter()
        .find(|s| s.outlet_id == "lemonde")
        .unwrap();
    assert_eq!(lemonde.counts, vec![14, 15, 16, 17, 18, 19, 20]);

    // Both "FR" and "fr" pass the filter but stay distinct series keys
    let liberation = response
        .series
        .iter()
        .find(|s| s.outlet_id == "liberation")
        .unwrap();
    assert_eq!(liberation.country, "fr");
    assert_eq!(liberation.counts, vec![0, 1, 0, 0, 1, 0, 0]);
}

#[test]
fn falls_back_to_later_candidates() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nowhere").join(INGEST_COUNTS_FILE);
    let fallback_root = dir.path().join("fallback");
    let log = write_log(
        &fallback_root,
        &[record("US", "a", None, "2024-01-03T10:00:00Z", 1)],
    );

    let service = IngestMetricsService::with_candidates(vec![missing, log]);
    let response = service.get_metrics(1, None);
    assert_eq!(response.days, vec!["2024-01-03"]);
    assert_eq!(response.series[0].counts, vec![1]);
}

#[test]
fn unresolvable_source_is_empty() {
    let dir = tempdir().unwrap();
    let service = IngestMetricsService::with_candidates(vec![dir.path().join("missing.jsonl")]);
    let response = service.get_metrics(7, None);
    assert!(response.days.is_empty());
    assert!(response.series.is_empty());
}

#[test]
fn partial_corruption_only_drops_bad_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ingest_counts.jsonl");
    let mut content = Vec::new();
    content.extend_from_slice(record("US", "a", None, "2024-01-02T00:00:00Z", 4).as_bytes());
    content.extend_from_slice(b"\n{\"country\": \"US\", \"outlet_id\": \n");
    content.extend_from_slice(&[0xc3, 0x28, b'\n']);
    content.extend_from_slice(b"\n\n");
    content.extend_from_slice(
        br#"{"country":"US","outlet_id":"a","retrieved_at":"yesterday","count":99}"#,
    );
    content.push(b'\n');
    content.extend_from_slice(record("US", "a", None, "2024-01-02T12:00:00Z", 1).as_bytes());
    fs::write(&path, content).unwrap();

    let service = IngestMetricsService::with_candidates(vec![path]);
    let response = service.get_metrics(2, None);
    assert_eq!(response.days, vec!["2024-01-01", "2024-01-02"]);
    assert_eq!(response.series.len(), 1);
    assert_eq!(response.series[0].counts, vec![0, 5]);
}

#[test]
fn non_positive_window_and_unmatched_filter_are_empty() {
    let dir = tempdir().unwrap();
    write_log(
        dir.path(),
        &[record("US", "a", None, "2024-01-03T10:00:00Z", 5)],
    );
    let service = IngestMetricsService::new(&DataPaths::new(dir.path()));

    assert!(service.get_metrics(0, None).is_empty());
    assert!(service.get_metrics(-1, Some("US")).is_empty());
    assert!(service.get_metrics(7, Some("GB")).is_empty());
    assert!(!service.get_metrics(7, Some("us")).is_empty());
}

#[test]
fn empty_log_is_empty() {
    let dir = tempdir().unwrap();
    write_log(dir.path(), &[]);
    let service = IngestMetricsService::new(&DataPaths::new(dir.path()));
    assert!(service.get_metrics(7, None).is_empty());
}
