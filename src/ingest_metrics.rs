//! Ingest metrics aggregation
//!
//! Turns the append-only ingestion counts log (`metrics/ingest_counts.jsonl`,
//! one JSON object per line, written by the feed ingester after each run)
//! into a dense day-by-series matrix for the dashboard:
//!
//! - the window is the `days` consecutive UTC calendar days ending at the most
//!   recent date seen among the retained events, oldest first;
//! - every (country, outlet) series carries exactly one count per window day,
//!   zero-filled where nothing was ingested;
//! - a missing log, a non-positive window or an empty event set all produce
//!   the same empty response, which the dashboard reads as "no data yet".
//!
//! Bad lines never abort a read: each line is parsed on its own and dropped
//! if it is malformed, lacks a required field, or has an unparseable
//! timestamp.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::data_paths::{first_existing, DataPaths, INGEST_COUNTS_FILE};
use crate::metrics::aggregator::{AggregatorMetrics, EmptyReason, SkipReason};

/// Default window size used when the caller does not supply one.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

/// One line of the ingestion counts log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEvent {
    pub country: String,
    pub outlet_id: String,
    pub outlet_name: Option<String>,
    pub retrieved_at: DateTime<Utc>,
    pub count: u64,
}

impl IngestEvent {
    /// UTC calendar day the event is bucketed into.
    pub fn date(&self) -> NaiveDate {
        self.retrieved_at.date_naive()
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey {
            country: self.country.clone(),
            outlet_id: self.outlet_id.clone(),
        }
    }
}

/// Identifies one output row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub country: String,
    pub outlet_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSeries {
    pub country: String,
    pub outlet_id: String,
    pub outlet_name: Option<String>,
    /// One entry per window day, oldest first.
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestMetricsResponse {
    /// ISO dates (`YYYY-MM-DD`) of the window, oldest first.
    pub days: Vec<String>,
    pub series: Vec<IngestSeries>,
}

impl IngestMetricsResponse {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.series.is_empty()
    }
}

/// Consecutive calendar days ending at an anchor date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    days: Vec<NaiveDate>,
}

impl DateWindow {
    /// The `size` days ending at and including `anchor`, oldest first.
    ///
    /// `None` for a zero size or when the start would fall outside the
    /// representable calendar.
    pub fn ending_at(anchor: NaiveDate, size: usize) -> Option<Self> {
        let span = u64::try_from(size.checked_sub(1)?).ok()?;
        let start = anchor.checked_sub_days(Days::new(span))?;
        let days: Vec<NaiveDate> = start.iter_days().take(size).collect();
        Some(Self { days })
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.days.first().copied()
    }

    /// Position of `date` in the window, if it falls inside it.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start()?).num_days();
        usize::try_from(offset).ok().filter(|&i| i < self.days.len())
    }

    pub fn labels(&self) -> Vec<String> {
        self.days.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect()
    }
}

/// Case-insensitive country match. Blank filters match everything.
///
/// Compares character by character on simple case mappings, so strings
/// whose full case mappings change length (`İ` vs `i̇`) do not match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryFilter {
    folded: Vec<char>,
}

impl CountryFilter {
    pub fn parse(filter: Option<&str>) -> Option<Self> {
        let trimmed = filter?.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self {
            folded: trimmed.chars().map(fold_case).collect(),
        })
    }

    pub fn matches(&self, country: &str) -> bool {
        country.chars().map(fold_case).eq(self.folded.iter().copied())
    }
}

/// Lowercase of the uppercase of `c`, using single-char mappings only.
fn fold_case(c: char) -> char {
    let upper = single_mapping(c.to_uppercase()).unwrap_or(c);
    let mut lower = upper.to_lowercase();
    // U+0130 is the only char whose lowercase expands; its simple mapping is the first char
    lower.next().unwrap_or(upper)
}

fn single_mapping(mut mapped: impl Iterator<Item = char>) -> Option<char> {
    let first = mapped.next()?;
    mapped.next().is_none().then_some(first)
}

/// Parse one raw log line.
///
/// Blank lines are filtered out by the caller before this is reached.
pub fn parse_event_line(line: &[u8]) -> Result<IngestEvent, SkipReason> {
    let text = std::str::from_utf8(line).map_err(|_| SkipReason::Malformed)?;
    let value: Value = serde_json::from_str(text.trim()).map_err(|_| SkipReason::Malformed)?;
    let obj = value.as_object().ok_or(SkipReason::Malformed)?;

    let country = text_field(obj, "country");
    let outlet_id = text_field(obj, "outlet_id");
    let retrieved_at = text_field(obj, "retrieved_at");
    let (Some(country), Some(outlet_id), Some(retrieved_at)) = (country, outlet_id, retrieved_at)
    else {
        return Err(SkipReason::MissingField);
    };

    let retrieved_at = DateTime::parse_from_rfc3339(&retrieved_at)
        .map_err(|_| SkipReason::BadTimestamp)?
        .with_timezone(&Utc);

    Ok(IngestEvent {
        country,
        outlet_id,
        outlet_name: text_field(obj, "outlet_name"),
        retrieved_at,
        count: count_field(obj),
    })
}

/// Scalar field as text; `null`, blank, arrays and objects count as absent.
fn text_field(obj: &Map<String, Value>, field: &str) -> Option<String> {
    let text = match obj.get(field)? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn count_field(obj: &Map<String, Value>) -> u64 {
    match obj.get("count") {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.trunc() as u64)
            })
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Parse every line, keeping the events that pass the country filter.
///
/// Returns the retained events and the number of non-blank lines seen.
pub fn collect_events<I, L>(lines: I, filter: Option<&CountryFilter>) -> (Vec<IngestEvent>, u64)
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    let mut events = Vec::new();
    let mut read = 0u64;
    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.as_ref();
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        read += 1;
        match parse_event_line(line) {
            Ok(event) => {
                if filter.map_or(true, |f| f.matches(&event.country)) {
                    events.push(event);
                }
            }
            Err(reason) => {
                debug!(line = idx + 1, reason = reason.as_str(), "skipping ingest counts line");
                AggregatorMetrics::record_line_skipped(reason);
            }
        }
    }
    (events, read)
}

struct SeriesAccumulator {
    outlet_name: Option<String>,
    counts: Vec<u64>,
}

/// Bucket already-filtered events into a window of `window_size` days.
pub fn aggregate(events: &[IngestEvent], window_size: usize) -> IngestMetricsResponse {
    let Some(anchor) = events.iter().map(IngestEvent::date).max() else {
        return IngestMetricsResponse::empty();
    };
    let Some(window) = DateWindow::ending_at(anchor, window_size) else {
        return IngestMetricsResponse::empty();
    };

    let mut by_key: BTreeMap<SeriesKey, SeriesAccumulator> = BTreeMap::new();
    for event in events {
        let Some(idx) = window.index_of(event.date()) else {
            continue;
        };
        let acc = by_key.entry(event.key()).or_insert_with(|| SeriesAccumulator {
            outlet_name: None,
            counts: vec![0; window.len()],
        });
        acc.counts[idx] = acc.counts[idx].saturating_add(event.count);
        // Last non-empty name in scan order wins
        if let Some(name) = &event.outlet_name {
            acc.outlet_name = Some(name.clone());
        }
    }

    let series = by_key
        .into_iter()
        .map(|(key, acc)| IngestSeries {
            country: key.country,
            outlet_id: key.outlet_id,
            outlet_name: acc.outlet_name,
            counts: acc.counts,
        })
        .collect();

    IngestMetricsResponse {
        days: window.labels(),
        series,
    }
}

/// Parse, filter and aggregate raw log lines in one call.
pub fn aggregate_from_lines<I, L>(
    lines: I,
    window_size: i64,
    country_filter: Option<&str>,
) -> IngestMetricsResponse
where
    I: IntoIterator<Item = L>,
    L: AsRef<[u8]>,
{
    let Some(size) = positive_window(window_size) else {
        return IngestMetricsResponse::empty();
    };
    let filter = CountryFilter::parse(country_filter);
    let (events, _) = collect_events(lines, filter.as_ref());
    aggregate(&events, size)
}

fn positive_window(window_size: i64) -> Option<usize> {
    if window_size <= 0 {
        return None;
    }
    usize::try_from(window_size).ok()
}

/// Serves ingest metrics from the first existing counts log candidate.
///
/// Holds no state beyond the candidate list; every call opens its own handle.
#[derive(Debug, Clone)]
pub struct IngestMetricsService {
    candidates: Vec<PathBuf>,
}

impl IngestMetricsService {
    pub fn new(paths: &DataPaths) -> Self {
        Self::with_candidates(paths.candidates(INGEST_COUNTS_FILE))
    }

    pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn get_metrics(&self, days: i64, country: Option<&str>) -> IngestMetricsResponse {
        let started = Instant::now();
        let response = self.compute(days, country);
        AggregatorMetrics::record_request(started.elapsed().as_secs_f64());
        response
    }

    fn compute(&self, days: i64, country: Option<&str>) -> IngestMetricsResponse {
        let Some(path) = first_existing(&self.candidates) else {
            debug!("no ingest counts log found among {} candidates", self.candidates.len());
            return empty_because(EmptyReason::SourceUnavailable);
        };
        let Some(size) = positive_window(days) else {
            return empty_because(EmptyReason::NonPositiveWindow);
        };

        let filter = CountryFilter::parse(country);
        let (events, lines_read) = match read_events(&path, filter.as_ref()) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read ingest counts log");
                return empty_because(EmptyReason::ReadFailed);
            }
        };
        AggregatorMetrics::record_lines_read(lines_read);

        let response = aggregate(&events, size);
        if response.is_empty() {
            return empty_because(EmptyReason::NoEvents);
        }

        AggregatorMetrics::record_result(events.len(), response.series.len());
        info!(
            path = %path.display(),
            days = size,
            country = country.unwrap_or(""),
            lines = lines_read,
            events = events.len(),
            series = response.series.len(),
            "aggregated ingest metrics"
        );
        response
    }
}

fn read_events(
    path: &Path,
    filter: Option<&CountryFilter>,
) -> io::Result<(Vec<IngestEvent>, u64)> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.split(b'\n').collect::<io::Result<Vec<Vec<u8>>>>()?;
    Ok(collect_events(lines, filter))
}

fn empty_because(reason: EmptyReason) -> IngestMetricsResponse {
    AggregatorMetrics::record_empty_result(reason);
    IngestMetricsResponse::empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(country: &str, outlet: &str, at: &str, count: u64) -> String {
        serde_json::json!({
            "country": country,
            "outlet_id": outlet,
            "retrieved_at": at,
            "count": count,
        })
        .to_string()
    }

    #[test]
    fn window_ends_at_anchor_oldest_first() {
        let window = DateWindow::ending_at(date(2024, 3, 1), 3).unwrap();
        assert_eq!(window.labels(), vec!["2024-02-28", "2024-02-29", "2024-03-01"]);
        assert_eq!(window.index_of(date(2024, 2, 29)), Some(1));
        assert_eq!(window.index_of(date(2024, 2, 27)), None);
        assert_eq!(window.index_of(date(2024, 3, 2)), None);
        assert!(DateWindow::ending_at(date(2024, 3, 1), 0).is_none());
    }

    #[test]
    fn window_bounds() {
        let window = DateWindow::ending_at(date(2024, 1, 3), 3).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window.start(), Some(date(2024, 1, 1)));
        assert!(DateWindow::ending_at(NaiveDate::MIN, 2).is_none());
    }

    #[test]
    fn country_filter_folds_per_char() {
        let us = CountryFilter::parse(Some(" us ")).unwrap();
        assert!(us.matches("US"));
        assert!(us.matches("Us"));
        assert!(!us.matches("USA"));

        let dotted_i = CountryFilter::parse(Some("i\u{307}")).unwrap();
        assert!(!dotted_i.matches("\u{130}"));
        assert!(CountryFilter::parse(Some("i")).unwrap().matches("\u{130}"));
        assert!(!CountryFilter::parse(Some("SS")).unwrap().matches("ß"));
        assert!(CountryFilter::parse(Some("ÉIRE")).unwrap().matches("éire"));
        assert!(CountryFilter::parse(Some("   ")).is_none());
        assert!(CountryFilter::parse(None).is_none());
    }

    #[test]
    fn parse_accepts_offsets_and_fractional_seconds() {
        let event = parse_event_line(
            br#"{"country":"DE","outlet_id":"spiegel","outlet_name":"Der Spiegel","retrieved_at":"2024-05-01T23:30:00.123456-02:00","count":4,"error_count":0}"#,
        )
        .unwrap();
        assert_eq!(event.date(), date(2024, 5, 2));
        assert_eq!(event.outlet_name.as_deref(), Some("Der Spiegel"));
        assert_eq!(event.count, 4);
    }

    #[test]
    fn parse_rejects_missing_fields_and_bad_timestamps() {
        assert_eq!(
            parse_event_line(br#"{"country":"US","retrieved_at":"2024-01-01T00:00:00Z"}"#),
            Err(SkipReason::MissingField)
        );
        assert_eq!(
            parse_event_line(br#"{"country":" ","outlet_id":"a","retrieved_at":"2024-01-01T00:00:00Z"}"#),
            Err(SkipReason::MissingField)
        );
        assert_eq!(
            parse_event_line(br#"{"country":"US","outlet_id":"a","retrieved_at":"2024-01-01 00:00"}"#),
            Err(SkipReason::BadTimestamp)
        );
        assert_eq!(
            parse_event_line(br#"{"country":"US","outlet_id":"a","retrieved_at":"2024-01-01T00:00:00"}"#),
            Err(SkipReason::BadTimestamp)
        );
        assert_eq!(parse_event_line(b"{not json"), Err(SkipReason::Malformed));
        assert_eq!(parse_event_line(b"[1,2,3]"), Err(SkipReason::Malformed));
        assert_eq!(parse_event_line(&[0xff, 0xfe, b'{', b'}']), Err(SkipReason::Malformed));
    }

    #[test]
    fn count_is_lenient() {
        let parse = |count: &str| {
            let raw = format!(
                r#"{{"country":"US","outlet_id":"a","retrieved_at":"2024-01-01T00:00:00Z"{}}}"#,
                count
            );
            parse_event_line(raw.as_bytes()).unwrap().count
        };
        assert_eq!(parse(""), 0);
        assert_eq!(parse(r#","count":null"#), 0);
        assert_eq!(parse(r#","count":"12""#), 12);
        assert_eq!(parse(r#","count":"many""#), 0);
        assert_eq!(parse(r#","count":7.9"#), 7);
        assert_eq!(parse(r#","count":-3"#), 0);
    }

    #[test]
    fn numeric_outlet_id_is_taken_as_text() {
        let event = parse_event_line(
            br#"{"country":"US","outlet_id":42,"retrieved_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(event.outlet_id, "42");
    }

    #[test]
    fn aggregates_documented_example() {
        let lines = vec![
            line("US", "a", "2024-01-03T10:00:00Z", 5),
            line("US", "a", "2024-01-03T14:00:00Z", 3),
            line("US", "b", "2024-01-01T00:00:00Z", 2),
        ];
        let response = aggregate_from_lines(&lines, 3, None);
        assert_eq!(response.days, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
        assert_eq!(response.series.len(), 2);
        assert_eq!(response.series[0].outlet_id, "a");
        assert_eq!(response.series[0].counts, vec![0, 0, 8]);
        assert_eq!(response.series[1].outlet_id, "b");
        assert_eq!(response.series[1].counts, vec![2, 0, 0]);
    }

    #[test]
    fn events_before_window_do_not_create_series() {
        let lines = vec![
            line("US", "old", "2023-12-01T00:00:00Z", 9),
            line("US", "new", "2024-01-03T00:00:00Z", 1),
        ];
        let response = aggregate_from_lines(&lines, 2, None);
        assert_eq!(response.days, vec!["2024-01-02", "2024-01-03"]);
        assert_eq!(response.series.len(), 1);
        assert_eq!(response.series[0].outlet_id, "new");
    }

    #[test]
    fn country_filter_is_case_insensitive_and_moves_anchor() {
        let lines = vec![
            line("US", "a", "2024-01-02T00:00:00Z", 1),
            line("FR", "lemonde", "2024-01-05T00:00:00Z", 4),
        ];
        let response = aggregate_from_lines(&lines, 2, Some("us"));
        assert_eq!(response.days, vec!["2024-01-01", "2024-01-02"]);
        assert_eq!(response.series.len(), 1);
        assert_eq!(response.series[0].country, "US");

        assert!(aggregate_from_lines(&lines, 2, Some("de")).is_empty());
        assert_eq!(aggregate_from_lines(&lines, 2, Some("  ")).series.len(), 1);
    }

    #[test]
    fn last_non_empty_outlet_name_wins() {
        let lines = vec![
            r#"{"country":"US","outlet_id":"a","outlet_name":"Old Name","retrieved_at":"2024-01-02T00:00:00Z","count":1}"#,
            r#"{"country":"US","outlet_id":"a","outlet_name":"New Name","retrieved_at":"2024-01-01T00:00:00Z","count":1}"#,
            r#"{"country":"US","outlet_id":"a","outlet_name":"","retrieved_at":"2024-01-02T00:00:00Z","count":1}"#,
            r#"{"country":"US","outlet_id":"b","retrieved_at":"2024-01-02T00:00:00Z","count":1}"#,
        ];
        let response = aggregate_from_lines(lines, 2, None);
        assert_eq!(response.series[0].outlet_name.as_deref(), Some("New Name"));
        assert_eq!(response.series[0].counts, vec![1, 2]);
        assert_eq!(response.series[1].outlet_name, None);
    }

    #[test]
    fn non_positive_window_is_empty() {
        let lines = vec![line("US", "a", "2024-01-03T10:00:00Z", 5)];
        assert!(aggregate_from_lines(&lines, 0, None).is_empty());
        assert!(aggregate_from_lines(&lines, -4, None).is_empty());
    }

    #[test]
    fn blank_and_bad_lines_are_skipped() {
        let lines: Vec<Vec<u8>> = vec![
            b"".to_vec(),
            b"   \r".to_vec(),
            b"garbage".to_vec(),
            br#"{"country":"US","retrieved_at":"2024-01-09T00:00:00Z","count":100}"#.to_vec(),
            line("US", "a", "2024-01-03T10:00:00Z", 5).into_bytes(),
        ];
        let (events, read) = collect_events(&lines, None);
        assert_eq!(read, 3);
        assert_eq!(events.len(), 1);

        // The record without outlet_id must not pull the anchor to 2024-01-09
        let response = aggregate(&events, 1);
        assert_eq!(response.days, vec!["2024-01-03"]);
        assert_eq!(response.series[0].counts, vec![5]);
    }

    #[test]
    fn empty_response_serializes_to_empty_arrays() {
        let json = serde_json::to_value(IngestMetricsResponse::empty()).unwrap();
        assert_eq!(json, serde_json::json!({ "days": [], "series": [] }));
    }
}
