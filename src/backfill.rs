//! The day-by-day backfill loop.
//!
//! Each date goes through fetch, parse and append. A failure in any step is
//! logged and ends that date only; the loop always moves on to the next
//! date, so a run makes exactly one attempt per date in the window.

use chrono::NaiveDate;
use log::{info, warn};
use uuid::Uuid;

use crate::currency::CurrencyCode;
use crate::date_window::DateWindow;
use crate::error::{AppendError, FetchError, ParseError};
use crate::pacer::Pacer;
use crate::rate_snapshot::RateSnapshot;
use crate::source::RateSource;
use crate::store::RateStore;

/// Terminal state of one date.
#[derive(Debug)]
pub enum DateOutcome {
    Appended { rows: u64, snapshot_date: NaiveDate },
    FetchFailed(FetchError),
    ParseFailed(ParseError),
    AppendFailed(AppendError),
}

/// Counters for a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub attempted: u64,
    pub succeeded: u64,
    pub fetch_failures: u64,
    pub parse_failures: u64,
    pub append_failures: u64,
    pub rows_appended: u64,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            attempted: 0,
            succeeded: 0,
            fetch_failures: 0,
            parse_failures: 0,
            append_failures: 0,
            rows_appended: 0,
        }
    }

    pub fn failed(&self) -> u64 {
        self.fetch_failures + self.parse_failures + self.append_failures
    }

    fn record(&mut self, outcome: &DateOutcome) {
        self.attempted += 1;
        match outcome {
            DateOutcome::Appended { rows, .. } => {
                self.succeeded += 1;
                self.rows_appended += rows;
            }
            DateOutcome::FetchFailed(_) => self.fetch_failures += 1,
            DateOutcome::ParseFailed(_) => self.parse_failures += 1,
            DateOutcome::AppendFailed(_) => self.append_failures += 1,
        }
    }
}

pub struct Backfill<S, T, P> {
    source: S,
    store: T,
    pacer: P,
    base_currency: CurrencyCode,
}

impl<S, T, P> Backfill<S, T, P>
where
    S: RateSource,
    T: RateStore,
    P: Pacer,
{
    pub fn new(source: S, store: T, pacer: P, base_currency: CurrencyCode) -> Self {
        Self {
            source,
            store,
            pacer,
            base_currency,
        }
    }

    /// Processes every date in `window`, oldest first.
    pub async fn run(&mut self, window: &DateWindow) -> RunSummary {
        let mut summary = RunSummary::new(Uuid::new_v4());
        info!(
            "Starting backfill {} from {} to {} ({} dates, base {})",
            summary.run_id,
            window.start(),
            window.end(),
            window.len(),
            self.base_currency
        );

        for date in window.iter() {
            self.pacer.ready().await;

            let outcome = self.process_date(date).await;
            match &outcome {
                DateOutcome::Appended {
                    rows,
                    snapshot_date,
                } => info!("  {}: appended {} rows dated {}", date, rows, snapshot_date),
                DateOutcome::FetchFailed(e) => {
                    warn!("  {}: error fetching data: {} (skipping date)", date, e)
                }
                DateOutcome::ParseFailed(e) => {
                    warn!("  {}: malformed snapshot: {} (skipping date)", date, e)
                }
                DateOutcome::AppendFailed(e) => {
                    warn!("  {}: error loading data: {} (skipping date)", date, e)
                }
            }
            summary.record(&outcome);
        }

        info!(
            "Backfill {} complete: {} attempted, {} succeeded, {} failed \
             (fetch {}, parse {}, append {}), {} rows appended",
            summary.run_id,
            summary.attempted,
            summary.succeeded,
            summary.failed(),
            summary.fetch_failures,
            summary.parse_failures,
            summary.append_failures,
            summary.rows_appended
        );

        summary
    }

    async fn process_date(&mut self, date: NaiveDate) -> DateOutcome {
        info!("Fetching rates for {}...", date);

        let body = match self.source.fetch(date, &self.base_currency).await {
            Ok(body) => body,
            Err(e) => return DateOutcome::FetchFailed(e),
        };

        let snapshot = match RateSnapshot::parse(&body) {
            Ok(snapshot) => snapshot,
            Err(e) => return DateOutcome::ParseFailed(e),
        };

        let records = snapshot.to_records();
        match self.store.append(&records).await {
            Ok(rows) => DateOutcome::Appended {
                rows,
                snapshot_date: snapshot.date,
            },
            Err(e) => DateOutcome::AppendFailed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::pacer::FixedInterval;
    use crate::rate_record::RateRecord;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn window(start: &str, end: &str) -> DateWindow {
        DateWindow::new(date(start), date(end)).unwrap()
    }

    fn snapshot_body(date: &str) -> String {
        format!(r#"{{"amount":1.0,"base":"USD","date":"{date}","rates":{{"EUR":0.92,"JPY":148.5}}}}"#)
    }

    enum Canned {
        Body(String),
        Status(StatusCode),
        Timeout,
    }

    /// Answers from a per-date table; dates not in it get a valid snapshot
    /// dated the requested day.
    #[derive(Default)]
    struct FakeSource {
        canned: HashMap<NaiveDate, Canned>,
        requested: Mutex<Vec<(NaiveDate, String)>>,
    }

    impl FakeSource {
        fn requested(&self) -> Vec<(NaiveDate, String)> {
            self.requested.lock().unwrap().clone()
        }

        fn with(mut self, day: &str, canned: Canned) -> Self {
            self.canned.insert(date(day), canned);
            self
        }
    }

    #[async_trait]
    impl RateSource for FakeSource {
        async fn fetch(
            &self,
            date: NaiveDate,
            base: &CurrencyCode,
        ) -> Result<String, FetchError> {
            self.requested.lock().unwrap().push((date, base.to_string()));
            match self.canned.get(&date) {
                Some(Canned::Body(body)) => Ok(body.clone()),
                Some(Canned::Status(status)) => Err(FetchError::Status(*status)),
                Some(Canned::Timeout) => Err(FetchError::Timeout),
                None => Ok(snapshot_body(&date.format("%Y-%m-%d").to_string())),
            }
        }
    }

    /// Append-only table shared between clones, with optional rejections.
    #[derive(Default, Clone)]
    struct MemoryStore {
        batches: Arc<Mutex<Vec<Vec<RateRecord>>>>,
        reject: Option<NaiveDate>,
    }

    impl MemoryStore {
        fn batches(&self) -> Vec<Vec<RateRecord>> {
            self.batches.lock().unwrap().clone()
        }

        fn row_count(&self) -> usize {
            self.batches().iter().map(Vec::len).sum()
        }
    }

    #[async_trait]
    impl RateStore for MemoryStore {
        async fn append(&mut self, records: &[RateRecord]) -> Result<u64, AppendError> {
            if records.iter().any(|r| Some(r.date) == self.reject) {
                return Err(AppendError::Database(sqlx::Error::PoolTimedOut));
            }
            self.batches.lock().unwrap().push(records.to_vec());
            Ok(records.len() as u64)
        }
    }

    struct NoPacing;

    #[async_trait]
    impl Pacer for NoPacing {
        async fn ready(&mut self) {}
    }

    fn backfill(
        source: FakeSource,
        store: MemoryStore,
    ) -> Backfill<FakeSource, MemoryStore, NoPacing> {
        Backfill::new(source, store, NoPacing, "USD".parse().unwrap())
    }

    #[tokio::test]
    async fn test_one_fetch_per_date_in_order() {
        let mut driver = backfill(FakeSource::default(), MemoryStore::default());
        let summary = driver.run(&window("2023-12-28", "2024-01-03")).await;

        let requested: Vec<NaiveDate> = driver.source.requested().iter().map(|(d, _)| *d).collect();
        let expected: Vec<NaiveDate> = window("2023-12-28", "2024-01-03").iter().collect();
        assert_eq!(requested, expected);
        assert_eq!(requested.len(), 7);
        assert!(driver.source.requested().iter().all(|(_, base)| base == "USD"));

        assert_eq!(summary.attempted, 7);
        assert_eq!(summary.succeeded, 7);
        assert_eq!(summary.failed(), 0);
        assert_eq!(summary.rows_appended, 14);
    }

    #[tokio::test]
    async fn test_server_error_does_not_stop_the_run() {
        let source = FakeSource::default().with(
            "2024-01-02",
            Canned::Status(StatusCode::INTERNAL_SERVER_ERROR),
        );
        let store = MemoryStore::default();
        let mut driver = backfill(source, store.clone());

        let summary = driver.run(&window("2024-01-01", "2024-01-05")).await;

        assert_eq!(driver.source.requested().len(), 5);
        assert_eq!(summary.attempted, 5);
        assert_eq!(summary.succeeded, 4);
        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(store.batches().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_rates_writes_nothing_for_that_date() {
        let source = FakeSource::default().with(
            "2024-01-02",
            Canned::Body(r#"{"amount":1.0,"base":"USD","date":"2024-01-02"}"#.to_string()),
        );
        let store = MemoryStore::default();
        let mut driver = backfill(source, store.clone());

        let summary = driver.run(&window("2024-01-01", "2024-01-03")).await;

        assert_eq!(summary.parse_failures, 1);
        assert_eq!(summary.succeeded, 2);
        assert!(
            store
                .batches()
                .iter()
                .flatten()
                .all(|r| r.date != date("2024-01-02"))
        );
    }

    #[tokio::test]
    async fn test_append_failure_is_isolated() {
        let store = MemoryStore {
            reject: Some(date("2024-01-02")),
            ..Default::default()
        };
        let mut driver = backfill(FakeSource::default(), store.clone());

        let summary = driver.run(&window("2024-01-01", "2024-01-03")).await;

        assert_eq!(summary.append_failures, 1);
        assert_eq!(summary.succeeded, 2);
        let dates: Vec<NaiveDate> = store.batches().iter().map(|b| b[0].date).collect();
        assert_eq!(dates, vec![date("2024-01-01"), date("2024-01-03")]);
    }

    #[tokio::test]
    async fn test_reported_date_is_stored() {
        // 2024-01-06 and 2024-01-07 are a weekend, answered with Friday's rates.
        let source = FakeSource::default()
            .with("2024-01-06", Canned::Body(snapshot_body("2024-01-05")))
            .with("2024-01-07", Canned::Body(snapshot_body("2024-01-05")));
        let store = MemoryStore::default();
        let mut driver = backfill(source, store.clone());

        driver.run(&window("2024-01-05", "2024-01-08")).await;

        let dates: Vec<NaiveDate> = store.batches().iter().map(|b| b[0].date).collect();
        assert_eq!(
            dates,
            vec![
                date("2024-01-05"),
                date("2024-01-05"),
                date("2024-01-05"),
                date("2024-01-08"),
            ]
        );
    }

    #[tokio::test]
    async fn test_rerun_duplicates_rows() {
        let store = MemoryStore::default();
        let range = window("2024-01-01", "2024-01-03");

        backfill(FakeSource::default(), store.clone()).run(&range).await;
        let first = store.row_count();
        assert_eq!(first, 6);

        backfill(FakeSource::default(), store.clone()).run(&range).await;
        assert_eq!(store.row_count(), 2 * first);
    }

    #[tokio::test]
    async fn test_timeout_mid_window() {
        let source = FakeSource::default()
            .with("2024-01-01", Canned::Body(snapshot_body("2024-01-01")))
            .with("2024-01-02", Canned::Timeout)
            .with("2024-01-03", Canned::Body(snapshot_body("2024-01-03")));
        let store = MemoryStore::default();
        let mut driver = backfill(source, store.clone());

        let summary = driver.run(&window("2024-01-01", "2024-01-03")).await;

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.fetch_failures, 1);
        assert_eq!(summary.parse_failures, 0);
        assert_eq!(summary.append_failures, 0);

        let batches = store.batches();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].iter().all(|r| r.date == date("2024-01-01")));
        assert!(batches[1].iter().all(|r| r.date == date("2024-01-03")));
        assert_eq!(
            batches[0],
            vec![
                RateRecord {
                    currency_code: "EUR".parse().unwrap(),
                    rate_vs_usd: 0.92,
                    date: date("2024-01-01"),
                },
                RateRecord {
                    currency_code: "JPY".parse().unwrap(),
                    rate_vs_usd: 148.5,
                    date: date("2024-01-01"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_process_date_outcomes() {
        let source = FakeSource::default()
            .with("2024-01-01", Canned::Status(StatusCode::NOT_FOUND))
            .with("2024-01-02", Canned::Body("not json".to_string()));
        let mut driver = backfill(source, MemoryStore::default());

        assert!(matches!(
            driver.process_date(date("2024-01-01")).await,
            DateOutcome::FetchFailed(FetchError::Status(s)) if s == StatusCode::NOT_FOUND
        ));
        assert!(matches!(
            driver.process_date(date("2024-01-02")).await,
            DateOutcome::ParseFailed(ParseError::Json(_))
        ));
        assert!(matches!(
            driver.process_date(date("2024-01-03")).await,
            DateOutcome::Appended { rows: 2, snapshot_date } if snapshot_date == date("2024-01-03")
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_paced() {
        let mut driver = Backfill::new(
            FakeSource::default(),
            MemoryStore::default(),
            FixedInterval::new(Duration::from_millis(200)),
            "USD".parse().unwrap(),
        );
        let start = tokio::time::Instant::now();

        driver.run(&window("2024-01-01", "2024-01-10")).await;

        // Ten requests, nine gaps.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1800), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1900), "elapsed {:?}", elapsed);
    }
}
