use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use reqwest::StatusCode;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{info, warn};

use tb_common::config::HTTP_REQUEST_TIMEOUT;
use tb_common::storage::ObjectStore;

/// Exponential-ish backoff for transient failures, and the longer waits
/// the API asks for when it rate-limits.
const RETRY_BACKOFF_SECS: [u64; 3] = [5, 10, 20];
const RATE_LIMIT_WAIT_SECS: [u64; 3] = [10, 20, 30];
const MAX_ATTEMPTS: usize = 3;

/// Stop point inside the five-minute run budget. Stopping at 260 s
/// leaves headroom to persist the last page and report continuation
/// state instead of dying mid-page at the hard limit.
pub const CONTINUATION_THRESHOLD: Duration = Duration::from_secs(260);

const CONCURRENT_PAGES: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    threshold: Duration,
}

impl TimeBudget {
    pub fn start(threshold: Duration) -> Self {
        Self {
            started: Instant::now(),
            threshold,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.started.elapsed() >= self.threshold
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// HTTP 404: the page does not exist, the crawl is done.
    #[error("no such page")]
    NoSuchPage,
    /// Transient failures did not clear within the retry budget.
    #[error("retries exhausted: {0}")]
    Exhausted(String),
    /// Non-retriable upstream response.
    #[error("fatal upstream status {0}")]
    Fatal(u16),
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, page: u32) -> Result<String, PageError>;
}

pub struct HttpPageFetcher {
    api_url: String,
    page_size: u32,
    date_from: String,
    date_to: String,
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(api_url: String, page_size: u32, date_from: String, date_to: String) -> Self {
        Self {
            api_url,
            page_size,
            date_from,
            date_to,
            client: reqwest::Client::builder()
                .timeout(HTTP_REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    /// One page with up to three retries: 5/10/20 s backoff on
    /// connection errors and 5xx, 10/20/30 s waits on explicit
    /// rate-limiting, immediate failure on other 4xx.
    async fn fetch(&self, page: u32) -> Result<String, PageError> {
        let mut last_error = String::new();

        for attempt in 0..=MAX_ATTEMPTS {
            let result = self
                .client
                .get(&self.api_url)
                .query(&[
                    ("PageNumber", page.to_string()),
                    ("PageSize", self.page_size.to_string()),
                    ("dateFrom", self.date_from.clone()),
                    ("dateTo", self.date_to.clone()),
                ])
                .send()
                .await;

            let wait = match result {
                Ok(resp) if resp.status().is_success() => {
                    return resp
                        .text()
                        .await
                        .map_err(|e| PageError::Exhausted(e.to_string()));
                }
                Ok(resp) if resp.status() == StatusCode::NOT_FOUND => {
                    return Err(PageError::NoSuchPage);
                }
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    last_error = "rate limited".into();
                    rate_limit_delay(attempt)
                }
                Ok(resp) if resp.status().is_server_error() => {
                    last_error = format!("status {}", resp.status());
                    retry_delay(attempt)
                }
                Ok(resp) => return Err(PageError::Fatal(resp.status().as_u16())),
                Err(err) => {
                    last_error = err.to_string();
                    retry_delay(attempt)
                }
            };

            if attempt == MAX_ATTEMPTS {
                break;
            }
            warn!(page, attempt, error = %last_error, "page fetch failed, retrying");
            sleep(wait).await;
        }

        Err(PageError::Exhausted(last_error))
    }
}

fn retry_delay(attempt: usize) -> Duration {
    let secs = RETRY_BACKOFF_SECS[attempt.min(RETRY_BACKOFF_SECS.len() - 1)];
    Duration::from_secs(secs)
}

fn rate_limit_delay(attempt: usize) -> Duration {
    let secs = RATE_LIMIT_WAIT_SECS[attempt.min(RATE_LIMIT_WAIT_SECS.len() - 1)];
    Duration::from_secs(secs)
}

/// Object key for a persisted page, e.g.
/// `etenders/etenders-p0003-1731412800000.json`.
pub fn page_key(prefix: &str, page: u32, timestamp_ms: i64) -> String {
    format!(
        "{}/etenders-p{:04}-{}.json",
        prefix.trim_end_matches('/'),
        page,
        timestamp_ms
    )
}

/// Where a crawl left off; also the input of a continuation run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CrawlState {
    pub start_page: u32,
    pub total_saved: u32,
    pub failed_pages: Vec<u32>,
}

impl CrawlState {
    pub fn starting_at(page: u32) -> Self {
        Self {
            start_page: page,
            total_saved: 0,
            failed_pages: Vec::new(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum CrawlOutcome {
    /// The crawl ran off the end of the data or hit the page bound.
    Complete(CrawlState),
    /// The time budget expired; resume from the embedded state.
    Continuation(CrawlState),
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub bucket: String,
    pub prefix: String,
    pub max_pages: u32,
    pub throttle: Duration,
    pub concurrent: bool,
}

/// Crawl pages sequentially (default) or three-at-a-time, persisting
/// each page body verbatim before moving on.
pub async fn run_crawl(
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ObjectStore>,
    config: &CrawlConfig,
    state: CrawlState,
    budget: TimeBudget,
) -> Result<CrawlOutcome, tb_common::storage::ObjectStoreError> {
    let mut page = state.start_page;
    let mut saved = state.total_saved;
    let mut failed = state.failed_pages;
    let last_page = config.max_pages;

    while page <= last_page {
        if budget.exhausted() {
            info!(next_page = page, saved, "time budget reached, handing off");
            return Ok(CrawlOutcome::Continuation(CrawlState {
                start_page: page,
                total_saved: saved,
                failed_pages: failed,
            }));
        }

        if config.concurrent {
            let chunk_end = (page + CONCURRENT_PAGES as u32 - 1).min(last_page);
            let mut set = JoinSet::new();
            for p in page..=chunk_end {
                let fetcher = fetcher.clone();
                set.spawn(async move { (p, fetcher.fetch(p).await) });
            }

            let mut finished = false;
            let mut results = Vec::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(result) => results.push(result),
                    Err(err) => warn!(error = %err, "page task panicked"),
                }
            }
            results.sort_by_key(|(p, _)| *p);

            for (p, result) in results {
                match result {
                    Ok(body) => {
                        persist_page(&store, config, p, body).await?;
                        saved += 1;
                    }
                    Err(PageError::NoSuchPage) => {
                        counter!("fetch_pages_total", "outcome" => "missing").increment(1);
                        finished = true;
                    }
                    Err(PageError::Fatal(status)) => {
                        counter!("fetch_pages_total", "outcome" => "fatal").increment(1);
                        warn!(page = p, status, "fatal upstream response");
                        failed.push(p);
                    }
                    Err(PageError::Exhausted(reason)) => {
                        counter!("fetch_pages_total", "outcome" => "failed").increment(1);
                        warn!(page = p, reason = %reason, "page failed after retries");
                        failed.push(p);
                    }
                }
            }

            if finished {
                break;
            }
            page = chunk_end + 1;
        } else {
            match fetcher.fetch(page).await {
                Ok(body) => {
                    persist_page(&store, config, page, body).await?;
                    saved += 1;
                }
                Err(PageError::NoSuchPage) => {
                    counter!("fetch_pages_total", "outcome" => "missing").increment(1);
                    info!(page, "page does not exist, crawl complete");
                    break;
                }
                Err(PageError::Fatal(status)) => {
                    counter!("fetch_pages_total", "outcome" => "fatal").increment(1);
                    warn!(page, status, "fatal upstream response, skipping page");
                    failed.push(page);
                }
                Err(PageError::Exhausted(reason)) => {
                    counter!("fetch_pages_total", "outcome" => "failed").increment(1);
                    warn!(page, reason = %reason, "page failed after retries");
                    failed.push(page);
                }
            }
            page += 1;

            if !config.throttle.is_zero() && page <= last_page {
                sleep(config.throttle).await;
            }
        }
    }

    Ok(CrawlOutcome::Complete(CrawlState {
        start_page: page,
        total_saved: saved,
        failed_pages: failed,
    }))
}

async fn persist_page(
    store: &Arc<dyn ObjectStore>,
    config: &CrawlConfig,
    page: u32,
    body: String,
) -> Result<(), tb_common::storage::ObjectStoreError> {
    let key = page_key(&config.prefix, page, Utc::now().timestamp_millis());
    store.put(&config.bucket, &key, body.into_bytes()).await?;
    counter!("fetch_pages_total", "outcome" => "saved").increment(1);
    info!(page, key = %key, "persisted page");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tb_common::storage::MemoryObjectStore;

    struct ScriptedFetcher {
        responses: Mutex<HashMap<u32, Vec<Result<String, PageError>>>>,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<(u32, Result<String, PageError>)>) -> Self {
            let mut responses: HashMap<u32, Vec<Result<String, PageError>>> = HashMap::new();
            for (page, result) in script {
                responses.entry(page).or_default().push(result);
            }
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for ScriptedFetcher {
        async fn fetch(&self, page: u32) -> Result<String, PageError> {
            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(&page).and_then(|queue| {
                if queue.is_empty() {
                    None
                } else {
                    Some(queue.remove(0))
                }
            }) {
                Some(result) => result,
                None => Err(PageError::NoSuchPage),
            }
        }
    }

    fn config() -> CrawlConfig {
        CrawlConfig {
            bucket: "tenders-raw".into(),
            prefix: "etenders".into(),
            max_pages: 50,
            throttle: Duration::ZERO,
            concurrent: false,
        }
    }

    fn fresh_budget() -> TimeBudget {
        TimeBudget::start(Duration::from_secs(3600))
    }

    #[test]
    fn page_keys_are_zero_padded_under_the_prefix() {
        assert_eq!(
            page_key("etenders", 3, 1731412800000),
            "etenders/etenders-p0003-1731412800000.json"
        );
        assert_eq!(
            page_key("etenders/", 123, 1),
            "etenders/etenders-p0123-1.json"
        );
    }

    #[test]
    fn delays_follow_the_documented_schedules() {
        assert_eq!(retry_delay(0), Duration::from_secs(5));
        assert_eq!(retry_delay(1), Duration::from_secs(10));
        assert_eq!(retry_delay(2), Duration::from_secs(20));
        assert_eq!(retry_delay(9), Duration::from_secs(20));

        assert_eq!(rate_limit_delay(0), Duration::from_secs(10));
        assert_eq!(rate_limit_delay(2), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn crawl_saves_pages_until_the_first_missing_one() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (1, Ok(r#"{"data":[1]}"#.into())),
            (2, Ok(r#"{"data":[2]}"#.into())),
            (3, Err(PageError::NoSuchPage)),
        ]));
        let store = Arc::new(MemoryObjectStore::new());

        let outcome = run_crawl(
            fetcher,
            store.clone(),
            &config(),
            CrawlState::starting_at(1),
            fresh_budget(),
        )
        .await
        .unwrap();

        let CrawlOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(state.total_saved, 2);
        assert!(state.failed_pages.is_empty());

        let keys = store.keys("tenders-raw");
        assert_eq!(keys.len(), 2);
        assert!(keys[0].starts_with("etenders/etenders-p0001-"));
        assert!(keys[0].ends_with(".json"));
        assert!(keys[1].starts_with("etenders/etenders-p0002-"));
    }

    #[tokio::test]
    async fn failed_pages_are_recorded_without_stopping_the_crawl() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (1, Ok("one".into())),
            (2, Err(PageError::Exhausted("boom".into()))),
            (3, Ok("three".into())),
            (4, Err(PageError::NoSuchPage)),
        ]));
        let store = Arc::new(MemoryObjectStore::new());

        let outcome = run_crawl(
            fetcher,
            store.clone(),
            &config(),
            CrawlState::starting_at(1),
            fresh_budget(),
        )
        .await
        .unwrap();

        let CrawlOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(state.total_saved, 2);
        assert_eq!(state.failed_pages, vec![2]);
        assert_eq!(store.keys("tenders-raw").len(), 2);
    }

    #[tokio::test]
    async fn exhausted_budget_reports_continuation_state() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![(7, Ok("unreached".into()))]));
        let store = Arc::new(MemoryObjectStore::new());

        let outcome = run_crawl(
            fetcher,
            store.clone(),
            &config(),
            CrawlState {
                start_page: 7,
                total_saved: 6,
                failed_pages: vec![3],
            },
            TimeBudget::start(Duration::ZERO),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            CrawlOutcome::Continuation(CrawlState {
                start_page: 7,
                total_saved: 6,
                failed_pages: vec![3],
            })
        );
        assert!(store.keys("tenders-raw").is_empty());
    }

    #[tokio::test]
    async fn max_pages_bounds_the_crawl() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (1, Ok("a".into())),
            (2, Ok("b".into())),
            (3, Ok("c".into())),
        ]));
        let store = Arc::new(MemoryObjectStore::new());
        let mut config = config();
        config.max_pages = 2;

        let outcome = run_crawl(
            fetcher,
            store.clone(),
            &config,
            CrawlState::starting_at(1),
            fresh_budget(),
        )
        .await
        .unwrap();

        let CrawlOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(state.total_saved, 2);
        assert_eq!(store.keys("tenders-raw").len(), 2);
    }

    #[tokio::test]
    async fn concurrent_mode_has_all_settled_semantics() {
        let fetcher = Arc::new(ScriptedFetcher::new(vec![
            (1, Ok("a".into())),
            (2, Err(PageError::Exhausted("boom".into()))),
            (3, Ok("c".into())),
            (4, Err(PageError::NoSuchPage)),
        ]));
        let store = Arc::new(MemoryObjectStore::new());
        let mut config = config();
        config.concurrent = true;

        let outcome = run_crawl(
            fetcher,
            store.clone(),
            &config,
            CrawlState::starting_at(1),
            fresh_budget(),
        )
        .await
        .unwrap();

        let CrawlOutcome::Complete(state) = outcome else {
            panic!("expected completion");
        };
        // One failure inside the chunk does not sink its siblings.
        assert_eq!(state.total_saved, 2);
        assert_eq!(state.failed_pages, vec![2]);
    }
}
