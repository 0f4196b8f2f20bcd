use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use tb_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use tb_common::storage::HttpObjectStore;

mod crawl;

use crawl::{
    run_crawl, CrawlConfig, CrawlOutcome, CrawlState, HttpPageFetcher, TimeBudget,
    CONTINUATION_THRESHOLD,
};

#[derive(Debug, Parser)]
#[command(
    name = "tb-fetcher",
    about = "Crawl the national OCDS tender API into the raw object store"
)]
struct Cli {
    /// OCDS releases endpoint
    #[arg(
        long,
        env = "OCDS_API_URL",
        default_value = "https://ocds-api.etenders.gov.za/api/OCDSReleases"
    )]
    api_url: String,

    /// Object store endpoint holding the raw payload bucket
    #[arg(long, env = "OBJECT_STORE_URL")]
    object_store_url: String,

    /// Optional bearer token for the object store
    #[arg(long, env = "OBJECT_STORE_TOKEN")]
    object_store_token: Option<String>,

    /// Bucket raw pages land in
    #[arg(long, env = "BUCKET")]
    bucket: String,

    /// Key prefix for persisted pages
    #[arg(long, env = "PREFIX", default_value = "etenders")]
    prefix: String,

    /// Releases per page
    #[arg(long, env = "PAGE_SIZE", default_value_t = 50)]
    page_size: u32,

    /// First page of this run
    #[arg(long, env = "PAGE_NUMBER", default_value_t = 1)]
    start_page: u32,

    /// Hard bound on pages per crawl
    #[arg(long, env = "MAX_PAGES", default_value_t = 200)]
    max_pages: u32,

    /// Sleep between sequential pages, in milliseconds
    #[arg(long, env = "THROTTLE_MS", default_value_t = 500)]
    throttle_ms: u64,

    /// Fetch up to three pages in flight instead of one at a time
    #[arg(long, env = "USE_CONCURRENT", default_value_t = false)]
    use_concurrent: bool,

    /// Crawl window start date (YYYY-MM-DD)
    #[arg(long, env = "OCDS_DATE_FROM", default_value = "2024-01-01")]
    date_from: String,

    /// Crawl window end date (YYYY-MM-DD)
    #[arg(long, env = "OCDS_DATE_TO", default_value = "2024-03-31")]
    date_to: String,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));
    tb_metrics::init_metrics("TB_FETCHER_METRICS_PORT", 9802);

    let cli = Cli::parse();

    let fetcher = Arc::new(HttpPageFetcher::new(
        cli.api_url,
        cli.page_size,
        cli.date_from,
        cli.date_to,
    ));
    let store = Arc::new(
        HttpObjectStore::new(cli.object_store_url).with_bearer_token(cli.object_store_token),
    );

    let config = CrawlConfig {
        bucket: cli.bucket,
        prefix: cli.prefix,
        max_pages: cli.max_pages,
        throttle: Duration::from_millis(cli.throttle_ms),
        concurrent: cli.use_concurrent,
    };

    // Each pass gets a fresh wall-clock budget; when a pass hands back
    // continuation state the next one picks up where it stopped, exactly
    // like an invocation re-triggering itself near its runtime ceiling.
    let mut state = CrawlState::starting_at(cli.start_page);
    loop {
        let budget = TimeBudget::start(CONTINUATION_THRESHOLD);
        match run_crawl(fetcher.clone(), store.clone(), &config, state, budget).await? {
            CrawlOutcome::Complete(summary) => {
                info!(
                    saved = summary.total_saved,
                    failed = summary.failed_pages.len(),
                    "crawl complete"
                );
                break;
            }
            CrawlOutcome::Continuation(next) => {
                info!(
                    next_page = next.start_page,
                    saved = next.total_saved,
                    "budget reached, self-continuing"
                );
                state = next;
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("tb-fetcher failed: {err}");
        std::process::exit(1);
    }
}
