use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

use tb_common::config;
use tb_common::db::{create_pool_from_url, run_migrations};
use tb_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use tb_common::publish::HttpTopicPublisher;
use tb_common::queue::{HttpQueueClient, QueueClient};
use tb_common::storage::HttpObjectStore;
use tb_common::timezone;

mod worker;

use worker::IngestWorker;

#[derive(Debug, Parser)]
#[command(
    name = "tb-ingestor",
    about = "Consume object-created events and upsert normalized tenders"
)]
struct Cli {
    /// PostgreSQL connection string (otherwise composed from DB_* vars)
    #[arg(long, env = "DATABASE_URL")]
    db_url: Option<String>,

    /// Ingest queue endpoint
    #[arg(long, env = "INGEST_QUEUE_URL")]
    queue_url: String,

    /// Object store endpoint holding the raw payload bucket
    #[arg(long, env = "OBJECT_STORE_URL")]
    object_store_url: String,

    /// Optional bearer token for the object store
    #[arg(long, env = "OBJECT_STORE_TOKEN")]
    object_store_token: Option<String>,

    /// Notification topic for per-tender messages
    #[arg(long, env = "TENDER_TOPIC_ARN")]
    tender_topic: String,

    /// Messages pulled per receive call
    #[arg(long, env = "TB_INGEST_MAX_MESSAGES", default_value_t = 10)]
    max_messages: usize,

    /// Idle poll interval in seconds when the queue is empty
    #[arg(long, env = "TB_INGEST_POLL_INTERVAL_SECONDS", default_value_t = 10)]
    poll_interval: u64,
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));
    tb_metrics::init_metrics("TB_INGESTOR_METRICS_PORT", 9801);

    let cli = Cli::parse();

    let db_url = match cli.db_url {
        Some(url) => url,
        None => config::database_url().await?,
    };
    let pool = create_pool_from_url(&db_url)?;
    run_migrations(&pool).await?;

    let status = pool.status();
    info!(
        size = status.size,
        available = status.available,
        "created postgres connection pool"
    );

    let store = Arc::new(
        HttpObjectStore::new(cli.object_store_url).with_bearer_token(cli.object_store_token),
    );
    let publisher = Arc::new(HttpTopicPublisher::new(cli.tender_topic));
    let queue = HttpQueueClient::new(cli.queue_url);

    let worker = IngestWorker::new(pool, store, publisher, timezone::local_offset());

    let mut idle = interval(Duration::from_secs(cli.poll_interval.max(1)));
    loop {
        let messages = match queue.receive(cli.max_messages).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "queue receive failed, backing off");
                idle.tick().await;
                continue;
            }
        };

        if messages.is_empty() {
            idle.tick().await;
            continue;
        }

        for message in messages {
            match worker.handle_message(&message.body).await {
                Ok(intents) => {
                    // Publishes happen strictly after every batch in the
                    // message has committed.
                    worker.publish_all(&intents).await;
                    if let Err(err) = queue.delete(&message).await {
                        warn!(message_id = %message.id, error = %err, "failed to ack message");
                    }
                }
                Err(err) => {
                    // Leave the message in place; the queue redelivers
                    // and the upsert is idempotent.
                    error!(message_id = %message.id, error = %err, "ingest failed, awaiting redelivery");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("tb-ingestor failed: {err}");
        std::process::exit(1);
    }
}
