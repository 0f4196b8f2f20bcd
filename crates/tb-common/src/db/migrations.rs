use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;
use tracing::{info, instrument};

use crate::db::{DbPoolError, PgPool};

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("failed to run migration: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to build pool: {0}")]
    PoolBuild(#[from] DbPoolError),
}

struct Migration {
    id: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        description: "core tender schema",
        sql: r#"
CREATE TABLE IF NOT EXISTS tb.sources (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

INSERT INTO tb.sources (name)
VALUES ('eskom'), ('sanral'), ('transnet'), ('etenders')
ON CONFLICT (name) DO NOTHING;

CREATE TABLE IF NOT EXISTS tb.tenders (
    id BIGSERIAL PRIMARY KEY,
    source_id INTEGER NOT NULL REFERENCES tb.sources(id),
    external_id TEXT NOT NULL,
    source_tender_id TEXT,
    title TEXT,
    description TEXT,
    category TEXT,
    location TEXT,
    buyer TEXT,
    procurement_method TEXT,
    procurement_method_details TEXT,
    status TEXT,
    tender_type TEXT,
    published_at TIMESTAMPTZ,
    briefing_at TIMESTAMPTZ,
    tender_start_at TIMESTAMPTZ,
    closing_at TIMESTAMPTZ,
    briefing_venue TEXT,
    briefing_compulsory BOOLEAN,
    briefing_details TEXT,
    value_amount DOUBLE PRECISION,
    value_currency TEXT,
    tender_box_address TEXT,
    target_audience TEXT,
    contract_type TEXT,
    project_type TEXT,
    queries_to TEXT,
    url TEXT,
    hash TEXT NOT NULL,
    last_seen_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (source_id, external_id)
);

CREATE TABLE IF NOT EXISTS tb.documents (
    id BIGSERIAL PRIMARY KEY,
    tender_id BIGINT NOT NULL REFERENCES tb.tenders(id) ON DELETE CASCADE,
    url TEXT,
    name TEXT,
    mime_type TEXT,
    published_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS tb.contacts (
    id BIGSERIAL PRIMARY KEY,
    tender_id BIGINT NOT NULL REFERENCES tb.tenders(id) ON DELETE CASCADE,
    name TEXT,
    email TEXT,
    phone TEXT
);

CREATE TABLE IF NOT EXISTS tb.users (
    id BIGSERIAL PRIMARY KEY,
    email TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS tb.user_preferences (
    user_id BIGINT NOT NULL REFERENCES tb.users(id) ON DELETE CASCADE,
    tender_category TEXT NOT NULL,
    PRIMARY KEY (user_id, tender_category)
);
"#,
    },
    Migration {
        id: 2,
        description: "query-path indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_tenders_closing_at ON tb.tenders(closing_at);
CREATE INDEX IF NOT EXISTS idx_tenders_published_at ON tb.tenders(published_at);
CREATE INDEX IF NOT EXISTS idx_tenders_category ON tb.tenders(category);
CREATE INDEX IF NOT EXISTS idx_tenders_fts ON tb.tenders
    USING GIN (to_tsvector('english', coalesce(title, '') || ' ' || coalesce(description, '')));
CREATE INDEX IF NOT EXISTS idx_documents_tender_id ON tb.documents(tender_id);
CREATE INDEX IF NOT EXISTS idx_contacts_tender_id ON tb.contacts(tender_id);
"#,
    },
];

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    let mut client = pool.get().await?;
    client
        .batch_execute(
            "CREATE SCHEMA IF NOT EXISTS tb;
             CREATE TABLE IF NOT EXISTS tb.schema_migrations (
                id INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
             );",
        )
        .await?;

    for migration in MIGRATIONS {
        let already_applied: bool = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM tb.schema_migrations WHERE id = $1)",
                &[&migration.id],
            )
            .await?
            .get(0);

        if already_applied {
            continue;
        }

        let tx = client.transaction().await?;
        tx.batch_execute(migration.sql).await?;
        tx.execute(
            "INSERT INTO tb.schema_migrations (id, description) VALUES ($1, $2)",
            &[&migration.id, &migration.description],
        )
        .await?;
        tx.commit().await?;

        info!(
            id = migration.id,
            description = migration.description,
            "applied migration"
        );
    }

    Ok(())
}
