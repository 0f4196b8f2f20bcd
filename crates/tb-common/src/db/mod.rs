pub mod migrations;
pub mod pool;
pub mod sources;
pub mod tenders;
pub mod users;

use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool_from_url, create_pool_with, DbPoolError, PgPool, PoolSettings};
pub use sources::resolve_source_id;
pub use tenders::{
    fetch_contacts, fetch_documents, fetch_tender, list_tenders, replace_contacts,
    replace_documents, upsert_tender, ContactRow, DocumentRow, SortField, SortOrder,
    TenderDetail, TenderFilters, TenderPage, TenderSummary,
};
pub use users::{find_user_id, replace_preferences};

/// Shared error for relational operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
}
