use std::collections::HashMap;
use std::sync::RwLock;

use once_cell::sync::Lazy;
use tokio_postgres::GenericClient;

use super::StorageError;
use crate::normalize::Source;

// Static reference data; resolved ids are cached for the life of the
// worker instance.
static SOURCE_IDS: Lazy<RwLock<HashMap<Source, i32>>> = Lazy::new(|| RwLock::new(HashMap::new()));

/// Resolve the relational id of a source, cache-through.
///
/// Runs inside whatever client the caller holds, so a batch transaction
/// can resolve the id without a second connection.
pub async fn resolve_source_id<C>(client: &C, source: Source) -> Result<i32, StorageError>
where
    C: GenericClient + Sync,
{
    if let Some(id) = SOURCE_IDS
        .read()
        .ok()
        .and_then(|map| map.get(&source).copied())
    {
        return Ok(id);
    }

    let row = client
        .query_one(
            "INSERT INTO tb.sources (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id",
            &[&source.as_str()],
        )
        .await?;
    let id: i32 = row.get(0);

    if let Ok(mut map) = SOURCE_IDS.write() {
        map.insert(source, id);
    }

    Ok(id)
}
