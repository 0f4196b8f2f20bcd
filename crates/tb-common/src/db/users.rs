use super::{PgPool, StorageError};

pub async fn find_user_id(pool: &PgPool, email: &str) -> Result<Option<i64>, StorageError> {
    let client = pool.get().await?;
    let row = client
        .query_opt("SELECT id FROM tb.users WHERE email = $1", &[&email])
        .await?;
    Ok(row.map(|r| r.get(0)))
}

/// Replace a user's category preference rows in one transaction.
pub async fn replace_preferences(
    pool: &PgPool,
    user_id: i64,
    categories: &[String],
) -> Result<(), StorageError> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    tx.execute(
        "DELETE FROM tb.user_preferences WHERE user_id = $1",
        &[&user_id],
    )
    .await?;

    let stmt = tx
        .prepare(
            "INSERT INTO tb.user_preferences (user_id, tender_category)
             VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .await?;
    for category in categories {
        tx.execute(&stmt, &[&user_id, category]).await?;
    }

    tx.commit().await?;
    Ok(())
}
