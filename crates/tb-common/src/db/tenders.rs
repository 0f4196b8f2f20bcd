use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::{GenericClient, Row};

use super::{PgPool, StorageError};
use crate::normalize::{ContactRecord, DocumentRecord, TenderRecord};

/// Canonical upsert keyed on `(source_id, external_id)`.
///
/// Every mutable column is overwritten and `last_seen_at` advances even
/// when nothing else changed; the hash column is written for
/// observability, the upsert never gates on it.
const UPSERT_TENDER_SQL: &str = "\
INSERT INTO tb.tenders (
    source_id, external_id, source_tender_id, title, description,
    category, location, buyer, procurement_method, procurement_method_details,
    status, tender_type, published_at, briefing_at, tender_start_at,
    closing_at, briefing_venue, briefing_compulsory, briefing_details,
    value_amount, value_currency, tender_box_address, target_audience,
    contract_type, project_type, queries_to, url, hash
) VALUES (
    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
    $11, $12, $13, $14, $15, $16, $17, $18, $19, $20,
    $21, $22, $23, $24, $25, $26, $27, $28
)
ON CONFLICT (source_id, external_id) DO UPDATE SET
    source_tender_id = EXCLUDED.source_tender_id,
    title = EXCLUDED.title,
    description = EXCLUDED.description,
    category = EXCLUDED.category,
    location = EXCLUDED.location,
    buyer = EXCLUDED.buyer,
    procurement_method = EXCLUDED.procurement_method,
    procurement_method_details = EXCLUDED.procurement_method_details,
    status = EXCLUDED.status,
    tender_type = EXCLUDED.tender_type,
    published_at = EXCLUDED.published_at,
    briefing_at = EXCLUDED.briefing_at,
    tender_start_at = EXCLUDED.tender_start_at,
    closing_at = EXCLUDED.closing_at,
    briefing_venue = EXCLUDED.briefing_venue,
    briefing_compulsory = EXCLUDED.briefing_compulsory,
    briefing_details = EXCLUDED.briefing_details,
    value_amount = EXCLUDED.value_amount,
    value_currency = EXCLUDED.value_currency,
    tender_box_address = EXCLUDED.tender_box_address,
    target_audience = EXCLUDED.target_audience,
    contract_type = EXCLUDED.contract_type,
    project_type = EXCLUDED.project_type,
    queries_to = EXCLUDED.queries_to,
    url = EXCLUDED.url,
    hash = EXCLUDED.hash,
    last_seen_at = NOW()
RETURNING id";

pub async fn upsert_tender<C>(
    client: &C,
    source_id: i32,
    tender: &TenderRecord,
) -> Result<i64, StorageError>
where
    C: GenericClient + Sync,
{
    let stmt = client.prepare(UPSERT_TENDER_SQL).await?;
    let row = client
        .query_one(
            &stmt,
            &[
                &source_id,
                &tender.external_id,
                &tender.source_tender_id,
                &tender.title,
                &tender.description,
                &tender.category,
                &tender.location,
                &tender.buyer,
                &tender.procurement_method,
                &tender.procurement_method_details,
                &tender.status,
                &tender.tender_type,
                &tender.published_at,
                &tender.briefing_at,
                &tender.tender_start_at,
                &tender.closing_at,
                &tender.briefing_venue,
                &tender.briefing_compulsory,
                &tender.briefing_details,
                &tender.value_amount,
                &tender.value_currency,
                &tender.tender_box_address,
                &tender.target_audience,
                &tender.contract_type,
                &tender.project_type,
                &tender.queries_to,
                &tender.url,
                &tender.hash,
            ],
        )
        .await?;

    Ok(row.get(0))
}

/// Replace a tender's documents wholesale. Must run inside the same
/// transaction as the parent upsert.
pub async fn replace_documents<C>(
    client: &C,
    tender_id: i64,
    documents: &[DocumentRecord],
) -> Result<(), StorageError>
where
    C: GenericClient + Sync,
{
    client
        .execute("DELETE FROM tb.documents WHERE tender_id = $1", &[&tender_id])
        .await?;

    if documents.is_empty() {
        return Ok(());
    }

    let stmt = client
        .prepare(
            "INSERT INTO tb.documents (tender_id, url, name, mime_type, published_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .await?;
    for doc in documents {
        client
            .execute(
                &stmt,
                &[&tender_id, &doc.url, &doc.name, &doc.mime_type, &doc.published_at],
            )
            .await?;
    }

    Ok(())
}

/// Replace a tender's contacts wholesale, same contract as
/// [`replace_documents`].
pub async fn replace_contacts<C>(
    client: &C,
    tender_id: i64,
    contacts: &[ContactRecord],
) -> Result<(), StorageError>
where
    C: GenericClient + Sync,
{
    client
        .execute("DELETE FROM tb.contacts WHERE tender_id = $1", &[&tender_id])
        .await?;

    if contacts.is_empty() {
        return Ok(());
    }

    let stmt = client
        .prepare("INSERT INTO tb.contacts (tender_id, name, email, phone) VALUES ($1, $2, $3, $4)")
        .await?;
    for contact in contacts {
        client
            .execute(&stmt, &[&tender_id, &contact.name, &contact.email, &contact.phone])
            .await?;
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    ClosingAt,
    PublishedAt,
    Id,
}

impl SortField {
    /// Coerce a raw `sort` parameter onto the allow-list; anything
    /// unknown falls back to the closing date.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.unwrap_or("") {
            "published_at" => SortField::PublishedAt,
            "id" => SortField::Id,
            _ => SortField::ClosingAt,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortField::ClosingAt => "t.closing_at",
            SortField::PublishedAt => "t.published_at",
            SortField::Id => "t.id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some(value) if value.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// AND-composed filter surface of `GET /tenders`.
#[derive(Debug, Clone, Default)]
pub struct TenderFilters {
    pub source: Option<String>,
    pub status: Option<String>,
    pub buyer: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub closing_from: Option<DateTime<Utc>>,
    pub closing_to: Option<DateTime<Utc>>,
    pub published_from: Option<DateTime<Utc>>,
    pub published_to: Option<DateTime<Utc>>,
    pub limit: i64,
    pub offset: i64,
    pub sort: SortField,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenderSummary {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub title: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub buyer: Option<String>,
    pub location: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub closing_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRow {
    pub id: i64,
    pub url: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactRow {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenderDetail {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub source_tender_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub buyer: Option<String>,
    pub procurement_method: Option<String>,
    pub procurement_method_details: Option<String>,
    pub status: Option<String>,
    pub tender_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub briefing_at: Option<DateTime<Utc>>,
    pub tender_start_at: Option<DateTime<Utc>>,
    pub closing_at: Option<DateTime<Utc>>,
    pub briefing_venue: Option<String>,
    pub briefing_compulsory: Option<bool>,
    pub briefing_details: Option<String>,
    pub value_amount: Option<f64>,
    pub value_currency: Option<String>,
    pub tender_box_address: Option<String>,
    pub target_audience: Option<String>,
    pub contract_type: Option<String>,
    pub project_type: Option<String>,
    pub queries_to: Option<String>,
    pub url: Option<String>,
    pub last_seen_at: DateTime<Utc>,
    pub documents: Vec<DocumentRow>,
    pub contacts: Vec<ContactRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenderPage {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub results: Vec<TenderSummary>,
}

const LIST_WHERE: &str = "\
    ($1::text IS NULL OR s.name = $1)
    AND ($2::text IS NULL OR t.status ILIKE $2)
    AND ($3::text IS NULL OR t.buyer ILIKE '%' || $3 || '%')
    AND ($4::text IS NULL OR t.category ILIKE $4)
    AND ($5::text IS NULL OR to_tsvector('english',
            coalesce(t.title, '') || ' ' || coalesce(t.description, ''))
        @@ plainto_tsquery('english', $5))
    AND ($6::timestamptz IS NULL OR t.closing_at >= $6)
    AND ($7::timestamptz IS NULL OR t.closing_at <= $7)
    AND ($8::timestamptz IS NULL OR t.published_at >= $8)
    AND ($9::timestamptz IS NULL OR t.published_at <= $9)";

pub async fn list_tenders(
    pool: &PgPool,
    filters: &TenderFilters,
) -> Result<TenderPage, StorageError> {
    let client = pool.get().await?;

    let count_sql = format!(
        "SELECT COUNT(*)
         FROM tb.tenders t
         JOIN tb.sources s ON s.id = t.source_id
         WHERE {LIST_WHERE}"
    );
    let list_sql = format!(
        "SELECT t.id, s.name AS source, t.external_id, t.title, t.category,
                t.status, t.buyer, t.location, t.published_at, t.closing_at, t.url
         FROM tb.tenders t
         JOIN tb.sources s ON s.id = t.source_id
         WHERE {LIST_WHERE}
         ORDER BY {sort} {order} NULLS LAST, t.id
         LIMIT $10 OFFSET $11",
        sort = filters.sort.as_sql(),
        order = filters.order.as_sql(),
    );

    let filter_params: [&(dyn tokio_postgres::types::ToSql + Sync); 9] = [
        &filters.source,
        &filters.status,
        &filters.buyer,
        &filters.category,
        &filters.q,
        &filters.closing_from,
        &filters.closing_to,
        &filters.published_from,
        &filters.published_to,
    ];

    let count_stmt = client.prepare(&count_sql).await?;
    let total: i64 = client.query_one(&count_stmt, &filter_params).await?.get(0);

    let list_stmt = client.prepare(&list_sql).await?;
    let mut list_params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
        filter_params.to_vec();
    list_params.push(&filters.limit);
    list_params.push(&filters.offset);

    let rows = client.query(&list_stmt, &list_params).await?;
    let results = rows.into_iter().map(map_summary).collect();

    Ok(TenderPage {
        total,
        limit: filters.limit,
        offset: filters.offset,
        results,
    })
}

fn map_summary(row: Row) -> TenderSummary {
    TenderSummary {
        id: row.get("id"),
        source: row.get("source"),
        external_id: row.get("external_id"),
        title: row.get("title"),
        category: row.get("category"),
        status: row.get("status"),
        buyer: row.get("buyer"),
        location: row.get("location"),
        published_at: row.get("published_at"),
        closing_at: row.get("closing_at"),
        url: row.get("url"),
    }
}

/// Full record with its documents and contacts embedded.
pub async fn fetch_tender(pool: &PgPool, id: i64) -> Result<Option<TenderDetail>, StorageError> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT t.*, s.name AS source
             FROM tb.tenders t
             JOIN tb.sources s ON s.id = t.source_id
             WHERE t.id = $1",
            &[&id],
        )
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let documents = fetch_documents(pool, id).await?;
    let contacts = fetch_contacts(pool, id).await?;

    Ok(Some(TenderDetail {
        id: row.get("id"),
        source: row.get("source"),
        external_id: row.get("external_id"),
        source_tender_id: row.get("source_tender_id"),
        title: row.get("title"),
        description: row.get("description"),
        category: row.get("category"),
        location: row.get("location"),
        buyer: row.get("buyer"),
        procurement_method: row.get("procurement_method"),
        procurement_method_details: row.get("procurement_method_details"),
        status: row.get("status"),
        tender_type: row.get("tender_type"),
        published_at: row.get("published_at"),
        briefing_at: row.get("briefing_at"),
        tender_start_at: row.get("tender_start_at"),
        closing_at: row.get("closing_at"),
        briefing_venue: row.get("briefing_venue"),
        briefing_compulsory: row.get("briefing_compulsory"),
        briefing_details: row.get("briefing_details"),
        value_amount: row.get("value_amount"),
        value_currency: row.get("value_currency"),
        tender_box_address: row.get("tender_box_address"),
        target_audience: row.get("target_audience"),
        contract_type: row.get("contract_type"),
        project_type: row.get("project_type"),
        queries_to: row.get("queries_to"),
        url: row.get("url"),
        last_seen_at: row.get("last_seen_at"),
        documents,
        contacts,
    }))
}

pub async fn fetch_documents(pool: &PgPool, tender_id: i64) -> Result<Vec<DocumentRow>, StorageError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT id, url, name, mime_type, published_at
             FROM tb.documents WHERE tender_id = $1 ORDER BY id",
            &[&tender_id],
        )
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| DocumentRow {
            id: row.get("id"),
            url: row.get("url"),
            name: row.get("name"),
            mime_type: row.get("mime_type"),
            published_at: row.get("published_at"),
        })
        .collect())
}

pub async fn fetch_contacts(pool: &PgPool, tender_id: i64) -> Result<Vec<ContactRow>, StorageError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT id, name, email, phone
             FROM tb.contacts WHERE tender_id = $1 ORDER BY id",
            &[&tender_id],
        )
        .await?;

    Ok(rows
        .into_iter()
        .map(|row| ContactRow {
            id: row.get("id"),
            name: row.get("name"),
            email: row.get("email"),
            phone: row.get("phone"),
        })
        .collect())
}
