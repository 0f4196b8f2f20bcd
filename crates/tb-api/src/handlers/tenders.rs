use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use tb_common::db::{
    fetch_contacts, fetch_documents, fetch_tender, list_tenders, ContactRow, DocumentRow,
    SortField, SortOrder, TenderDetail, TenderFilters, TenderPage,
};
use tb_common::textparse::parse_iso;
use tb_common::timezone;

use crate::error::ApiError;
use crate::SharedState;

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, Default)]
pub struct TenderListQuery {
    pub source: Option<String>,
    pub status: Option<String>,
    pub buyer: Option<String>,
    pub category: Option<String>,
    pub q: Option<String>,
    pub closing_from: Option<String>,
    pub closing_to: Option<String>,
    pub published_from: Option<String>,
    pub published_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

fn parse_date_param(name: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw {
        None => Ok(None),
        Some(value) => parse_iso(value, timezone::local_offset())
            .map(Some)
            .ok_or_else(|| ApiError::BadRequest(format!("invalid {name}: {value}"))),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub(crate) fn build_filters(query: TenderListQuery) -> Result<TenderFilters, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    let offset = query.offset.unwrap_or(0);
    if offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".into()));
    }

    Ok(TenderFilters {
        source: non_empty(query.source),
        status: non_empty(query.status),
        buyer: non_empty(query.buyer),
        category: non_empty(query.category),
        q: non_empty(query.q),
        closing_from: parse_date_param("closing_from", query.closing_from.as_deref())?,
        closing_to: parse_date_param("closing_to", query.closing_to.as_deref())?,
        published_from: parse_date_param("published_from", query.published_from.as_deref())?,
        published_to: parse_date_param("published_to", query.published_to.as_deref())?,
        limit,
        offset,
        sort: SortField::from_param(query.sort.as_deref()),
        order: SortOrder::from_param(query.order.as_deref()),
    })
}

pub async fn list(
    State(state): State<SharedState>,
    Query(query): Query<TenderListQuery>,
) -> Result<Json<TenderPage>, ApiError> {
    let filters = build_filters(query)?;
    let page = list_tenders(&state.pool, &filters).await?;
    Ok(Json(page))
}

pub async fn detail(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<TenderDetail>, ApiError> {
    let tender = fetch_tender(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tender not found: {id}")))?;
    Ok(Json(tender))
}

pub async fn documents(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<DocumentRow>>, ApiError> {
    Ok(Json(fetch_documents(&state.pool, id).await?))
}

pub async fn contacts(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ContactRow>>, ApiError> {
    Ok(Json(fetch_contacts(&state.pool, id).await?))
}
