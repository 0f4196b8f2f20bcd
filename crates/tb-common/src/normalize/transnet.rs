//! Transnet records: a flat listing row plus an optional richer
//! `details` sub-object from the detail page; `details.*` wins where
//! both carry a value.

use chrono::FixedOffset;
use serde_json::Value;

use super::{
    bool_field, f64_field, html_text_field, tender_hash, text_field, ContactRecord,
    DocumentRecord, NormalizedItem, Source, TenderRecord,
};
use crate::textparse::parse_transnet_date;

pub(crate) fn normalize_record(raw: &Value, tz: FixedOffset) -> Option<NormalizedItem> {
    let details = raw.get("details").unwrap_or(&Value::Null);

    let external_id = pick_text(details, raw, &["tenderNumber", "tenderNo", "refNo"])?;

    let closing_at = pick_text(details, raw, &["closingDate", "closing"])
        .and_then(|s| parse_transnet_date(&s, tz));
    let published_at = pick_text(details, raw, &["publishDate", "datePublished", "published"])
        .and_then(|s| parse_transnet_date(&s, tz));
    let briefing_at = pick_text(details, raw, &["briefingDate", "briefing"])
        .and_then(|s| parse_transnet_date(&s, tz));

    let mut tender = TenderRecord {
        external_id,
        source_tender_id: pick_text(details, raw, &["id", "tenderId"]),
        title: pick_html_text(details, raw, &["title", "tenderDescription", "description"]),
        description: pick_html_text(details, raw, &["description", "scopeOfWork"]),
        category: pick_text(details, raw, &["tenderCategory", "category"]),
        location: pick_html_text(details, raw, &["locationOfService", "location"]),
        buyer: pick_html_text(details, raw, &["institution", "operatingDivision"]),
        tender_type: pick_text(details, raw, &["tenderType"]),
        status: pick_text(details, raw, &["status"]),
        published_at,
        briefing_at,
        closing_at,
        briefing_venue: pick_html_text(details, raw, &["briefingVenue"]),
        briefing_compulsory: bool_field(details, &["briefingCompulsory"])
            .or_else(|| bool_field(raw, &["briefingCompulsory"])),
        value_amount: f64_field(details, &["estimatedValue", "value"])
            .or_else(|| f64_field(raw, &["estimatedValue", "value"])),
        contract_type: pick_text(details, raw, &["contractType"]),
        url: pick_text(details, raw, &["url", "detailUrl"]),
        ..TenderRecord::default()
    };

    let documents = details
        .get("documents")
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(|doc| {
                    let url = text_field(doc, &["url", "documentUrl", "link"]);
                    let name = html_text_field(doc, &["name", "fileName", "title"]);
                    if url.is_none() && name.is_none() {
                        return None;
                    }
                    Some(DocumentRecord {
                        url,
                        name,
                        mime_type: text_field(doc, &["mimeType", "contentType"]),
                        published_at: text_field(doc, &["publishedDate"])
                            .and_then(|s| parse_transnet_date(&s, tz)),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let contact_name = pick_html_text(details, raw, &["contactPerson"]);
    let contact_email = pick_text(details, raw, &["contactEmail", "email"]);
    let contact_phone = pick_text(details, raw, &["contactNumber", "telephone"]);
    let contacts = if contact_name.is_some() || contact_email.is_some() || contact_phone.is_some()
    {
        vec![ContactRecord {
            name: contact_name,
            email: contact_email.map(|e| e.to_ascii_lowercase()),
            phone: contact_phone,
        }]
    } else {
        Vec::new()
    };

    tender.hash = tender_hash(
        Source::Transnet,
        &tender,
        &[
            (
                "buyer",
                tender.buyer.clone().map(Value::String).unwrap_or(Value::Null),
            ),
            (
                "category",
                tender
                    .category
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            (
                "status",
                tender
                    .status
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
        ],
    );

    Some(NormalizedItem {
        tender,
        documents,
        contacts,
    })
}

fn pick_text(details: &Value, raw: &Value, keys: &[&str]) -> Option<String> {
    text_field(details, keys).or_else(|| text_field(raw, keys))
}

fn pick_html_text(details: &Value, raw: &Value, keys: &[&str]) -> Option<String> {
    html_text_field(details, keys).or_else(|| html_text_field(raw, keys))
}
