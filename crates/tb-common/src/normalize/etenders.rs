//! National eTenders (OCDS) API pages: a `{data: [...]}` envelope of
//! flat release summaries with ISO timestamps and name-only support
//! documents.

use chrono::FixedOffset;
use serde_json::Value;

use super::{
    bool_field, f64_field, tender_hash, text_field, ContactRecord, DocumentRecord,
    NormalizedItem, Source, TenderRecord,
};
use crate::textparse::parse_iso;

pub(crate) fn normalize_page(raw: &Value, tz: FixedOffset) -> Vec<NormalizedItem> {
    let data = match raw.get("data").and_then(Value::as_array) {
        Some(items) => items.as_slice(),
        None => match raw.as_array() {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
    };

    data.iter().filter_map(|r| normalize_record(r, tz)).collect()
}

fn normalize_record(raw: &Value, tz: FixedOffset) -> Option<NormalizedItem> {
    let external_id = text_field(raw, &["tender_No", "tenderNo"])?;

    let iso = |keys: &[&str]| text_field(raw, keys).and_then(|s| parse_iso(&s, tz));

    let value = raw.get("value").unwrap_or(&Value::Null);

    let mut tender = TenderRecord {
        external_id,
        source_tender_id: text_field(raw, &["id"]),
        title: text_field(raw, &["tender_Name", "title", "bid_Description"]),
        description: text_field(raw, &["description", "bid_Description"]),
        category: text_field(raw, &["category"]),
        location: text_field(raw, &["province", "delivery_Location"]),
        buyer: text_field(raw, &["organ_of_State", "department"]),
        procurement_method: text_field(raw, &["procurementMethod"]),
        procurement_method_details: text_field(raw, &["procurementMethodDetails"]),
        status: text_field(raw, &["status"]),
        tender_type: text_field(raw, &["tenderType", "type"]),
        published_at: iso(&["datePublished", "date_Published"]),
        briefing_at: iso(&["briefingDate", "briefingSession"]),
        tender_start_at: iso(&["dateFrom", "startDate"]),
        closing_at: iso(&["closing_Date", "closingDate"]),
        briefing_venue: text_field(raw, &["briefingVenue", "briefing_Venue"]),
        briefing_compulsory: bool_field(
            raw,
            &["compulsory_briefing_session", "compulsoryBriefing"],
        ),
        briefing_details: text_field(raw, &["briefingSessionDetails", "conditions"]),
        value_amount: f64_field(value, &["amount"]),
        value_currency: text_field(value, &["currency"]),
        target_audience: text_field(raw, &["targetAudience"]),
        contract_type: text_field(raw, &["contractType"]),
        // The portal exposes no stable detail link for a release yet.
        url: None,
        ..TenderRecord::default()
    };

    let documents = raw
        .get("supportDocument")
        .or_else(|| raw.get("supportDocuments"))
        .and_then(Value::as_array)
        .map(|docs| {
            docs.iter()
                .filter_map(|doc| {
                    let name = text_field(doc, &["fileName", "name"])?;
                    let extension = text_field(doc, &["extension"])
                        .or_else(|| name.rsplit('.').next().map(|e| e.to_string()));
                    Some(DocumentRecord {
                        url: text_field(doc, &["url", "documentUrl"]),
                        mime_type: extension.as_deref().and_then(mime_for_extension),
                        name: Some(name),
                        published_at: text_field(doc, &["datePublished"])
                            .and_then(|s| parse_iso(&s, tz)),
                    })
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let contact_name = text_field(raw, &["contactPerson"]);
    let contact_email = text_field(raw, &["email"]).map(|e| e.to_ascii_lowercase());
    let contact_phone = text_field(raw, &["telephone"]).or_else(|| text_field(raw, &["fax"]));
    let contacts = if contact_name.is_some() || contact_email.is_some() || contact_phone.is_some()
    {
        vec![ContactRecord {
            name: contact_name,
            email: contact_email,
            phone: contact_phone,
        }]
    } else {
        Vec::new()
    };

    tender.hash = tender_hash(
        Source::Etenders,
        &tender,
        &[
            (
                "status",
                tender
                    .status
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            (
                "tender_type",
                tender
                    .tender_type
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            (
                "buyer",
                tender.buyer.clone().map(Value::String).unwrap_or(Value::Null),
            ),
        ],
    );

    Some(NormalizedItem {
        tender,
        documents,
        contacts,
    })
}

fn mime_for_extension(extension: &str) -> Option<String> {
    match extension.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf".into()),
        _ => None,
    }
}
