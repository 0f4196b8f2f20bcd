//! Eskom tender bulletin records: flat fields, bulletin-style dates,
//! at most one download document, no contacts.

use chrono::FixedOffset;
use serde_json::Value;

use super::{
    bool_field, hash::iso_or_null, html_text_field, tender_hash, text_field, DocumentRecord,
    NormalizedItem, Source, TenderRecord,
};
use crate::textparse::parse_eskom_date;

pub(crate) fn normalize_record(raw: &Value, tz: FixedOffset) -> Option<NormalizedItem> {
    let external_id = text_field(raw, &["TenderID", "tenderId", "tenderID"])?;

    let source_tender_id = text_field(raw, &["enquiryNumber", "enquiry_number"]);
    let description = html_text_field(raw, &["scopeDetails", "description"]);
    let title = html_text_field(raw, &["title", "tenderDescription"])
        .or_else(|| source_tender_id.clone());

    let tender_box_address = html_text_field(raw, &["tenderBoxAddress", "tenderBox"]);
    let url = text_field(raw, &["readMore", "url"]);

    let published_at = text_field(raw, &["published", "publishedDate"])
        .and_then(|s| parse_eskom_date(&s, tz));
    let closing_at =
        text_field(raw, &["closing", "closingDate"]).and_then(|s| parse_eskom_date(&s, tz));
    let briefing_at = text_field(raw, &["briefingDate", "briefing"])
        .and_then(|s| parse_eskom_date(&s, tz));

    let mut tender = TenderRecord {
        external_id,
        source_tender_id,
        title,
        description,
        category: text_field(raw, &["dt", "category"]),
        location: tender_box_address.clone(),
        published_at,
        briefing_at,
        closing_at,
        briefing_compulsory: bool_field(raw, &["briefingCompulsory"]),
        briefing_venue: html_text_field(raw, &["briefingVenue"]),
        tender_box_address,
        url: url.clone(),
        ..TenderRecord::default()
    };

    let documents = text_field(raw, &["downloadLink"])
        .map(|link| {
            vec![DocumentRecord {
                url: Some(link),
                published_at: tender.published_at,
                ..DocumentRecord::default()
            }]
        })
        .unwrap_or_default();

    tender.hash = tender_hash(
        Source::Eskom,
        &tender,
        &[
            (
                "category",
                tender
                    .category
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            ("url", url.map(Value::String).unwrap_or(Value::Null)),
            ("briefing", iso_or_null(tender.briefing_at)),
        ],
    );

    Some(NormalizedItem {
        tender,
        documents,
        contacts: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{normalize, Source};
    use crate::timezone::default_offset;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn happy_record() -> Value {
        json!({
            "TenderID": "T-1",
            "enquiryNumber": "E1",
            "scopeDetails": "  scope   text  ",
            "published": "2025-Oct-01 09:00:00",
            "closing": "2025-Nov-15 12:00:00",
            "readMore": "https://tenderbulletin.example/tender/X",
            "downloadLink": "https://tenderbulletin.example/DownloadAll?id=X"
        })
    }

    #[test]
    fn normalizes_the_happy_path_record() {
        let tz = default_offset();
        let items = normalize(Source::Eskom, &json!([happy_record()]), tz);
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.tender.external_id, "T-1");
        assert_eq!(item.tender.source_tender_id.as_deref(), Some("E1"));
        assert_eq!(item.tender.description.as_deref(), Some("scope text"));
        assert_eq!(
            item.tender.published_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 1, 7, 0, 0).unwrap())
        );
        assert_eq!(
            item.tender.closing_at,
            Some(Utc.with_ymd_and_hms(2025, 11, 15, 10, 0, 0).unwrap())
        );
        assert_eq!(
            item.tender.url.as_deref(),
            Some("https://tenderbulletin.example/tender/X")
        );

        assert_eq!(item.documents.len(), 1);
        assert_eq!(
            item.documents[0].url.as_deref(),
            Some("https://tenderbulletin.example/DownloadAll?id=X")
        );
        assert!(item.contacts.is_empty());
        assert_eq!(item.tender.hash.len(), 64);
    }

    #[test]
    fn records_without_a_tender_id_are_skipped() {
        let tz = default_offset();
        let page = json!([{ "enquiryNumber": "E1", "scopeDetails": "text" }, happy_record()]);
        let items = normalize(Source::Eskom, &page, tz);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tender.external_id, "T-1");
    }

    #[test]
    fn normalization_is_deterministic() {
        let tz = default_offset();
        let a = normalize(Source::Eskom, &json!([happy_record()]), tz);
        let b = normalize(Source::Eskom, &json!([happy_record()]), tz);
        assert_eq!(a[0].tender.hash, b[0].tender.hash);
    }

    #[test]
    fn missing_optional_fields_stay_null() {
        let tz = default_offset();
        let items = normalize(Source::Eskom, &json!([{ "TenderID": "T-9" }]), tz);
        let tender = &items[0].tender;
        assert_eq!(tender.description, None);
        assert_eq!(tender.published_at, None);
        assert_eq!(tender.closing_at, None);
        assert!(items[0].documents.is_empty());
    }
}
