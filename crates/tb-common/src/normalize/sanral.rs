//! SANRAL records: short metadata plus HTML-derived prose in
//! `details.rawText`/`details.paragraphs`. Deadlines, briefing data,
//! addresses and contacts are recovered line-by-line with the small
//! extractors from `textparse`.

use chrono::{DateTime, FixedOffset, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::{
    hash::iso_or_null, html_text_field, tender_hash, text_field, ContactRecord, DocumentRecord,
    NormalizedItem, Source, TenderRecord,
};
use crate::textparse::{
    clean_htmlish, clean_text, extract_emails, extract_numeric_datetime, extract_phone,
    extract_textual_datetime, extract_time_range, extract_urls, guess_venue_from_line,
    line_has_venue_keyword, squash_whitespace,
};

lazy_static! {
    static ref CLOSING_LINE_RE: Regex = Regex::new(r"(?i)\bCLOSING\s+(?:DATE|TIME)\b").unwrap();
    static ref BRIEFING_LINE_RE: Regex = Regex::new(r"(?i)\bBRIEFING\b").unwrap();
    static ref ISSUE_LINE_RE: Regex = Regex::new(r"(?i)\bISSUE\s+DATE\b").unwrap();
    static ref COMPLETION_LINE_RE: Regex =
        Regex::new(r"(?i)\bCOMPLETION\s+AND\s+DELIVERY\b").unwrap();
    static ref ADDRESS_LINE_RE: Regex =
        Regex::new(r"(?i)at the offices of|delivered to|address|offices of").unwrap();
    static ref NON_COMPULSORY_RE: Regex =
        Regex::new(r"(?i)\b(?:non[\s-]?compulsory|not compulsory|optional)\b").unwrap();
    static ref COMPULSORY_RE: Regex = Regex::new(r"(?i)\bcompulsory\b").unwrap();
    static ref DOC_EXTENSION_RE: Regex =
        Regex::new(r"(?i)\.(?:pdf|zip|docx?|xlsx?)$").unwrap();
}

const FILE_SHARE_HOSTS: [&str; 3] = ["drive.google.com", "dropbox.com", "onedrive.live.com"];

// How far below the completion/delivery heading an address may start,
// and how many lines of it are kept.
const ADDRESS_SCAN_LINES: usize = 10;
const ADDRESS_JOIN_LINES: usize = 6;

const TRUNCATED_DESCRIPTION_MIN: usize = 80;

pub(crate) fn normalize_record(raw: &Value, tz: FixedOffset) -> Option<NormalizedItem> {
    let external_id = text_field(raw, &["tenderNumber", "tenderNo", "reference", "id"])?;

    let lines = prose_lines(raw);
    let full_text = lines.join("\n");

    let closing_line = lines.iter().find(|l| CLOSING_LINE_RE.is_match(l));
    let briefing_line = lines.iter().find(|l| BRIEFING_LINE_RE.is_match(l));
    let issue_line = lines.iter().find(|l| ISSUE_LINE_RE.is_match(l));

    let closing_at = closing_line.and_then(|line| {
        let base = line_datetime(line, tz)?;
        // A closing line carrying a window means the deadline is its end.
        Some(match extract_time_range(line) {
            Some(range) => at_local_time(base, range.end, tz),
            None => base,
        })
    });

    let briefing_range = briefing_line.and_then(|line| extract_time_range(line));
    let briefing_at = briefing_line.and_then(|line| {
        let base = line_datetime(line, tz)?;
        Some(match briefing_range {
            Some(range) => at_local_time(base, range.start, tz),
            None => base,
        })
    });

    let mut briefing_details = briefing_line.map(|l| l.clone());
    if let Some(range) = briefing_range {
        let note = format!("Briefing window ends at {}", range.end.format("%H:%M"));
        briefing_details = Some(match briefing_details {
            Some(existing) => format!("{existing}; {note}"),
            None => note,
        });
    }

    let briefing_venue = lines
        .iter()
        .find(|l| line_has_venue_keyword(l))
        .cloned()
        .or_else(|| briefing_line.and_then(|l| guess_venue_from_line(l)));

    let briefing_compulsory = briefing_line.and_then(|line| {
        if NON_COMPULSORY_RE.is_match(line) {
            Some(false)
        } else if COMPULSORY_RE.is_match(line) {
            Some(true)
        } else {
            None
        }
    });

    let tender_start_at = issue_line.and_then(|line| line_datetime(line, tz));
    let tender_box_address = submission_address(&lines);

    let queries_to = html_text_field(raw, &["queriesTo", "queries"]);
    let contact_text = match &queries_to {
        Some(q) => format!("{q}\n{full_text}"),
        None => full_text.clone(),
    };
    let phone = extract_phone(&contact_text);
    let contacts: Vec<ContactRecord> = extract_emails(&contact_text)
        .into_iter()
        .map(|email| ContactRecord {
            name: None,
            email: Some(email),
            phone: phone.clone(),
        })
        .collect();

    let documents: Vec<DocumentRecord> = extract_urls(&full_text)
        .into_iter()
        .filter(|url| is_document_url(url))
        .map(|url| DocumentRecord {
            name: document_name(&url),
            url: Some(url),
            ..DocumentRecord::default()
        })
        .collect();

    let short_description = html_text_field(raw, &["description", "summary"]);
    let prose = clean_text(&lines.join(" "));
    let description = match (&short_description, &prose) {
        (Some(short), Some(full)) if looks_truncated(short) => Some(full.clone()),
        (Some(short), _) => Some(short.clone()),
        (None, full) => full.clone(),
    };

    let mut tender = TenderRecord {
        external_id,
        source_tender_id: text_field(raw, &["id", "tenderId"]),
        title: html_text_field(raw, &["title", "tenderName"]),
        description,
        category: text_field(raw, &["category"]),
        location: html_text_field(raw, &["region", "province", "location"]),
        published_at: text_field(raw, &["datePublished", "published"])
            .and_then(|s| crate::textparse::parse_sanral_numeric_date(&s, tz))
            .or(tender_start_at),
        briefing_at,
        tender_start_at,
        closing_at,
        briefing_venue,
        briefing_compulsory,
        briefing_details,
        tender_box_address,
        queries_to,
        url: text_field(raw, &["url", "detailUrl"]),
        ..TenderRecord::default()
    };

    tender.hash = tender_hash(
        Source::Sanral,
        &tender,
        &[
            (
                "tender_box_address",
                tender
                    .tender_box_address
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            (
                "briefing_venue",
                tender
                    .briefing_venue
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
            ),
            ("briefing", iso_or_null(tender.briefing_at)),
        ],
    );

    Some(NormalizedItem {
        tender,
        documents,
        contacts,
    })
}

/// Prose lines in document order: prefer `details.paragraphs`, fall back
/// to splitting `details.rawText`; entities decoded, whitespace squashed,
/// empties dropped.
fn prose_lines(raw: &Value) -> Vec<String> {
    let details = raw.get("details").unwrap_or(raw);

    let from_paragraphs = details
        .get("paragraphs")
        .and_then(Value::as_array)
        .map(|paragraphs| {
            paragraphs
                .iter()
                .filter_map(Value::as_str)
                .flat_map(|p| p.split('\n'))
                .map(|l| squash_whitespace(&clean_htmlish(l)))
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    if !from_paragraphs.is_empty() {
        return from_paragraphs;
    }

    details
        .get("rawText")
        .and_then(Value::as_str)
        .map(|text| {
            text.split('\n')
                .map(|l| squash_whitespace(&clean_htmlish(l)))
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn line_datetime(line: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    extract_textual_datetime(line, tz).or_else(|| extract_numeric_datetime(line, tz))
}

/// Re-anchor an instant to a different wall-clock time on the same local day.
fn at_local_time(base: DateTime<Utc>, time: NaiveTime, tz: FixedOffset) -> DateTime<Utc> {
    let local_day = base.with_timezone(&tz).date_naive();
    tz.from_local_datetime(&local_day.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(base)
}

/// The submission address block: scan the lines after the
/// completion/delivery heading for the first address-ish line, then keep
/// it and its continuation lines.
fn submission_address(lines: &[String]) -> Option<String> {
    let heading = lines.iter().position(|l| COMPLETION_LINE_RE.is_match(l))?;
    let scan_end = (heading + 1 + ADDRESS_SCAN_LINES).min(lines.len());

    let start = lines[heading + 1..scan_end]
        .iter()
        .position(|l| ADDRESS_LINE_RE.is_match(l))
        .map(|offset| heading + 1 + offset)?;

    let end = (start + ADDRESS_JOIN_LINES).min(lines.len());
    Some(lines[start..end].join(", "))
}

fn looks_truncated(short: &str) -> bool {
    short.ends_with('…')
        || short.contains("&n")
        || short.chars().count() < TRUNCATED_DESCRIPTION_MIN
}

fn is_document_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    if DOC_EXTENSION_RE.is_match(path) {
        return true;
    }

    let host = url
        .split("://")
        .nth(1)
        .and_then(|rest| rest.split('/').next())
        .unwrap_or("");
    FILE_SHARE_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{known}")))
}

fn document_name(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let segment = path.rsplit('/').next()?;
    if segment.is_empty() || !segment.contains('.') {
        None
    } else {
        Some(segment.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use crate::timezone::default_offset;
    use chrono::TimeZone;
    use serde_json::json;

    fn prose_record() -> Value {
        json!({
            "tenderNumber": "SANRAL-001",
            "title": "Routine road maintenance",
            "description": "Short blurb&n",
            "queriesTo": "Queries: jane@example.co.za, 011 555 1234",
            "details": {
                "rawText": "SOUTH AFRICAN NATIONAL ROADS AGENCY\n\
                            ISSUE DATE: 1 August 2025\n\
                            CLOSING DATE: 20 August 2025 12:00\n\
                            BRIEFING SESSION: 14 August 2025 13:00-14:00 at Boardroom B, 12 Main Road\n\
                            COMPLETION AND DELIVERY OF TENDER DOCUMENTS\n\
                            Tenders must be delivered to the address below\n\
                            SANRAL Northern Region\n\
                            38 Ida Street\n\
                            Menlo Park, Pretoria\n\
                            Documents: https://www.nra.co.za/docs/sanral-001.pdf"
            }
        })
    }

    #[test]
    fn extracts_deadlines_and_briefing_window() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        assert_eq!(items.len(), 1);
        let tender = &items[0].tender;

        assert_eq!(
            tender.closing_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 20, 10, 0, 0).unwrap())
        );
        assert_eq!(
            tender.briefing_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 14, 11, 0, 0).unwrap())
        );
        assert_eq!(
            tender.tender_start_at,
            Some(Utc.with_ymd_and_hms(2025, 7, 31, 22, 0, 0).unwrap())
        );
        assert!(tender
            .briefing_details
            .as_deref()
            .unwrap()
            .contains("Briefing window ends at 14:00"));
    }

    #[test]
    fn briefing_venue_comes_from_the_first_venue_line() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        let venue = items[0].tender.briefing_venue.as_deref().unwrap();
        assert!(venue.contains("Boardroom B"));
    }

    #[test]
    fn submission_address_joins_continuation_lines() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        let address = items[0].tender.tender_box_address.as_deref().unwrap();
        assert!(address.starts_with("Tenders must be delivered to"));
        assert!(address.contains("38 Ida Street"));
        assert!(address.contains("Menlo Park, Pretoria"));
    }

    #[test]
    fn contacts_pair_each_email_with_the_first_phone() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        assert_eq!(items[0].contacts.len(), 1);
        let contact = &items[0].contacts[0];
        assert_eq!(contact.email.as_deref(), Some("jane@example.co.za"));
        assert_eq!(contact.phone.as_deref(), Some("011 555 1234"));
        assert_eq!(contact.name, None);
    }

    #[test]
    fn truncated_short_descriptions_fall_back_to_prose() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        let description = items[0].tender.description.as_deref().unwrap();
        assert!(description.contains("SOUTH AFRICAN NATIONAL ROADS AGENCY"));
    }

    #[test]
    fn keeps_a_long_short_description() {
        let tz = default_offset();
        let mut record = prose_record();
        let long = "A sufficiently descriptive summary of the works that does not look cut \
                    off and comfortably exceeds the truncation threshold in length.";
        record["description"] = json!(long);
        let items = normalize(Source::Sanral, &json!([record]), tz);
        assert_eq!(items[0].tender.description.as_deref(), Some(long));
    }

    #[test]
    fn document_urls_are_filtered_by_extension_or_host() {
        assert!(is_document_url("https://x.za/docs/a.pdf"));
        assert!(is_document_url("https://x.za/docs/a.PDF?version=2"));
        assert!(is_document_url("https://x.za/pack.zip"));
        assert!(is_document_url("https://x.za/sheet.xlsx"));
        assert!(is_document_url("https://drive.google.com/file/d/abc/view"));
        assert!(is_document_url("https://www.dropbox.com/s/abc"));
        assert!(!is_document_url("https://x.za/tenders/view?id=1"));
        assert!(!is_document_url("https://x.za/index.html"));
    }

    #[test]
    fn picks_document_from_prose() {
        let tz = default_offset();
        let items = normalize(Source::Sanral, &json!([prose_record()]), tz);
        assert_eq!(items[0].documents.len(), 1);
        assert_eq!(
            items[0].documents[0].url.as_deref(),
            Some("https://www.nra.co.za/docs/sanral-001.pdf")
        );
        assert_eq!(
            items[0].documents[0].name.as_deref(),
            Some("sanral-001.pdf")
        );
    }

    #[test]
    fn records_without_a_reference_are_skipped() {
        let tz = default_offset();
        let items = normalize(
            Source::Sanral,
            &json!([{ "details": { "rawText": "CLOSING DATE: 20 August 2025" } }]),
            tz,
        );
        assert!(items.is_empty());
    }
}
