use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::{Source, TenderRecord};

pub(crate) fn iso_or_null(ts: Option<DateTime<Utc>>) -> Value {
    ts.map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)))
        .unwrap_or(Value::Null)
}

fn str_or_null(value: &Option<String>) -> Value {
    value
        .as_ref()
        .map(|s| Value::String(s.clone()))
        .unwrap_or(Value::Null)
}

/// Hex SHA-256 over a canonical JSON rendering of the semantic fields.
///
/// The base subset is shared by every source (identity, descriptive
/// core, key timestamps as UTC RFC 3339 or null); callers add their
/// source-specific differentiators through `extras`. serde_json's map
/// is key-sorted, so the rendering is stable for equal inputs.
pub fn tender_hash(source: Source, tender: &TenderRecord, extras: &[(&str, Value)]) -> String {
    let mut fields = Map::new();
    fields.insert("source".into(), Value::String(source.as_str().into()));
    fields.insert("external_id".into(), Value::String(tender.external_id.clone()));
    fields.insert("title".into(), str_or_null(&tender.title));
    fields.insert("description".into(), str_or_null(&tender.description));
    fields.insert("location".into(), str_or_null(&tender.location));
    fields.insert("published_at".into(), iso_or_null(tender.published_at));
    fields.insert("closing_at".into(), iso_or_null(tender.closing_at));
    fields.insert("briefing_at".into(), iso_or_null(tender.briefing_at));
    fields.insert("tender_start_at".into(), iso_or_null(tender.tender_start_at));

    for (key, value) in extras {
        fields.insert((*key).into(), value.clone());
    }

    let canonical = Value::Object(fields).to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> TenderRecord {
        TenderRecord {
            external_id: "T-1".into(),
            title: Some("Substation maintenance".into()),
            description: Some("scope text".into()),
            location: Some("Gauteng".into()),
            published_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, 7, 0, 0).unwrap()),
            closing_at: Some(Utc.with_ymd_and_hms(2025, 11, 15, 10, 0, 0).unwrap()),
            ..TenderRecord::default()
        }
    }

    #[test]
    fn equal_inputs_hash_equal() {
        let a = tender_hash(Source::Eskom, &sample(), &[]);
        let b = tender_hash(Source::Eskom, &sample(), &[]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn any_semantic_change_moves_the_hash() {
        let base = tender_hash(Source::Eskom, &sample(), &[]);

        let mut changed = sample();
        changed.description = Some("scope text v2".into());
        assert_ne!(base, tender_hash(Source::Eskom, &changed, &[]));

        let mut cleared = sample();
        cleared.closing_at = None;
        assert_ne!(base, tender_hash(Source::Eskom, &cleared, &[]));

        // Same record attributed to another source is a different identity.
        assert_ne!(base, tender_hash(Source::Sanral, &sample(), &[]));
    }

    #[test]
    fn extras_participate_in_the_hash() {
        let without = tender_hash(Source::Eskom, &sample(), &[]);
        let with = tender_hash(
            Source::Eskom,
            &sample(),
            &[("url", Value::String("https://example.com/x".into()))],
        );
        assert_ne!(without, with);
    }
}
