//! Per-source transforms from raw portal payloads into the unified
//! tender/documents/contacts triple.

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;

use crate::textparse::{clean_htmlish, clean_text};

pub mod eskom;
pub mod etenders;
pub mod hash;
pub mod sanral;
pub mod transnet;

pub use hash::tender_hash;

/// The originating portal. The ingest hot path dispatches on this tag;
/// each variant's parser lives in its own module and is testable alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Eskom,
    Sanral,
    Transnet,
    Etenders,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::Eskom,
        Source::Sanral,
        Source::Transnet,
        Source::Etenders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Eskom => "eskom",
            Source::Sanral => "sanral",
            Source::Transnet => "transnet",
            Source::Etenders => "etenders",
        }
    }

    /// Resolve a source from an object key such as `eskom/2025-10-01.json`.
    pub fn from_key_prefix(key: &str) -> Option<Source> {
        let prefix = key.split('/').next()?;
        Source::ALL.into_iter().find(|s| s.as_str() == prefix)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical tender row as produced by a normalizer. Field semantics
/// follow the relational schema one-to-one; every free-text field is
/// whitespace-squashed with empty mapped to `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenderRecord {
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
    pub hash: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentRecord {
    pub url: Option<String>,
    pub name: Option<String>,
    pub mime_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactRecord {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// One normalized tender plus its fully-owned child collections.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedItem {
    pub tender: TenderRecord,
    pub documents: Vec<DocumentRecord>,
    pub contacts: Vec<ContactRecord>,
}

/// Run the matching normalizer over a decoded object-store payload.
///
/// Scraper sources deliver a JSON array (a bare object is treated as a
/// single-element array); eTenders wraps its page in `{data: [...]}`.
/// Anything else yields an empty item list.
pub fn normalize(source: Source, raw: &Value, tz: FixedOffset) -> Vec<NormalizedItem> {
    match source {
        Source::Eskom => each_record(raw).filter_map(|r| eskom::normalize_record(r, tz)).collect(),
        Source::Sanral => each_record(raw).filter_map(|r| sanral::normalize_record(r, tz)).collect(),
        Source::Transnet => {
            each_record(raw).filter_map(|r| transnet::normalize_record(r, tz)).collect()
        }
        Source::Etenders => etenders::normalize_page(raw, tz),
    }
}

fn each_record(raw: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match raw {
        Value::Array(items) => Box::new(items.iter()),
        Value::Object(_) => Box::new(std::iter::once(raw)),
        _ => Box::new(std::iter::empty()),
    }
}

/// First non-empty string value among the given keys, squashed.
pub(crate) fn text_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .filter_map(Value::as_str)
        .find_map(clean_text)
}

/// Like [`text_field`] but decoding HTML entities first; used for fields
/// that originate from scraped markup.
pub(crate) fn html_text_field(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| raw.get(k))
        .filter_map(Value::as_str)
        .find_map(|s| clean_text(&clean_htmlish(s)))
}

pub(crate) fn f64_field(raw: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| raw.get(k)).find_map(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

pub(crate) fn bool_field(raw: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().filter_map(|k| raw.get(k)).find_map(|v| match v {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "y" | "1" => Some(true),
            "no" | "false" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::default_offset;
    use serde_json::json;

    #[test]
    fn resolves_sources_from_key_prefixes() {
        assert_eq!(Source::from_key_prefix("eskom/2025.json"), Some(Source::Eskom));
        assert_eq!(
            Source::from_key_prefix("etenders/etenders-p0001-123.json"),
            Some(Source::Etenders)
        );
        assert_eq!(Source::from_key_prefix("unknown/x.json"), None);
        assert_eq!(Source::from_key_prefix(""), None);
    }

    #[test]
    fn non_collection_payloads_normalize_to_nothing() {
        let tz = default_offset();
        assert!(normalize(Source::Eskom, &json!("just a string"), tz).is_empty());
        assert!(normalize(Source::Sanral, &json!(42), tz).is_empty());
        assert!(normalize(Source::Etenders, &json!(null), tz).is_empty());
    }

    #[test]
    fn field_helpers_squash_and_coerce() {
        let raw = json!({
            "a": "  two   words ",
            "b": "",
            "n": "12.5",
            "flag": "Yes",
            "markup": "x&nbsp;&amp;&nbsp;y"
        });
        assert_eq!(text_field(&raw, &["missing", "a"]), Some("two words".into()));
        assert_eq!(text_field(&raw, &["b"]), None);
        assert_eq!(html_text_field(&raw, &["markup"]), Some("x & y".into()));
        assert_eq!(f64_field(&raw, &["n"]), Some(12.5));
        assert_eq!(bool_field(&raw, &["flag"]), Some(true));
        assert_eq!(bool_field(&raw, &["a"]), None);
    }
}
