//! Pure text extractors for the source portals.
//!
//! Every function in this module family is total: unrecognized input
//! yields `None` (or an empty collection), never a panic. Date parsers
//! take the local portal offset explicitly so callers control how
//! zone-less wall-clock times are anchored.

pub mod dates;
pub mod text;
pub mod timerange;

pub use dates::{
    extract_numeric_datetime, extract_textual_datetime, parse_eskom_date, parse_iso,
    parse_sanral_numeric_date, parse_transnet_date,
};
pub use text::{
    clean_htmlish, clean_text, extract_emails, extract_phone, extract_urls,
    guess_venue_from_line, line_has_venue_keyword, squash_whitespace,
};
pub use timerange::{extract_time_range, TimeRange};
