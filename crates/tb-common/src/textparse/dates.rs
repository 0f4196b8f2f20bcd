use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref TEXTUAL_DATETIME_RE: Regex = Regex::new(
        r"(?ix)
        \b(\d{1,2})\s+
        (jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|
         jul(?:y)?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)
        \s+(\d{4})
        (?:\s*(?:@|at\b|h\b|\.)?\s*(\d{1,2})(?:[:hH.](\d{2}))?\s*(am|pm)?)?"
    )
    .unwrap();
    static ref NUMERIC_DATETIME_RE: Regex =
        Regex::new(r"\b(\d{4})[/\-.](\d{1,2})[/\-.](\d{1,2})(?:[ T]\s*(\d{1,2}):(\d{2}))?").unwrap();
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_ascii_lowercase();
    match prefix.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

fn localize(naive: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse the Eskom bulletin format `YYYY-Mon-DD HH:MM:SS` (three-letter
/// English month, e.g. `2025-Oct-01 09:00:00`).
pub fn parse_eskom_date(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%b-%d %H:%M:%S").ok()?;
    localize(naive, tz)
}

/// Parse the SANRAL metadata format `YYYY/MM/DD HH:MM[:SS]`.
pub fn parse_sanral_numeric_date(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y/%m/%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y/%m/%d %H:%M"))
        .ok()?;
    localize(naive, tz)
}

/// Parse the Transnet format `M/D/YYYY H:MM[:SS] AM|PM`.
///
/// Meridiem is case-insensitive; single-digit day, month and hour are
/// accepted.
pub fn parse_transnet_date(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let upper = raw.trim().to_ascii_uppercase();
    let naive = NaiveDateTime::parse_from_str(&upper, "%m/%d/%Y %I:%M:%S %p")
        .or_else(|_| NaiveDateTime::parse_from_str(&upper, "%m/%d/%Y %I:%M %p"))
        .ok()?;
    localize(naive, tz)
}

/// Parse an ISO-8601 / RFC 3339 timestamp as delivered by the OCDS API.
///
/// Inputs with an explicit offset are honored; naive `YYYY-MM-DDTHH:MM:SS`
/// values are anchored in the supplied local offset.
pub fn parse_iso(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok()?;
    localize(naive, tz)
}

/// Find a `D Month YYYY [HH[:MM] [AM|PM]]` date inside free text.
///
/// Optional `@`, `at`, `h` or `.` may separate the date from the time;
/// a missing time defaults to 00:00.
pub fn extract_textual_datetime(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let caps = TEXTUAL_DATETIME_RE.captures(raw)?;

    let day: u32 = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year: i32 = caps.get(3)?.as_str().parse().ok()?;

    let mut hour: u32 = caps
        .get(4)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let minute: u32 = caps
        .get(5)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    if let Some(meridiem) = caps.get(6) {
        let pm = meridiem.as_str().eq_ignore_ascii_case("pm");
        if pm && hour < 12 {
            hour += 12;
        } else if !pm && hour == 12 {
            hour = 0;
        }
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    localize(date.and_time(time), tz)
}

/// Find a `YYYY[/-.]MM[/-.]DD[ T HH:MM]` date inside free text.
pub fn extract_numeric_datetime(raw: &str, tz: FixedOffset) -> Option<DateTime<Utc>> {
    let caps = NUMERIC_DATETIME_RE.captures(raw)?;

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2)?.as_str().parse().ok()?;
    let day: u32 = caps.get(3)?.as_str().parse().ok()?;
    let hour: u32 = caps
        .get(4)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    let minute: u32 = caps
        .get(5)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    localize(date.and_time(time), tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::default_offset;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_eskom_bulletin_dates() {
        let tz = default_offset();
        assert_eq!(
            parse_eskom_date("2025-Oct-01 09:00:00", tz),
            Some(utc(2025, 10, 1, 7, 0, 0))
        );
        assert_eq!(
            parse_eskom_date("2025-Nov-15 12:00:00", tz),
            Some(utc(2025, 11, 15, 10, 0, 0))
        );
    }

    #[test]
    fn eskom_parser_returns_none_on_other_grammars() {
        let tz = default_offset();
        assert_eq!(parse_eskom_date("2025/10/01 09:00", tz), None);
        assert_eq!(parse_eskom_date("01 October 2025", tz), None);
        assert_eq!(parse_eskom_date("", tz), None);
    }

    #[test]
    fn parses_sanral_numeric_dates_with_and_without_seconds() {
        let tz = default_offset();
        assert_eq!(
            parse_sanral_numeric_date("2025/08/20 12:00", tz),
            Some(utc(2025, 8, 20, 10, 0, 0))
        );
        assert_eq!(
            parse_sanral_numeric_date("2025/08/20 12:00:30", tz),
            Some(utc(2025, 8, 20, 10, 0, 30))
        );
        assert_eq!(parse_sanral_numeric_date("20/08/2025 12:00", tz), None);
    }

    #[test]
    fn parses_transnet_meridiem_dates() {
        let tz = default_offset();
        assert_eq!(
            parse_transnet_date("12/12/2025 4:00:00 PM", tz),
            Some(utc(2025, 12, 12, 14, 0, 0))
        );
        assert_eq!(
            parse_transnet_date("1/2/2025 9:30 am", tz),
            Some(utc(2025, 1, 2, 7, 30, 0))
        );
        assert_eq!(
            parse_transnet_date("12/12/2025 12:00:00 AM", tz),
            Some(utc(2025, 12, 11, 22, 0, 0))
        );
        assert_eq!(parse_transnet_date("2025-12-12T16:00:00", tz), None);
    }

    #[test]
    fn parses_iso_variants() {
        let tz = default_offset();
        assert_eq!(
            parse_iso("2025-03-01T10:15:00Z", tz),
            Some(utc(2025, 3, 1, 10, 15, 0))
        );
        assert_eq!(
            parse_iso("2025-03-01T10:15:00+02:00", tz),
            Some(utc(2025, 3, 1, 8, 15, 0))
        );
        assert_eq!(
            parse_iso("2025-03-01T10:15:00", tz),
            Some(utc(2025, 3, 1, 8, 15, 0))
        );
        assert_eq!(parse_iso("not a date", tz), None);
    }

    #[test]
    fn extracts_textual_dates_from_prose() {
        let tz = default_offset();
        assert_eq!(
            extract_textual_datetime("CLOSING DATE: 20 August 2025 12:00", tz),
            Some(utc(2025, 8, 20, 10, 0, 0))
        );
        assert_eq!(
            extract_textual_datetime("briefing on 14 August 2025 @ 13h00 sharp", tz),
            Some(utc(2025, 8, 14, 11, 0, 0))
        );
        assert_eq!(
            extract_textual_datetime("due 5 Sept 2025", tz),
            Some(utc(2025, 9, 4, 22, 0, 0))
        );
        assert_eq!(
            extract_textual_datetime("opens 1 March 2025 9 AM", tz),
            Some(utc(2025, 3, 1, 7, 0, 0))
        );
        assert_eq!(extract_textual_datetime("no date here", tz), None);
    }

    #[test]
    fn extracts_numeric_dates_from_prose() {
        let tz = default_offset();
        assert_eq!(
            extract_numeric_datetime("submit by 2025-08-20 12:30 at the latest", tz),
            Some(utc(2025, 8, 20, 10, 30, 0))
        );
        assert_eq!(
            extract_numeric_datetime("issued 2025.07.01", tz),
            Some(utc(2025, 6, 30, 22, 0, 0))
        );
        assert_eq!(extract_numeric_datetime("ref 12/345", tz), None);
    }

    #[test]
    fn invalid_calendar_dates_yield_none() {
        let tz = default_offset();
        assert_eq!(extract_numeric_datetime("2025-02-30", tz), None);
        assert_eq!(extract_textual_datetime("31 February 2025", tz), None);
    }
}
