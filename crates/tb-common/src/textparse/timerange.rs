use chrono::NaiveTime;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // 12:00-14:00, 12h00 – 14h00, 12.00-14.00; ASCII hyphen or en-dash.
    static ref TIME_RANGE_RE: Regex =
        Regex::new(r"\b(\d{1,2})[:.hH](\d{2})\s*[-–]\s*(\d{1,2})[:.hH](\d{2})\b").unwrap();
}

/// A wall-clock window on a single day, e.g. a briefing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Find the first `HH:MM – HH:MM` style window inside free text.
///
/// When a closing line carries both a date and a window, the deadline is
/// the window's end; callers decide which edge they need.
pub fn extract_time_range(raw: &str) -> Option<TimeRange> {
    let caps = TIME_RANGE_RE.captures(raw)?;

    let start_h: u32 = caps.get(1)?.as_str().parse().ok()?;
    let start_m: u32 = caps.get(2)?.as_str().parse().ok()?;
    let end_h: u32 = caps.get(3)?.as_str().parse().ok()?;
    let end_m: u32 = caps.get(4)?.as_str().parse().ok()?;

    Some(TimeRange {
        start: NaiveTime::from_hms_opt(start_h, start_m, 0)?,
        end: NaiveTime::from_hms_opt(end_h, end_m, 0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn extracts_colon_and_h_separators() {
        assert_eq!(
            extract_time_range("BRIEFING: 14 August 2025 13:00-14:00"),
            Some(TimeRange { start: t(13, 0), end: t(14, 0) })
        );
        assert_eq!(
            extract_time_range("session 09h30 – 11h00 at the hall"),
            Some(TimeRange { start: t(9, 30), end: t(11, 0) })
        );
        assert_eq!(
            extract_time_range("10.00-12.00"),
            Some(TimeRange { start: t(10, 0), end: t(12, 0) })
        );
    }

    #[test]
    fn ignores_lines_without_a_window(){
        assert_eq!(extract_time_range("CLOSING DATE: 20 August 2025 12:00"), None);
        assert_eq!(extract_time_range("contract 2024-2027"), None);
        assert_eq!(extract_time_range(""), None);
    }

    #[test]
    fn out_of_range_clock_values_yield_none() {
        assert_eq!(extract_time_range("25:00-26:00"), None);
        assert_eq!(extract_time_range("10:99-11:00"), None);
    }
}
