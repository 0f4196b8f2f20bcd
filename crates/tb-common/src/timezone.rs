use chrono::FixedOffset;

/// Offset applied to portal timestamps that carry no zone of their own.
///
/// All four source portals publish wall-clock times in South African
/// Standard Time; keeping the default in one constant avoids scattering
/// the string across parsers and configuration.
pub const DEFAULT_TZ_OFFSET: &str = "+02:00";

/// Parse an `±HH:MM` offset string into a `FixedOffset`.
pub fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let trimmed = raw.trim();
    let (sign, rest) = match trimmed.as_bytes().first()? {
        b'+' => (1i32, &trimmed[1..]),
        b'-' => (-1i32, &trimmed[1..]),
        _ => (1i32, trimmed),
    };

    let (hours, minutes) = rest.split_once(':')?;
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Resolve the local offset from `TZ_OFFSET`, falling back to `+02:00`.
pub fn local_offset() -> FixedOffset {
    std::env::var("TZ_OFFSET")
        .ok()
        .as_deref()
        .and_then(parse_offset)
        .unwrap_or_else(default_offset)
}

pub fn default_offset() -> FixedOffset {
    parse_offset(DEFAULT_TZ_OFFSET).unwrap_or_else(|| FixedOffset::east_opt(2 * 3600).unwrap())
}
