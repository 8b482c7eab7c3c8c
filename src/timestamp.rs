//! RFC 3339 text form of `google.protobuf.Timestamp`.

use chrono::{DateTime, SecondsFormat};
use prost_types::Timestamp;

use crate::duration::format_fraction;

const MIN_SECONDS: i64 = -62_135_596_800;
const MAX_SECONDS: i64 = 253_402_300_799;

/// Parses an RFC 3339 timestamp with up to nanosecond precision.
///
/// The result must fall within `0001-01-01T00:00:00Z` and
/// `9999-12-31T23:59:59.999999999Z`.
pub fn parse_timestamp(text: &str) -> Result<Timestamp, String> {
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| e.to_string())?;
    let seconds = parsed.timestamp();
    if seconds < MIN_SECONDS {
        return Err("before 0001-01-01T00:00:00Z".to_string());
    }
    if seconds > MAX_SECONDS {
        return Err("after 9999-12-31T23:59:59Z".to_string());
    }
    if fraction_digits(text) > 9 {
        return Err("too many fractional second digits".to_string());
    }
    let nanos = parsed.timestamp_subsec_nanos();
    if nanos >= 1_000_000_000 {
        return Err("second out of range".to_string());
    }
    Ok(Timestamp {
        seconds,
        nanos: nanos as i32,
    })
}

fn fraction_digits(text: &str) -> usize {
    let Some(dot) = text.rfind('.') else {
        return 0;
    };
    text[dot + 1..].bytes().take_while(u8::is_ascii_digit).count()
}

/// Formats a timestamp in UTC with 0, 3, 6 or 9 fractional digits.
pub fn format_timestamp(timestamp: &Timestamp) -> Option<String> {
    if !(MIN_SECONDS..=MAX_SECONDS).contains(&timestamp.seconds)
        || !(0..1_000_000_000).contains(&timestamp.nanos)
    {
        return None;
    }
    let time = DateTime::from_timestamp(timestamp.seconds, 0)?;
    let base = time.to_rfc3339_opts(SecondsFormat::Secs, true);
    let base = base.strip_suffix('Z')?;
    Some(format!(
        "{base}{}Z",
        format_fraction(timestamp.nanos as u32)
    ))
}
