//! Text form of `google.protobuf.Duration`.
//!
//! Decoding accepts the protobuf JSON form (`1.5s`) and a sequence of
//! unit-suffixed numbers (`1h30m`, `250ms`). Encoding always produces the
//! protobuf JSON form.

use core::fmt;

use prost_types::Duration;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Why a duration could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurationError {
    /// Malformed text.
    Invalid(String),
    /// A number is followed by something other than a known unit.
    UnknownUnit {
        /// The unit text
        unit: String,
        /// The whole input
        text: String,
    },
    /// A fractional part does not come out as whole nanoseconds.
    FractionalNanos(String),
    /// A number does not fit in 64 bits.
    Overflow(String),
    /// The total does not fit in `i64` seconds.
    OutOfRange(String),
}

impl fmt::Display for DurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationError::Invalid(text) => write!(f, "invalid duration {text:?}"),
            DurationError::UnknownUnit { unit, text } => {
                write!(f, "unknown unit {unit:?} in duration {text:?}")
            }
            DurationError::FractionalNanos(text) => {
                write!(f, "fractional nanos in duration {text:?}")
            }
            DurationError::Overflow(text) => write!(f, "overflow in duration {text:?}"),
            DurationError::OutOfRange(text) => write!(f, "duration {text:?} out of range"),
        }
    }
}

impl std::error::Error for DurationError {}

fn unit_nanos(unit: &str) -> Option<i128> {
    let nanos = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => 1_000,
        "ms" => 1_000_000,
        "s" => NANOS_PER_SECOND,
        "m" => 60 * NANOS_PER_SECOND,
        "h" => 3_600 * NANOS_PER_SECOND,
        _ => return None,
    };
    Some(nanos)
}

/// Parses a duration such as `1.5s`, `-90s` or `1h1m1.5s`.
///
/// A bare `0` is accepted without a unit. Negative durations carry the sign
/// on both seconds and nanos.
pub fn parse_duration(text: &str) -> Result<Duration, DurationError> {
    let invalid = || DurationError::Invalid(text.to_string());

    let (negative, mut rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if rest == "0" {
        return Ok(Duration::default());
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i128 = 0;
    while !rest.is_empty() {
        let int_len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let (int_text, after) = rest.split_at(int_len);
        rest = after;

        let mut frac_text = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = after_dot.bytes().take_while(u8::is_ascii_digit).count();
            (frac_text, rest) = after_dot.split_at(frac_len);
        }
        if int_text.is_empty() && frac_text.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .bytes()
            .position(|b| matches!(b, b'.' | b'+' | b'-') || b.is_ascii_digit())
            .unwrap_or(rest.len());
        if unit_len == 0 {
            return Err(invalid());
        }
        let (unit, after) = rest.split_at(unit_len);
        rest = after;
        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            unit: unit.to_string(),
            text: text.to_string(),
        })?;

        let whole = if int_text.is_empty() {
            0
        } else {
            int_text
                .parse::<u64>()
                .map_err(|_| DurationError::Overflow(text.to_string()))?
        };
        let mut nanos = i128::from(whole) * scale;

        let frac_text = frac_text.trim_end_matches('0');
        if !frac_text.is_empty() {
            // No unit has more than 12 decimal places of nanoseconds.
            if frac_text.len() > 18 {
                return Err(DurationError::FractionalNanos(text.to_string()));
            }
            let digits: i128 = frac_text.parse().map_err(|_| invalid())?;
            let divisor = 10i128.pow(frac_text.len() as u32);
            let scaled = digits * scale;
            if scaled % divisor != 0 {
                return Err(DurationError::FractionalNanos(text.to_string()));
            }
            nanos += scaled / divisor;
        }

        total = total
            .checked_add(nanos)
            .ok_or_else(|| DurationError::Overflow(text.to_string()))?;
    }

    if negative {
        total = -total;
    }
    let seconds = i64::try_from(total / NANOS_PER_SECOND)
        .map_err(|_| DurationError::OutOfRange(text.to_string()))?;
    Ok(Duration {
        seconds,
        nanos: (total % NANOS_PER_SECOND) as i32,
    })
}

/// Formats a duration as `<seconds>[.fff|.ffffff|.fffffffff]s`.
///
/// Returns `None` when seconds and nanos disagree in sign or nanos is out of
/// range.
pub fn format_duration(duration: &Duration) -> Option<String> {
    let Duration { seconds, nanos } = *duration;
    if nanos.unsigned_abs() >= 1_000_000_000
        || (seconds > 0 && nanos < 0)
        || (seconds < 0 && nanos > 0)
    {
        return None;
    }
    let mut out = String::new();
    if seconds < 0 || nanos < 0 {
        out.push('-');
    }
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(seconds.unsigned_abs()));
    out.push_str(&format_fraction(nanos.unsigned_abs()));
    out.push('s');
    Some(out)
}

/// Fractional seconds with 0, 3, 6 or 9 digits.
pub(crate) fn format_fraction(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(text: &str) -> (i64, i32) {
        let d = parse_duration(text).unwrap();
        (d.seconds, d.nanos)
    }

    fn err(text: &str) -> String {
        parse_duration(text).unwrap_err().to_string()
    }

    #[test]
    fn malformed() {
        for text in [
            "", "-", "s", ".", "-s", ".s", "-.", "-.s", "--0s", "0s-0ms", "1s+1s", "1m-", "1",
        ] {
            assert!(err(text).starts_with("invalid duration"), "{text}");
        }
        for text in ["0y", "0so", "0os"] {
            assert!(err(text).contains("unknown unit"), "{text}");
        }
    }

    #[test]
    fn fractional_nanos() {
        for text in [
            "0.5ns",
            "0.0005us",
            "0.0000005μs",
            "0.0000000005ms",
            "1.0000000001s",
        ] {
            assert!(err(text).contains("fractional nanos"), "{text}");
        }
    }

    #[test]
    fn range() {
        assert_eq!(ok("9223372036854775807s"), (i64::MAX, 0));
        assert_eq!(ok("-9223372036854775808s"), (i64::MIN, 0));
        assert!(err("9223372036854775808s").contains("out of range"));
        assert!(err("-9223372036854775809s").contains("out of range"));
        assert!(err("18446744073709551615s").contains("out of range"));
        assert!(err("18446744073709551616s").contains("overflow"));
    }

    #[test]
    fn valid() {
        assert_eq!(ok("0"), (0, 0));
        assert_eq!(ok("0s"), (0, 0));
        assert_eq!(ok("-0s"), (0, 0));
        assert_eq!(ok("1s"), (1, 0));
        assert_eq!(ok("-1s"), (-1, 0));
        assert_eq!(ok("1.5s"), (1, 500_000_000));
        assert_eq!(ok("-1.5s"), (-1, -500_000_000));
        assert_eq!(ok("1.000000001s"), (1, 1));
        assert_eq!(ok("1.000000000s"), (1, 0));
        assert_eq!(ok("1.0000000010s"), (1, 1));
        assert_eq!(ok("1h"), (3600, 0));
        assert_eq!(ok("1m"), (60, 0));
        assert_eq!(ok("1h1m"), (3660, 0));
        assert_eq!(ok("1h1m1s"), (3661, 0));
        assert_eq!(ok("1h1m1.5s"), (3661, 500_000_000));
        assert_eq!(ok("1.5h1m1.5s"), (5461, 500_000_000));
        assert_eq!(ok("1.5h1m1.5s1.5h1m1.5s"), (10923, 0));
        assert_eq!(ok("1h1m1s1ms1us1μs1µs1ns"), (3661, 1_003_001));
    }

    #[test]
    fn formatting() {
        let fmt = |seconds, nanos| format_duration(&Duration { seconds, nanos });
        assert_eq!(fmt(0, 0).as_deref(), Some("0s"));
        assert_eq!(fmt(1, 500_000_000).as_deref(), Some("1.500s"));
        assert_eq!(fmt(-1, -1_000).as_deref(), Some("-1.000001s"));
        assert_eq!(fmt(0, -1).as_deref(), Some("-0.000000001s"));
        assert_eq!(fmt(1, -1), None);
    }
}
