//! Numeric literal parsing shared by the scalar and dynamic value decoders.
//!
//! Integers may arrive in hex/octal/binary form, or as floats written by a
//! JSON round-trip (`1e10`). The latter are accepted only when the integer is
//! recovered exactly.

use core::fmt;

/// Largest magnitude recovered from a float literal (the double-precision
/// safe-integer limit).
const MAX_SAFE_FLOAT_INT: u64 = 1 << 53;

/// Why a literal could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralError {
    /// The text is not a number.
    InvalidSyntax(String),
    /// The number does not fit the target width.
    OutOfRange(String),
    /// The float form of an integer cannot be converted exactly.
    PrecisionLoss,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralError::InvalidSyntax(text) => write!(f, "parsing {text:?}: invalid syntax"),
            LiteralError::OutOfRange(text) => write!(f, "parsing {text:?}: value out of range"),
            LiteralError::PrecisionLoss => f.write_str("precision loss"),
        }
    }
}

impl std::error::Error for LiteralError {}

/// Parses an unsigned integer literal.
///
/// Accepts a `0x`/`0o`/`0b` prefix (any case). When integer parsing fails,
/// the text is retried as a non-negative float that must hold an integer
/// below 2^53.
pub fn parse_unsigned(text: &str) -> Result<u64, LiteralError> {
    let (digits, radix) = split_radix(text);
    let err = match u64::from_str_radix(digits, radix) {
        Ok(parsed) if !digits.starts_with('+') => return Ok(parsed),
        Ok(_) => LiteralError::InvalidSyntax(digits.to_string()),
        Err(e) if *e.kind() == core::num::IntErrorKind::PosOverflow => {
            LiteralError::OutOfRange(digits.to_string())
        }
        Err(_) => LiteralError::InvalidSyntax(digits.to_string()),
    };

    let float = match parse_float(digits, 64) {
        Ok(float) if float >= 0.0 => float,
        _ => return Err(err),
    };
    let parsed = float as u64;
    if parsed as f64 != float || parsed >= MAX_SAFE_FLOAT_INT {
        return Err(LiteralError::PrecisionLoss);
    }
    Ok(parsed)
}

/// Parses a signed integer literal into its sign and magnitude.
pub fn parse_signed(text: &str) -> Result<(bool, u64), LiteralError> {
    match text.strip_prefix('-') {
        Some(rest) => parse_unsigned(rest).map(|magnitude| (true, magnitude)),
        None => parse_unsigned(text).map(|magnitude| (false, magnitude)),
    }
}

/// Parses a float literal for a field of the given width (32 or 64 bits).
///
/// `inf`, `infinity` and `nan` are accepted in any case with an optional
/// sign. Finite text that overflows the width is an error.
pub fn parse_float(text: &str, bits: u32) -> Result<f64, LiteralError> {
    let parsed: f64 = text
        .parse()
        .map_err(|_| LiteralError::InvalidSyntax(text.to_string()))?;
    if parsed.is_infinite() && !is_infinity_literal(text) {
        return Err(LiteralError::OutOfRange(text.to_string()));
    }
    if bits == 32 {
        let narrowed = parsed as f32;
        if narrowed.is_infinite() && parsed.is_finite() {
            return Err(LiteralError::OutOfRange(text.to_string()));
        }
        return Ok(f64::from(narrowed));
    }
    Ok(parsed)
}

fn is_infinity_literal(text: &str) -> bool {
    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

fn split_radix(text: &str) -> (&str, u32) {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => return (&text[2..], 16),
            b'o' | b'O' => return (&text[2..], 8),
            b'b' | b'B' => return (&text[2..], 2),
            _ => {}
        }
    }
    (text, 10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_bases() {
        assert_eq!(parse_unsigned("42"), Ok(42));
        assert_eq!(parse_unsigned("0x1F"), Ok(31));
        assert_eq!(parse_unsigned("0O17"), Ok(15));
        assert_eq!(parse_unsigned("0b101"), Ok(5));
        assert_eq!(parse_unsigned("007"), Ok(7));
        assert_eq!(
            parse_unsigned("18446744073709551615"),
            Ok(u64::MAX)
        );
    }

    #[test]
    fn unsigned_float_fallback() {
        assert_eq!(parse_unsigned("1e10"), Ok(10_000_000_000));
        assert_eq!(parse_unsigned("5.0"), Ok(5));
        assert_eq!(parse_unsigned("1.5"), Err(LiteralError::PrecisionLoss));
        // Exactly representable, but at or above 2^53 the float form is
        // treated as lossy.
        assert_eq!(parse_unsigned("9007199254740992.0"), Err(LiteralError::PrecisionLoss));
        assert_eq!(parse_unsigned("9007199254740991.0"), Ok(9_007_199_254_740_991));
        assert_eq!(parse_unsigned("1e300"), Err(LiteralError::PrecisionLoss));
    }

    #[test]
    fn unsigned_errors_keep_integer_cause() {
        assert_eq!(
            parse_unsigned("abc"),
            Err(LiteralError::InvalidSyntax("abc".into()))
        );
        assert_eq!(
            parse_unsigned("-1"),
            Err(LiteralError::InvalidSyntax("-1".into()))
        );
        assert_eq!(
            parse_unsigned("18446744073709551616"),
            Err(LiteralError::PrecisionLoss)
        );
        assert_eq!(
            parse_unsigned("0xFFFFFFFFFFFFFFFFF"),
            Err(LiteralError::OutOfRange("FFFFFFFFFFFFFFFFF".into()))
        );
        assert_eq!(
            parse_unsigned("").unwrap_err().to_string(),
            "parsing \"\": invalid syntax"
        );
    }

    #[test]
    fn signed_magnitude() {
        assert_eq!(parse_signed("-2147483648"), Ok((true, 2_147_483_648)));
        assert_eq!(parse_signed("12"), Ok((false, 12)));
        assert_eq!(parse_signed("-0x10"), Ok((true, 16)));
        assert!(parse_signed("--1").is_err());
    }

    #[test]
    fn floats() {
        assert_eq!(parse_float("1.5", 64), Ok(1.5));
        assert!(parse_float("-inf", 64).unwrap().is_infinite());
        assert!(parse_float("NaN", 64).unwrap().is_nan());
        assert_eq!(
            parse_float("1e400", 64),
            Err(LiteralError::OutOfRange("1e400".into()))
        );
        assert_eq!(
            parse_float("1e39", 32),
            Err(LiteralError::OutOfRange("1e39".into()))
        );
        assert_eq!(parse_float("0.1", 32), Ok(f64::from(0.1f32)));
        assert!(parse_float("one", 64).is_err());
    }
}
