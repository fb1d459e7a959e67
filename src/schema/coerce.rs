//! Tolerant coercion of raw extract values
//!
//! Administrative extracts encode the same value in several ways: `3`, `03`,
//! `3.0`, ` 3 `. Anything that cannot be read is missing, never an error.

/// Markers that mean "no value" in the source extracts
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none", "-"];

/// Normalize a raw cell: trim it and map missing markers to `None`
#[must_use]
pub fn clean(raw: Option<&str>) -> Option<&str> {
    let value = raw?.trim();
    if MISSING_MARKERS
        .iter()
        .any(|marker| value.eq_ignore_ascii_case(marker))
    {
        None
    } else {
        Some(value)
    }
}

/// Strip a trailing `.0`, `.00`, ... left by float-typed exports of integer codes
fn strip_integral_fraction(value: &str) -> &str {
    match value.split_once('.') {
        Some((int_part, frac)) if !frac.is_empty() && frac.bytes().all(|b| b == b'0') => int_part,
        _ => value,
    }
}

/// Parse a non-negative integer code (`"03"`, `"3.0"`, `" 3 "`)
#[must_use]
pub fn parse_code(raw: Option<&str>) -> Option<u32> {
    let value = strip_integral_fraction(clean(raw)?);
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// Parse a categorical code that fits in a byte
#[must_use]
pub fn parse_small_code(raw: Option<&str>) -> Option<u8> {
    parse_code(raw).and_then(|code| u8::try_from(code).ok())
}

/// Parse a numeric value; accepts a decimal comma when no dot is present
#[must_use]
pub fn parse_number(raw: Option<&str>) -> Option<f64> {
    let value = clean(raw)?;
    let parsed = if value.contains(',') && !value.contains('.') {
        value.replace(',', ".").parse::<f64>().ok()
    } else {
        value.parse::<f64>().ok()
    };
    parsed.filter(|v| v.is_finite())
}

/// Number of digits in the integral part of a code as written
#[must_use]
pub fn digit_count(raw: Option<&str>) -> Option<usize> {
    let value = strip_integral_fraction(clean(raw)?);
    value
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then_some(value.len())
        .filter(|len| *len > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_variants() {
        assert_eq!(parse_code(Some("3")), Some(3));
        assert_eq!(parse_code(Some(" 03 ")), Some(3));
        assert_eq!(parse_code(Some("3.0")), Some(3));
        assert_eq!(parse_code(Some("50001")), Some(50001));
        assert_eq!(parse_code(Some("3.5")), None);
        assert_eq!(parse_code(Some("abc")), None);
        assert_eq!(parse_code(Some("-3")), None);
        assert_eq!(parse_code(Some("NA")), None);
        assert_eq!(parse_code(None), None);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number(Some("12.5")), Some(12.5));
        assert_eq!(parse_number(Some("12,5")), Some(12.5));
        assert_eq!(parse_number(Some(" 7 ")), Some(7.0));
        assert_eq!(parse_number(Some("nan")), None);
        assert_eq!(parse_number(Some("inf")), None);
        assert_eq!(parse_number(Some("x1")), None);
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(Some("001")), Some(3));
        assert_eq!(digit_count(Some("50001.0")), Some(5));
        assert_eq!(digit_count(Some("Meta")), None);
        assert_eq!(digit_count(Some("")), None);
    }
}
