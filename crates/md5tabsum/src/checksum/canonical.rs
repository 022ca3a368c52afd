//! Canonical text forms that every dialect's SQL must reproduce.

/// Text substituted for SQL NULL before hashing.
pub const NULL_SENTINEL: &str = "null";

/// Canonical decimal text of a numeric value rendered by an engine.
///
/// - a missing leading zero is restored (`.5` → `0.5`, `-.5` → `-0.5`)
/// - trailing fractional zeros and a dangling point are dropped (`1.50` → `1.5`, `2.` → `2`)
/// - a leading `+` is dropped and negative zero becomes `0`
///
/// Input that is not plain decimal text (exponent notation, NaN) is returned trimmed
/// but otherwise untouched.
pub fn canonical_decimal(text: &str) -> String {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let plain = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().filter(|&b| b == b'.').count() <= 1
        && digits != ".";
    if !plain {
        return trimmed.to_string();
    }

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f.trim_end_matches('0')),
        None => (digits, ""),
    };
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };

    let mut out = String::with_capacity(trimmed.len() + 1);
    if negative && !(int_part == "0" && frac_part.is_empty()) {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
