//! Semantic classification of engine-reported column types.
//!
//! Every dialect maps its raw type strings through the same function so that
//! equivalent logical types take the same canonicalization path on every engine.

/// Canonicalization category of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Character data: trimmed, then hashed.
    String,
    /// Dates and timestamps: formatted to microsecond precision.
    Temporal,
    /// Booleans: rendered as "1" / "0".
    Boolean,
    /// Exact and approximate numerics: canonical decimal text.
    Numeric,
    /// Anything else: cast to a bounded string.
    Other,
}

const STRING_KEYWORDS: &[&str] = &["CHAR"];
const TEMPORAL_KEYWORDS: &[&str] = &["TIME", "DATE"];
const BOOLEAN_KEYWORDS: &[&str] = &["BOOL"];
const NUMERIC_KEYWORDS: &[&str] = &["NUMBER", "NUMERIC", "DECIMAL", "FLOAT", "DOUBLE", "REAL"];

/// Classify a raw type string.
///
/// Matching is by substring on the upper-cased type, checked in the fixed order
/// STRING, TEMPORAL, BOOLEAN, NUMERIC; anything unmatched is OTHER.
pub fn classify(reported_type: &str) -> TypeCategory {
    let upper = reported_type.to_uppercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| upper.contains(k));

    if has_any(STRING_KEYWORDS) {
        TypeCategory::String
    } else if has_any(TEMPORAL_KEYWORDS) {
        TypeCategory::Temporal
    } else if has_any(BOOLEAN_KEYWORDS) {
        TypeCategory::Boolean
    } else if has_any(NUMERIC_KEYWORDS) {
        TypeCategory::Numeric
    } else {
        TypeCategory::Other
    }
}
