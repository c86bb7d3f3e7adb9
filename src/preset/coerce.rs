//! Type grammars and silent type-change conversion.
//!
//! Conversion never fails: text that cannot be read as a number becomes the
//! zero of the target type.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use super::types::ValueType;

static INT_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("static regex"));

// A dot must be followed by at least one digit: "1.5", ".5", "-3" are valid,
// "-", ".", "5." are not.
static FLOAT_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]*\.?[0-9]+$").expect("static regex"));

/// Reported when `setValue` text did not match its declared type and was
/// coerced before being stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub key: String,
    pub value_type: ValueType,
    pub given: String,
    pub stored: String,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "value {:?} for '{}' does not match type {}; stored {:?}",
            self.given, self.key, self.value_type, self.stored
        )
    }
}

/// Check `raw` against the grammar of `value_type`.
pub fn is_valid(value_type: ValueType, raw: &str) -> bool {
    match value_type {
        ValueType::Int => INT_GRAMMAR.is_match(raw),
        ValueType::Float => FLOAT_GRAMMAR.is_match(raw),
        ValueType::String => true,
    }
}

/// Convert `raw` into the domain of `target`.
///
/// - `int`: nearest integer, halves away from zero, `0` when unparsable
/// - `float`: two decimals, `0.00` when unparsable
/// - `string`: the text as-is
pub fn convert(target: ValueType, raw: &str) -> String {
    match target {
        ValueType::Int => to_int(raw).to_string(),
        ValueType::Float => format!("{:.2}", to_float(raw)),
        ValueType::String => raw.to_string(),
    }
}

/// Text to store for a `setValue`: unchanged when it matches the grammar,
/// otherwise converted, together with the warning to report.
pub fn normalize(key: &str, value_type: ValueType, raw: &str) -> (String, Option<ValidationWarning>) {
    if is_valid(value_type, raw) {
        return (raw.to_string(), None);
    }
    let stored = convert(value_type, raw);
    let warning = ValidationWarning {
        key: key.to_string(),
        value_type,
        given: raw.to_string(),
        stored: stored.clone(),
    };
    (stored, Some(warning))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

fn to_int(raw: &str) -> i64 {
    let text = raw.trim();
    // Exact path first so large integers don't lose precision through f64.
    if INT_GRAMMAR.is_match(text) {
        if let Ok(n) = text.parse::<i64>() {
            return n;
        }
    }
    match parse_number(text) {
        // `as` saturates at the i64 bounds
        Some(n) => n.round() as i64,
        None => 0,
    }
}

fn to_float(raw: &str) -> f64 {
    let rounded = match parse_number(raw) {
        // Past ~1e306 scaling overflows; such values have no fraction anyway
        Some(n) if (n * 100.0).is_finite() => (n * 100.0).round() / 100.0,
        Some(n) => n,
        None => 0.0,
    };
    // no "-0.00"
    if rounded == 0.0 { 0.0 } else { rounded }
}
