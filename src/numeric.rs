//! Numeric and textual coercions for raw values.
//!
//! Template repositories hand back loosely typed JSON values: numbers may
//! arrive as strings (`"65"`) and lists as nested arrays. These helpers
//! normalise them the same way everywhere in the aggregator.

use serde_json::Value;

/// Multiplier applied to summed rate values (`200` means `+200%`).
pub const RATE_SCALE: f64 = 0.01;

/// Read a raw value as a number.
///
/// Numbers are taken as-is, strings are parsed after trimming. Empty
/// strings, arrays, objects, booleans and null are not numeric.
///
/// ```rust
/// use zztag::numeric::to_number;
/// use serde_json::json;
///
/// assert_eq!(to_number(&json!(65)), Some(65.0));
/// assert_eq!(to_number(&json!(" 12.5 ")), Some(12.5));
/// assert_eq!(to_number(&json!("")), None);
/// assert_eq!(to_number(&json!("Botan")), None);
/// ```
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok().filter(|f| !f.is_nan())
            }
        }
        _ => None,
    }
}

/// Wrap a float as a JSON value, falling back to its text for non-finite values.
pub fn number_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(format_number(f)))
}

/// Format a number without a trailing `.0` for integral values.
///
/// ```rust
/// use zztag::numeric::format_number;
///
/// assert_eq!(format_number(10.0), "10");
/// assert_eq!(format_number(2.5), "2.5");
/// ```
pub fn format_number(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{f}")
    }
}

/// Flatten a raw value into its comma-list parts.
///
/// Arrays are flattened, strings trimmed and empty parts dropped. A
/// string is one part even when it contains commas.
pub fn text_parts(value: &Value) -> Vec<String> {
    let mut parts = Vec::new();
    push_parts(value, &mut parts);
    parts
}

fn push_parts(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                parts.push(format_number(f));
            }
        }
        Value::Bool(b) => parts.push(b.to_string()),
        Value::Array(items) => {
            for item in items {
                push_parts(item, parts);
            }
        }
        Value::Object(_) => parts.push(value.to_string()),
    }
}

/// Split a comma list, trimming entries and dropping empty ones.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number_rejects_non_scalars() {
        assert_eq!(to_number(&json!([1])), None);
        assert_eq!(to_number(&json!({ "a": 1 })), None);
        assert_eq!(to_number(&Value::Null), None);
        assert_eq!(to_number(&json!(true)), None);
    }

    #[test]
    fn test_text_parts_flattens() {
        let value = json!(["a, b", ["c"], 10, " ", null]);
        assert_eq!(text_parts(&value), ["a, b", "c", "10"]);
    }

    #[test]
    fn test_number_value_round_trip() {
        assert_eq!(to_number(&number_value(1995.0)), Some(1995.0));
        assert_eq!(number_value(f64::NAN), Value::String("NaN".into()));
    }
}
