//! Bigint-safe JSON handling (§4.2, Open Question D resolution).
//!
//! Older cache entries may carry integers serialized as a decimal string
//! with a trailing `n` (e.g. `"123n"`), a convention some upstream encoders
//! use to mark "this passed through a bigint". Reads accept that form and
//! normalize it away; new writes never re-add the suffix.

use serde_json::Value;

/// Recursively strips a legacy trailing `n` from any string value that looks
/// like `-?[0-9]+n`, leaving the digits as a plain decimal string.
pub fn normalize_legacy_bigint_suffixes(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(digits) = legacy_bigint_digits(s) {
                *s = digits;
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_legacy_bigint_suffixes(item);
            }
        }
        Value::Object(map) => {
            for (_, v) in map.iter_mut() {
                normalize_legacy_bigint_suffixes(v);
            }
        }
        _ => {}
    }
}

fn legacy_bigint_digits(s: &str) -> Option<String> {
    let body = s.strip_suffix('n')?;
    let digits = body.strip_prefix('-').unwrap_or(body);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(body.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_trailing_n_from_nested_values() {
        let mut value = json!({
            "balance": "123456789012345678901234n",
            "negative": "-42n",
            "label": "not-a-bigint",
            "nested": ["5n", {"inner": "7n"}],
        });
        normalize_legacy_bigint_suffixes(&mut value);
        assert_eq!(value["balance"], "123456789012345678901234");
        assert_eq!(value["negative"], "-42");
        assert_eq!(value["label"], "not-a-bigint");
        assert_eq!(value["nested"][0], "5");
        assert_eq!(value["nested"][1]["inner"], "7");
    }

    #[test]
    fn leaves_plain_strings_and_numbers_untouched() {
        let mut value = json!({"a": "hello", "b": 42, "c": "n"});
        let before = value.clone();
        normalize_legacy_bigint_suffixes(&mut value);
        assert_eq!(value, before);
    }
}
