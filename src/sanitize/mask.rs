use serde_json::{Map, Value};

use crate::config::MaskKeyword;

const MASK: char = '*';

/// Hide secrets selected by `keywords`.
///
/// - A scalar under an object key matched by any keyword is replaced by
///   `*` repeated once per character of its string form. Objects, arrays
///   and nulls under a matched key are walked instead.
/// - Any other string is checked against the pattern keywords in order; the
///   first one that matches with a non-empty first capture group gets that
///   group masked in place.
///
/// With no keywords the value is returned untouched.
pub fn mask_secrets(value: Value, keywords: &[MaskKeyword]) -> Value {
    if keywords.is_empty() {
        return value;
    }
    mask_value(value, keywords)
}

fn mask_value(value: Value, keywords: &[MaskKeyword]) -> Value {
    match value {
        Value::String(s) => Value::String(mask_capture(s, keywords)),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|item| mask_value(item, keywords)).collect())
        }
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| {
                    let masked = mask_field(&key, value, keywords);
                    (key, masked)
                })
                .collect::<Map<_, _>>(),
        ),
        other => other,
    }
}

fn mask_field(key: &str, value: Value, keywords: &[MaskKeyword]) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) | Value::Null => mask_value(value, keywords),
        scalar if keywords.iter().any(|keyword| keyword.matches_key(key)) => {
            Value::String(mask_all(&scalar_text(&scalar)))
        }
        scalar => mask_value(scalar, keywords),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn mask_all(text: &str) -> String {
    text.chars()
        .map(|c| if is_line_terminator(c) { c } else { MASK })
        .collect()
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

fn mask_capture(text: String, keywords: &[MaskKeyword]) -> String {
    for keyword in keywords {
        let MaskKeyword::Pattern(regex) = keyword else {
            continue;
        };
        let Some(group) = regex.captures(&text).and_then(|captures| captures.get(1)) else {
            continue;
        };
        if group.as_str().is_empty() {
            continue;
        }

        let mut masked = String::with_capacity(text.len());
        masked.push_str(&text[..group.start()]);
        masked.push_str(&mask_all(group.as_str()));
        masked.push_str(&text[group.end()..]);
        return masked;
    }
    text
}
