//! Helpers for pulling answers out of raw model output.

use serde_json::Value;

/// Unwrap the answer text from a provider-shaped JSON envelope.
///
/// Recognised shapes, in order: `choices[0].message.content`,
/// `content[0].text`, `response`. Anything else, including non-JSON text, is
/// returned unchanged.
pub fn extract_model_response(raw: &str) -> String {
    let Ok(Value::Object(data)) = serde_json::from_str::<Value>(raw.trim()) else {
        return raw.to_string();
    };

    let extracted = if data.contains_key("choices") {
        data.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
    } else if data.contains_key("content") {
        data.get("content")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
    } else {
        data.get("response")
    };

    match extracted {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => raw.to_string(),
    }
}

/// Trimmed text between `<tag>` and the following `</tag>`.
pub fn extract_tagged<'a>(text: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = text.find(&open)? + open.len();
    let end = text[start..].find(&close)? + start;
    Some(text[start..end].trim())
}

/// Parse the JSON object inside `<tag>...</tag>`.
pub fn parse_tagged_json(text: &str, tag: &str) -> Option<serde_json::Map<String, Value>> {
    let body = extract_tagged(text, tag)?;
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// String value of `key`, treating JSON null, empty strings and the literal
/// `"null"` as absent.
pub fn optional_string(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() && !s.eq_ignore_ascii_case("null") => {
            Some(s.trim().to_string())
        }
        _ => None,
    }
}
