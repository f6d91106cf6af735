//! Inbound payload normalization.
//!
//! Every webhook request collapses to one `data` map regardless of method
//! and content type:
//! - GET and DELETE take the query string (single-value keys become
//!   scalars, repeated keys become lists)
//! - JSON bodies are parsed as objects, falling back to raw-body capture
//!   when the body is not a JSON object
//! - everything else is parsed as a form with the same collapsing rules

use axum::http::{HeaderMap, Method};
use serde_json::Value;
use std::collections::HashMap;
use url::form_urlencoded;

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;

/// Key under which an unparseable body is captured verbatim.
pub const RAW_BODY_KEY: &str = "_raw";

/// Key under which request metadata is attached to the data map.
pub const META_KEY: &str = "_meta";

/// Normalize one inbound request into the plugin data map.
pub fn normalize_payload(
    method: &Method,
    raw_query: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> HashMap<String, Value> {
    if *method == Method::GET || *method == Method::DELETE {
        return collapse_query(raw_query.unwrap_or(""));
    }

    if body.is_empty() {
        return HashMap::new();
    }

    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object.into_iter().collect(),
            // Not an object (or not JSON at all): keep the raw body so the
            // plugin still sees what arrived.
            _ => raw_capture(body),
        }
    } else {
        collapse_query(&String::from_utf8_lossy(body))
    }
}

/// Collapse `key=value` pairs: one value stays a scalar, repeats become a
/// list in arrival order.
pub fn collapse_query(raw: &str) -> HashMap<String, Value> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
        let key = key.into_owned();
        if !grouped.contains_key(&key) {
            order.push(key.clone());
        }
        grouped.entry(key).or_default().push(value.into_owned());
    }

    let mut collapsed = HashMap::with_capacity(order.len());
    for key in order {
        let mut values = grouped.remove(&key).unwrap_or_default();
        let value = if values.len() == 1 {
            Value::String(values.remove(0))
        } else {
            Value::Array(values.into_iter().map(Value::String).collect())
        };
        collapsed.insert(key, value);
    }
    collapsed
}

fn raw_capture(body: &[u8]) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert(
        RAW_BODY_KEY.to_string(),
        Value::String(String::from_utf8_lossy(body).into_owned()),
    );
    map
}

/// Build the `_meta` block attached to every normalized payload.
pub fn request_meta(
    method: &Method,
    headers: &HeaderMap,
    request_id: &str,
) -> Value {
    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    serde_json::json!({
        "method": method.as_str(),
        "headers": header_map,
        "client_ip": client_ip(headers),
        "user_agent": header_str(headers, axum::http::header::USER_AGENT.as_str()),
        "request_id": request_id,
    })
}

/// Best-effort caller address from proxy headers.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        // First hop is the original client.
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    header_str(headers, "x-real-ip")
}

pub fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

/// Stringify a normalized data map for the executor wire, which carries
/// `map<string, string>` only. Strings pass through; other values are
/// serialized to JSON strings.
pub fn stringify_values(data: &HashMap<String, Value>) -> HashMap<String, String> {
    data.iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}
