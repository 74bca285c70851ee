//! Listing dispatch
//!
//! Maps a resource type plus one page request onto a concrete REST URL, and
//! pulls the record list back out of the response body.

use super::fetcher::PageRequest;
use super::registry::ResourceType;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use url::Url;

/// Build the list URL for one page: `<endpoint>/<path>?<params>&limit=..&marker=..`.
/// Unpaginated resource types get no `limit` or `marker`.
pub fn build_list_url(endpoint: &Url, resource: &ResourceType, request: &PageRequest) -> Result<String> {
    let mut base = endpoint.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let url = base
        .join(resource.path.trim_start_matches('/'))
        .with_context(|| format!("Invalid list path '{}' for {}", resource.path, resource.key))?;

    let mut params: Map<String, Value> = request
        .params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if resource.paginated {
        params.insert("limit".to_string(), Value::from(request.limit));
        if let Some(marker) = &request.marker {
            params.insert("marker".to_string(), Value::String(marker.clone()));
        }
    }

    Ok(add_query_params(url.as_str(), &Value::Object(params)))
}

/// Append parameters as a query string; lists repeat the key
pub fn add_query_params(url: &str, params: &Value) -> String {
    let Value::Object(map) = params else {
        return url.to_string();
    };

    let mut query_parts: Vec<String> = Vec::new();

    for (key, value) in map {
        match value {
            Value::Array(arr) => {
                for item in arr {
                    if let Some(s) = query_value(item) {
                        query_parts.push(format!("{}={}", urlencoding::encode(key), urlencoding::encode(&s)));
                    }
                }
            }
            other => {
                if let Some(s) = query_value(other) {
                    query_parts.push(format!("{}={}", urlencoding::encode(key), urlencoding::encode(&s)));
                }
            }
        }
    }

    if query_parts.is_empty() {
        url.to_string()
    } else if url.contains('?') {
        format!("{}&{}", url, query_parts.join("&"))
    } else {
        format!("{}?{}", url, query_parts.join("&"))
    }
}

fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract items from a response using the resource's response_path
pub fn extract_items(response: &Value, resource: &ResourceType) -> Vec<Value> {
    let raw_items = if resource.response_path.is_empty() {
        response.as_array().cloned().unwrap_or_default()
    } else {
        let mut current = response;
        for part in resource.response_path.split('.') {
            current = match current.get(part) {
                Some(v) => v,
                None => return vec![],
            };
        }
        current.as_array().cloned().unwrap_or_default()
    };

    raw_items
        .into_iter()
        .map(|item| post_process_item(item, resource))
        .collect()
}

/// Add derived fields that properties read from
fn post_process_item(mut item: Value, resource: &ResourceType) -> Value {
    if resource.key != "servers" {
        return item;
    }
    if let Value::Object(ref mut map) = item {
        // addresses: {"net": [{"addr": ..}, ..], ..} flattened to one list
        if let Some(networks) = map.get("addresses").and_then(|v| v.as_object()) {
            let flat: Vec<Value> = networks
                .values()
                .filter_map(|v| v.as_array())
                .flatten()
                .filter_map(|entry| entry.get("addr").cloned())
                .collect();
            map.insert("addresses_flat".to_string(), Value::Array(flat));
        }
    }
    item
}
