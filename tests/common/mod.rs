//! Shared test support: an in-memory listing primitive and a small catalogue

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use stackquery::resource::{PageRequest, ResourceLister, ResourceType};
use stackquery::Catalogue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A catalogue with one unscoped resource whose remote parameters are plain
/// record fields, so the mock lister can apply them literally.
pub const THINGS_JSON: &str = r#"{
  "resources": {
    "things": {
      "display_name": "Things",
      "service": "test",
      "path": "things",
      "response_path": "things",
      "marker_property": "thing_id",
      "properties": {
        "thing_id": { "path": "id", "kind": "string", "aliases": ["id"] },
        "name": { "path": "name", "kind": "string" },
        "status": { "path": "status", "kind": "string" },
        "size": { "path": "size", "kind": "integer" },
        "created_at": { "path": "created_at", "kind": "datetime" },
        "tags": { "path": "tags", "kind": "list" }
      },
      "local_filters": {
        "equal_to": ["*"],
        "not_equal_to": ["*"],
        "any_in": ["*"],
        "not_any_in": ["*"],
        "matches_regex": ["name"],
        "less_than": ["size"],
        "greater_than": ["size"],
        "older_than": ["created_at"],
        "younger_than": ["created_at"],
        "older_than_or_equal_to": ["created_at"],
        "younger_than_or_equal_to": ["created_at"],
        "contains": ["tags"]
      },
      "remote_filters": [
        { "preset": "equal_to", "property": "name", "param": "name" },
        { "preset": "equal_to", "property": "status", "param": "status" },
        { "preset": "any_in", "property": "name", "param": "name" },
        { "preset": "any_in", "property": "status", "param": "status" }
      ]
    }
  }
}"#;

pub fn things_catalogue() -> Catalogue {
    Catalogue::from_json_sources(&[THINGS_JSON]).expect("test catalogue is valid")
}

pub fn thing(id: &str, name: &str, status: &str) -> Value {
    json!({"id": id, "name": name, "status": status})
}

/// In-memory listing primitive.
///
/// Each remote parameter is matched against the record field found at its
/// configured path (the parameter name itself by default). Pages follow the
/// marker convention on the record's `id`.
pub struct MockLister {
    records: HashMap<String, Vec<Value>>,
    param_paths: HashMap<String, String>,
    ignore_params: bool,
    fail_when: Option<(String, Value)>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, PageRequest)>>,
}

impl MockLister {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            param_paths: HashMap::new(),
            ignore_params: false,
            fail_when: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(mut self, resource: &str, records: Vec<Value>) -> Self {
        self.records.insert(resource.to_string(), records);
        self
    }

    pub fn with_param_path(mut self, param: &str, path: &str) -> Self {
        self.param_paths.insert(param.to_string(), path.to_string());
        self
    }

    /// Return every record whatever the parameters
    pub fn ignoring_params(mut self) -> Self {
        self.ignore_params = true;
        self
    }

    /// Fail any call whose parameters contain `param = value`
    pub fn failing_when(mut self, param: &str, value: Value) -> Self {
        self.fail_when = Some((param.to_string(), value));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<(String, PageRequest)> {
        self.requests.lock().unwrap().clone()
    }

    fn field<'v>(&self, record: &'v Value, param: &str) -> Option<&'v Value> {
        let path = self.param_paths.get(param).map(|p| p.as_str()).unwrap_or(param);
        path.split('.').try_fold(record, |current, part| current.get(part))
    }

    fn matches(&self, record: &Value, request: &PageRequest) -> bool {
        self.ignore_params
            || request
                .params
                .iter()
                .all(|(param, expected)| self.field(record, param) == Some(expected))
    }
}

#[async_trait]
impl ResourceLister for MockLister {
    async fn list_page(&self, resource: &ResourceType, request: &PageRequest) -> Result<Vec<Value>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((resource.key.clone(), request.clone()));

        if let Some((param, value)) = &self.fail_when {
            if request.params.get(param) == Some(value) {
                anyhow::bail!("API request failed: 500 Internal Server Error");
            }
        }

        let matching: Vec<&Value> = self
            .records
            .get(&resource.key)
            .map(|records| records.iter().filter(|r| self.matches(r, request)).collect())
            .unwrap_or_default();

        let start = match &request.marker {
            Some(marker) => matching
                .iter()
                .position(|r| r.get("id").and_then(|id| id.as_str()) == Some(marker.as_str()))
                .map(|i| i + 1)
                .unwrap_or(matching.len()),
            None => 0,
        };

        Ok(matching
            .into_iter()
            .skip(start)
            .take(request.limit)
            .cloned()
            .collect())
    }
}
