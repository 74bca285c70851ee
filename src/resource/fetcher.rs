//! Resource Fetcher
//!
//! The listing primitive is abstracted as [`ResourceLister`]: one call returns
//! one page of records. [`fetch_all_pages`] follows the marker convention on
//! top of it until a page comes back short. Unpaginated resource types are
//! listed with a single call.

use super::registry::ResourceType;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Parameters for one page of a listing call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRequest {
    pub params: BTreeMap<String, Value>,
    /// Marker of the last record on the previous page
    pub marker: Option<String>,
    pub limit: usize,
}

/// One page of a "list resources" call against a remote API
#[async_trait]
pub trait ResourceLister: Send + Sync {
    async fn list_page(&self, resource: &ResourceType, request: &PageRequest) -> Result<Vec<Value>>;
}

/// Identity of a record: its marker property rendered as a string
pub fn marker_of(resource: &ResourceType, record: &Value) -> Option<String> {
    match resource.marker().extract(record).ok()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Fetch all records for one parameter set (auto-paginate)
pub async fn fetch_all_pages(
    lister: &dyn ResourceLister,
    resource: &ResourceType,
    params: &BTreeMap<String, Value>,
    page_size: usize,
) -> Result<Vec<Value>> {
    let limit = page_size.max(1);
    if !resource.paginated {
        let request = PageRequest {
            params: params.clone(),
            marker: None,
            limit,
        };
        let items = lister.list_page(resource, &request).await?;
        debug!("{}: unpaginated listing returned {} records", resource.key, items.len());
        return Ok(items);
    }

    let mut all_items = Vec::new();
    let mut marker: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let request = PageRequest {
            params: params.clone(),
            marker: marker.clone(),
            limit,
        };
        let items = lister.list_page(resource, &request).await?;
        pages += 1;
        debug!(
            "{}: page {} returned {} records (marker: {:?})",
            resource.key,
            pages,
            items.len(),
            marker
        );

        let count = items.len();
        let next_marker = match items.last() {
            Some(last) if count >= limit => match marker_of(resource, last) {
                Some(m) => Some(m),
                None => bail!(
                    "{}: last record on page {} has no '{}' to continue from",
                    resource.key,
                    pages,
                    resource.marker().name
                ),
            },
            _ => None,
        };
        all_items.extend(items);

        match next_marker {
            None => break,
            // APIs that ignore the marker hand back the same page again
            Some(next) if marker.as_deref() == Some(next.as_str()) => {
                warn!(
                    "{}: marker '{}' did not advance, stopping pagination",
                    resource.key, next
                );
                break;
            }
            Some(next) => marker = Some(next),
        }
    }

    Ok(all_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Catalogue;
    use serde_json::json;
    use std::sync::Mutex;

    /// Serves pre-built pages in order and records each request
    struct PagedLister {
        pages: Mutex<Vec<Vec<Value>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl PagedLister {
        fn new(pages: Vec<Vec<Value>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ResourceLister for PagedLister {
        async fn list_page(&self, _: &ResourceType, request: &PageRequest) -> Result<Vec<Value>> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self.pages.lock().unwrap().pop().unwrap_or_default())
        }
    }

    fn servers(ids: std::ops::Range<usize>) -> Vec<Value> {
        ids.map(|i| json!({"id": format!("s{}", i)})).collect()
    }

    #[tokio::test]
    async fn test_follows_markers_until_short_page() {
        let catalogue = Catalogue::builtin().unwrap();
        let resource = catalogue.resource("servers").unwrap();
        let lister = PagedLister::new(vec![servers(0..2), servers(2..4), servers(4..5)]);

        let items = fetch_all_pages(&lister, &resource, &BTreeMap::new(), 2)
            .await
            .unwrap();
        assert_eq!(items.len(), 5);

        let requests = lister.requests.lock().unwrap();
        let markers: Vec<_> = requests.iter().map(|r| r.marker.clone()).collect();
        assert_eq!(markers, vec![None, Some("s1".to_string()), Some("s3".to_string())]);
        assert!(requests.iter().all(|r| r.limit == 2));
    }

    #[tokio::test]
    async fn test_stops_on_empty_page() {
        let catalogue = Catalogue::builtin().unwrap();
        let resource = catalogue.resource("servers").unwrap();
        let lister = PagedLister::new(vec![servers(0..2), vec![]]);

        let items = fetch_all_pages(&lister, &resource, &BTreeMap::new(), 2)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(lister.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stops_when_marker_does_not_advance() {
        let catalogue = Catalogue::builtin().unwrap();
        let resource = catalogue.resource("servers").unwrap();
        let lister = PagedLister::new(vec![servers(0..2), servers(0..2), servers(0..2)]);

        let items = fetch_all_pages(&lister, &resource, &BTreeMap::new(), 2)
            .await
            .unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(lister.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unpaginated_resource_is_listed_once() {
        let catalogue = Catalogue::builtin().unwrap();
        let resource = catalogue.resource("aggregates").unwrap();
        let aggregates: Vec<Value> = (0..3).map(|i| json!({"uuid": format!("a{}", i)})).collect();
        let lister = PagedLister::new(vec![aggregates, vec![json!({"uuid": "never"})]]);

        let items = fetch_all_pages(&lister, &resource, &BTreeMap::new(), 2)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);

        let requests = lister.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].marker, None);
    }

    #[tokio::test]
    async fn test_full_page_without_marker_is_error() {
        let catalogue = Catalogue::builtin().unwrap();
        let resource = catalogue.resource("servers").unwrap();
        let lister = PagedLister::new(vec![vec![json!({"name": "a"}), json!({"name": "b"})]]);

        let result = fetch_all_pages(&lister, &resource, &BTreeMap::new(), 2).await;
        assert!(result.is_err());
    }
}
