//! Paginated execution
//!
//! One listing call is made per (remote group x meta-parameter) combination.
//! Calls run concurrently but results are merged in call order, deduplicated
//! by marker, then filtered by the plan's local predicates.

use super::meta::MetaParams;
use super::plan::QueryPlan;
use crate::error::{QueryError, QueryResult};
use crate::filter::RemoteFilterGroup;
use crate::resource::{fetch_all_pages, marker_of, ResourceLister, ResourceType};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Executes query plans against a [`ResourceLister`]
#[derive(Debug, Clone, Copy)]
pub struct QueryRunner {
    page_size: usize,
    max_concurrency: usize,
}

impl Default for QueryRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE, DEFAULT_MAX_CONCURRENCY)
    }
}

impl QueryRunner {
    pub fn new(page_size: usize, max_concurrency: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// List, merge and filter.
    ///
    /// Meta-parameter conflicts are reported before any call is made. The
    /// first listing failure aborts the run; no partial result is returned.
    pub async fn run(
        &self,
        lister: &dyn ResourceLister,
        resource: &ResourceType,
        plan: &QueryPlan,
        meta: &MetaParams,
    ) -> QueryResult<Vec<Value>> {
        let calls = meta.expand(plan.remote_groups())?;
        debug!(
            "{}: {} listing call(s), {} local predicate(s)",
            resource.key,
            calls.len(),
            plan.local_predicates().len()
        );

        let page_size = self.page_size;
        let pages: Vec<Vec<Value>> = stream::iter(calls.into_iter().map(|params| async move {
            debug!("{}: listing with {}", resource.key, describe_group(&params));
            fetch_all_pages(lister, resource, &params, page_size)
                .await
                .map_err(|source| QueryError::Listing {
                    resource: resource.key.clone(),
                    group: describe_group(&params),
                    source,
                })
        }))
        .buffered(self.max_concurrency)
        .try_collect()
        .await?;

        let merged = merge_unique(resource, pages);
        let total = merged.len();
        let kept: Vec<Value> = merged.into_iter().filter(|r| plan.matches(r)).collect();
        debug!("{}: {} of {} records kept", resource.key, kept.len(), total);
        Ok(kept)
    }
}

/// Union of result sets keyed by marker, first occurrence wins
fn merge_unique(resource: &ResourceType, result_sets: Vec<Vec<Value>>) -> Vec<Value> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged = Vec::new();
    let mut unmarked = 0usize;

    for record in result_sets.into_iter().flatten() {
        match marker_of(resource, &record) {
            Some(marker) => {
                if seen.insert(marker) {
                    merged.push(record);
                }
            }
            None => {
                unmarked += 1;
                merged.push(record);
            }
        }
    }

    if unmarked > 0 {
        warn!(
            "{}: {} record(s) without '{}' could not be deduplicated",
            resource.key,
            unmarked,
            resource.marker().name
        );
    }
    merged
}

/// `{key=value, ...}` for log and error messages
pub fn describe_group(group: &RemoteFilterGroup) -> String {
    let parts: Vec<String> = group
        .iter()
        .map(|(k, v)| match v {
            Value::String(s) => format!("{}={}", k, s),
            other => format!("{}={}", k, other),
        })
        .collect();
    format!("{{{}}}", parts.join(", "))
}
