//! Caller-facing query API
//!
//! ```ignore
//! let catalogue = Catalogue::builtin()?;
//! let mut query = Query::new(&catalogue, "servers")?;
//! query
//!     .where_filter("equal_to", "status", json!({"value": "ACTIVE"}))?
//!     .select(&["id", "name", "flavor_id"])?;
//! let servers = query.run(&client, &RunSettings::default()).await?;
//! if let Some(flavors) = servers.then(&catalogue, "flavors")? {
//!     let flavors = flavors.run(&client, &RunSettings::default()).await?;
//! }
//! ```

use super::builder::{FilterRequest, QueryPlanBuilder};
use super::chain::ChainResolver;
use super::meta::{parse_meta_params, RunOptions};
use super::output::{group_records, select_groups, sort_records, to_props, SortOrder};
use super::plan::QueryPlan;
use super::runner::{QueryRunner, DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_SIZE};
use crate::error::{QueryError, QueryResult};
use crate::filter::comparison::values_equal;
use crate::filter::{FilterArgs, Preset};
use crate::resource::{Catalogue, PropertyDef, ResourceLister, ResourceType};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a query is executed
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub page_size: usize,
    pub max_concurrency: usize,
    /// When false, remote groups are dropped and every filter runs locally
    pub server_side_filters: bool,
    pub options: RunOptions,
    /// Project of the authenticated session, used when no projects are given
    pub current_project: Option<String>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            server_side_filters: true,
            options: RunOptions::default(),
            current_project: None,
        }
    }
}

/// A filtered, sorted query over one resource type
#[derive(Debug, Clone)]
pub struct Query {
    builder: QueryPlanBuilder,
    sort_keys: Vec<(PropertyDef, SortOrder)>,
    selected: Vec<PropertyDef>,
    group_by: Option<PropertyDef>,
}

impl Query {
    pub fn new(catalogue: &Catalogue, resource: &str) -> QueryResult<Self> {
        Ok(Self::for_resource(catalogue.resource(resource)?))
    }

    pub fn for_resource(resource: Arc<ResourceType>) -> Self {
        Self::from_builder(QueryPlanBuilder::new(resource))
    }

    /// Fix "now" for relative-time filters
    pub fn with_clock(resource: Arc<ResourceType>, now: DateTime<Utc>) -> Self {
        Self::from_builder(QueryPlanBuilder::with_clock(resource, now))
    }

    fn from_builder(builder: QueryPlanBuilder) -> Self {
        Self {
            builder,
            sort_keys: Vec::new(),
            selected: Vec::new(),
            group_by: None,
        }
    }

    pub fn resource(&self) -> &Arc<ResourceType> {
        self.builder.resource()
    }

    /// Add a filter by preset and property alias
    pub fn where_filter(&mut self, preset: &str, property: &str, args: Value) -> QueryResult<&mut Self> {
        let preset = Preset::from_alias(preset)?;
        let args = FilterArgs::from_value(args).map_err(|e| QueryError::InvalidFilterArguments {
            preset: preset.to_string(),
            property: property.to_string(),
            keys: e.keys,
            reason: e.reason,
        })?;
        self.builder.add_filter(preset, property, &args)?;
        Ok(self)
    }

    pub fn filter(&mut self, request: &FilterRequest) -> QueryResult<&mut Self> {
        self.builder.add_request(request)?;
        Ok(self)
    }

    /// Add a sort key; earlier keys take precedence
    pub fn sort_by(&mut self, property: &str, order: SortOrder) -> QueryResult<&mut Self> {
        let prop = self.resource().property(property)?.clone();
        self.sort_keys.push((prop, order));
        Ok(self)
    }

    /// Group results by the value of one property; a later call replaces it
    pub fn group_by(&mut self, property: &str) -> QueryResult<&mut Self> {
        self.group_by = Some(self.resource().property(property)?.clone());
        Ok(self)
    }

    pub fn select(&mut self, properties: &[&str]) -> QueryResult<&mut Self> {
        let resource = Arc::clone(self.resource());
        for alias in properties {
            let prop = resource.property(alias)?;
            if !self.selected.iter().any(|p| p.name == prop.name) {
                self.selected.push(prop.clone());
            }
        }
        Ok(self)
    }

    pub fn select_all(&mut self) -> &mut Self {
        self.selected = self.resource().properties().cloned().collect();
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        self.builder.plan()
    }

    /// Execute the query. The plan is consumed.
    pub async fn run(self, lister: &dyn ResourceLister, settings: &RunSettings) -> QueryResult<QueryResults> {
        let resource = Arc::clone(self.resource());
        let meta = parse_meta_params(&resource, &settings.options, settings.current_project.as_deref())?;

        let mut plan = self.builder.build();
        if !settings.server_side_filters {
            plan = plan.into_local_only();
        }

        let runner = QueryRunner::new(settings.page_size, settings.max_concurrency);
        let mut records = runner.run(lister, &resource, &plan, &meta).await?;
        sort_records(&mut records, &self.sort_keys);

        let selected = if self.selected.is_empty() {
            resource.properties().cloned().collect()
        } else {
            self.selected
        };
        Ok(QueryResults {
            resource,
            records,
            selected,
            group_by: self.group_by,
        })
    }
}

/// Records returned by a query run
#[derive(Debug, Clone)]
pub struct QueryResults {
    resource: Arc<ResourceType>,
    records: Vec<Value>,
    selected: Vec<PropertyDef>,
    group_by: Option<PropertyDef>,
}

impl QueryResults {
    pub fn resource(&self) -> &Arc<ResourceType> {
        &self.resource
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Value> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Selected properties per record (every property if none were selected)
    pub fn to_props(&self) -> Vec<Map<String, Value>> {
        to_props(&self.records, &self.selected)
    }

    /// Property the results are grouped by, if any
    pub fn grouped_by(&self) -> Option<&PropertyDef> {
        self.group_by.as_ref()
    }

    /// Records split by the grouping property, groups in key order.
    ///
    /// `names` restricts the output to those groups; empty means all. Fails
    /// when the results are not grouped or a name is not a group.
    pub fn groups(&self, names: &[&str]) -> QueryResult<BTreeMap<String, Vec<&Value>>> {
        let prop = self.group_by.as_ref().ok_or_else(|| {
            QueryError::InvalidGroups(format!("results are not grouped, cannot select {:?}", names))
        })?;
        select_groups(group_records(&self.records, prop), names)
    }

    /// [`to_props`](Self::to_props) per group
    pub fn to_grouped_props(&self, names: &[&str]) -> QueryResult<BTreeMap<String, Vec<Map<String, Value>>>> {
        Ok(self
            .groups(names)?
            .into_iter()
            .map(|(key, records)| {
                let records: Vec<Value> = records.into_iter().cloned().collect();
                (key, to_props(&records, &self.selected))
            })
            .collect())
    }

    /// Distinct values of one property across the records, missing skipped
    pub fn values_of(&self, property: &str) -> QueryResult<Vec<Value>> {
        let prop = self.resource.property(property)?;
        let mut values: Vec<Value> = Vec::new();
        for record in &self.records {
            if let Ok(value) = prop.extract(record) {
                if !values.iter().any(|v| values_equal(v, value)) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    /// A query on `target` narrowed to records linked to these results.
    ///
    /// Returns `None` when the results hold no values to chain on.
    pub fn then(&self, catalogue: &Catalogue, target: &str) -> QueryResult<Option<Query>> {
        let chains = ChainResolver::new(catalogue);
        let link = chains.find_link(&self.resource, target)?;
        self.chain(link)
    }

    /// Like [`then`](Self::then), chaining through a specific property
    pub fn then_via(&self, catalogue: &Catalogue, property: &str, target: &str) -> QueryResult<Option<Query>> {
        let chains = ChainResolver::new(catalogue);
        let source = self.resource.property(property)?;
        let link = chains.get_link(&self.resource, source, target)?;
        self.chain(link)
    }

    fn chain(&self, link: super::chain::ChainLink) -> QueryResult<Option<Query>> {
        let values = self.values_of(&link.source.name)?;
        let Some(request) = link.filter_for(values) else {
            return Ok(None);
        };
        let mut query = Query::for_resource(Arc::clone(&link.target_resource));
        query.filter(&request)?;
        Ok(Some(query))
    }
}
