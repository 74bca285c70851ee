//! Query plan builder
//!
//! Each accepted filter ends up either trusted to the remote groups (with a
//! fallback kept for local-only execution) or in the unconditional local list.
//! A remote form that only approximates the filter, such as a rounded bound,
//! still narrows the listing but keeps its predicate in the local list.
//! Remote groups from independent filters are combined by cross product, so a
//! plan holding `{G1, G2}` that receives a disjoint `G3` becomes
//! `{G1 ∪ G3, G2 ∪ G3}`. A filter whose remote parameters overlap a key already
//! in the plan is never merged: it is evaluated locally, and so is every
//! remote filter it collided with.

use super::plan::{Fallback, QueryPlan};
use crate::error::QueryResult;
use crate::filter::{FilterArgs, FilterResolver, Preset, RemoteFilterGroup};
use crate::resource::ResourceType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// One caller-supplied predicate: `preset` applied to `property` with `args`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRequest {
    pub preset: Preset,
    pub property: String,
    #[serde(default)]
    pub args: FilterArgs,
}

impl FilterRequest {
    pub fn new(preset: Preset, property: impl Into<String>, args: FilterArgs) -> Self {
        Self {
            preset,
            property: property.into(),
            args,
        }
    }
}

/// Accumulates filter requests into a [`QueryPlan`]
#[derive(Debug, Clone)]
pub struct QueryPlanBuilder {
    resource: Arc<ResourceType>,
    now: DateTime<Utc>,
    plan: QueryPlan,
}

impl QueryPlanBuilder {
    pub fn new(resource: Arc<ResourceType>) -> Self {
        Self::with_clock(resource, Utc::now())
    }

    /// Use a fixed instant for relative-time filters
    pub fn with_clock(resource: Arc<ResourceType>, now: DateTime<Utc>) -> Self {
        Self {
            resource,
            now,
            plan: QueryPlan::default(),
        }
    }

    pub fn resource(&self) -> &Arc<ResourceType> {
        &self.resource
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn build(self) -> QueryPlan {
        self.plan
    }

    pub fn add_request(&mut self, request: &FilterRequest) -> QueryResult<()> {
        self.add_filter(request.preset, &request.property, &request.args)
    }

    /// Resolve one filter and fold it into the plan.
    ///
    /// Any error leaves the plan unchanged.
    pub fn add_filter(&mut self, preset: Preset, property: &str, args: &FilterArgs) -> QueryResult<()> {
        let resolver = FilterResolver::new(&self.resource, self.now);
        let prop = self.resource.property(property)?;
        let local = resolver.resolve_local(preset, prop, args)?;
        let remote = resolver.resolve_remote(preset, prop, args)?;

        let (groups, exact) = match remote {
            Some(remote) if !remote.groups.is_empty() => (remote.groups, remote.exact),
            _ => {
                info!(
                    "{}: no server-side filter for '{}', filtering locally",
                    self.resource.key,
                    local.label()
                );
                self.plan.local_predicates.push(local);
                return Ok(());
            }
        };

        let new_keys: BTreeSet<String> = groups.iter().flat_map(|g| g.keys().cloned()).collect();
        let existing_keys: BTreeSet<String> = self
            .plan
            .remote_groups
            .iter()
            .flat_map(|g| g.keys().cloned())
            .collect();
        let overlap: Vec<&String> = new_keys.intersection(&existing_keys).collect();

        if !overlap.is_empty() {
            info!(
                "{}: server-side parameter(s) {:?} already in use, filtering '{}' locally",
                self.resource.key,
                overlap,
                local.label()
            );
            self.promote_fallbacks(&new_keys);
            self.plan.local_predicates.push(local);
            return Ok(());
        }

        self.plan.remote_groups = if self.plan.remote_groups.is_empty() {
            groups
        } else {
            cross_merge(&self.plan.remote_groups, &groups)
        };
        debug!(
            "{}: '{}' added to {} remote group(s)",
            self.resource.key,
            local.label(),
            self.plan.remote_groups.len()
        );
        if exact {
            self.plan.fallbacks.push(Fallback {
                keys: new_keys,
                predicate: local,
            });
        } else {
            debug!(
                "{}: server-side form of '{}' is approximate, also filtering locally",
                self.resource.key,
                local.label()
            );
            self.plan.local_predicates.push(local);
        }
        Ok(())
    }

    /// Re-check locally every remote condition touching `keys`
    fn promote_fallbacks(&mut self, keys: &BTreeSet<String>) {
        let (promoted, kept): (Vec<Fallback>, Vec<Fallback>) = std::mem::take(&mut self.plan.fallbacks)
            .into_iter()
            .partition(|f| !f.keys.is_disjoint(keys));
        self.plan.fallbacks = kept;
        self.plan
            .local_predicates
            .extend(promoted.into_iter().map(|f| f.predicate));
    }
}

/// Union every existing group with every new group
fn cross_merge(existing: &[RemoteFilterGroup], new: &[RemoteFilterGroup]) -> Vec<RemoteFilterGroup> {
    existing
        .iter()
        .flat_map(|current| {
            new.iter().map(move |extra| {
                let mut merged = current.clone();
                merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::resource::Catalogue;
    use serde_json::json;

    fn builder(resource: &str) -> QueryPlanBuilder {
        let catalogue = Catalogue::builtin().unwrap();
        QueryPlanBuilder::new(catalogue.resource(resource).unwrap())
    }

    fn args(value: serde_json::Value) -> FilterArgs {
        FilterArgs::from_value(value).unwrap()
    }

    #[test]
    fn test_remote_filter_becomes_group() {
        let mut b = builder("servers");
        b.add_filter(Preset::EqualTo, "status", &args(json!({"value": "ACTIVE"})))
            .unwrap();
        let plan = b.build();
        assert_eq!(
            plan.remote_groups(),
            &[RemoteFilterGroup::from([("status".to_string(), json!("ACTIVE"))])]
        );
        assert!(plan.local_predicates().is_empty());
        assert_eq!(plan.fallback_predicates().count(), 1);
    }

    #[test]
    fn test_local_only_filter() {
        let mut b = builder("servers");
        b.add_filter(Preset::MatchesRegex, "name", &args(json!({"value": "^web-"})))
            .unwrap();
        let plan = b.build();
        assert!(plan.remote_groups().is_empty());
        assert_eq!(plan.local_predicates().len(), 1);
    }

    #[test]
    fn test_cross_product_merge() {
        let mut b = builder("servers");
        b.add_filter(Preset::AnyIn, "flavor_id", &args(json!({"values": ["f1", "f2"]})))
            .unwrap();
        b.add_filter(Preset::AnyIn, "status", &args(json!({"values": ["ACTIVE", "ERROR"]})))
            .unwrap();
        let plan = b.build();
        assert_eq!(plan.remote_groups().len(), 4);
        for group in plan.remote_groups() {
            assert_eq!(group.len(), 2);
            assert!(group.contains_key("flavor") && group.contains_key("status"));
        }
        assert!(plan.local_predicates().is_empty());
    }

    #[test]
    fn test_key_collision_downgrades_both() {
        let mut b = builder("servers");
        b.add_filter(Preset::EqualTo, "status", &args(json!({"value": "ACTIVE"})))
            .unwrap();
        b.add_filter(Preset::EqualTo, "status", &args(json!({"value": "ERROR"})))
            .unwrap();
        let plan = b.build();
        assert_eq!(plan.remote_groups().len(), 1);
        assert_eq!(plan.local_predicates().len(), 2);
        assert_eq!(plan.fallback_predicates().count(), 0);
        assert!(!plan.matches(&json!({"status": "ACTIVE"})));
        assert!(!plan.matches(&json!({"status": "ERROR"})));
    }

    #[test]
    fn test_errors_leave_plan_unchanged() {
        let mut b = builder("servers");
        b.add_filter(Preset::EqualTo, "status", &args(json!({"value": "ACTIVE"})))
            .unwrap();

        let err = b
            .add_filter(Preset::LessThan, "status", &args(json!({"value": 1})))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedCombination { .. }));

        let err = b
            .add_filter(Preset::YoungerThan, "created_at", &args(json!({})))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterArguments { .. }));

        let err = b
            .add_filter(Preset::EqualTo, "colour", &args(json!({"value": 1})))
            .unwrap_err();
        assert!(matches!(err, QueryError::UnknownProperty { .. }));

        assert_eq!(b.plan().remote_groups().len(), 1);
        assert!(b.plan().local_predicates().is_empty());
    }

    #[test]
    fn test_add_request() {
        let mut b = builder("flavors");
        let request = FilterRequest::new(Preset::GreaterThanOrEqualTo, "ram", args(json!({"value": 1024})));
        b.add_request(&request).unwrap();
        assert_eq!(b.plan().remote_groups()[0]["minRam"], json!(1024));
        assert_eq!(b.plan().fallback_predicates().count(), 1);
    }

    #[test]
    fn test_approximate_remote_keeps_local_predicate() {
        let mut b = builder("flavors");
        b.add_filter(Preset::GreaterThanOrEqualTo, "ram", &args(json!({"value": 2048.5})))
            .unwrap();
        let plan = b.build();
        assert_eq!(plan.remote_groups()[0]["minRam"], json!(2048));
        assert_eq!(plan.local_predicates().len(), 1);
        assert_eq!(plan.fallback_predicates().count(), 0);
        assert!(!plan.matches(&json!({"id": "f1", "ram": 2048})));
        assert!(plan.matches(&json!({"id": "f2", "ram": 4096})));
    }
}
