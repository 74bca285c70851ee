//! Chaining one query's output into another query
//!
//! Links are declared per property in the catalogue. Chaining is one hop at a
//! time: the values a source query produced become an `any_in` filter on the
//! linked property of the target resource.

use super::builder::FilterRequest;
use crate::error::{QueryError, QueryResult};
use crate::filter::comparison::values_equal;
use crate::filter::{FilterArgs, Preset};
use crate::resource::{Catalogue, PropertyDef, PropertyRef, ResourceType};
use serde_json::Value;
use std::sync::Arc;

pub struct ChainResolver<'a> {
    catalogue: &'a Catalogue,
}

/// A resolved link from a source property to a property on the target resource
#[derive(Debug, Clone)]
pub struct ChainLink {
    pub source: PropertyDef,
    pub target_resource: Arc<ResourceType>,
    pub target: PropertyDef,
}

impl ChainLink {
    /// The `any_in` filter for the target query, or `None` when no values
    /// were found to chain on
    pub fn filter_for(&self, values: Vec<Value>) -> Option<FilterRequest> {
        chain_filter(&self.target, values)
    }
}

impl<'a> ChainResolver<'a> {
    pub fn new(catalogue: &'a Catalogue) -> Self {
        Self { catalogue }
    }

    /// Every property linked to `source`, on any resource type
    pub fn links(&self, resource: &ResourceType, source: &PropertyDef) -> Vec<PropertyRef> {
        resource
            .chain_links(source)
            .map(|links| links.to_vec())
            .unwrap_or_default()
    }

    /// The link from `source` to the resource type `target`
    pub fn get_link(
        &self,
        resource: &ResourceType,
        source: &PropertyDef,
        target: &str,
    ) -> QueryResult<ChainLink> {
        let target_resource = self.catalogue.resource(target)?;
        let link = self
            .links(resource, source)
            .into_iter()
            .find(|link| link.resource == target_resource.key)
            .ok_or_else(|| QueryError::NoChainMapping {
                resource: resource.key.clone(),
                property: source.name.clone(),
                target: target_resource.key.clone(),
            })?;
        let target_prop = target_resource.property(&link.property)?.clone();
        Ok(ChainLink {
            source: source.clone(),
            target_resource,
            target: target_prop,
        })
    }

    /// The first property of `resource` that links to `target`
    pub fn find_link(&self, resource: &ResourceType, target: &str) -> QueryResult<ChainLink> {
        let target_resource = self.catalogue.resource(target)?;
        for source in resource.properties() {
            let linked = self
                .links(resource, source)
                .iter()
                .any(|link| link.resource == target_resource.key);
            if linked {
                return self.get_link(resource, source, target);
            }
        }
        Err(QueryError::NoChainMapping {
            resource: resource.key.clone(),
            property: "*".to_string(),
            target: target_resource.key.clone(),
        })
    }
}

/// `any_in` over the distinct values, in first-seen order
pub fn chain_filter(target: &PropertyDef, values: Vec<Value>) -> Option<FilterRequest> {
    let mut distinct: Vec<Value> = Vec::new();
    for value in values {
        if value.is_null() {
            continue;
        }
        if !distinct.iter().any(|v| values_equal(v, &value)) {
            distinct.push(value);
        }
    }
    if distinct.is_empty() {
        return None;
    }
    Some(FilterRequest::new(
        Preset::AnyIn,
        target.name.clone(),
        FilterArgs::new().with("values", Value::Array(distinct)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_link_server_flavor() {
        let catalogue = Catalogue::builtin().unwrap();
        let chains = ChainResolver::new(&catalogue);
        let servers = catalogue.resource("servers").unwrap();
        let flavor_id = servers.property("flavor_id").unwrap();

        let link = chains.get_link(&servers, flavor_id, "flavors").unwrap();
        assert_eq!(link.target_resource.key, "flavors");
        assert_eq!(link.target.name, "flavor_id");
    }

    #[test]
    fn test_no_chain_mapping() {
        let catalogue = Catalogue::builtin().unwrap();
        let chains = ChainResolver::new(&catalogue);
        let servers = catalogue.resource("servers").unwrap();
        let status = servers.property("status").unwrap();

        let err = chains.get_link(&servers, status, "flavors").unwrap_err();
        assert!(matches!(err, QueryError::NoChainMapping { .. }));
        assert!(chains.find_link(&servers, "servers").is_err());
    }

    #[test]
    fn test_find_link_reverse() {
        let catalogue = Catalogue::builtin().unwrap();
        let chains = ChainResolver::new(&catalogue);
        let users = catalogue.resource("users").unwrap();

        let link = chains.find_link(&users, "servers").unwrap();
        assert_eq!(link.source.name, "user_id");
        assert_eq!(link.target.name, "user_id");
        assert_eq!(link.target.resource, "servers");
    }

    #[test]
    fn test_chain_filter_distinct_values() {
        let catalogue = Catalogue::builtin().unwrap();
        let flavors = catalogue.resource("flavors").unwrap();
        let target = flavors.property("flavor_id").unwrap();

        let request = chain_filter(target, vec![json!("f1"), json!("f2"), json!("f1"), Value::Null]).unwrap();
        assert_eq!(request.preset, Preset::AnyIn);
        assert_eq!(request.args.get("values"), Some(&json!(["f1", "f2"])));
        assert!(chain_filter(target, vec![]).is_none());
    }
}
