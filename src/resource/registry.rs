//! Resource Registry - Load resource definitions from JSON
//!
//! Resource types, their properties, and the filter tables that say which
//! preset/property pairs can be checked locally or pushed to the API are all
//! declared in embedded JSON files. A [`Catalogue`] is built once and handed
//! to queries explicitly.

use crate::error::{QueryError, QueryResult};
use crate::filter::preset::{normalize_alias, Preset, PresetKind};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/compute.json"),
    include_str!("../resources/identity.json"),
    include_str!("../resources/image.json"),
];

/// Value type held by a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    String,
    Integer,
    Datetime,
    Bool,
    List,
}

impl PropertyKind {
    /// Whether presets of `kind` can be applied to properties of this kind
    pub fn accepts(self, kind: PresetKind) -> bool {
        match kind {
            PresetKind::Generic => true,
            PresetKind::Numeric => self == PropertyKind::Integer,
            PresetKind::Datetime => self == PropertyKind::Datetime,
            PresetKind::String => matches!(self, PropertyKind::String | PropertyKind::List),
            PresetKind::List => self == PropertyKind::List,
        }
    }
}

/// How filter arguments become a remote parameter value
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteTransform {
    /// Pass the argument through unchanged
    #[default]
    Value,
    /// Boolean negation of the argument
    Negate,
    /// Numeric argument truncated to an integer
    Integer,
    /// Relative time turned into an absolute timestamp, with an optional operator prefix
    Timestamp {
        #[serde(default)]
        prefix: String,
    },
}

/// One entry of a resource's remote filter table
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFilterDef {
    pub preset: String,
    pub property: String,
    pub param: String,
    #[serde(default)]
    pub transform: RemoteTransform,
}

/// How run options map onto listing parameters for a resource type
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    #[default]
    Unscoped,
    Projects {
        project_param: String,
        #[serde(default)]
        all_projects_param: Option<String>,
    },
    Domain {
        domain_param: String,
        default_domain: String,
    },
}

/// A property on a specific resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct PropertyRef {
    pub resource: String,
    pub property: String,
}

impl fmt::Display for PropertyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.property)
    }
}

/// Property definition from JSON
#[derive(Debug, Clone, Deserialize)]
struct PropertyEntry {
    path: String,
    kind: PropertyKind,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
struct ResourceEntry {
    display_name: String,
    service: String,
    path: String,
    response_path: String,
    marker_property: String,
    #[serde(default)]
    aliases: Vec<String>,
    properties: BTreeMap<String, PropertyEntry>,
    #[serde(default)]
    local_filters: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    remote_filters: Vec<RemoteFilterDef>,
    #[serde(default)]
    chain_links: BTreeMap<String, Vec<PropertyRef>>,
    #[serde(default)]
    scope: Scope,
    /// False for APIs that return everything in one response
    #[serde(default = "default_paginated")]
    paginated: bool,
}

fn default_paginated() -> bool {
    true
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
struct ResourceFile {
    #[serde(default)]
    resources: BTreeMap<String, ResourceEntry>,
}

/// A named, extractable attribute of one resource type
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub resource: String,
    pub name: String,
    pub path: String,
    pub kind: PropertyKind,
    pub aliases: Vec<String>,
    pub description: String,
}

impl PropertyDef {
    /// Read this property from a listed record.
    ///
    /// The path is dot-separated; numeric segments index into arrays. An absent
    /// segment or a `null` leaf is `FieldMissing`.
    pub fn extract<'r>(&self, record: &'r Value) -> QueryResult<&'r Value> {
        let mut current = record;
        for part in self.path.split('.') {
            let next = match current {
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => current.get(part),
            };
            current = match next {
                Some(v) => v,
                None => return Err(self.missing()),
            };
        }
        if current.is_null() {
            return Err(self.missing());
        }
        Ok(current)
    }

    fn missing(&self) -> QueryError {
        QueryError::FieldMissing {
            property: self.name.clone(),
            path: self.path.clone(),
        }
    }
}

/// A fully validated resource type
#[derive(Debug, Clone)]
pub struct ResourceType {
    pub key: String,
    pub display_name: String,
    pub service: String,
    pub path: String,
    pub response_path: String,
    pub aliases: Vec<String>,
    /// Whether listings follow the limit/marker convention
    pub paginated: bool,
    marker_property: String,
    properties: BTreeMap<String, PropertyDef>,
    property_aliases: HashMap<String, String>,
    local_support: HashMap<Preset, BTreeSet<String>>,
    remote_filters: HashMap<(Preset, String), RemoteFilterDef>,
    chain_links: BTreeMap<String, Vec<PropertyRef>>,
    scope: Scope,
}

impl ResourceType {
    /// Look up a property by canonical name or alias (case-insensitive)
    pub fn property(&self, alias: &str) -> QueryResult<&PropertyDef> {
        self.property_aliases
            .get(&normalize_alias(alias))
            .and_then(|name| self.properties.get(name))
            .ok_or_else(|| QueryError::UnknownProperty {
                resource: self.key.clone(),
                property: alias.to_string(),
            })
    }

    pub fn properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.values()
    }

    /// The property used as pagination cursor and deduplication key
    pub fn marker(&self) -> &PropertyDef {
        &self.properties[&self.marker_property]
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn supports_local(&self, preset: Preset, property: &PropertyDef) -> bool {
        property.resource == self.key
            && self
                .local_support
                .get(&preset)
                .is_some_and(|props| props.contains(&property.name))
    }

    pub fn remote_filter(&self, preset: Preset, property: &PropertyDef) -> Option<&RemoteFilterDef> {
        if property.resource != self.key {
            return None;
        }
        self.remote_filters.get(&(preset, property.name.clone()))
    }

    pub fn chain_links(&self, property: &PropertyDef) -> Option<&[PropertyRef]> {
        self.chain_links
            .get(&property.name)
            .map(|links| links.as_slice())
    }

    fn from_entry(key: &str, entry: ResourceEntry) -> QueryResult<Self> {
        let mut properties = BTreeMap::new();
        let mut property_aliases = HashMap::new();

        for (name, prop) in entry.properties {
            for alias in prop.aliases.iter().chain(std::iter::once(&name)) {
                let normalized = normalize_alias(alias);
                if let Some(existing) = property_aliases.insert(normalized, name.clone()) {
                    if existing != name {
                        return Err(QueryError::catalogue(format!(
                            "{}: alias '{}' used by both '{}' and '{}'",
                            key, alias, existing, name
                        )));
                    }
                }
            }
            properties.insert(
                name.clone(),
                PropertyDef {
                    resource: key.to_string(),
                    name,
                    path: prop.path,
                    kind: prop.kind,
                    aliases: prop.aliases,
                    description: prop.description,
                },
            );
        }

        if !properties.contains_key(&entry.marker_property) {
            return Err(QueryError::catalogue(format!(
                "{}: marker property '{}' is not defined",
                key, entry.marker_property
            )));
        }

        let mut local_support: HashMap<Preset, BTreeSet<String>> = HashMap::new();
        for (preset_name, props) in &entry.local_filters {
            let preset = parse_preset(key, preset_name)?;
            let supported = local_support.entry(preset).or_default();
            for prop_name in props {
                if prop_name == "*" {
                    supported.extend(
                        properties
                            .values()
                            .filter(|p| p.kind.accepts(preset.kind()))
                            .map(|p| p.name.clone()),
                    );
                    continue;
                }
                let prop = lookup(key, &properties, prop_name)?;
                if !prop.kind.accepts(preset.kind()) {
                    return Err(QueryError::catalogue(format!(
                        "{}: preset '{}' cannot apply to {:?} property '{}'",
                        key, preset, prop.kind, prop_name
                    )));
                }
                supported.insert(prop.name.clone());
            }
        }

        let mut remote_filters = HashMap::new();
        for def in entry.remote_filters {
            let preset = parse_preset(key, &def.preset)?;
            lookup(key, &properties, &def.property)?;
            let is_time_transform = matches!(def.transform, RemoteTransform::Timestamp { .. });
            if is_time_transform != preset.is_relative_time() {
                return Err(QueryError::catalogue(format!(
                    "{}: remote filter '{}' on '{}' must use a timestamp transform exactly when the preset is relative-time",
                    key, preset, def.property
                )));
            }
            remote_filters.insert((preset, def.property.clone()), def);
        }

        for prop_name in entry.chain_links.keys() {
            lookup(key, &properties, prop_name)?;
        }

        Ok(Self {
            key: key.to_string(),
            display_name: entry.display_name,
            service: entry.service,
            path: entry.path,
            response_path: entry.response_path,
            aliases: entry.aliases,
            paginated: entry.paginated,
            marker_property: entry.marker_property,
            properties,
            property_aliases,
            local_support,
            remote_filters,
            chain_links: entry.chain_links,
            scope: entry.scope,
        })
    }
}

fn lookup<'a>(
    resource: &str,
    properties: &'a BTreeMap<String, PropertyDef>,
    name: &str,
) -> QueryResult<&'a PropertyDef> {
    properties.get(name).ok_or_else(|| {
        QueryError::catalogue(format!("{}: unknown property '{}'", resource, name))
    })
}

fn parse_preset(resource: &str, name: &str) -> QueryResult<Preset> {
    Preset::from_alias(name).map_err(|_| {
        QueryError::catalogue(format!("{}: unknown preset '{}'", resource, name))
    })
}

/// All resource types known to a query session
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    resources: BTreeMap<String, Arc<ResourceType>>,
    aliases: HashMap<String, String>,
}

impl Catalogue {
    /// The built-in OpenStack catalogue
    pub fn builtin() -> QueryResult<Self> {
        Self::from_json_sources(RESOURCE_FILES)
    }

    /// Build a catalogue from one or more resource JSON documents
    pub fn from_json_sources(sources: &[&str]) -> QueryResult<Self> {
        let mut catalogue = Catalogue::default();

        for content in sources {
            let partial: ResourceFile = serde_json::from_str(content)
                .map_err(|e| QueryError::catalogue(format!("failed to parse resource JSON: {}", e)))?;

            for (key, entry) in partial.resources {
                for alias in entry.aliases.iter().chain(std::iter::once(&key)) {
                    catalogue.aliases.insert(normalize_alias(alias), key.clone());
                }
                let resource = ResourceType::from_entry(&key, entry)?;
                catalogue.resources.insert(key, Arc::new(resource));
            }
        }

        catalogue.validate_chain_links()?;
        Ok(catalogue)
    }

    fn validate_chain_links(&self) -> QueryResult<()> {
        for resource in self.resources.values() {
            for (source, targets) in &resource.chain_links {
                for target in targets {
                    let target_resource = self.resources.get(&target.resource).ok_or_else(|| {
                        QueryError::catalogue(format!(
                            "{}.{}: chain target resource '{}' is not defined",
                            resource.key, source, target.resource
                        ))
                    })?;
                    if !target_resource.properties.contains_key(&target.property) {
                        return Err(QueryError::catalogue(format!(
                            "{}.{}: chain target '{}' is not defined",
                            resource.key, source, target
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Get a resource type by key or alias
    pub fn resource(&self, alias: &str) -> QueryResult<Arc<ResourceType>> {
        self.aliases
            .get(&normalize_alias(alias))
            .and_then(|key| self.resources.get(key))
            .cloned()
            .ok_or_else(|| QueryError::UnknownResource(alias.to_string()))
    }

    /// Get all resource keys (for help output)
    pub fn keys(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }
}
