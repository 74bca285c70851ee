//! Filter resolution
//!
//! Maps a (preset, property) pair onto a local predicate and, when the
//! resource type declares one, the remote parameters that express the same
//! condition to the listing API.

use super::args::{ArgumentError, FilterArgs};
use super::comparison::{values_equal, Comparison};
use super::predicate::LocalPredicate;
use super::preset::Preset;
use super::time::{format_timestamp, whole_second, RelativeTime};
use super::RemoteFilterGroup;
use crate::error::{QueryError, QueryResult};
use crate::resource::{PropertyDef, RemoteFilterDef, RemoteTransform, ResourceType};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Remote form of one filter
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFilter {
    /// Alternatives, one per value for fan-out presets
    pub groups: Vec<RemoteFilterGroup>,
    /// False when the API can only approximate the condition (a rounded
    /// bound or cutoff), so records must still be checked locally
    pub exact: bool,
}

/// Resolves filters for one resource type.
///
/// `now` is captured once so relative-time filters resolved by the same
/// resolver agree on their cutoff, locally and remotely.
#[derive(Debug, Clone, Copy)]
pub struct FilterResolver<'a> {
    resource: &'a ResourceType,
    now: DateTime<Utc>,
}

impl<'a> FilterResolver<'a> {
    pub fn new(resource: &'a ResourceType, now: DateTime<Utc>) -> Self {
        Self { resource, now }
    }

    pub fn resource(&self) -> &'a ResourceType {
        self.resource
    }

    /// Build the local predicate for `preset` applied to `property`.
    ///
    /// Fails with `UnsupportedCombination` when the resource declares no local
    /// implementation, and with `InvalidFilterArguments` when `args` do not
    /// fit the preset.
    pub fn resolve_local(
        &self,
        preset: Preset,
        property: &PropertyDef,
        args: &FilterArgs,
    ) -> QueryResult<LocalPredicate> {
        self.check_owner(property)?;
        if !self.resource.supports_local(preset, property) {
            return Err(QueryError::UnsupportedCombination {
                resource: self.resource.key.clone(),
                preset: preset.to_string(),
                property: property.name.clone(),
            });
        }

        let comparison = Comparison::compile(preset, args, self.now)
            .map_err(|e| invalid_args(preset, property, e))?;

        let prop = property.clone();
        let label = format!("{} {}", prop.name, preset);
        Ok(LocalPredicate::new(label, move |record: &Value| {
            match prop.extract(record) {
                Ok(value) => comparison.evaluate(value),
                Err(_) => false,
            }
        }))
    }

    /// Build the remote parameter groups for `preset` applied to `property`.
    ///
    /// Returns `Ok(None)` when no remote filter is registered. Fan-out presets
    /// produce one single-value group per distinct listed value.
    pub fn resolve_remote(
        &self,
        preset: Preset,
        property: &PropertyDef,
        args: &FilterArgs,
    ) -> QueryResult<Option<RemoteFilter>> {
        self.check_owner(property)?;
        let def = match self.resource.remote_filter(preset, property) {
            Some(def) => def,
            None => return Ok(None),
        };

        let (values, exact) = self
            .remote_values(preset, def, args)
            .map_err(|e| invalid_args(preset, property, e))?;
        let groups = values
            .into_iter()
            .map(|value| RemoteFilterGroup::from([(def.param.clone(), value)]))
            .collect();
        Ok(Some(RemoteFilter { groups, exact }))
    }

    fn remote_values(
        &self,
        preset: Preset,
        def: &RemoteFilterDef,
        args: &FilterArgs,
    ) -> Result<(Vec<Value>, bool), ArgumentError> {
        if let RemoteTransform::Timestamp { prefix } = &def.transform {
            let cutoff = RelativeTime::from_args(args)?.cutoff(self.now)?;
            // widen to the second the API can express
            let round_up = matches!(preset, Preset::OlderThan | Preset::OlderThanOrEqualTo);
            let (cutoff, exact) = whole_second(cutoff, round_up);
            let value = Value::String(format!("{}{}", prefix, format_timestamp(cutoff)));
            return Ok((vec![value], exact));
        }

        let rounding = Rounding::for_preset(preset);
        if preset.fans_out() {
            let mut distinct: Vec<Value> = Vec::new();
            let mut exact = true;
            for value in args.required_list("values")? {
                let (converted, value_exact) = apply_transform(&def.transform, value, "values", rounding)?;
                exact &= value_exact;
                if !distinct.iter().any(|v| values_equal(v, &converted)) {
                    distinct.push(converted);
                }
            }
            return Ok((distinct, exact));
        }

        let value = args.required("value")?;
        let (converted, exact) = apply_transform(&def.transform, value, "value", rounding)?;
        Ok((vec![converted], exact))
    }

    fn check_owner(&self, property: &PropertyDef) -> QueryResult<()> {
        if property.resource == self.resource.key {
            Ok(())
        } else {
            Err(QueryError::UnknownProperty {
                resource: self.resource.key.clone(),
                property: format!("{}.{}", property.resource, property.name),
            })
        }
    }
}

/// Which way a numeric argument moves when the API only takes integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rounding {
    Up,
    Down,
    TowardZero,
}

impl Rounding {
    /// Round so the remote bound never excludes a record the preset accepts
    fn for_preset(preset: Preset) -> Self {
        match preset {
            Preset::GreaterThan | Preset::GreaterThanOrEqualTo => Rounding::Down,
            Preset::LessThan | Preset::LessThanOrEqualTo => Rounding::Up,
            _ => Rounding::TowardZero,
        }
    }

    fn apply(self, n: f64) -> f64 {
        match self {
            Rounding::Up => n.ceil(),
            Rounding::Down => n.floor(),
            Rounding::TowardZero => n.trunc(),
        }
    }
}

/// The remote value for one argument, and whether it is an exact translation
fn apply_transform(
    transform: &RemoteTransform,
    value: &Value,
    key: &str,
    rounding: Rounding,
) -> Result<(Value, bool), ArgumentError> {
    match transform {
        RemoteTransform::Value => Ok((value.clone(), true)),
        RemoteTransform::Negate => value
            .as_bool()
            .map(|b| (Value::Bool(!b), true))
            .ok_or_else(|| ArgumentError::new(&[key], "expected a boolean")),
        RemoteTransform::Integer => {
            let n = value
                .as_f64()
                .ok_or_else(|| ArgumentError::new(&[key], "expected a number"))?;
            // saturating cast
            let rounded = rounding.apply(n) as i64;
            Ok((Value::from(rounded), rounded as f64 == n))
        }
        RemoteTransform::Timestamp { .. } => Err(ArgumentError::new(
            &[key],
            "timestamp parameters take relative-time arguments",
        )),
    }
}

fn invalid_args(preset: Preset, property: &PropertyDef, err: ArgumentError) -> QueryError {
    QueryError::InvalidFilterArguments {
        preset: preset.to_string(),
        property: property.name.clone(),
        keys: err.keys,
        reason: err.reason,
    }
}
