//! Sorting, grouping and property selection for query results

use crate::error::{QueryError, QueryResult};
use crate::filter::preset::normalize_alias;
use crate::resource::PropertyDef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortOrder {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_alias(s).as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            _ => Err(QueryError::meta(format!("unknown sort order '{}'", s))),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// Sort records by each key in turn; the first key is most significant.
/// Records lacking a key sort after those that have it, in either order.
pub fn sort_records(records: &mut [Value], keys: &[(PropertyDef, SortOrder)]) {
    if keys.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for (prop, order) in keys {
            let ordering = match (prop.extract(a).ok(), prop.extract(b).ok()) {
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    match order {
                        SortOrder::Asc => ord,
                        SortOrder::Desc => ord.reverse(),
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// The selected properties of each record, keyed by canonical name.
/// Missing values are `null`.
pub fn to_props(records: &[Value], props: &[PropertyDef]) -> Vec<Map<String, Value>> {
    records
        .iter()
        .map(|record| {
            props
                .iter()
                .map(|prop| {
                    let value = prop.extract(record).cloned().unwrap_or(Value::Null);
                    (prop.name.clone(), value)
                })
                .collect()
        })
        .collect()
}

/// Key a record is grouped under: strings as-is, other values as JSON text,
/// `null` when the property is missing
pub fn group_key(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => Value::Null.to_string(),
    }
}

/// Split records by the value of `prop`, keeping their relative order
pub fn group_records<'a>(records: &'a [Value], prop: &PropertyDef) -> BTreeMap<String, Vec<&'a Value>> {
    let mut groups: BTreeMap<String, Vec<&'a Value>> = BTreeMap::new();
    for record in records {
        groups
            .entry(group_key(prop.extract(record).ok()))
            .or_default()
            .push(record);
    }
    groups
}

/// Keep only the named groups; every name must exist
pub fn select_groups<T>(mut groups: BTreeMap<String, T>, names: &[&str]) -> QueryResult<BTreeMap<String, T>> {
    if names.is_empty() {
        return Ok(groups);
    }
    if let Some(missing) = names.iter().find(|name| !groups.contains_key(**name)) {
        return Err(QueryError::InvalidGroups(format!(
            "no group '{}' (valid groups: {})",
            missing,
            groups.keys().cloned().collect::<Vec<_>>().join(", ")
        )));
    }
    Ok(names
        .iter()
        .filter_map(|name| groups.remove_entry(*name))
        .collect())
}

/// Parse `prop` or `prop:desc`
pub fn parse_sort_key(key: &str) -> QueryResult<(String, SortOrder)> {
    match key.rsplit_once(':') {
        Some((prop, order)) => Ok((prop.to_string(), order.parse()?)),
        None => Ok((key.to_string(), SortOrder::Asc)),
    }
}
