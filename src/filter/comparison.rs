//! Preset comparison logic.
//!
//! A [`Comparison`] is compiled once from a preset and its arguments. Compiling
//! is where argument validation happens, so a malformed filter is rejected
//! before any listing call. Evaluation never fails: values of the wrong shape
//! simply do not match.

use super::args::{ArgumentError, FilterArgs};
use super::preset::Preset;
use super::time::{parse_timestamp, RelativeTime};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Exclusive,
    Inclusive,
}

/// A compiled preset, ready to test property values
#[derive(Debug, Clone)]
pub enum Comparison {
    EqualTo(Value),
    NotEqualTo(Value),
    AnyIn(Vec<Value>),
    NotAnyIn(Vec<Value>),
    GreaterThan(f64, Bound),
    LessThan(f64, Bound),
    /// Timestamp before the cutoff
    OlderThan(DateTime<Utc>, Bound),
    /// Timestamp after the cutoff
    YoungerThan(DateTime<Utc>, Bound),
    MatchesRegex(Regex),
    NotMatchesRegex(Regex),
    Contains(Vec<Value>),
    NotContains(Vec<Value>),
}

impl Comparison {
    /// Validate `args` against `preset` and build the comparison.
    /// Relative-time cutoffs are fixed against `now`.
    pub fn compile(
        preset: Preset,
        args: &FilterArgs,
        now: DateTime<Utc>,
    ) -> Result<Self, ArgumentError> {
        let comparison = match preset {
            Preset::EqualTo | Preset::NotEqualTo => {
                args.expect_only(&["value"])?;
                let value = args.required("value")?.clone();
                if preset == Preset::EqualTo {
                    Comparison::EqualTo(value)
                } else {
                    Comparison::NotEqualTo(value)
                }
            }
            Preset::AnyIn | Preset::NotAnyIn => {
                args.expect_only(&["values"])?;
                let values = args.required_list("values")?.to_vec();
                if preset == Preset::AnyIn {
                    Comparison::AnyIn(values)
                } else {
                    Comparison::NotAnyIn(values)
                }
            }
            Preset::GreaterThan
            | Preset::GreaterThanOrEqualTo
            | Preset::LessThan
            | Preset::LessThanOrEqualTo => {
                args.expect_only(&["value"])?;
                let bound_value = args.required_number("value")?;
                match preset {
                    Preset::GreaterThan => Comparison::GreaterThan(bound_value, Bound::Exclusive),
                    Preset::GreaterThanOrEqualTo => {
                        Comparison::GreaterThan(bound_value, Bound::Inclusive)
                    }
                    Preset::LessThan => Comparison::LessThan(bound_value, Bound::Exclusive),
                    _ => Comparison::LessThan(bound_value, Bound::Inclusive),
                }
            }
            Preset::OlderThan
            | Preset::OlderThanOrEqualTo
            | Preset::YoungerThan
            | Preset::YoungerThanOrEqualTo => {
                let cutoff = RelativeTime::from_args(args)?.cutoff(now)?;
                match preset {
                    Preset::OlderThan => Comparison::OlderThan(cutoff, Bound::Exclusive),
                    Preset::OlderThanOrEqualTo => Comparison::OlderThan(cutoff, Bound::Inclusive),
                    Preset::YoungerThan => Comparison::YoungerThan(cutoff, Bound::Exclusive),
                    _ => Comparison::YoungerThan(cutoff, Bound::Inclusive),
                }
            }
            Preset::MatchesRegex | Preset::NotMatchesRegex => {
                args.expect_only(&["value"])?;
                let pattern = args.required_str("value")?;
                let regex = Regex::new(pattern).map_err(|e| {
                    ArgumentError::new(&["value"], format!("invalid regular expression: {}", e))
                })?;
                if preset == Preset::MatchesRegex {
                    Comparison::MatchesRegex(regex)
                } else {
                    Comparison::NotMatchesRegex(regex)
                }
            }
            Preset::Contains | Preset::NotContains => {
                args.expect_only(&["values"])?;
                let values = match args.required("values")? {
                    Value::Array(list) if list.is_empty() => {
                        return Err(ArgumentError::new(
                            &["values"],
                            "list must contain at least one item to match against",
                        ));
                    }
                    Value::Array(list) => list.clone(),
                    single => vec![single.clone()],
                };
                if preset == Preset::Contains {
                    Comparison::Contains(values)
                } else {
                    Comparison::NotContains(values)
                }
            }
        };
        Ok(comparison)
    }

    /// Test a property value. Never panics; mismatched shapes are `false`.
    pub fn evaluate(&self, prop: &Value) -> bool {
        match self {
            Comparison::EqualTo(expected) => values_equal(prop, expected),
            Comparison::NotEqualTo(expected) => !values_equal(prop, expected),
            Comparison::AnyIn(values) => values.iter().any(|v| values_equal(prop, v)),
            Comparison::NotAnyIn(values) => !values.iter().any(|v| values_equal(prop, v)),
            Comparison::GreaterThan(bound_value, bound) => match as_number(prop) {
                Some(n) => match bound {
                    Bound::Exclusive => n > *bound_value,
                    Bound::Inclusive => n >= *bound_value,
                },
                None => false,
            },
            Comparison::LessThan(bound_value, bound) => match as_number(prop) {
                Some(n) => match bound {
                    Bound::Exclusive => n < *bound_value,
                    Bound::Inclusive => n <= *bound_value,
                },
                None => false,
            },
            Comparison::OlderThan(cutoff, bound) => match as_timestamp(prop) {
                Some(ts) => match bound {
                    Bound::Exclusive => ts < *cutoff,
                    Bound::Inclusive => ts <= *cutoff,
                },
                None => false,
            },
            Comparison::YoungerThan(cutoff, bound) => match as_timestamp(prop) {
                Some(ts) => match bound {
                    Bound::Exclusive => ts > *cutoff,
                    Bound::Inclusive => ts >= *cutoff,
                },
                None => false,
            },
            Comparison::MatchesRegex(regex) => regex_matches(regex, prop),
            Comparison::NotMatchesRegex(regex) => {
                !prop.is_null() && !regex_matches(regex, prop)
            }
            Comparison::Contains(values) => list_contains(prop, values),
            Comparison::NotContains(values) => prop.is_array() && !list_contains(prop, values),
        }
    }
}

/// JSON equality with numbers compared numerically, so `1 == 1.0`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn as_number(prop: &Value) -> Option<f64> {
    match prop {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(prop: &Value) -> Option<DateTime<Utc>> {
    prop.as_str().and_then(parse_timestamp)
}

/// Prefix match on strings; lists of strings match if any element does
fn regex_matches(regex: &Regex, prop: &Value) -> bool {
    let matches_at_start = |s: &str| regex.find(s).is_some_and(|m| m.start() == 0);
    match prop {
        Value::String(s) => matches_at_start(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .any(matches_at_start),
        _ => false,
    }
}

fn list_contains(prop: &Value, values: &[Value]) -> bool {
    match prop.as_array() {
        Some(items) => values
            .iter()
            .all(|wanted| items.iter().any(|item| values_equal(item, wanted))),
        None => false,
    }
}
