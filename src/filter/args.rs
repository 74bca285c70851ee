//! Preset arguments.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Why a set of arguments was rejected, and which keys were at fault
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentError {
    pub keys: Vec<String>,
    pub reason: String,
}

impl ArgumentError {
    pub fn new<S: Into<String>>(keys: &[&str], reason: S) -> Self {
        Self {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            reason: reason.into(),
        }
    }
}

/// Keyword arguments configuring a preset, e.g. `{"value": "ACTIVE"}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterArgs(Map<String, Value>);

impl FilterArgs {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value; `null` means no arguments
    pub fn from_value(value: Value) -> Result<Self, ArgumentError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ArgumentError::new(
                &[],
                format!("arguments must be a JSON object, got {}", other),
            )),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject keys outside `allowed`, naming every offender
    pub fn expect_only(&self, allowed: &[&str]) -> Result<(), ArgumentError> {
        let unknown: Vec<String> = self
            .keys()
            .filter(|k| !allowed.contains(k))
            .map(|k| k.to_string())
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(ArgumentError {
                reason: format!("unexpected argument(s), expected only: {}", allowed.join(", ")),
                keys: unknown,
            })
        }
    }

    /// A required argument of any JSON type other than null
    pub fn required(&self, key: &str) -> Result<&Value, ArgumentError> {
        match self.get(key) {
            Some(Value::Null) | None => {
                Err(ArgumentError::new(&[key], "missing required argument"))
            }
            Some(v) => Ok(v),
        }
    }

    pub fn required_number(&self, key: &str) -> Result<f64, ArgumentError> {
        self.required(key)?
            .as_f64()
            .ok_or_else(|| ArgumentError::new(&[key], "expected a number"))
    }

    pub fn required_str(&self, key: &str) -> Result<&str, ArgumentError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| ArgumentError::new(&[key], "expected a string"))
    }

    /// A required, non-empty list
    pub fn required_list(&self, key: &str) -> Result<&[Value], ArgumentError> {
        let list = self
            .required(key)?
            .as_array()
            .ok_or_else(|| ArgumentError::new(&[key], "expected a list of values"))?;
        if list.is_empty() {
            return Err(ArgumentError::new(
                &[key],
                "list must contain at least one item to match against",
            ));
        }
        Ok(list)
    }

    /// An optional non-negative number, 0 when absent
    pub fn optional_non_negative(&self, key: &str) -> Result<f64, ArgumentError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(0.0),
            Some(v) => match v.as_f64() {
                Some(n) if n >= 0.0 && n.is_finite() => Ok(n),
                Some(_) => Err(ArgumentError::new(&[key], "must not be negative")),
                None => Err(ArgumentError::new(&[key], "expected a number")),
            },
        }
    }
}

impl From<Map<String, Value>> for FilterArgs {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_accepts_object_and_null() {
        let args = FilterArgs::from_value(json!({"value": 1})).unwrap();
        assert_eq!(args.get("value"), Some(&json!(1)));
        assert!(FilterArgs::from_value(Value::Null).unwrap().is_empty());
        assert!(FilterArgs::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_expect_only_names_unknown_keys() {
        let args = FilterArgs::new().with("value", 1).with("valeu", 2).with("x", 3);
        let err = args.expect_only(&["value"]).unwrap_err();
        assert_eq!(err.keys, vec!["valeu".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_required_list_rejects_empty() {
        let args = FilterArgs::new().with("values", json!([]));
        let err = args.required_list("values").unwrap_err();
        assert_eq!(err.keys, vec!["values".to_string()]);
    }

    #[test]
    fn test_optional_non_negative() {
        let args = FilterArgs::new().with("days", 2).with("hours", -1);
        assert_eq!(args.optional_non_negative("days").unwrap(), 2.0);
        assert_eq!(args.optional_non_negative("minutes").unwrap(), 0.0);
        assert!(args.optional_non_negative("hours").is_err());
    }
}
