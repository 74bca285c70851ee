//! Error types for query building and execution.
//!
//! Plan-building errors are always raised before any listing call is made.
//! Listing errors carry the remote group that was in flight.

use thiserror::Error;

/// Result alias for engine operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Errors raised while resolving filters, building plans, running or chaining queries.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A preset alias did not match any known preset.
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    /// A property alias did not match any property of the resource type.
    #[error("unknown property '{property}' for resource '{resource}'")]
    UnknownProperty { resource: String, property: String },

    /// A resource alias did not match any catalogued resource type.
    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    /// No local predicate is registered for the preset/property pair.
    #[error("preset '{preset}' is not supported for property '{property}' on '{resource}'")]
    UnsupportedCombination {
        resource: String,
        preset: String,
        property: String,
    },

    /// Arguments failed validation for the preset.
    #[error(
        "invalid arguments for preset '{preset}' on property '{property}' (keys: {}): {reason}",
        .keys.join(", ")
    )]
    InvalidFilterArguments {
        preset: String,
        property: String,
        keys: Vec<String>,
        reason: String,
    },

    /// No link exists from the source property to the target resource type.
    #[error("no chain mapping from '{resource}.{property}' to '{target}'")]
    NoChainMapping {
        resource: String,
        property: String,
        target: String,
    },

    /// A record lacks the field backing a property.
    #[error("field '{path}' missing for property '{property}'")]
    FieldMissing { property: String, path: String },

    /// Run options could not be turned into meta-parameters.
    #[error("invalid run parameters: {0}")]
    InvalidMetaParams(String),

    /// The listing primitive failed. Not retried.
    #[error("listing '{resource}' failed (remote group: {group}): {source:#}")]
    Listing {
        resource: String,
        group: String,
        #[source]
        source: anyhow::Error,
    },

    /// Group names were asked of ungrouped results, or do not exist.
    #[error("invalid groups: {0}")]
    InvalidGroups(String),

    /// The resource catalogue is malformed.
    #[error("catalogue error: {0}")]
    Catalogue(String),
}

impl QueryError {
    /// Create a new `Catalogue` error.
    pub fn catalogue<S: Into<String>>(msg: S) -> Self {
        Self::Catalogue(msg.into())
    }

    /// Create a new `InvalidMetaParams` error.
    pub fn meta<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetaParams(msg.into())
    }

    /// True for errors raised while building a plan, before any call is issued.
    pub fn is_plan_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownPreset(_)
                | Self::UnknownProperty { .. }
                | Self::UnsupportedCombination { .. }
                | Self::InvalidFilterArguments { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_arguments_names_keys() {
        let err = QueryError::InvalidFilterArguments {
            preset: "older_than".to_string(),
            property: "server_creation_date".to_string(),
            keys: vec!["days".to_string(), "hours".to_string()],
            reason: "all time components are zero".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("older_than"));
        assert!(msg.contains("server_creation_date"));
        assert!(msg.contains("days, hours"));
        assert!(err.is_plan_error());
    }

    #[test]
    fn test_listing_error_labels_group() {
        let err = QueryError::Listing {
            resource: "servers".to_string(),
            group: "{status=ACTIVE}".to_string(),
            source: anyhow::anyhow!("API request failed: 500"),
        };
        let msg = err.to_string();
        assert!(msg.contains("{status=ACTIVE}"));
        assert!(msg.contains("500"));
        assert!(!err.is_plan_error());
    }

    #[test]
    fn test_invalid_groups_message() {
        let err = QueryError::InvalidGroups("results are not grouped".to_string());
        assert_eq!(err.to_string(), "invalid groups: results are not grouped");
    }
}
