//! Client-side predicates.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type PredicateFn = dyn Fn(&Value) -> bool + Send + Sync;

/// A check run against a listed record after it has been fetched.
///
/// The label names the preset and property the predicate was built from.
#[derive(Clone)]
pub struct LocalPredicate {
    label: String,
    func: Arc<PredicateFn>,
}

impl LocalPredicate {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, record: &Value) -> bool {
        (self.func)(record)
    }
}

impl fmt::Debug for LocalPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalPredicate").field(&self.label).finish()
    }
}
