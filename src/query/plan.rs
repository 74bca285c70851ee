//! Query plans

use crate::filter::{LocalPredicate, RemoteFilterGroup};
use serde_json::Value;
use std::collections::BTreeSet;

/// A local re-check for a condition that is currently trusted to a remote group
#[derive(Debug, Clone)]
pub(crate) struct Fallback {
    pub keys: BTreeSet<String>,
    pub predicate: LocalPredicate,
}

/// Remote filter groups to list with, plus the local predicates that still
/// have to hold for a listed record to be kept.
///
/// Groups are alternatives whose results are unioned. Predicates are ANDed.
#[derive(Debug, Clone, Default)]
pub struct QueryPlan {
    pub(crate) remote_groups: Vec<RemoteFilterGroup>,
    pub(crate) local_predicates: Vec<LocalPredicate>,
    pub(crate) fallbacks: Vec<Fallback>,
}

impl QueryPlan {
    pub fn remote_groups(&self) -> &[RemoteFilterGroup] {
        &self.remote_groups
    }

    /// Predicates applied to every listed record
    pub fn local_predicates(&self) -> &[LocalPredicate] {
        &self.local_predicates
    }

    /// Predicates that re-check what the remote groups already enforce
    pub fn fallback_predicates(&self) -> impl Iterator<Item = &LocalPredicate> {
        self.fallbacks.iter().map(|f| &f.predicate)
    }

    pub fn is_empty(&self) -> bool {
        self.remote_groups.is_empty() && self.local_predicates.is_empty() && self.fallbacks.is_empty()
    }

    /// Drop every remote group and evaluate everything locally instead
    pub fn into_local_only(self) -> Self {
        let mut local_predicates = self.local_predicates;
        local_predicates.extend(self.fallbacks.into_iter().map(|f| f.predicate));
        Self {
            remote_groups: Vec::new(),
            local_predicates,
            fallbacks: Vec::new(),
        }
    }

    /// AND of the unconditional local predicates
    pub fn matches(&self, record: &Value) -> bool {
        self.local_predicates.iter().all(|p| p.matches(record))
    }
}
