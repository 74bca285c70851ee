//! Filter presets and their resolution
//!
//! - [`preset`] - comparison presets and alias parsing
//! - [`args`] - preset arguments
//! - [`comparison`] - compiled comparison logic
//! - [`resolver`] - maps preset/property pairs to local predicates and remote parameters

pub mod args;
pub mod comparison;
pub mod predicate;
pub mod preset;
pub mod resolver;
pub mod time;

use serde_json::Value;
use std::collections::BTreeMap;

pub use args::FilterArgs;
pub use predicate::LocalPredicate;
pub use preset::{Preset, PresetKind};
pub use resolver::{FilterResolver, RemoteFilter};

/// Keyword arguments for one remote listing call
pub type RemoteFilterGroup = BTreeMap<String, Value>;
