//! Query building and execution
//!
//! - [`builder`] - folds filter requests into a [`QueryPlan`]
//! - [`runner`] - lists, merges and filters according to a plan
//! - [`meta`] - run options turned into listing parameters
//! - [`chain`] - feeds one query's values into the next
//! - [`api`] - the [`Query`] facade tying them together

pub mod api;
pub mod builder;
pub mod chain;
pub mod meta;
pub mod output;
pub mod plan;
pub mod runner;

pub use api::{Query, QueryResults, RunSettings};
pub use builder::{FilterRequest, QueryPlanBuilder};
pub use chain::{ChainLink, ChainResolver};
pub use meta::{parse_meta_params, MetaParams, RunOptions};
pub use output::SortOrder;
pub use plan::QueryPlan;
pub use runner::QueryRunner;
