//! Filtered, sorted and chained queries over OpenStack resource listings.
//!
//! Filters are given as a preset ("equal_to", "older_than", "matches_regex",
//! ...) applied to a resource property. Each filter is pushed to the listing
//! API when the resource type declares an equivalent parameter, and is
//! otherwise checked locally after listing.
//!
//! - [`resource`] - resource catalogue, listing primitive and pagination
//! - [`filter`] - presets, arguments and filter resolution
//! - [`query`] - plan building, execution, chaining and output
//! - [`openstack`] - HTTP listing against the OpenStack REST APIs

pub mod config;
pub mod error;
pub mod filter;
pub mod openstack;
pub mod query;
pub mod resource;

pub use error::{QueryError, QueryResult};
pub use filter::{FilterArgs, Preset};
pub use query::{FilterRequest, Query, QueryResults, RunOptions, RunSettings, SortOrder};
pub use resource::{Catalogue, ResourceLister};
