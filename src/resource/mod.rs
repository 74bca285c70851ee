//! Resource abstraction layer
//!
//! Resource types are data-driven: definitions are loaded from JSON files at
//! compile time, so new resource types and filter mappings can be added
//! without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and validates resource definitions from embedded JSON
//! - [`fetcher`] - The listing primitive and marker-based pagination
//! - [`dispatch`] - Maps a page request onto a REST URL and extracts items
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `compute.json` - servers, flavors, hypervisors
//! - `identity.json` - projects, users
//! - `image.json` - images

pub mod dispatch;
mod fetcher;
mod registry;

pub use fetcher::{fetch_all_pages, marker_of, PageRequest, ResourceLister};
pub use registry::*;
