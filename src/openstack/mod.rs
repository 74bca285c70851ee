//! OpenStack API interaction module
//!
//! - [`client`] - [`ResourceLister`](crate::resource::ResourceLister) over the OpenStack REST APIs
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use stackquery::openstack::OpenStackClient;
//!
//! let client = OpenStackClient::new(&token, &config.endpoints)?;
//! let results = query.run(&client, &settings).await?;
//! ```

pub mod client;
pub mod http;

pub use client::OpenStackClient;
pub use http::format_openstack_error;
