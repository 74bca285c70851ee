//! OpenStack Client
//!
//! Lists resources from the compute, identity and image REST APIs. Session
//! setup is not done here: the client is handed a token and one endpoint per
//! service.

use super::http::OpenStackHttpClient;
use crate::config::Config;
use crate::resource::dispatch::{build_list_url, extract_items};
use crate::resource::{PageRequest, ResourceLister, ResourceType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

/// Environment variable holding the keystone token
pub const TOKEN_ENV: &str = "OS_AUTH_TOKEN";

#[derive(Clone)]
pub struct OpenStackClient {
    http: OpenStackHttpClient,
    token: String,
    endpoints: BTreeMap<String, Url>,
}

impl OpenStackClient {
    pub fn new(token: &str, endpoints: &BTreeMap<String, String>) -> Result<Self> {
        let mut parsed = BTreeMap::new();
        for (service, raw) in endpoints {
            let url = Url::parse(raw)
                .with_context(|| format!("Invalid endpoint for '{}': {}", service, raw))?;
            parsed.insert(service.clone(), url);
        }

        Ok(Self {
            http: OpenStackHttpClient::new()?,
            token: token.to_string(),
            endpoints: parsed,
        })
    }

    /// Build a client from the config file and `OS_AUTH_TOKEN`
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("{} is not set; export a keystone token first", TOKEN_ENV))?;
        Self::new(&token, &config.endpoints)
    }

    pub fn endpoint(&self, service: &str) -> Result<&Url> {
        self.endpoints
            .get(service)
            .with_context(|| format!("No endpoint configured for service '{}'", service))
    }

    pub async fn get(&self, url: &str) -> Result<Value> {
        self.http.get(url, &self.token).await
    }
}

#[async_trait]
impl ResourceLister for OpenStackClient {
    async fn list_page(&self, resource: &ResourceType, request: &PageRequest) -> Result<Vec<Value>> {
        let endpoint = self.endpoint(&resource.service)?;
        let url = build_list_url(endpoint, resource, request)?;
        let response = self
            .get(&url)
            .await
            .with_context(|| format!("Failed to list {}", resource.display_name))?;
        Ok(extract_items(&response, resource))
    }
}
