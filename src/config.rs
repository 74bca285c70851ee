//! Configuration Management
//!
//! Handles persistent configuration storage for stackquery.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::query::runner::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PAGE_SIZE};

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_true() -> bool {
    true
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service name (`compute`, `identity`, `image`) to endpoint URL
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    /// Project the token is scoped to
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_true")]
    pub server_side_filters: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoints: BTreeMap::new(),
            project_id: None,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            server_side_filters: true,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("stackquery").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_json(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Get effective project (CLI > config > OS_PROJECT_ID)
    pub fn effective_project(&self) -> Option<String> {
        self.project_id
            .clone()
            .or_else(|| std::env::var("OS_PROJECT_ID").ok())
            .filter(|p| !p.is_empty())
    }
}
