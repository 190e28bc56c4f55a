//! Runtime settings for the live availability fetch.

use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://datamall2.mytransport.sg/ltaodataservice";
pub const CARPARK_ENDPOINT: &str = "CarParkAvailabilityv2";
pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings read from the environment (and `.env`, once the binary has loaded it).
///
/// | Variable            | Default                                             |
/// |---------------------|-----------------------------------------------------|
/// | `LTA_API_KEY`       | none; required for a live fetch                     |
/// | `LTA_BASE_URL`      | `https://datamall2.mytransport.sg/ltaodataservice`  |
/// | `CARPARK_PAGE_SIZE` | `500`                                               |
/// | `HTTP_TIMEOUT_SECS` | `30`                                                |
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub page_size: usize,
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from any variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let page_size = match var("CARPARK_PAGE_SIZE") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("CARPARK_PAGE_SIZE must be a positive integer, got {v:?}"))?,
            None => defaults.page_size,
        };
        anyhow::ensure!(page_size > 0, "CARPARK_PAGE_SIZE must be greater than zero");

        let timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.trim()
                    .parse::<u64>()
                    .with_context(|| format!("HTTP_TIMEOUT_SECS must be whole seconds, got {v:?}"))?,
            ),
            None => defaults.timeout,
        };

        Ok(Self {
            api_key: var("LTA_API_KEY"),
            base_url: var("LTA_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            page_size,
            timeout,
        })
    }

    /// Full URL of the carpark availability endpoint.
    pub fn carpark_url(&self) -> String {
        format!("{}/{}", self.base_url, CARPARK_ENDPOINT)
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("LTA_API_KEY must be set to fetch live availability")
    }
}
