//! HTTP currency rate providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::RateBatch;
use crate::config::{CurrencyConfig, CurrencyProviderKind};

const ECB_BASE_URL: &str = "https://api.frankfurter.app";
const FIXER_BASE_URL: &str = "https://data.fixer.io";

#[async_trait]
pub trait CurrencyProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_rates(&self) -> Result<RateBatch>;
}

/// Build the provider selected in the configuration.
pub fn provider_from_config(config: &CurrencyConfig) -> Arc<dyn CurrencyProvider> {
    match config.provider {
        CurrencyProviderKind::Internal => Arc::new(EcbProvider::new(
            config.base_url.as_deref().unwrap_or(ECB_BASE_URL),
        )),
        CurrencyProviderKind::Fixerio => Arc::new(FixerIoProvider::new(
            config.base_url.as_deref().unwrap_or(FIXER_BASE_URL),
            &config.api_key,
        )),
    }
}

/// European Central Bank reference rates served by Frankfurter.
pub struct EcbProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EcbProvider {
    pub fn new(base_url: &str) -> Self {
        EcbProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct EcbResponse {
    base: String,
    date: String,
    rates: BTreeMap<String, f64>,
}

#[async_trait]
impl CurrencyProvider for EcbProvider {
    fn name(&self) -> &'static str {
        "ecb"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_rates(&self) -> Result<RateBatch> {
        let url = format!("{}/latest?from=EUR", self.base_url);
        debug!("Requesting ECB rates: {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("ECB rate request failed")?
            .error_for_status()?
            .json::<EcbResponse>()
            .await
            .context("Failed to parse ECB response")?;

        let date = NaiveDate::parse_from_str(&response.date, "%Y-%m-%d")
            .with_context(|| format!("Invalid ECB date '{}'", response.date))?;
        let timestamp = date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| anyhow!("Invalid ECB date '{}'", response.date))?;

        Ok(RateBatch {
            base: response.base,
            timestamp,
            rates: response.rates,
        })
    }
}

/// fixer.io latest rates; requires an access key.
pub struct FixerIoProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl FixerIoProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        FixerIoProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct FixerError {
    code: i64,
    #[serde(default)]
    info: Option<String>,
}

#[derive(Deserialize, Debug)]
struct FixerResponse {
    success: bool,
    timestamp: Option<i64>,
    base: Option<String>,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
    error: Option<FixerError>,
}

#[async_trait]
impl CurrencyProvider for FixerIoProvider {
    fn name(&self) -> &'static str {
        "fixerio"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_rates(&self) -> Result<RateBatch> {
        if self.api_key.is_empty() {
            return Err(anyhow!("fixer.io requires an API key"));
        }
        let url = format!("{}/api/latest", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("access_key", self.api_key.as_str())])
            .send()
            .await
            .context("fixer.io rate request failed")?
            .error_for_status()?
            .json::<FixerResponse>()
            .await
            .context("Failed to parse fixer.io response")?;

        if !response.success {
            let (code, info) = response
                .error
                .map(|e| (e.code, e.info.unwrap_or_default()))
                .unwrap_or((0, String::new()));
            return Err(anyhow!("fixer.io error {}: {}", code, info));
        }

        let timestamp = response
            .timestamp
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(RateBatch {
            base: response.base.unwrap_or_else(|| "EUR".to_string()),
            timestamp,
            rates: response.rates,
        })
    }
}
