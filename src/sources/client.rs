use async_trait::async_trait;
use meridian_schema::{RawCountry, RawRateTable};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Instant;
use tracing::{info, warn};
use url::Url;

use super::{COUNTRIES_SOURCE, CountrySource, EXCHANGE_RATES_SOURCE, UPSTREAM_BODY_PREVIEW_CHARS};
use crate::config::SourcesConfig;
use crate::error::MeridianError;

/// Plain HTTP client for both upstream feeds. No retries: a failed fetch ends the refresh.
#[derive(Clone)]
pub struct HttpCountrySource {
    client: reqwest::Client,
    countries_url: Url,
    rates_url: Url,
}

impl HttpCountrySource {
    pub fn new(cfg: &SourcesConfig) -> Result<Self, MeridianError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder()
            .user_agent(cfg.user_agent.as_str())
            .connect_timeout(cfg.connect_timeout())
            .timeout(cfg.timeout())
            .default_headers(headers);

        if let Some(proxy_url) = cfg.proxy.as_ref() {
            let proxy = reqwest::Proxy::all(proxy_url.as_str()).map_err(|e| {
                MeridianError::UnexpectedError(format!("invalid proxy url for sources: {e}"))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| {
            MeridianError::UnexpectedError(format!("failed to build sources client: {e}"))
        })?;

        Ok(Self {
            client,
            countries_url: cfg.countries_url.clone(),
            rates_url: cfg.rates_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        source_name: &'static str,
        url: &Url,
    ) -> Result<T, MeridianError> {
        let unavailable = || MeridianError::SourceUnavailable { source_name };
        let start = Instant::now();

        let resp = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(
                source = source_name,
                url = %url,
                timeout = e.is_timeout(),
                error = %e,
                "[{source_name}] Upstream request failed"
            );
            unavailable()
        })?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| {
            warn!(
                source = source_name,
                %status,
                timeout = e.is_timeout(),
                error = %e,
                "[{source_name}] Failed to read upstream body"
            );
            unavailable()
        })?;

        if !status.is_success() {
            warn!(
                source = source_name,
                %status,
                body = %body_preview(&bytes),
                "[{source_name}] Upstream returned non-success status"
            );
            return Err(unavailable());
        }

        let parsed = serde_json::from_slice::<T>(&bytes).map_err(|e| {
            warn!(
                source = source_name,
                error = %e,
                body = %body_preview(&bytes),
                "[{source_name}] Upstream payload did not match the expected shape"
            );
            unavailable()
        })?;

        info!(
            source = source_name,
            bytes = bytes.len(),
            took_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "[{source_name}] Fetched upstream payload"
        );
        Ok(parsed)
    }
}

#[async_trait]
impl CountrySource for HttpCountrySource {
    async fn fetch_countries(&self) -> Result<Vec<RawCountry>, MeridianError> {
        let countries: Vec<RawCountry> =
            self.get_json(COUNTRIES_SOURCE, &self.countries_url).await?;

        if countries.is_empty() {
            warn!(
                source = COUNTRIES_SOURCE,
                "[{COUNTRIES_SOURCE}] Upstream returned an empty list"
            );
            return Err(MeridianError::SourceUnavailable {
                source_name: COUNTRIES_SOURCE,
            });
        }
        Ok(countries)
    }

    async fn fetch_exchange_rates(&self) -> Result<RawRateTable, MeridianError> {
        let table: RawRateTable = self.get_json(EXCHANGE_RATES_SOURCE, &self.rates_url).await?;

        if table.is_error() {
            warn!(
                source = EXCHANGE_RATES_SOURCE,
                result = table.result.as_deref().unwrap_or(""),
                "[{EXCHANGE_RATES_SOURCE}] Upstream reported an error result"
            );
            return Err(MeridianError::SourceUnavailable {
                source_name: EXCHANGE_RATES_SOURCE,
            });
        }
        Ok(table)
    }
}

fn body_preview(bytes: &[u8]) -> String {
    let raw_body = String::from_utf8_lossy(bytes);
    format!("{:.len$}", raw_body, len = UPSTREAM_BODY_PREVIEW_CHARS)
}
