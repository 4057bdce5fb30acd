//! Upstream data sources: the countries directory and the exchange-rate feed.

mod client;

pub use client::HttpCountrySource;

use async_trait::async_trait;
use meridian_schema::{RawCountry, RawRateTable};

use crate::error::MeridianError;

pub const COUNTRIES_SOURCE: &str = "countries";
pub const EXCHANGE_RATES_SOURCE: &str = "exchange_rates";

/// Max chars of an upstream body included in diagnostics.
pub const UPSTREAM_BODY_PREVIEW_CHARS: usize = 256;

/// Both fetches fail only with [`MeridianError::SourceUnavailable`].
#[async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_countries(&self) -> Result<Vec<RawCountry>, MeridianError>;

    async fn fetch_exchange_rates(&self) -> Result<RawRateTable, MeridianError>;
}
