use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Upstream data sources: the countries directory and the exchange-rate feed.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Countries directory endpoint returning a JSON array.
    /// TOML: `sources.countries_url`.
    #[serde(default = "default_countries_url")]
    pub countries_url: Url,

    /// Exchange-rate endpoint returning `{ "rates": { CODE: rate } }`.
    /// TOML: `sources.rates_url`.
    #[serde(default = "default_rates_url")]
    pub rates_url: Url,

    /// Whole-request timeout for each upstream call, in seconds.
    /// TOML: `sources.timeout_secs`. Default: `15`.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout, in seconds.
    /// TOML: `sources.connect_timeout_secs`. Default: `5`.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Optional upstream HTTP proxy. Example: `http://127.0.0.1:1080`.
    /// TOML: `sources.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// TOML: `sources.user_agent`.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            countries_url: default_countries_url(),
            rates_url: default_rates_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            proxy: None,
            user_agent: default_user_agent(),
        }
    }
}

fn default_countries_url() -> Url {
    Url::parse(
        "https://restcountries.com/v2/all?fields=name,capital,region,population,flag,currencies",
    )
    .expect("valid default countries url")
}

fn default_rates_url() -> Url {
    Url::parse("https://open.er-api.com/v6/latest/USD").expect("valid default rates url")
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    concat!("meridian/", env!("CARGO_PKG_VERSION")).to_string()
}
