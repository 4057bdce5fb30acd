mod basic;
mod service;
mod sources;

pub use basic::BasicConfig;
pub use service::{RefreshConfig, SummaryConfig};
pub use sources::SourcesConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::LazyLock};

/// Application configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Core server configuration (see `basic` table in config.toml).
    #[serde(default)]
    pub basic: BasicConfig,

    /// Upstream endpoints and HTTP client settings (see `sources` table).
    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub summary: SummaryConfig,
}

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const ENV_PREFIX: &str = "MERIDIAN_";

impl Config {
    /// Builds a Figment that merges defaults, an optional config TOML file and
    /// `MERIDIAN_`-prefixed environment variables (`__` separates tables).
    pub fn figment() -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
        if PathBuf::from(DEFAULT_CONFIG_FILE).is_file() {
            figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads configuration from every layer, panicking on malformed values.
    pub fn load() -> Self {
        Self::figment()
            .extract()
            .unwrap_or_else(|err| panic!("failed to extract configuration: {err}"))
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::load);
