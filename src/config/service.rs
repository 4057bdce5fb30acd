use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Ceiling on how long a `POST /countries/refresh` caller waits, in seconds.
    /// TOML: `refresh.timeout_secs`. Default: `25`.
    #[serde(default = "default_refresh_timeout_secs")]
    pub timeout_secs: u64,
}

impl RefreshConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

/// Summary image settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Directory holding the rendered artifact.
    /// TOML: `summary.cache_dir`. Default: `cache`.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// How many countries the ranking shows.
    /// TOML: `summary.top_n`. Default: `5`.
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// `Cache-Control: max-age` sent with the image, in seconds.
    /// TOML: `summary.max_age_secs`. Default: `300`.
    #[serde(default = "default_max_age_secs")]
    pub max_age_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            top_n: default_top_n(),
            max_age_secs: default_max_age_secs(),
        }
    }
}

fn default_refresh_timeout_secs() -> u64 {
    25
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

fn default_top_n() -> usize {
    5
}

fn default_max_age_secs() -> u64 {
    300
}
