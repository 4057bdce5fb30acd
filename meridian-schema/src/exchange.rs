use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Latest-rates payload of the exchange-rate feed (`GET /v6/latest/USD`).
///
/// Rates are quoted as units of local currency per one unit of `base_code`.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RawRateTable {
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub base_code: Option<String>,
    #[serde(default)]
    pub time_last_update_utc: Option<String>,
    pub rates: HashMap<String, f64>,
}

impl RawRateTable {
    /// The feed reports failures in-band with `"result": "error"`.
    pub fn is_error(&self) -> bool {
        self.result
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("error"))
    }

    /// Rate for `code`, only if it is finite and strictly positive.
    pub fn rate_for(&self, code: &str) -> Option<f64> {
        self.rates
            .get(code)
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }
}
