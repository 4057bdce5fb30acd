use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One entry of the countries directory (`GET /v2/all`).
///
/// Every field is optional at the wire level: a record that lacks a name or a usable
/// population is rejected per record later on, instead of failing the whole payload.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RawCountry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub capital: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "deserialize_population_lax")]
    pub population: Option<i64>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub currencies: Option<Vec<RawCurrency>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RawCurrency {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl RawCountry {
    /// Code of the first listed currency, if it is present and non-blank.
    pub fn first_currency_code(&self) -> Option<&str> {
        self.currencies
            .as_deref()?
            .first()?
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Accepts integers and integral floats (`1000.0`); anything else becomes `None`.
fn deserialize_population_lax<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;

    Ok(match v {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15)
                .map(|f| f as i64)
        }),
        _ => None,
    })
}
