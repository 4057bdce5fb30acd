use chrono::{DateTime, Utc};
use meridian_schema::CountryBody;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbCountry {
    pub id: i64,
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

impl From<DbCountry> for CountryBody {
    fn from(c: DbCountry) -> Self {
        CountryBody {
            id: c.id,
            name: c.name,
            capital: c.capital,
            region: c.region,
            population: c.population,
            currency_code: c.currency_code,
            exchange_rate: c.exchange_rate,
            estimated_gdp: c.estimated_gdp,
            flag_url: c.flag_url,
            last_refreshed_at: c.last_refreshed_at,
        }
    }
}

/// An estimated, not yet persisted country produced by one refresh cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryCandidate {
    pub name: String,
    pub capital: Option<String>,
    pub region: Option<String>,
    pub population: i64,
    pub currency_code: Option<String>,
    pub exchange_rate: Option<f64>,
    pub estimated_gdp: Option<f64>,
    pub flag_url: Option<String>,
    pub last_refreshed_at: DateTime<Utc>,
}

/// Everything one refresh cycle hands to the store: candidates sharing `refreshed_at`.
#[derive(Debug, Clone)]
pub struct RefreshBatch {
    pub refreshed_at: DateTime<Utc>,
    pub candidates: Vec<CountryCandidate>,
}

/// What the reconciliation transaction changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub updated: usize,
    /// Candidates dropped because their name folded onto an earlier one in the batch.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub total_countries: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

/// Case-insensitive identity key for country names.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
