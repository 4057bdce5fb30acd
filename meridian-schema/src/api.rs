use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted country as exposed by `GET /countries` and `GET /countries/{name}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CountryBody {
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

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StatusBody {
    pub total_countries: i64,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RefreshReportBody {
    pub message: String,
    pub fetched: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub updated: usize,
    pub summary_rendered: bool,
    pub last_refreshed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
