use crate::db::{CountryQuery, SortOrder};
use crate::error::MeridianError;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
struct RawListParams {
    region: Option<String>,
    currency: Option<String>,
    sort: Option<String>,
}

/// Validated `GET /countries` query string.
///
/// - `region`, `currency`: trimmed; blank values are ignored.
/// - `sort`: `<gdp|name|population>[_<asc|desc>]`, case-insensitive; defaults to `name_asc`.
pub struct CountryListQuery(pub CountryQuery);

impl<S> FromRequestParts<S> for CountryListQuery
where
    S: Send + Sync,
{
    type Rejection = MeridianError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<RawListParams>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                debug!(error = %rejection, "Rejected /countries query string");
                MeridianError::validation("Invalid query parameters.")
            })?;

        let sort = match raw.sort.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => SortOrder::parse(s).map_err(|e| match e {
                MeridianError::Validation { message, .. } => MeridianError::Validation {
                    message,
                    details: Some(json!({ "sort": s })),
                },
                other => other,
            })?,
            None => SortOrder::default(),
        };

        Ok(Self(CountryQuery {
            region: non_blank(raw.region),
            currency: non_blank(raw.currency),
            sort,
        }))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
