use super::extract::CountryListQuery;
use crate::error::MeridianError;
use crate::server::guards::auth::RequireAdminKey;
use crate::server::router::MeridianState;
use crate::summary;
use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use meridian_schema::{CountryBody, MessageBody, RefreshReportBody};
use tracing::warn;

/// POST /countries/refresh
pub async fn refresh_countries(
    _admin: RequireAdminKey,
    State(state): State<MeridianState>,
) -> Result<Json<RefreshReportBody>, MeridianError> {
    let report = tokio::time::timeout(state.refresh_timeout, state.refresh.refresh())
        .await
        .map_err(|_| {
            warn!(
                timeout_secs = state.refresh_timeout.as_secs(),
                "Refresh request timed out"
            );
            MeridianError::RefreshTimedOut
        })??;

    Ok(Json(report.into()))
}

/// GET /countries
pub async fn list_countries(
    State(state): State<MeridianState>,
    CountryListQuery(query): CountryListQuery,
) -> Result<Json<Vec<CountryBody>>, MeridianError> {
    let rows = state.db.list_countries(query).await?;
    Ok(Json(rows.into_iter().map(CountryBody::from).collect()))
}

/// GET /countries/{name}
pub async fn get_country(
    State(state): State<MeridianState>,
    Path(name): Path<String>,
) -> Result<Json<CountryBody>, MeridianError> {
    let row = state.db.get_country(&name).await?;
    Ok(Json(row.into()))
}

/// DELETE /countries/{name}
pub async fn delete_country(
    _admin: RequireAdminKey,
    State(state): State<MeridianState>,
    Path(name): Path<String>,
) -> Result<Json<MessageBody>, MeridianError> {
    state.db.delete_country(&name).await?;
    Ok(Json(MessageBody::new(format!(
        "Country '{name}' successfully deleted."
    ))))
}

/// GET /countries/image
pub async fn summary_image(State(state): State<MeridianState>) -> Result<Response, MeridianError> {
    let bytes = state.summary.load_or_rebuild(&state.db).await?;
    let cache_control = format!("public, max-age={}", state.image_max_age_secs);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, summary::CONTENT_TYPE)],
        [(header::CACHE_CONTROL, cache_control)],
        bytes,
    )
        .into_response())
}
