use crate::error::MeridianError;
use crate::server::router::MeridianState;
use axum::{Json, Router, extract::State, routing::get};
use meridian_schema::StatusBody;

pub fn router() -> Router<MeridianState> {
    Router::new().route("/status", get(status_handler))
}

/// GET /status
pub async fn status_handler(
    State(state): State<MeridianState>,
) -> Result<Json<StatusBody>, MeridianError> {
    let snapshot = state.db.status().await?;
    Ok(Json(StatusBody {
        total_countries: snapshot.total_countries,
        last_refreshed_at: snapshot.last_refreshed_at,
    }))
}
