use crate::server::router::MeridianState;
use axum::{
    Router,
    routing::{get, post},
};

pub mod extract;
pub mod handlers;

pub fn router() -> Router<MeridianState> {
    Router::new()
        .route("/countries", get(handlers::list_countries))
        .route("/countries/refresh", post(handlers::refresh_countries))
        .route("/countries/image", get(handlers::summary_image))
        .route(
            "/countries/{name}",
            get(handlers::get_country).delete(handlers::delete_country),
        )
}
