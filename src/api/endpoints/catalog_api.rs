use std::sync::Arc;

use axum::response::IntoResponse;
use log::error;

use crate::api::api_utils::error_response;
use crate::api::model::app_state::AppState;
use crate::services::catalog::load_catalog;

const CATALOG_CACHE_CONTROL: &str = "public, max-age=3600";

async fn channel_catalog(
    axum::extract::State(app_state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse + Send {
    match load_catalog(&app_state.http_client, &app_state.config.stream, &app_state.config.catalog).await {
        Ok(entries) => {
            ([(axum::http::header::CACHE_CONTROL, CATALOG_CACHE_CONTROL)], axum::Json(entries)).into_response()
        }
        Err(err) => {
            error!("catalog aggregation failed: {err}");
            error_response(&err)
        }
    }
}

pub fn catalog_api_register() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/channels/catalog", axum::routing::get(channel_catalog))
}
