use std::sync::Arc;

use axum::response::IntoResponse;

use crate::api::api_utils::bad_request_response;
use crate::api::model::app_state::AppState;
use crate::api::model::request::{PageQuery, TitleQuery};
use crate::services::extractor::extract_manifest;
use crate::services::metadata::lookup_title;

/// Title enrichment boundary: a record when the lookup worked, `null` in
/// every other case.
async fn title_metadata(
    axum::extract::Query(api_req): axum::extract::Query<TitleQuery>,
    axum::extract::State(app_state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse + Send {
    let record = match &app_state.config.metadata {
        Some(cfg) => lookup_title(&app_state.http_client, &app_state.config.stream, cfg, &api_req.title).await,
        None => None,
    };
    axum::Json(record).into_response()
}

/// Page-scrape boundary for a third-party video platform. Unreliable by
/// nature and therefore always a 200 with an embedded error field.
async fn page_manifest(
    axum::extract::Query(api_req): axum::extract::Query<PageQuery>,
    axum::extract::State(app_state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse + Send {
    let page_url = api_req.url.trim();
    if page_url.is_empty() {
        return bad_request_response("missing url parameter");
    }
    let extraction = extract_manifest(&app_state.http_client, &app_state.config.stream, page_url).await;
    axum::Json(extraction).into_response()
}

pub fn media_api_register() -> axum::Router<Arc<AppState>> {
    axum::Router::new()
        .route("/metadata", axum::routing::get(title_metadata))
        .route("/extract", axum::routing::get(page_manifest))
}
