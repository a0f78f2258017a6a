use std::sync::Arc;

use axum::response::IntoResponse;
use chrono::Utc;
use log::error;

use crate::api::model::app_state::AppState;
use crate::model::channel::{ChannelLineupFailure, ChannelLineupResponse, SessionInfo};
use crate::provider::lineup::{fetch_channel_lineup, rewrite_channel_records};

/// Lineups are edge cacheable for a short window, stale responses may be
/// revalidated in the background for longer.
const LINEUP_CACHE_CONTROL: &str = "public, max-age=300, stale-while-revalidate=600";

async fn channel_session(
    axum::extract::State(app_state): axum::extract::State<Arc<AppState>>,
) -> impl axum::response::IntoResponse + Send {
    let session = app_state.session_factory.create_session();
    match fetch_channel_lineup(&app_state.http_client, &app_state.config.stream, &app_state.config.lineup, &session).await {
        Ok(lineup) => {
            let channels = rewrite_channel_records(lineup.channels, &app_state.config.lineup, &session, Utc::now());
            let response = ChannelLineupResponse {
                channels,
                session_info: SessionInfo {
                    device_id: session.device_id.clone(),
                    sid: session.sid.clone(),
                    generated_at: session.generated_at_rfc3339(),
                },
            };
            ([(axum::http::header::CACHE_CONTROL, LINEUP_CACHE_CONTROL)], axum::Json(response)).into_response()
        }
        Err(err) => {
            error!("channel lineup failed: {err}");
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, axum::Json(ChannelLineupFailure {
                error: String::from("ALL_PROVIDERS_FAILED"),
                message: err.to_string(),
                channels: Vec::new(),
            })).into_response()
        }
    }
}

pub fn channel_api_register() -> axum::Router<Arc<AppState>> {
    axum::Router::new().route("/channels/session", axum::routing::get(channel_session))
}
