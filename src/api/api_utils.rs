use axum::response::IntoResponse;
use serde_json::json;

use crate::tv_proxy_error::{TvProxyError, TvProxyErrorKind};
use crate::utils::constants::{PLAYLIST_CACHE_CONTROL, PLAYLIST_CONTENT_TYPE};

pub fn bad_request_response(message: &str) -> axum::response::Response {
    (axum::http::StatusCode::BAD_REQUEST, axum::Json(json!({"error": message}))).into_response()
}

pub fn error_response(err: &TvProxyError) -> axum::response::Response {
    let status = match err.kind {
        TvProxyErrorKind::Validation => axum::http::StatusCode::BAD_REQUEST,
        TvProxyErrorKind::UpstreamHttp => err.upstream_status
            .and_then(|status| axum::http::StatusCode::from_u16(status).ok())
            .unwrap_or(axum::http::StatusCode::BAD_GATEWAY),
        TvProxyErrorKind::UpstreamNetwork | TvProxyErrorKind::Internal => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        TvProxyErrorKind::ProviderExhausted => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, axum::Json(json!({"error": err.to_string()}))).into_response()
}

/// Playlist bodies must stay fresh at the edge.
pub fn playlist_response(body: String) -> axum::response::Response {
    axum::response::Response::builder()
        .status(axum::http::StatusCode::OK)
        .header(axum::http::header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
        .header(axum::http::header::CACHE_CONTROL, PLAYLIST_CACHE_CONTROL)
        .body(axum::body::Body::from(body))
        .unwrap()
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_status_is_propagated() {
        let err = TvProxyError::upstream_http(403, String::from("denied"));
        let response = error_response(&err);
        assert_eq!(response.status(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn exhausted_chain_maps_to_service_unavailable() {
        let err = TvProxyError::new(TvProxyErrorKind::ProviderExhausted, String::from("all endpoints failed"));
        assert_eq!(error_response(&err).status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        let err = TvProxyError::new(TvProxyErrorKind::Validation, String::from("missing url parameter"));
        assert_eq!(error_response(&err).status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
